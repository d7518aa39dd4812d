use medscan::app::ScannerApp;
use medscan::config::Settings;
use medscan::error::AppError;
use tracing::Level;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

fn main() -> Result<(), AppError> {
    init_logging();
    let settings = Settings::load()?;
    ScannerApp::start_gui(settings)
}
