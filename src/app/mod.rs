pub mod scanner_app;
pub mod session;
pub mod views;

pub use scanner_app::ScannerApp;
pub use session::{Phase, Session};
