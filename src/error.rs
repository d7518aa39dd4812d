use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Camera Error: {0}")]
    Camera(#[from] CameraError),
    #[error("Analysis Error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("UI Error: {0}")]
    Ui(String),
}

// Capture Source Error Type
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera device {0}: {1}")]
    Open(u32, String),
    #[error("Failed to read frame from camera: {0}")]
    Read(String),
    #[error("Camera produced an empty frame")]
    EmptyFrame,
    #[error("Camera worker is not running")]
    Stopped,
    #[error("Timed out waiting for a still frame")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to encode still frame: {0}")]
    Encode(String),
    #[error("Vision API key not configured. Set vision.api_key or MEDSCAN__VISION__API_KEY")]
    MissingApiKey,
    #[error("Vision API request failed: {0}")]
    Request(String),
    #[error("Vision API returned an empty response")]
    EmptyResponse,
    #[error("Analysis worker is not running")]
    Stopped,
}
