pub mod analysis;
pub mod app;
pub mod camera;
pub mod common;
pub mod config;
pub mod error;

pub use error::{AnalysisError, AppError, CameraError};
