pub mod client;
pub mod source;

pub use client::CameraClient;
pub use source::{DeviceSource, FrameSource};
