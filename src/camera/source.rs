use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use tracing::info;

use crate::config::CameraSettings;
use crate::error::CameraError;

/// Boundary to the imaging device.
///
/// Pulls one full-resolution RGB frame at a time; the call blocks until the
/// device delivers the next frame. `stop` releases the device and must be
/// safe to call more than once.
pub trait FrameSource: Send {
    fn descriptor(&self) -> String;
    fn next_frame(&mut self) -> Result<RgbImage, CameraError>;
    fn stop(&mut self);
}

/// Webcam-backed frame source.
pub struct DeviceSource {
    camera: Camera,
    index: u32,
    streaming: bool,
}

impl DeviceSource {
    /// Opens the device and starts its stream. A failure here aborts
    /// startup; the camera handle is released again on drop.
    pub fn open(settings: &CameraSettings) -> Result<Self, CameraError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(settings.index), requested)
            .map_err(|e| CameraError::Open(settings.index, e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::Open(settings.index, e.to_string()))?;
        info!(
            "Opened camera {} ({})",
            settings.index,
            camera.info().human_name()
        );
        Ok(Self {
            camera,
            index: settings.index,
            streaming: true,
        })
    }
}

impl FrameSource for DeviceSource {
    fn descriptor(&self) -> String {
        format!("camera {} ({})", self.index, self.camera.info().human_name())
    }

    fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or(CameraError::EmptyFrame)
    }

    fn stop(&mut self) {
        if self.streaming {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {}", e);
            }
            self.streaming = false;
            info!("Released camera {}", self.index);
        }
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.stop();
    }
}
