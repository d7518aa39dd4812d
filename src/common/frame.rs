use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::Arc;
use uuid::Uuid;

/// A single RGB frame from the capture source.
///
/// Used both for preview frames and for the held still. The pixel buffer is
/// immutable and shared; cloning a `Frame` never copies pixels.
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: DateTime<Utc>) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
            frame_id: Uuid::new_v4(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("size", &format!("{}x{}", self.width(), self.height()))
            .field("captured_at", &self.captured_at)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}
