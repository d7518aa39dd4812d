use std::time::Duration;

use chrono::Utc;
use image::{imageops, imageops::FilterType, RgbImage};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::common::Frame;
use crate::config::{CameraSettings, PreviewFormat};
use crate::error::CameraError;

use super::source::FrameSource;

enum CameraCommand {
    Snapshot(std::sync::mpsc::Sender<Result<Frame, CameraError>>),
}

/// Handle to the capture worker thread.
///
/// The worker owns the `FrameSource` for its whole lifetime: it continuously
/// publishes downscaled preview frames and answers on-demand snapshot
/// requests with a full-resolution still. `stop` cancels the worker and joins
/// it, releasing the device exactly once.
pub struct CameraClient {
    cancel_token: CancellationToken,
    command_tx: Sender<CameraCommand>,
    worker_thread: Option<std::thread::JoinHandle<()>>,
    snapshot_timeout: Duration,
}

impl CameraClient {
    pub fn spawn<S: FrameSource + 'static>(
        source: S,
        settings: CameraSettings,
        preview_tx: Sender<Frame>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let (command_tx, command_rx) = tokio::sync::mpsc::channel(4);
        let snapshot_timeout = Duration::from_secs(settings.snapshot_timeout_secs);
        let mut worker = CameraWorker {
            source,
            command_rx,
            preview_tx,
            settings,
        };
        Self {
            cancel_token: cancel_token.clone(),
            command_tx,
            worker_thread: Some(std::thread::spawn(move || worker.run(cancel_token))),
            snapshot_timeout,
        }
    }

    /// Captures a still frame from the high-resolution stream, downscaled to
    /// the configured target width. Blocks the caller for at most the
    /// configured snapshot timeout.
    pub fn snapshot(&self) -> Result<Frame, CameraError> {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        self.command_tx
            .try_send(CameraCommand::Snapshot(reply_tx))
            .map_err(|_| CameraError::Stopped)?;
        match reply_rx.recv_timeout(self.snapshot_timeout) {
            Ok(result) => result,
            Err(_) => Err(CameraError::Timeout),
        }
    }

    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(thread) = self.worker_thread.take() {
            if thread.join().is_err() {
                error!("Camera worker thread panicked");
            }
        }
    }
}

impl Drop for CameraClient {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CameraWorker<S: FrameSource> {
    source: S,
    command_rx: Receiver<CameraCommand>,
    preview_tx: Sender<Frame>,
    settings: CameraSettings,
}

impl<S: FrameSource> CameraWorker<S> {
    fn run(&mut self, cancel_token: CancellationToken) {
        info!("Capture worker started for {}", self.source.descriptor());
        while !cancel_token.is_cancelled() {
            match self.command_rx.try_recv() {
                Ok(CameraCommand::Snapshot(reply_tx)) => {
                    // The requester may have timed out and gone away.
                    let _ = reply_tx.send(self.capture_still());
                    continue;
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("Command channel closed, stopping capture loop");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }
            self.publish_preview();
        }
        self.source.stop();
        info!("Capture worker stopped");
    }

    fn publish_preview(&mut self) {
        let image = match self.source.next_frame() {
            Ok(image) => image,
            Err(e) => {
                error!("Failed to read preview frame: {}", e);
                std::thread::sleep(Duration::from_millis(50));
                return;
            }
        };
        if image.width() == 0 || image.height() == 0 {
            error!("Preview stream yielded an empty frame");
            return;
        }
        let preview = to_display_rgb(
            fit_to_width(&image, self.settings.preview_width),
            self.settings.low_res_format,
        );
        match self.preview_tx.try_send(Frame::new(preview, Utc::now())) {
            Ok(_) => {}
            Err(TrySendError::Full(_)) => {
                // Drop frame to keep the preview real-time.
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Preview channel closed, stopping capture loop");
            }
        }
    }

    fn capture_still(&mut self) -> Result<Frame, CameraError> {
        let image = self.source.next_frame()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(CameraError::EmptyFrame);
        }
        let still = fit_to_width(&image, self.settings.target_capture_width);
        Ok(Frame::new(still, Utc::now()))
    }
}

/// Scales an image to the given width, preserving aspect ratio.
fn fit_to_width(image: &RgbImage, target_width: u32) -> RgbImage {
    if image.width() == target_width || target_width == 0 {
        return image.clone();
    }
    let target_height =
        ((target_width as u64 * image.height() as u64) / image.width() as u64).max(1) as u32;
    imageops::resize(image, target_width, target_height, FilterType::Triangle)
}

/// Normalizes a preview frame to RGB channel order for display.
fn to_display_rgb(image: RgbImage, format: PreviewFormat) -> RgbImage {
    match format {
        PreviewFormat::Rgb => image,
        PreviewFormat::Bgr => {
            let (width, height) = (image.width(), image.height());
            let mut swapped: Vec<u8> = Vec::with_capacity(image.as_raw().len());
            // -- pixel order is B G R; convert to R G B
            for chunk in image.as_raw().chunks_exact(3) {
                swapped.extend_from_slice(&[chunk[2], chunk[1], chunk[0]]);
            }
            RgbImage::from_raw(width, height, swapped).unwrap_or(image)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedSource {
        frames: VecDeque<Result<RgbImage, CameraError>>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<RgbImage, CameraError>>) -> Self {
            Self {
                frames: frames.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn descriptor(&self) -> String {
            "scripted source".to_string()
        }

        fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
            std::thread::sleep(Duration::from_millis(5));
            self.frames
                .pop_front()
                .unwrap_or(Err(CameraError::Read("script exhausted".to_string())))
        }

        fn stop(&mut self) {}
    }

    fn test_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]))
    }

    fn settings() -> CameraSettings {
        CameraSettings {
            target_capture_width: 800,
            ..CameraSettings::default()
        }
    }

    #[test]
    fn snapshot_downscales_to_target_width() {
        let source = ScriptedSource::new((0..20).map(|_| Ok(test_image(1280, 720))).collect());
        let (preview_tx, _preview_rx) = tokio::sync::mpsc::channel(8);
        let mut client = CameraClient::spawn(source, settings(), preview_tx);
        let frame = client.snapshot().expect("snapshot should succeed");
        assert_eq!(frame.width(), 800);
        assert_eq!(frame.height(), 450);
        client.stop();
    }

    #[test]
    fn snapshot_surfaces_read_failure() {
        let source = ScriptedSource::new(
            (0..20)
                .map(|_| Err(CameraError::Read("sensor fault".to_string())))
                .collect(),
        );
        let (preview_tx, _preview_rx) = tokio::sync::mpsc::channel(8);
        let mut client = CameraClient::spawn(source, settings(), preview_tx);
        let result = client.snapshot();
        assert!(matches!(result, Err(CameraError::Read(_))));
        client.stop();
    }

    #[test]
    fn snapshot_rejects_empty_frames() {
        let source = ScriptedSource::new((0..20).map(|_| Ok(test_image(0, 0))).collect());
        let (preview_tx, _preview_rx) = tokio::sync::mpsc::channel(8);
        let mut client = CameraClient::spawn(source, settings(), preview_tx);
        let result = client.snapshot();
        assert!(matches!(result, Err(CameraError::EmptyFrame)));
        client.stop();
    }

    #[test]
    fn preview_frames_arrive_downscaled() {
        let source = ScriptedSource::new((0..50).map(|_| Ok(test_image(1280, 720))).collect());
        let (preview_tx, mut preview_rx) = tokio::sync::mpsc::channel(8);
        let mut client = CameraClient::spawn(source, settings(), preview_tx);
        let frame = preview_rx.blocking_recv().expect("preview frame expected");
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 360);
        client.stop();
    }

    #[test]
    fn bgr_preview_is_swapped_to_rgb() {
        let mut raw = RgbImage::new(2, 1);
        raw.put_pixel(0, 0, image::Rgb([1, 2, 3]));
        raw.put_pixel(1, 0, image::Rgb([4, 5, 6]));
        let swapped = to_display_rgb(raw, PreviewFormat::Bgr);
        assert_eq!(swapped.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(swapped.get_pixel(1, 0).0, [6, 5, 4]);
    }

    #[test]
    fn fit_to_width_is_identity_at_target() {
        let img = test_image(800, 600);
        let scaled = fit_to_width(&img, 800);
        assert_eq!(scaled.dimensions(), (800, 600));
    }
}
