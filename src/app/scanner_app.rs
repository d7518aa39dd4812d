use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, Receiver};
use tracing::{error, info};

use crate::analysis::{AnalysisOutcome, AnalysisWorker, VisionClient};
use crate::app::session::{Phase, Session};
use crate::app::views::{FrameView, View};
use crate::camera::{CameraClient, DeviceSource};
use crate::common::Frame;
use crate::config::Settings;
use crate::error::AppError;

const APP_TITLE: &str = "MedScan - Prescription Scanner";
const PREVIEW_REFRESH: Duration = Duration::from_millis(33);

/// The UI controller.
///
/// Owns the session context (camera worker, analysis worker and their
/// channels) for its lifetime and releases it exactly once on shutdown. All
/// state mutation happens on the UI thread; the workers only ever talk to it
/// through the preview and outcome channels.
pub struct ScannerApp {
    session: Session,
    camera: CameraClient,
    preview_rx: Receiver<Frame>,
    cached_preview: Option<Frame>,
    analysis: AnalysisWorker,
    outcome_rx: Receiver<AnalysisOutcome>,
    shut_down: bool,
}

impl ScannerApp {
    fn new(
        camera: CameraClient,
        preview_rx: Receiver<Frame>,
        analysis: AnalysisWorker,
        outcome_rx: Receiver<AnalysisOutcome>,
    ) -> Self {
        Self {
            session: Session::new(),
            camera,
            preview_rx,
            cached_preview: None,
            analysis,
            outcome_rx,
            shut_down: false,
        }
    }

    /// Acquires the capture device, starts the workers and runs the GUI
    /// until quit. Device acquisition failure aborts startup; the source
    /// releases itself on drop.
    pub fn start_gui(settings: Settings) -> Result<(), AppError> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(800.0, 700.0))
                .with_title(APP_TITLE),
            ..Default::default()
        };

        let (preview_tx, preview_rx) = mpsc::channel::<Frame>(8);
        let (outcome_tx, outcome_rx) = mpsc::channel::<AnalysisOutcome>(8);

        let source = DeviceSource::open(&settings.camera)?;
        let camera = CameraClient::spawn(source, settings.camera.clone(), preview_tx);
        let vision = VisionClient::new(&settings.vision)?;
        let analysis = AnalysisWorker::spawn(vision, outcome_tx);

        eframe::run_native(
            APP_TITLE,
            options,
            Box::new(move |_cc| {
                Ok(Box::new(ScannerApp::new(
                    camera, preview_rx, analysis, outcome_rx,
                )))
            }),
        )
        .map_err(|e| AppError::Ui(e.to_string()))
    }

    fn poll_outcomes(&mut self) {
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => self.session.apply_outcome(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Outcome receiver disconnected");
                    break;
                }
            }
        }
    }

    fn poll_preview(&mut self) {
        loop {
            match self.preview_rx.try_recv() {
                Ok(frame) => self.cached_preview = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Preview receiver disconnected");
                    break;
                }
            }
        }
    }

    fn on_capture(&mut self) {
        let result = self.camera.snapshot();
        self.session.record_capture(result);
    }

    fn on_confirm(&mut self) {
        if let Some(request) = self.session.begin_analysis() {
            let id = request.ticket.id();
            if let Err(e) = self.analysis.submit(request) {
                self.session.apply_outcome(AnalysisOutcome::Error {
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| match self.session.phase() {
            Phase::Live => {
                if ui.button("Capture").clicked() {
                    self.on_capture();
                }
            }
            Phase::Captured => {
                if ui.button("Confirm").clicked() {
                    self.on_confirm();
                }
                if ui.button("Retake").clicked() {
                    self.session.retake();
                }
            }
            Phase::Analyzing => {
                ui.add_enabled(false, egui::Button::new("Analyzing..."));
                if ui.button("Retake").clicked() {
                    self.session.retake();
                }
            }
        });
    }

    /// Orderly drain: stop the analysis worker first (waits for any
    /// outstanding call), then release the capture source.
    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down: draining analysis worker, releasing camera");
        self.analysis.shutdown();
        self.camera.stop();
    }
}

impl eframe::App for ScannerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_outcomes();
        self.poll_preview();

        if ctx.input(|i| i.key_pressed(egui::Key::Q)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::TopBottomPanel::bottom("controls")
            .resizable(false)
            .show(ctx, |ui| {
                self.draw_controls(ui);
                ui.separator();
                ui.label(self.session.status());
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let displayed = match self.session.phase() {
                Phase::Live => self.cached_preview.clone(),
                Phase::Captured | Phase::Analyzing => self.session.still().cloned(),
            };
            match displayed {
                Some(frame) => {
                    let name = if self.session.phase() == Phase::Live {
                        "preview_frame"
                    } else {
                        "still_frame"
                    };
                    FrameView::new(name, frame).draw(ui);
                }
                None => {
                    ui.heading("Waiting for camera...");
                }
            }
        });

        ctx.request_repaint_after(PREVIEW_REFRESH);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}
