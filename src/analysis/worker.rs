use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::Frame;
use crate::error::AnalysisError;

use super::encoder::{encode_jpeg, JPEG_QUALITY};
use super::postprocess::format_medication_report;
use super::vision::VisionBackend;

/// Fixed instruction prompt sent with every still frame.
pub const PROMPT: &str = "You are an AI assistant specialized in medical document analysis. \
Carefully examine the provided image. \
If the image contains a clear prescription, list ONLY the names of the medications. \
Present them as a comma-separated list. \
If no medications are identifiable or if the image is not a prescription, \
state 'No medications found' or describe the general content of the image concisely \
if it's clearly not a medical document. \
Examples:\n\
Prescription: 'Amoxicillin, Ibuprofen, Lisinopril'\n\
Not a prescription: 'A document containing various handwritten notes'\n\
No medications: 'No medications found'\n";

const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Identifies one analysis attempt and carries its cancellation flag.
///
/// Cancellation is advisory: the worker consults the flag before and after
/// the model call but never aborts a request already in flight.
#[derive(Clone)]
pub struct AnalysisTicket {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
}

impl AnalysisTicket {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for AnalysisTicket {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AnalysisRequest {
    pub ticket: AnalysisTicket,
    pub frame: Frame,
}

/// Tagged outcome of one analysis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Success { id: Uuid, text: String },
    Cancelled { id: Uuid, reason: String },
    Error { id: Uuid, message: String },
}

impl AnalysisOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            AnalysisOutcome::Success { id, .. }
            | AnalysisOutcome::Cancelled { id, .. }
            | AnalysisOutcome::Error { id, .. } => *id,
        }
    }
}

/// Single-worker background execution context for analysis calls.
///
/// Requests are processed strictly one at a time on a dedicated thread; the
/// outcome is posted to the controller's outcome channel. `shutdown` stops
/// accepting work and joins the thread, draining any outstanding request.
pub struct AnalysisWorker {
    request_tx: Option<std::sync::mpsc::Sender<AnalysisRequest>>,
    worker_thread: Option<std::thread::JoinHandle<()>>,
}

impl AnalysisWorker {
    pub fn spawn<B: VisionBackend + 'static>(
        backend: B,
        outcome_tx: Sender<AnalysisOutcome>,
    ) -> Self {
        let (request_tx, request_rx) = std::sync::mpsc::channel::<AnalysisRequest>();
        let worker_thread = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to build analysis runtime: {}", e);
                    return;
                }
            };
            info!("Analysis worker started");
            while let Ok(request) = request_rx.recv() {
                let outcome = runtime.block_on(run_analysis(&backend, request));
                if outcome_tx.blocking_send(outcome).is_err() {
                    warn!("Outcome channel closed, stopping analysis worker");
                    break;
                }
            }
            info!("Analysis worker stopped");
        });
        Self {
            request_tx: Some(request_tx),
            worker_thread: Some(worker_thread),
        }
    }

    pub fn submit(&self, request: AnalysisRequest) -> Result<(), AnalysisError> {
        match &self.request_tx {
            Some(tx) => tx.send(request).map_err(|_| AnalysisError::Stopped),
            None => Err(AnalysisError::Stopped),
        }
    }

    /// Stops accepting requests and waits for the worker to finish any
    /// outstanding one.
    pub fn shutdown(&mut self) {
        self.request_tx.take();
        if let Some(thread) = self.worker_thread.take() {
            if thread.join().is_err() {
                error!("Analysis worker thread panicked");
            }
        }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_analysis<B: VisionBackend>(backend: &B, request: AnalysisRequest) -> AnalysisOutcome {
    let id = request.ticket.id();
    if request.ticket.is_cancelled() {
        return AnalysisOutcome::Cancelled {
            id,
            reason: "analysis cancelled before the model call".to_string(),
        };
    }

    let image_bytes = match encode_jpeg(request.frame.image(), JPEG_QUALITY) {
        Ok(bytes) => bytes,
        Err(e) => {
            return AnalysisOutcome::Error {
                id,
                message: e.to_string(),
            }
        }
    };

    match backend.generate(&image_bytes, IMAGE_MIME_TYPE, PROMPT).await {
        Ok(raw) => {
            if request.ticket.is_cancelled() {
                // The response arrived after a retake; discard it.
                AnalysisOutcome::Cancelled {
                    id,
                    reason: "analysis cancelled after the model call".to_string(),
                }
            } else {
                AnalysisOutcome::Success {
                    id,
                    text: format_medication_report(&raw),
                }
            }
        }
        Err(e) => AnalysisOutcome::Error {
            id,
            message: e.to_string(),
        },
    }
}
