use tracing::{debug, warn};

use crate::analysis::{AnalysisOutcome, AnalysisRequest, AnalysisTicket};
use crate::common::Frame;
use crate::error::CameraError;

const STATUS_LIVE: &str = "Live camera feed.";
const STATUS_CAPTURED: &str = "Image captured. Press 'Confirm' to analyze or 'Retake'.";
const STATUS_ANALYZING: &str = "Analyzing image with the vision model...";
const STATUS_ANALYSIS_IN_PROGRESS: &str = "Analysis already in progress. Please wait.";
const STATUS_NO_STILL: &str =
    "ERROR: No valid image to analyze. Please capture an image first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Live,
    Captured,
    Analyzing,
}

/// The UI controller's session state.
///
/// Owns the phase, the held still frame and the displayed status text, and is
/// the only place either is mutated. Completions arrive as
/// [`AnalysisOutcome`] messages and are matched against the active ticket, so
/// a completion that lands after a retake can never clobber the display.
pub struct Session {
    phase: Phase,
    still: Option<Frame>,
    status: String,
    active: Option<AnalysisTicket>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Live,
            still: None,
            status: STATUS_LIVE.to_string(),
            active: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn still(&self) -> Option<&Frame> {
        self.still.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Applies the result of a capture attempt. A failed capture reports the
    /// error inline and stays live rather than advancing with no still.
    pub fn record_capture(&mut self, result: Result<Frame, CameraError>) {
        if self.phase != Phase::Live {
            warn!("Ignoring capture while {:?}", self.phase);
            return;
        }
        match result {
            Ok(frame) => {
                debug!("Captured still frame {}", frame.id());
                self.still = Some(frame);
                self.phase = Phase::Captured;
                self.status = STATUS_CAPTURED.to_string();
            }
            Err(e) => {
                self.still = None;
                self.status = format!("ERROR during photo capture: {}", e);
            }
        }
    }

    /// Starts an analysis attempt for the held still.
    ///
    /// Returns the request to hand to the analysis worker, or `None` when the
    /// confirm is rejected (one already in flight, or no still held). At most
    /// one request is ever outstanding; a rejected confirm produces nothing.
    pub fn begin_analysis(&mut self) -> Option<AnalysisRequest> {
        // Also rejects while a retaken attempt is still outstanding: the
        // worker runs one request at a time and nothing is ever queued.
        if self.phase == Phase::Analyzing || self.active.is_some() {
            self.status = STATUS_ANALYSIS_IN_PROGRESS.to_string();
            return None;
        }
        let frame = match &self.still {
            Some(frame) => frame.clone(),
            None => {
                self.status = STATUS_NO_STILL.to_string();
                return None;
            }
        };
        let ticket = AnalysisTicket::new();
        self.active = Some(ticket.clone());
        self.phase = Phase::Analyzing;
        self.status = STATUS_ANALYZING.to_string();
        Some(AnalysisRequest { ticket, frame })
    }

    /// Discards the held still and returns to the live feed. An in-flight
    /// analysis is marked cancelled; its eventual completion is discarded.
    pub fn retake(&mut self) {
        if let Some(ticket) = &self.active {
            ticket.cancel();
        }
        self.still = None;
        self.phase = Phase::Live;
        self.status = STATUS_LIVE.to_string();
    }

    /// Consumes one completion message from the analysis worker.
    pub fn apply_outcome(&mut self, outcome: AnalysisOutcome) {
        let matches_active = self
            .active
            .as_ref()
            .map(|ticket| ticket.id() == outcome.id())
            .unwrap_or(false);
        if !matches_active {
            debug!("Ignoring completion for stale attempt {}", outcome.id());
            return;
        }
        self.active = None;
        match outcome {
            AnalysisOutcome::Success { text, .. } => {
                if self.phase == Phase::Analyzing {
                    self.status = text;
                    self.phase = Phase::Captured;
                }
                // Otherwise the session already moved on; discard the result.
            }
            AnalysisOutcome::Error { message, .. } => {
                if self.phase == Phase::Analyzing {
                    self.status = format!("ERROR during analysis: {}", message);
                    self.phase = Phase::Captured;
                }
            }
            AnalysisOutcome::Cancelled { reason, .. } => {
                self.status = format!("Analysis was cancelled: {}", reason);
                if self.phase == Phase::Analyzing {
                    self.phase = Phase::Captured;
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::RgbImage;

    fn still() -> Frame {
        Frame::new(
            RgbImage::from_pixel(8, 6, image::Rgb([100, 100, 100])),
            Utc::now(),
        )
    }

    #[test]
    fn capture_then_retake_clears_the_still() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        assert_eq!(session.phase(), Phase::Captured);
        assert!(session.still().is_some());

        session.retake();
        assert_eq!(session.phase(), Phase::Live);
        assert!(session.still().is_none());
    }

    #[test]
    fn failed_capture_stays_live_with_error_text() {
        let mut session = Session::new();
        session.record_capture(Err(CameraError::EmptyFrame));
        assert_eq!(session.phase(), Phase::Live);
        assert!(session.still().is_none());
        assert!(session.status().contains("ERROR during photo capture"));
    }

    #[test]
    fn second_confirm_is_rejected_while_analyzing() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let first = session.begin_analysis();
        assert!(first.is_some());

        let second = session.begin_analysis();
        assert!(second.is_none());
        assert_eq!(session.phase(), Phase::Analyzing);
        assert_eq!(session.status(), STATUS_ANALYSIS_IN_PROGRESS);
    }

    #[test]
    fn confirm_without_still_is_rejected() {
        let mut session = Session::new();
        assert!(session.begin_analysis().is_none());
        assert_eq!(session.phase(), Phase::Live);
        assert_eq!(session.status(), STATUS_NO_STILL);
    }

    #[test]
    fn success_completion_displays_text_and_reenables_controls() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let request = session.begin_analysis().expect("analysis should start");

        session.apply_outcome(AnalysisOutcome::Success {
            id: request.ticket.id(),
            text: "Identified Medications:\nAmoxicillin".to_string(),
        });
        assert_eq!(session.phase(), Phase::Captured);
        assert_eq!(session.status(), "Identified Medications:\nAmoxicillin");
    }

    #[test]
    fn retake_while_analyzing_marks_the_ticket_cancelled() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let request = session.begin_analysis().expect("analysis should start");
        assert!(!request.ticket.is_cancelled());

        session.retake();
        assert!(request.ticket.is_cancelled());
        assert_eq!(session.phase(), Phase::Live);
        assert!(session.still().is_none());
    }

    #[test]
    fn completion_after_retake_does_not_alter_the_display() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let request = session.begin_analysis().expect("analysis should start");
        session.retake();
        let status_after_retake = session.status().to_string();

        session.apply_outcome(AnalysisOutcome::Success {
            id: request.ticket.id(),
            text: "stale result".to_string(),
        });
        assert_eq!(session.phase(), Phase::Live);
        assert_eq!(session.status(), status_after_retake);

        session.apply_outcome(AnalysisOutcome::Error {
            id: request.ticket.id(),
            message: "stale error".to_string(),
        });
        assert_eq!(session.phase(), Phase::Live);
        assert_eq!(session.status(), status_after_retake);
    }

    #[test]
    fn cancelled_completion_after_retake_shows_a_notice_only() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let request = session.begin_analysis().expect("analysis should start");
        session.retake();

        session.apply_outcome(AnalysisOutcome::Cancelled {
            id: request.ticket.id(),
            reason: "analysis cancelled after the model call".to_string(),
        });
        assert_eq!(session.phase(), Phase::Live);
        assert!(session.status().contains("Analysis was cancelled"));
        assert!(session.still().is_none());
    }

    #[test]
    fn confirm_is_rejected_until_a_retaken_attempt_completes() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let request = session.begin_analysis().expect("analysis should start");
        session.retake();

        session.record_capture(Ok(still()));
        assert!(session.begin_analysis().is_none());
        assert_eq!(session.status(), STATUS_ANALYSIS_IN_PROGRESS);

        session.apply_outcome(AnalysisOutcome::Cancelled {
            id: request.ticket.id(),
            reason: "analysis cancelled before the model call".to_string(),
        });
        assert!(session.begin_analysis().is_some());
    }

    #[test]
    fn unrelated_completion_is_ignored() {
        let mut session = Session::new();
        session.record_capture(Ok(still()));
        let _request = session.begin_analysis().expect("analysis should start");

        session.apply_outcome(AnalysisOutcome::Success {
            id: uuid::Uuid::new_v4(),
            text: "someone else's result".to_string(),
        });
        assert_eq!(session.phase(), Phase::Analyzing);
        assert_eq!(session.status(), STATUS_ANALYZING);
    }
}
