pub mod encoder;
pub mod postprocess;
pub mod vision;
pub mod worker;

pub use vision::{VisionBackend, VisionClient};
pub use worker::{AnalysisOutcome, AnalysisRequest, AnalysisTicket, AnalysisWorker};
