pub mod attempt_ctx;
pub mod recognition_session;
pub mod step_flow;

pub use attempt_ctx::AttemptCtx;
pub use recognition_session::{RecognitionSession, SessionPhase, SessionSettings};
pub use step_flow::{StepFlow, StepOutcome};
