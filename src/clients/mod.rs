use crate::error::AppError;
use crate::models::{RecognitionResult, Stroke};
use std::future::Future;

pub mod recognition_client;
pub mod validation_client;

pub use recognition_client::{RecognitionClient, RecognitionSettings};
pub use validation_client::{SolveResponse, SolvingStep, ValidationClient};

/// 识别能力
///
/// 识别会话只依赖这个能力，测试时可以换成假的实现
pub trait Recognizer: Send + Sync + 'static {
    fn recognize(
        &self,
        strokes: &[Stroke],
        use_signature: bool,
    ) -> impl Future<Output = Result<RecognitionResult, AppError>> + Send;
}
