/// 防抖校验
///
/// 静默期内的连续请求合并成一次调用；在结果返回之前再次请求的调用方拿到同一个 future
use crate::config::Config;
use crate::error::{AppError, ValidationError};
use crate::models::{ValidationRequest, ValidationResult};
use crate::services::StepValidator;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub type ValidationOutcome = Result<ValidationResult, Arc<AppError>>;
pub type PendingValidation = Shared<BoxFuture<'static, ValidationOutcome>>;

struct PendingCall {
    id: u64,
    request: ValidationRequest,
    deadline: Instant,
    fired: bool,
    future: PendingValidation,
}

struct Inner {
    validator: Arc<StepValidator>,
    quiet_period: Duration,
    slot: Mutex<Option<PendingCall>>,
    next_id: AtomicU64,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<PendingCall>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, id: u64) -> ValidationOutcome {
        // 等到静默期结束；期间截止时间可能被后来的调用推迟
        let request = loop {
            let deadline = {
                let mut slot = self.slot();
                let Some(call) = slot.as_mut().filter(|c| c.id == id) else {
                    return Err(Arc::new(ValidationError::Cancelled.into()));
                };
                if Instant::now() >= call.deadline {
                    call.fired = true;
                    break call.request.clone();
                }
                call.deadline
            };
            tokio::time::sleep_until(deadline).await;
        };

        debug!(
            "防抖结束，校验 {} 第 {} 步",
            request.problem_id, request.step_number
        );
        let outcome = self.validator.validate(&request).await.map_err(Arc::new);

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|c| c.id == id) {
            *slot = None;
        }
        outcome
    }
}

/// 防抖校验器
pub struct DebouncedValidator {
    inner: Arc<Inner>,
}

impl DebouncedValidator {
    pub fn new(validator: Arc<StepValidator>, quiet_period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                validator,
                quiet_period,
                slot: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_config(validator: Arc<StepValidator>, config: &Config) -> Self {
        Self::new(validator, config.validation_debounce())
    }

    /// 提交校验请求
    ///
    /// 尚未触发时，新请求替换旧请求并推迟触发时间；已触发但未返回时，直接复用进行中的 future
    pub fn validate(&self, request: ValidationRequest) -> PendingValidation {
        let mut slot = self.inner.slot();
        let deadline = Instant::now() + self.inner.quiet_period;

        if let Some(call) = slot.as_mut() {
            if !call.fired {
                debug!("合并校验请求，推迟到静默期结束");
                call.request = request;
                call.deadline = deadline;
            }
            return call.future.clone();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let future = self.inner.clone().run(id).boxed().shared();
        // 没有人 await 时也要按时触发
        tokio::spawn(future.clone());

        *slot = Some(PendingCall {
            id,
            request,
            deadline,
            fired: false,
            future: future.clone(),
        });
        future
    }

    /// 取消尚未触发的请求；等待中的调用方收到 `Cancelled`
    pub fn cancel(&self) -> bool {
        let mut slot = self.inner.slot();
        match slot.as_ref() {
            Some(call) if !call.fired => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner.slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::{RateLimiter, ResultCache};
    use crate::models::{ExpectedStep, Problem, ProblemCatalog};

    fn validator() -> Arc<StepValidator> {
        let catalog = ProblemCatalog::from_problems([Problem {
            id: "linear-1".into(),
            title: String::new(),
            statement: "x+5=12".into(),
            answer: "x=7".into(),
            expected_steps: vec![ExpectedStep {
                step_number: 1,
                description: "Subtract 5 from both sides".into(),
                expression: "x+5-5=12-5".into(),
                operation_label: "subtraction".into(),
            }],
            file_path: None,
        }]);
        // 远程不可达，结果全部来自本地校验；单次尝试避免重试等待
        let config = Config {
            validation_base_url: "http://127.0.0.1:9".into(),
            max_retries: 1,
            ..Config::default()
        };
        Arc::new(StepValidator::new(
            &config,
            Arc::new(catalog),
            Arc::new(ResultCache::default()),
            Arc::new(RateLimiter::per_minute(60)),
        ))
    }

    fn request(expr: &str) -> ValidationRequest {
        ValidationRequest {
            problem_id: "linear-1".into(),
            student_step_expression: expr.into(),
            step_number: 1,
            previous_steps: vec![],
            problem_statement_expression: "x+5=12".into(),
        }
    }

    #[tokio::test]
    async fn test_rapid_calls_coalesce_to_latest() {
        let debounced = DebouncedValidator::new(validator(), Duration::from_millis(50));

        let first = debounced.validate(request("x+5+5=12+5"));
        let second = debounced.validate(request("x+5-5=12-6"));
        let third = debounced.validate(request("x+5-5=12-5"));

        let (a, b, c) = tokio::join!(first, second, third);
        let a = a.unwrap();
        // 三个调用方拿到同一个结果，且是最后一次请求的结果
        assert_eq!(a.id, b.unwrap().id);
        assert_eq!(a.id, c.unwrap().id);
        assert!(a.is_correct);
        assert!(!debounced.has_pending());
    }

    #[tokio::test]
    async fn test_new_call_after_settle_is_independent() {
        let config = Config {
            validation_debounce_ms: 10,
            ..Config::default()
        };
        let debounced = DebouncedValidator::from_config(validator(), &config);

        let first = debounced.validate(request("x+5-5=12-5")).await.unwrap();
        let second = debounced.validate(request("x+5+5=12+5")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.is_correct);
        assert!(!second.is_correct);
    }

    #[tokio::test]
    async fn test_cancel_before_fire() {
        let debounced = DebouncedValidator::new(validator(), Duration::from_millis(200));

        let pending = debounced.validate(request("x+5-5=12-5"));
        assert!(debounced.cancel());
        assert!(!debounced.cancel());

        let err = pending.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(matches!(
            err.as_ref(),
            AppError::Validation(ValidationError::Cancelled)
        ));
    }
}
