/// 步骤校验服务
///
/// 缓存 → 限流 → 远程解题（带重试）→ 对照解答；远程失败或没有匹配时降级为本地校验
use crate::clients::{SolveResponse, ValidationClient};
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ValidationError};
use crate::infrastructure::{CacheStats, RateLimiter, ResultCache, RetryPolicy};
use crate::models::{Problem, ProblemCatalog, ValidationRequest, ValidationResult};
use crate::services::local_validator::{feedback_for, is_useful_step, validate_locally};
use crate::services::normalize::{self, normalize_latex};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 步骤校验服务
///
/// 缓存和限流器由应用构建后注入，可以在多个校验服务之间共享
pub struct StepValidator {
    catalog: Arc<ProblemCatalog>,
    client: ValidationClient,
    cache: Option<Arc<ResultCache>>,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl StepValidator {
    /// 创建新的校验服务
    pub fn new(
        config: &Config,
        catalog: Arc<ProblemCatalog>,
        cache: Arc<ResultCache>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            catalog,
            client: ValidationClient::new(config),
            cache: config.cache_enabled.then_some(cache),
            rate_limiter,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
                config.retry_multiplier,
            ),
        }
    }

    /// 替换解题客户端（测试或切换服务时使用）
    pub fn with_client(mut self, client: ValidationClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn catalog(&self) -> &ProblemCatalog {
        &self.catalog
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    fn problem(&self, problem_id: &str) -> AppResult<&Problem> {
        self.catalog
            .get(problem_id)
            .ok_or_else(|| AppError::problem_not_found(problem_id))
    }

    /// 是否已写出最终答案；只比较规范化后的表达式
    pub fn is_final_answer(&self, problem_id: &str, student_expression: &str) -> AppResult<bool> {
        let problem = self.problem(problem_id)?;
        Ok(normalize::is_final_answer(student_expression, problem))
    }

    /// 校验一个步骤
    ///
    /// # 参数
    /// - `request`: 校验请求
    ///
    /// # 返回
    /// 校验结果；题目不存在或超出限流配额时返回错误，远程服务失败不会报错
    pub async fn validate(&self, request: &ValidationRequest) -> AppResult<ValidationResult> {
        let problem = self.problem(&request.problem_id)?;
        let normalized = normalize_latex(&request.student_step_expression);
        let cache_key = ResultCache::key_for(&request.problem_id, request.step_number, &normalized);

        // 1. 缓存
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&cache_key).await {
                info!("💾 缓存命中: {} 第 {} 步", request.problem_id, request.step_number);
                return Ok(hit.as_cached());
            }
        }

        // 2. 限流
        if !self.rate_limiter.try_acquire().await {
            let retry_after = self.rate_limiter.retry_after().await;
            warn!("⏳ 校验请求被限流，{}ms 后可重试", retry_after.as_millis());
            return Err(ValidationError::RateLimitExceeded {
                limit: self.rate_limiter.limit(),
                window: self.rate_limiter.window(),
                retry_after,
            }
            .into());
        }

        // 3. 远程解题 + 4. 对照
        let statement = if request.problem_statement_expression.trim().is_empty() {
            problem.statement.as_str()
        } else {
            request.problem_statement_expression.as_str()
        };

        let remote = self
            .retry
            .run(
                |attempt| {
                    debug!("远程解题第 {} 次尝试", attempt);
                    self.client.solve(statement)
                },
                ApiError::is_retryable,
            )
            .await;

        let result = match remote {
            Ok(response) => match reconcile(request, problem, &normalized, &response) {
                Some(result) => {
                    info!("✓ 远程解答匹配: {} 第 {} 步", request.problem_id, request.step_number);
                    result
                }
                None => {
                    debug!("远程解答中没有匹配的步骤，使用本地校验");
                    validate_locally(request, problem)
                }
            },
            Err(e) => {
                warn!("⚠️ 远程解题失败，降级为本地校验: {}", e);
                validate_locally(request, problem)
            }
        };

        // 5. 写回缓存
        if let Some(cache) = &self.cache {
            cache.set(cache_key, result.clone()).await;
        }

        Ok(result)
    }
}

/// 在远程解答中查找规范化后相同的步骤；匹配即正确，是否有用与本地规则一致，下一步作为提示
fn reconcile(
    request: &ValidationRequest,
    problem: &Problem,
    normalized: &str,
    response: &SolveResponse,
) -> Option<ValidationResult> {
    let steps: Vec<_> = response.steps().collect();
    let index = steps.iter().position(|step| {
        step.expression_text()
            .is_some_and(|expr| normalize_latex(expr) == normalized)
    })?;

    let next = steps
        .get(index + 1)
        .and_then(|s| s.expression_text())
        .map(str::to_string);
    let is_useful = is_useful_step(normalized, &request.previous_steps);
    // 无用的一步提示下一步的做法
    let hinted = if is_useful { steps.get(index) } else { steps.get(index + 1) };
    let description = hinted
        .and_then(|s| s.description.as_deref())
        .or_else(|| problem.step(request.step_number).map(|s| s.description.as_str()));

    Some(ValidationResult {
        id: uuid::Uuid::new_v4().to_string(),
        step_id: ValidationResult::step_id_for(&request.problem_id, request.step_number),
        is_correct: true,
        is_useful,
        error_kind: None,
        feedback_text: feedback_for(true, is_useful, None, description),
        suggested_next_expressions: next.iter().cloned().collect(),
        expected_next_expression: next,
        confidence: Some(1.0),
        was_cached: false,
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}
