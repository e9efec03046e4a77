//! 重试策略 - 基础设施层
//!
//! 指数退避：第 n 次失败后等待 `base * multiplier^(n-1)`。
//! 只有可重试的错误才会重试；次数用完或遇到不可重试的错误时，原样返回最后一次的错误。

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 重试配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待
    pub base_delay: Duration,
    /// 每次重试的等待倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exponent))
    }

    /// 执行 `operation`，按策略重试
    ///
    /// `operation` 收到当前的尝试序号（从 1 开始）
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("第 {} 次尝试成功", attempt);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable(&err) {
                        if attempt > 1 {
                            warn!("已尝试 {} 次，放弃: {}", attempt, err);
                        }
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "请求失败 (尝试 {}/{}), {}ms 后重试: {}",
                        attempt,
                        max_attempts,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
