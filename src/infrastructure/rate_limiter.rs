//! 固定窗口限流器 - 基础设施层
//!
//! 窗口重置和计数在同一把锁内完成，多个校验请求并发时也是原子的

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// 限流器
///
/// 由应用构建一次，通过 `Arc` 注入给需要的编排器
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    /// 每分钟配额
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 尝试占用一个配额
    ///
    /// 窗口过期先重置；配额用完时返回 `false` 且不修改状态
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.started_at) >= self.window {
            debug!("限流窗口重置 (上个窗口 {} 次请求)", state.count);
            state.started_at = now;
            state.count = 0;
        }

        if state.count < self.limit {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// 当前窗口剩余配额
    pub async fn remaining(&self) -> u32 {
        let state = self.state.lock().await;
        if Instant::now().duration_since(state.started_at) >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(state.count)
        }
    }

    /// 距离窗口重置还有多久
    pub async fn retry_after(&self) -> Duration {
        let state = self.state.lock().await;
        let elapsed = Instant::now().duration_since(state.started_at);
        self.window.saturating_sub(elapsed)
    }
}
