//! 基础设施层
//!
//! 持有被多个编排器共享的资源（缓存、限流窗口）以及通用的定时、重试能力，
//! 不认识题目和笔画。

pub mod cache;
pub mod rate_limiter;
pub mod retry;
pub mod timer;

pub use cache::{CacheEntry, CacheStats, ResultCache};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use timer::CancelableTimer;
