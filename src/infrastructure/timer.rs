//! 可取消的单次定时器 - 基础设施层
//!
//! 重新 `arm` 会取消上一个尚未触发的定时器，同一个句柄上最多只有一个在等待

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 单次定时器句柄
///
/// 回调运行在独立的 tokio 任务中；`cancel` 只能取消尚未触发的等待，
/// 回调里再派生出去的任务不受影响。
#[derive(Debug, Default)]
pub struct CancelableTimer {
    handle: Option<JoinHandle<()>>,
}

impl CancelableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `delay` 之后执行 `callback`，并取消之前的定时器
    pub fn arm<F, Fut>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback().await;
        }));
    }

    /// 取消等待中的定时器；已经触发或不存在时什么也不做
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// 放弃句柄但不取消（回调自身调用，避免取消正在运行的自己）
    pub fn release(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
