//! 识别会话 - 流程层
//!
//! 核心职责：决定"什么时候识别"
//!
//! 状态流转：
//! Idle → Drawing → AwaitingPause → Recognizing → (Success | Failed)
//!
//! - 每完成一笔就重新计时，停笔超过设定时间才触发识别
//! - 距上次识别完成不足防抖间隔时，推迟到间隔结束再触发
//! - 新的一笔只取消计时器，已经发出的识别请求不受影响，结果仍会记录（后到的结果覆盖先到的）

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::Recognizer;
use crate::config::Config;
use crate::infrastructure::CancelableTimer;
use crate::models::{RecognitionResult, Stroke};

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Drawing,
    AwaitingPause,
    Recognizing,
    Success,
    Failed,
}

/// 会话设置
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// 停笔多久触发识别
    pub pause_duration: Duration,
    /// 两次识别之间的最小间隔
    pub debounce_interval: Duration,
    pub use_signature: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pause_duration: Duration::from_millis(500),
            debounce_interval: Duration::from_millis(500),
            use_signature: true,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pause_duration: config.pause_duration(),
            debounce_interval: config.debounce_interval(),
            use_signature: config.recognition_hmac_key.is_some(),
        }
    }
}

struct SessionState {
    phase: SessionPhase,
    /// 上次成功识别之后累积的笔画
    pending: Vec<Stroke>,
    timer: CancelableTimer,
    /// 每次笔画事件递增，过时的计时回调据此放弃
    generation: u64,
    last_completed_at: Option<Instant>,
    latest: Option<RecognitionResult>,
    closed: bool,
}

struct SessionCore<R> {
    recognizer: Arc<R>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    results: mpsc::UnboundedSender<RecognitionResult>,
}

impl<R: Recognizer> SessionCore<R> {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn debounce_remaining(&self, state: &SessionState) -> Option<Duration> {
        let last = state.last_completed_at?;
        let elapsed = Instant::now().duration_since(last);
        (elapsed < self.settings.debounce_interval)
            .then(|| self.settings.debounce_interval - elapsed)
    }

    fn arm_pause(self: &Arc<Self>, state: &mut SessionState, delay: Duration) {
        let generation = state.generation;
        let core = Arc::clone(self);
        state
            .timer
            .arm(delay, move || core.on_pause(generation));
    }

    async fn on_pause(self: Arc<Self>, generation: u64) {
        let Some(batch) = self.begin_recognition(generation) else {
            return;
        };
        self.dispatch(batch).await;
    }

    /// 计时器触发：检查防抖、过滤笔画，返回要识别的批次
    fn begin_recognition(self: &Arc<Self>, generation: u64) -> Option<Vec<Stroke>> {
        let mut state = self.state();
        if state.closed || state.generation != generation {
            return None;
        }
        // 回调运行在计时器自己的任务里，先放开句柄，后面的新笔画不会中断正在进行的请求
        state.timer.release();

        if let Some(remaining) = self.debounce_remaining(&state) {
            warn!(
                "⏱️ 距上次识别不足 {}ms，{}ms 后再试",
                self.settings.debounce_interval.as_millis(),
                remaining.as_millis()
            );
            self.arm_pause(&mut state, remaining);
            return None;
        }

        let total = state.pending.len();
        state.pending.retain(Stroke::is_valid_for_recognition);
        let dropped = total - state.pending.len();
        if dropped > 0 {
            warn!("丢弃 {} 条少于 2 个点的笔画", dropped);
        }

        if state.pending.is_empty() {
            debug!("没有可识别的笔画，回到 Idle");
            state.phase = SessionPhase::Idle;
            return None;
        }

        state.phase = SessionPhase::Recognizing;
        Some(state.pending.clone())
    }

    async fn dispatch(&self, batch: Vec<Stroke>) {
        let ids: BTreeSet<String> = batch.iter().map(|s| s.id.clone()).collect();
        info!("✍️ 开始识别 {} 条笔画", batch.len());

        let result = match self
            .recognizer
            .recognize(&batch, self.settings.use_signature)
            .await
        {
            Ok(result) => {
                info!("✓ 识别完成: {}", result.expression().unwrap_or("<空>"));
                result
            }
            Err(e) => {
                warn!("❌ 识别失败 ({:?}): {}", e.kind(), e);
                RecognitionResult::failed(&e, ids.clone())
            }
        };

        self.finish(result, &ids);
    }

    fn finish(&self, result: RecognitionResult, ids: &BTreeSet<String>) {
        let success = result.is_success();
        {
            let mut state = self.state();
            state.last_completed_at = Some(Instant::now());
            // 失败时保留笔画，下次停笔连同新笔画一起重试
            if success {
                state.pending.retain(|s| !ids.contains(&s.id));
            }
            // 识别期间用户又开始写了，阶段以用户为准
            if state.phase == SessionPhase::Recognizing {
                state.phase = if success {
                    SessionPhase::Success
                } else {
                    SessionPhase::Failed
                };
            }
            state.latest = Some(result.clone());
        }

        if self.results.send(result).is_err() {
            debug!("结果接收端已关闭");
        }
    }
}

/// 识别会话
///
/// 一次绘制会话一个实例；丢弃时自动关闭
pub struct RecognitionSession<R: Recognizer> {
    core: Arc<SessionCore<R>>,
}

impl<R: Recognizer> RecognitionSession<R> {
    /// 创建会话，同时返回识别结果的接收端
    pub fn new(
        recognizer: Arc<R>,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<RecognitionResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(SessionCore {
            recognizer,
            settings,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                pending: Vec::new(),
                timer: CancelableTimer::new(),
                generation: 0,
                last_completed_at: None,
                latest: None,
                closed: false,
            }),
            results: tx,
        });
        (Self { core }, rx)
    }

    /// 开始新的一笔：取消等待中的计时器
    pub fn stroke_started(&self) {
        let mut state = self.core.state();
        if state.closed {
            return;
        }
        state.generation += 1;
        if state.timer.cancel() {
            debug!("新笔画开始，取消停笔计时");
        }
        state.phase = SessionPhase::Drawing;
    }

    /// 完成一笔：加入待识别队列并重新计时
    pub fn stroke_completed(&self, stroke: Stroke) {
        let mut state = self.core.state();
        if state.closed {
            warn!("会话已关闭，忽略笔画 {}", stroke.id);
            return;
        }
        debug!("笔画完成: {} ({} 个点)", stroke.id, stroke.points.len());
        state.pending.push(stroke);
        state.generation += 1;
        self.core
            .arm_pause(&mut state, self.core.settings.pause_duration);
        state.phase = SessionPhase::AwaitingPause;
    }

    /// 距上次识别完成是否已超过防抖间隔
    pub fn can_recognize(&self) -> bool {
        let state = self.core.state();
        self.core.debounce_remaining(&state).is_none()
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.state().phase
    }

    pub fn latest_result(&self) -> Option<RecognitionResult> {
        self.core.state().latest.clone()
    }

    pub fn pending_stroke_count(&self) -> usize {
        self.core.state().pending.len()
    }

    /// 结束会话：取消计时器，之后不再发起识别
    pub fn close(&self) {
        let mut state = self.core.state();
        if state.closed {
            return;
        }
        state.closed = true;
        state.generation += 1;
        state.timer.cancel();
        info!("会话已关闭");
    }
}

impl<R: Recognizer> Drop for RecognitionSession<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, RecognitionError};
    use crate::models::StrokePoint;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockRecognizer {
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
        fail: AtomicBool,
        latency: Duration,
    }

    impl Recognizer for MockRecognizer {
        fn recognize(
            &self,
            strokes: &[Stroke],
            _use_signature: bool,
        ) -> impl Future<Output = Result<RecognitionResult, AppError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(strokes.len());
            let ids: BTreeSet<String> = strokes.iter().map(|s| s.id.clone()).collect();
            let fail = self.fail.load(Ordering::SeqCst);
            let latency = self.latency;
            async move {
                tokio::time::sleep(latency).await;
                if fail {
                    Err(RecognitionError::Service {
                        message: "mock failure".into(),
                    }
                    .into())
                } else {
                    Ok(RecognitionResult::success(
                        Some("x=7".into()),
                        None,
                        None,
                        Some(0.95),
                        ids,
                    ))
                }
            }
        }
    }

    fn stroke(id: &str, points: usize) -> Stroke {
        Stroke::new(
            id,
            (0..points)
                .map(|i| StrokePoint::new(i as f64, i as f64, 0.5, i as i64 * 10))
                .collect(),
        )
    }

    fn settings(pause_ms: u64, debounce_ms: u64) -> SessionSettings {
        SessionSettings {
            pause_duration: Duration::from_millis(pause_ms),
            debounce_interval: Duration::from_millis(debounce_ms),
            use_signature: false,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_strokes_fire_once() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, mut results) = RecognitionSession::new(mock.clone(), settings(500, 500));

        for i in 0..5 {
            session.stroke_started();
            session.stroke_completed(stroke(&format!("s{i}"), 3));
            assert_eq!(session.phase(), SessionPhase::AwaitingPause);
            tokio::time::sleep(ms(100)).await;
        }
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(ms(1000)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*mock.batch_sizes.lock().unwrap(), vec![5]);

        let result = results.recv().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.source_stroke_ids.len(), 5);
        assert_eq!(session.phase(), SessionPhase::Success);
        assert_eq!(session.pending_stroke_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_strokes_are_dropped() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, _results) = RecognitionSession::new(mock.clone(), settings(500, 500));

        session.stroke_completed(stroke("dot", 1));
        tokio::time::sleep(ms(600)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.pending_stroke_count(), 0);

        session.stroke_completed(stroke("dot2", 1));
        session.stroke_completed(stroke("line", 4));
        tokio::time::sleep(ms(600)).await;
        assert_eq!(*mock.batch_sizes.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_stroke_cancels_timer() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, _results) = RecognitionSession::new(mock.clone(), settings(500, 500));

        session.stroke_completed(stroke("a", 3));
        tokio::time::sleep(ms(400)).await;
        session.stroke_started();
        assert_eq!(session.phase(), SessionPhase::Drawing);

        tokio::time::sleep(ms(1000)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.pending_stroke_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_call_survives_new_stroke() {
        let mock = Arc::new(MockRecognizer {
            latency: ms(300),
            ..MockRecognizer::default()
        });
        let (session, mut results) = RecognitionSession::new(mock.clone(), settings(100, 0));

        session.stroke_completed(stroke("a", 3));
        tokio::time::sleep(ms(150)).await;
        assert_eq!(session.phase(), SessionPhase::Recognizing);

        session.stroke_started();
        let result = results.recv().await.unwrap();
        assert!(result.is_success());
        assert!(session.latest_result().is_some());
        // 用户在写，阶段不被识别结果覆盖
        assert_eq!(session.phase(), SessionPhase::Drawing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_recognize_after_debounce_interval() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, mut results) = RecognitionSession::new(mock.clone(), settings(100, 500));
        assert!(session.can_recognize());

        session.stroke_completed(stroke("a", 3));
        results.recv().await.unwrap();
        assert!(!session.can_recognize());

        tokio::time::sleep(ms(499)).await;
        assert!(!session.can_recognize());
        tokio::time::sleep(ms(2)).await;
        assert!(session.can_recognize());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_rejection_rearms() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, _results) = RecognitionSession::new(mock.clone(), settings(100, 500));

        session.stroke_completed(stroke("a", 3));
        tokio::time::sleep(ms(150)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);

        session.stroke_completed(stroke("b", 3));
        tokio::time::sleep(ms(250)).await;
        // 停笔计时已到，但还在防抖间隔内
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(ms(300)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*mock.batch_sizes.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_strokes() {
        let mock = Arc::new(MockRecognizer::default());
        mock.fail.store(true, Ordering::SeqCst);
        let (session, mut results) = RecognitionSession::new(mock.clone(), settings(100, 0));

        session.stroke_completed(stroke("a", 3));
        let result = results.recv().await.unwrap();
        assert!(!result.is_success());
        assert!(result.error.is_some());
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(session.pending_stroke_count(), 1);

        mock.fail.store(false, Ordering::SeqCst);
        session.stroke_completed(stroke("b", 3));
        let result = results.recv().await.unwrap();
        assert!(result.is_success());
        assert_eq!(*mock.batch_sizes.lock().unwrap(), vec![1, 2]);
        assert_eq!(session.pending_stroke_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_prevents_recognition() {
        let mock = Arc::new(MockRecognizer::default());
        let (session, _results) = RecognitionSession::new(mock.clone(), settings(100, 0));

        session.stroke_completed(stroke("a", 3));
        session.close();
        session.stroke_completed(stroke("b", 3));

        tokio::time::sleep(ms(500)).await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }
}
