//! 单次作答处理器 - 编排层
//!
//! ## 职责
//!
//! 回放一次作答的笔迹，逐步驱动 识别会话 → 作答流程。
//!
//! ## 核心功能
//!
//! 1. **会话管理**：每次作答创建一个 `RecognitionSession`，结束时关闭
//! 2. **笔迹回放**：按步骤把笔画交给会话，等待停笔识别的结果
//! 3. **步骤校验**：把识别结果交给 `StepFlow`
//! 4. **统计输出**：记录正确/有用/识别失败数量

use crate::clients::Recognizer;
use crate::config::Config;
use crate::models::AttemptScript;
use crate::services::StepValidator;
use crate::utils::logging;
use crate::workflow::{AttemptCtx, RecognitionSession, SessionSettings, StepFlow, StepOutcome};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 作答统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttemptStats {
    pub steps: usize,
    pub correct: usize,
    pub useful: usize,
    pub cached: usize,
    pub recognition_failures: usize,
    pub reached_final_answer: bool,
}

/// 处理单次作答
///
/// # 参数
/// - `recognizer`: 识别能力
/// - `validator`: 步骤校验服务
/// - `script`: 笔迹回放
/// - `attempt_index`: 作答序号（用于日志）
/// - `config`: 配置
///
/// # 返回
/// 本次作答的统计
pub async fn process_attempt<R: Recognizer>(
    recognizer: Arc<R>,
    validator: Arc<StepValidator>,
    script: &AttemptScript,
    attempt_index: usize,
    config: &Config,
) -> Result<AttemptStats> {
    let ctx = AttemptCtx::new(script.problem_id.clone(), attempt_index);
    logging::log_attempt_start(&ctx, script.steps.len(), script.stroke_count());

    let mut flow = StepFlow::new(validator, ctx.clone())
        .with_context(|| format!("{} 无法开始作答", ctx))?;
    let (session, mut results) =
        RecognitionSession::new(recognizer, SessionSettings::from_config(config));

    // 停笔 + 防抖 + 网络超时之后仍没有结果，视为丢失
    let wait_limit = config.pause_duration()
        + config.debounce_interval()
        + Duration::from_millis(config.recognition_timeout_ms)
        + Duration::from_secs(1);

    let mut stats = AttemptStats::default();

    for (index, strokes) in script.steps.iter().enumerate() {
        if flow.is_finished() {
            warn!("{} 作答已结束，忽略剩余 {} 步", ctx, script.steps.len() - index);
            break;
        }

        for stroke in strokes {
            session.stroke_started();
            session.stroke_completed(stroke.clone());
        }

        let recognition = match tokio::time::timeout(wait_limit, results.recv()).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                error!("{} 识别结果通道已关闭", ctx);
                break;
            }
            Err(_) => {
                warn!("{} 第 {} 步没有产生识别结果（笔画无效或已超时）", ctx, index + 1);
                continue;
            }
        };

        stats.steps += 1;
        match flow.submit(&recognition).await {
            Ok(StepOutcome::Validated { result, is_final }) => {
                logging::log_step_result(&ctx, index + 1, &result);
                stats.correct += usize::from(result.is_correct);
                stats.useful += usize::from(result.is_correct && result.is_useful);
                stats.cached += usize::from(result.was_cached);
                stats.reached_final_answer |= is_final;
            }
            Ok(StepOutcome::RecognitionFailed { message, kind }) => {
                warn!("{} 识别失败 ({:?}): {}", ctx, kind, message);
                stats.recognition_failures += 1;
            }
            Ok(StepOutcome::AttemptClosed) => break,
            Err(e) => {
                error!("{} 第 {} 步校验失败: {}", ctx, index + 1, e);
            }
        }
    }

    session.close();
    logging::log_attempt_complete(&ctx, &stats);
    info!("{} 已接受步骤: {:?}", ctx, flow.accepted_steps());

    Ok(stats)
}
