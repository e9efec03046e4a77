/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use crate::infrastructure::CacheStats;
use crate::models::ValidationResult;
use crate::orchestrator::AttemptStats;
use crate::workflow::AttemptCtx;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则默认 `info`，`verbose` 时为 `debug`。重复调用无副作用
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 手写步骤识别与校验");
    info!(
        "✍️ 停笔 {}ms / 防抖 {}ms / 最低置信度 {:.2}",
        config.pause_duration_ms, config.debounce_interval_ms, config.min_confidence
    );
    info!(
        "🧮 解题服务: {} (限流 {}/{}s, 最多 {} 次尝试)",
        config.validation_base_url,
        config.rate_limit_per_minute,
        config.rate_limit_window_secs,
        config.max_retries
    );
    if config.recognition_hmac_key.is_none() {
        warn!("⚠️ 未配置签名密钥，识别请求将不签名");
    }
    info!("{}", "=".repeat(60));
}

/// 记录作答开始信息
pub fn log_attempt_start(ctx: &AttemptCtx, steps: usize, strokes: usize) {
    info!("\n{}", "─".repeat(60));
    info!("📝 {} 开始回放: {} 步, {} 条笔画", ctx, steps, strokes);
    info!("{}", "─".repeat(60));
}

/// 记录单步校验结果
pub fn log_step_result(ctx: &AttemptCtx, step_index: usize, result: &ValidationResult) {
    let mark = match (result.is_correct, result.is_useful) {
        (true, true) => "✅",
        (true, false) => "🟡",
        (false, _) => "❌",
    };
    info!(
        "{} {} 第 {} 步{}: {}",
        ctx,
        mark,
        step_index,
        if result.was_cached { " (缓存)" } else { "" },
        truncate_text(&result.feedback_text, 80)
    );
}

/// 记录作答完成信息
pub fn log_attempt_complete(ctx: &AttemptCtx, stats: &AttemptStats) {
    info!(
        "✓ {} 完成: 正确 {}/{}, 有用 {}, 识别失败 {}, 最终答案: {}",
        ctx,
        stats.correct,
        stats.steps,
        stats.useful,
        stats.recognition_failures,
        if stats.reached_final_answer { "是" } else { "否" }
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `attempts`: 作答总数
/// - `finished`: 写出最终答案的作答数
/// - `totals`: 汇总统计
/// - `cache`: 缓存统计（缓存关闭时为 `None`）
pub fn print_final_stats(
    attempts: usize,
    finished: usize,
    totals: &AttemptStats,
    cache: Option<CacheStats>,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成作答: {}/{}", finished, attempts);
    info!("🧮 步骤: {} (正确 {}, 有用 {})", totals.steps, totals.correct, totals.useful);
    info!("❌ 识别失败: {}", totals.recognition_failures);
    match cache {
        Some(stats) => info!(
            "💾 缓存: 命中 {} / 未命中 {} ({:.0}%), 条目 {}",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            stats.entries
        ),
        None => info!("💾 缓存: 已关闭"),
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
