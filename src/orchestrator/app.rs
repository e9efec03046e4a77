//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 管理应用生命周期，构建整条流水线并回放作答文件。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、加载题库、构建共享的缓存/限流器/客户端
//! 2. **加载作答**：读取作答回放文件（`Vec<AttemptScript>`）
//! 3. **逐个处理**：委托 attempt_processor 处理单次作答
//! 4. **全局统计**：汇总所有作答的结果和缓存命中情况

use crate::clients::RecognitionClient;
use crate::config::Config;
use crate::infrastructure::{RateLimiter, ResultCache};
use crate::models::{load_attempt_file, load_problem_catalog, AttemptScript};
use crate::orchestrator::attempt_processor::{self, AttemptStats};
use crate::services::StepValidator;
use crate::utils::logging;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    recognizer: Arc<RecognitionClient>,
    validator: Arc<StepValidator>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置无效")?;
        logging::log_startup(&config);

        info!("📁 正在加载题库: {}", config.problem_folder);
        let catalog = load_problem_catalog(&config.problem_folder)
            .await
            .with_context(|| format!("无法加载题库 {}", config.problem_folder))?;
        if catalog.is_empty() {
            warn!("⚠️ 题库为空");
        }

        // 缓存和限流器只构建一次，注入给校验服务
        let cache = Arc::new(ResultCache::new(config.cache_ttl()));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_window(),
        ));
        let validator = Arc::new(StepValidator::new(
            &config,
            Arc::new(catalog),
            cache,
            rate_limiter,
        ));
        let recognizer = Arc::new(RecognitionClient::new(&config));

        Ok(Self {
            config,
            recognizer,
            validator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let attempts = self.load_attempts().await?;

        if attempts.is_empty() {
            warn!("⚠️ 作答文件中没有内容，程序结束");
            return Ok(());
        }

        let mut totals = AttemptStats::default();
        let mut finished = 0;

        for (index, script) in attempts.iter().enumerate() {
            match attempt_processor::process_attempt(
                self.recognizer.clone(),
                self.validator.clone(),
                script,
                index + 1,
                &self.config,
            )
            .await
            {
                Ok(stats) => {
                    finished += usize::from(stats.reached_final_answer);
                    totals.steps += stats.steps;
                    totals.correct += stats.correct;
                    totals.useful += stats.useful;
                    totals.cached += stats.cached;
                    totals.recognition_failures += stats.recognition_failures;
                }
                Err(e) => error!("[作答 {}] ❌ 处理失败: {:#}", index + 1, e),
            }
        }

        let cache_stats = self.validator.cache_stats().await;
        logging::print_final_stats(attempts.len(), finished, &totals, cache_stats);

        Ok(())
    }

    /// 加载作答回放
    async fn load_attempts(&self) -> Result<Vec<AttemptScript>> {
        info!("📁 正在读取作答文件: {}", self.config.attempt_file);
        let attempts = load_attempt_file(Path::new(&self.config.attempt_file))
            .await
            .with_context(|| format!("无法读取作答文件 {}", self.config.attempt_file))?;
        Ok(attempts)
    }
}
