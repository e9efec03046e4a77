//! # Ink Step Check
//!
//! 手写数学步骤的识别与校验流水线
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 与业务无关的通用能力
//! - `CancelableTimer` - 可取消的单次定时器（停笔检测）
//! - `ResultCache` - 带 TTL 的校验结果缓存
//! - `RateLimiter` - 固定窗口限流
//! - `RetryPolicy` - 指数退避重试
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 外部服务调用
//! - `RecognitionClient` - 手写识别（签名、两种请求结构、置信度门槛）
//! - `ValidationClient` - 远程解题服务
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个步骤
//! - `StepValidator` - 缓存 → 限流 → 远程解题 → 本地兜底
//! - `DebouncedValidator` - 合并连续的校验请求
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一次作答"的处理流程
//! - `RecognitionSession` - 停笔检测 + 防抖 + 识别
//! - `StepFlow` - 识别结果 → 步骤校验 → 最终答案判断
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/app` - 构建流水线，回放作答文件
//! - `orchestrator/attempt_processor` - 单次作答处理器
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{RecognitionClient, RecognitionSettings, Recognizer, ValidationClient};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use infrastructure::{CancelableTimer, RateLimiter, ResultCache, RetryPolicy};
pub use models::{Problem, ProblemCatalog, RecognitionResult, Stroke, ValidationRequest, ValidationResult};
pub use orchestrator::App;
pub use services::{is_final_answer, normalize_latex, DebouncedValidator, StepValidator};
pub use workflow::{AttemptCtx, RecognitionSession, SessionPhase, StepFlow, StepOutcome};
