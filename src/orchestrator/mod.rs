//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责构建流水线和调度作答回放，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 加载题库和作答文件
//! - 持有共享资源（缓存、限流器、识别客户端）
//! - 输出全局统计信息
//!
//! ### `attempt_processor` - 单次作答处理器
//! - 为每次作答创建识别会话和 StepFlow
//! - 按步骤回放笔画，等待识别结果
//! - 输出单次作答的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! app (处理 Vec<AttemptScript>)
//!     ↓
//! attempt_processor (处理一次作答的 Vec<步骤>)
//!     ↓
//! workflow (RecognitionSession / StepFlow)
//!     ↓
//! services (校验能力：远程解题 / 本地规则 / 防抖)
//!     ↓
//! clients + infrastructure (识别/解题客户端、缓存、限流、重试、计时器)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管整体，attempt_processor 管单次作答
//! 2. **资源隔离**：只有编排层构建缓存和限流器，下层通过注入使用
//! 3. **向下依赖**：编排层 → workflow → services → clients / infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体判断

pub mod app;
pub mod attempt_processor;

// 重新导出主要类型
pub use app::App;
pub use attempt_processor::{process_attempt, AttemptStats};
