//! 作答步骤流程 - 流程层
//!
//! 核心职责：把一次识别结果变成一次步骤校验
//!
//! 流程顺序：
//! 1. 识别失败 → 本次尝试结束（识别没有本地兜底）
//! 2. 识别成功 → 按已接受的步骤编号 → 校验
//! 3. 步骤正确 → 记入已接受步骤；写出最终答案 → 本次尝试结束

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppResult, ErrorKind};
use crate::models::{RecognitionResult, ValidationRequest, ValidationResult};
use crate::services::StepValidator;
use crate::workflow::attempt_ctx::AttemptCtx;

/// 单步处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// 校验完成
    Validated {
        result: ValidationResult,
        is_final: bool,
    },
    /// 识别失败，本次尝试结束
    RecognitionFailed {
        message: String,
        kind: Option<ErrorKind>,
    },
    /// 尝试已经结束，不再接受新步骤
    AttemptClosed,
}

/// 作答步骤流程
///
/// - 一次尝试一个实例
/// - 只依赖校验能力（services），不持有识别会话
pub struct StepFlow {
    validator: Arc<StepValidator>,
    ctx: AttemptCtx,
    statement: String,
    accepted_steps: Vec<String>,
    finished: bool,
}

impl StepFlow {
    /// 创建新的作答流程；题目不存在时报错
    pub fn new(validator: Arc<StepValidator>, ctx: AttemptCtx) -> AppResult<Self> {
        let statement = validator
            .catalog()
            .get(&ctx.problem_id)
            .map(|p| p.statement.clone())
            .ok_or_else(|| crate::error::AppError::problem_not_found(&ctx.problem_id))?;

        Ok(Self {
            validator,
            ctx,
            statement,
            accepted_steps: Vec::new(),
            finished: false,
        })
    }

    pub fn ctx(&self) -> &AttemptCtx {
        &self.ctx
    }

    pub fn accepted_steps(&self) -> &[String] {
        &self.accepted_steps
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 下一步的校验请求
    pub fn next_request(&self, expression: &str) -> ValidationRequest {
        ValidationRequest {
            problem_id: self.ctx.problem_id.clone(),
            student_step_expression: expression.to_string(),
            step_number: self.accepted_steps.len() as u32 + 1,
            previous_steps: self.accepted_steps.clone(),
            problem_statement_expression: self.statement.clone(),
        }
    }

    /// 提交一次识别结果
    pub async fn submit(&mut self, recognition: &RecognitionResult) -> AppResult<StepOutcome> {
        if self.finished {
            return Ok(StepOutcome::AttemptClosed);
        }

        let expression = match recognition.expression() {
            Some(expr) if recognition.is_success() => expr.to_string(),
            _ => {
                let message = recognition
                    .error
                    .clone()
                    .unwrap_or_else(|| "识别结果为空".to_string());
                warn!("{} ❌ 识别失败，本次尝试结束: {}", self.ctx, message);
                self.finished = true;
                return Ok(StepOutcome::RecognitionFailed {
                    message,
                    kind: recognition.error_kind,
                });
            }
        };

        let request = self.next_request(&expression);
        let result = self.validator.validate(&request).await?;

        let is_final =
            result.is_correct && self.validator.is_final_answer(&self.ctx.problem_id, &expression)?;

        info!(
            "{} 第 {} 步 {} → correct={}, useful={}{}",
            self.ctx,
            request.step_number,
            expression,
            result.is_correct,
            result.is_useful,
            if is_final { " 🎉 最终答案" } else { "" }
        );

        if result.is_correct {
            self.accepted_steps.push(expression);
        }
        if is_final {
            self.finished = true;
        }

        Ok(StepOutcome::Validated { result, is_final })
    }
}
