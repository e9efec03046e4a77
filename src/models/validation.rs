use serde::{Deserialize, Serialize};

/// 步骤校验请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub problem_id: String,
    pub student_step_expression: String,
    /// 从 1 开始
    pub step_number: u32,
    #[serde(default)]
    pub previous_steps: Vec<String>,
    pub problem_statement_expression: String,
}

/// 错误步骤的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepErrorKind {
    /// 括号不配对
    Syntax,
    /// 运算方向和预期相反
    Method,
    /// 其他计算错误
    Arithmetic,
}

impl StepErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepErrorKind::Syntax => "syntax",
            StepErrorKind::Method => "method",
            StepErrorKind::Arithmetic => "arithmetic",
        }
    }
}

/// 步骤校验结果，创建后不再修改
///
/// `is_useful` 只有在 `is_correct` 为真时才有"同义反复"的含义，但两个字段总是有值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: String,
    pub step_id: String,
    pub is_correct: bool,
    pub is_useful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StepErrorKind>,
    pub feedback_text: String,
    #[serde(default)]
    pub suggested_next_expressions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_next_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub was_cached: bool,
    pub timestamp_ms: i64,
}

impl ValidationResult {
    pub fn step_id_for(problem_id: &str, step_number: u32) -> String {
        format!("{}-step-{}", problem_id, step_number)
    }

    /// 缓存命中时返回的副本
    pub fn as_cached(&self) -> Self {
        Self {
            was_cached: true,
            ..self.clone()
        }
    }
}
