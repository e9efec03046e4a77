use crate::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 识别状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStatus {
    Processing,
    Success,
    Error,
}

/// 一次识别尝试的结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub status: RecognitionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mathml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub timestamp_ms: i64,
    pub source_stroke_ids: BTreeSet<String>,
}

impl RecognitionResult {
    pub fn success(
        latex: Option<String>,
        mathml: Option<String>,
        plain_text: Option<String>,
        confidence: Option<f64>,
        source_stroke_ids: BTreeSet<String>,
    ) -> Self {
        Self {
            status: RecognitionStatus::Success,
            latex,
            mathml,
            plain_text,
            confidence,
            error: None,
            error_kind: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source_stroke_ids,
        }
    }

    pub fn failed(err: &AppError, source_stroke_ids: BTreeSet<String>) -> Self {
        Self {
            status: RecognitionStatus::Error,
            latex: None,
            mathml: None,
            plain_text: None,
            confidence: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source_stroke_ids,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecognitionStatus::Success
    }

    /// 供校验使用的表达式：优先 LaTeX，其次纯文本
    pub fn expression(&self) -> Option<&str> {
        self.latex
            .as_deref()
            .or(self.plain_text.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}
