use crate::models::Stroke;
use serde::{Deserialize, Serialize};

/// 一次作答的笔迹回放
///
/// `steps` 中每一项是学生写一步时落下的全部笔画
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptScript {
    pub problem_id: String,
    #[serde(default)]
    pub steps: Vec<Vec<Stroke>>,
}

impl AttemptScript {
    pub fn stroke_count(&self) -> usize {
        self.steps.iter().map(Vec::len).sum()
    }
}
