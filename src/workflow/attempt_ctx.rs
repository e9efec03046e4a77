//! 作答上下文
//!
//! 封装"学生正在做哪道题的第几次尝试"这一信息

use std::fmt::Display;

/// 作答上下文
#[derive(Debug, Clone)]
pub struct AttemptCtx {
    /// 题目ID
    pub problem_id: String,

    /// 尝试序号（仅用于日志显示，从1开始）
    pub attempt_index: usize,
}

impl AttemptCtx {
    pub fn new(problem_id: impl Into<String>, attempt_index: usize) -> Self {
        Self {
            problem_id: problem_id.into(),
            attempt_index,
        }
    }
}

impl Display for AttemptCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[题目 {} 尝试#{}]", self.problem_id, self.attempt_index)
    }
}
