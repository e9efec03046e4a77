use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 标准解题步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedStep {
    pub step_number: u32,
    pub description: String,
    pub expression: String,
    /// 运算标签，如 "subtraction"、"division"、"simplify"
    #[serde(rename = "operation", alias = "operation_label")]
    pub operation_label: String,
}

/// 题目（只读参考数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// 题干表达式，如 `x+5=12`
    pub statement: String,
    /// 最终答案表达式，如 `x=7`
    pub answer: String,
    #[serde(default, rename = "steps")]
    pub expected_steps: Vec<ExpectedStep>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl Problem {
    /// 按步骤号查找
    pub fn step(&self, step_number: u32) -> Option<&ExpectedStep> {
        self.expected_steps
            .iter()
            .find(|s| s.step_number == step_number)
    }

    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }
}

/// 题库
///
/// 构建完成后只读，校验器通过 `Arc` 共享
#[derive(Debug, Clone, Default)]
pub struct ProblemCatalog {
    problems: HashMap<String, Problem>,
}

impl ProblemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_problems(problems: impl IntoIterator<Item = Problem>) -> Self {
        let mut catalog = Self::new();
        for problem in problems {
            catalog.insert(problem);
        }
        catalog
    }

    /// 同 id 的题目会被覆盖
    pub fn insert(&mut self, problem: Problem) {
        self.problems.insert(problem.id.clone(), problem);
    }

    pub fn get(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.get(problem_id)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
