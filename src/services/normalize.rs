/// 表达式规范化
///
/// 缓存键、本地校验和最终答案判断共用同一套规范化规则
use crate::models::Problem;
use regex::Regex;
use std::sync::LazyLock;

static BACKSLASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\{2,}").expect("valid backslash run regex"));

static DIRECTIONAL_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(left|right)\b").expect("valid directional paren regex"));

// 恒等运算：+0 / -0 / *1 / /1（含 LaTeX 写法）。
// 规则很粗糙，`/10`、`-0.5` 也会命中，保持原样。
static IDENTITY_OP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+0|-0|\*1|/1|\\times1|\\cdot1|\\div1").expect("valid identity op regex"));

/// 规范化 LaTeX 表达式
///
/// 折叠连续反斜杠、去掉 `\left` / `\right`、去掉所有空白、转小写
pub fn normalize_latex(expression: &str) -> String {
    let collapsed = BACKSLASH_RUN.replace_all(expression, r"\");
    let stripped = DIRECTIONAL_PAREN.replace_all(&collapsed, "");
    stripped
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 规范化后是否与题目答案相同；纯函数，不访问缓存和网络
pub fn is_final_answer(student_expression: &str, problem: &Problem) -> bool {
    let student = normalize_latex(student_expression);
    !student.is_empty() && student == normalize_latex(&problem.answer)
}

/// 是否包含恒等运算（已规范化的表达式）
pub fn contains_identity_op(normalized: &str) -> bool {
    IDENTITY_OP.is_match(normalized)
}

/// 括号数量是否配对
pub fn parens_balanced(expression: &str) -> bool {
    let open = expression.chars().filter(|c| *c == '(').count();
    let close = expression.chars().filter(|c| *c == ')').count();
    open == close
}

/// 四则运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// 从运算标签推断，如 "subtraction"、"Divide both sides"
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("subtract") {
            Some(Operation::Subtract)
        } else if label.contains("add") {
            Some(Operation::Add)
        } else if label.contains("multipl") {
            Some(Operation::Multiply)
        } else if label.contains("divi") {
            Some(Operation::Divide)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Operation::Add => Operation::Subtract,
            Operation::Subtract => Operation::Add,
            Operation::Multiply => Operation::Divide,
            Operation::Divide => Operation::Multiply,
        }
    }

    /// 规范化表达式中是否出现该运算符号
    pub fn appears_in(self, normalized: &str) -> bool {
        match self {
            Operation::Add => normalized.contains('+'),
            Operation::Subtract => normalized.contains('-'),
            Operation::Multiply => {
                normalized.contains('*')
                    || normalized.contains(r"\times")
                    || normalized.contains(r"\cdot")
            }
            Operation::Divide => {
                normalized.contains('/')
                    || normalized.contains(r"\div")
                    || normalized.contains(r"\frac")
            }
        }
    }
}

/// 运算方向错误：没有用预期的运算，反而用了相反的运算
pub fn is_opposite_operation(normalized: &str, expected: Operation) -> bool {
    !expected.appears_in(normalized) && expected.opposite().appears_in(normalized)
}
