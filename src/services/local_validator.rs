/// 本地规则校验
///
/// 远程解题服务不可用或没有匹配时的降级路径：对照题目的标准步骤表判断
use crate::models::{ExpectedStep, Problem, StepErrorKind, ValidationRequest, ValidationResult};
use crate::services::normalize::{
    contains_identity_op, is_final_answer, is_opposite_operation, normalize_latex,
    parens_balanced, Operation,
};
use phf::phf_map;
use tracing::debug;

/// 步骤号漂移容差
const STEP_DRIFT: u32 = 2;

/// 反馈模板，`{description}` 替换为标准步骤描述
static FEEDBACK_TEMPLATES: phf::Map<&'static str, &'static str> = phf_map! {
    "correct_useful" => "Correct! {description} brings you closer to the solution.",
    "correct_not_useful" => "That step is correct, but it doesn't move you closer to the solution. Try this instead: {description}.",
    "incorrect_syntax" => "Check your parentheses. Every opening bracket needs a closing one.",
    "incorrect_method" => "That's not the right operation here. Next move: {description}.",
    "incorrect_arithmetic" => "Check your arithmetic. Expected step: {description}.",
};

/// 没有步骤描述时使用
static FEEDBACK_FALLBACK: phf::Map<&'static str, &'static str> = phf_map! {
    "correct_useful" => "Correct! Keep going.",
    "correct_not_useful" => "That step is correct, but it doesn't move you closer to the solution.",
    "incorrect_syntax" => "Check your parentheses. Every opening bracket needs a closing one.",
    "incorrect_method" => "That's not the right operation here.",
    "incorrect_arithmetic" => "Check your arithmetic.",
};

fn template_key(is_correct: bool, is_useful: bool, error_kind: Option<StepErrorKind>) -> &'static str {
    match (is_correct, is_useful, error_kind) {
        (true, true, _) => "correct_useful",
        (true, false, _) => "correct_not_useful",
        (false, _, Some(StepErrorKind::Syntax)) => "incorrect_syntax",
        (false, _, Some(StepErrorKind::Method)) => "incorrect_method",
        (false, _, _) => "incorrect_arithmetic",
    }
}

/// 按 (是否正确, 是否有用, 错误类型) 生成反馈文本
pub fn feedback_for(
    is_correct: bool,
    is_useful: bool,
    error_kind: Option<StepErrorKind>,
    description: Option<&str>,
) -> String {
    let key = template_key(is_correct, is_useful, error_kind);
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    match (description, FEEDBACK_TEMPLATES.get(key)) {
        (Some(description), Some(template)) => template.replace("{description}", description),
        _ => FEEDBACK_FALLBACK
            .get(key)
            .copied()
            .unwrap_or_default()
            .to_string(),
    }
}

/// 是否有用：含恒等运算，或与上一步相同，都算无用
pub fn is_useful_step(normalized: &str, previous_steps: &[String]) -> bool {
    if contains_identity_op(normalized) {
        return false;
    }
    match previous_steps.last() {
        Some(previous) => normalize_latex(previous) != normalized,
        None => true,
    }
}

/// 先找当前步骤号，再在 ±2 范围内由近到远查找
fn find_matching_step<'a>(
    problem: &'a Problem,
    step_number: u32,
    normalized: &str,
) -> Option<&'a ExpectedStep> {
    let matches = |step: &&ExpectedStep| normalize_latex(&step.expression) == normalized;

    if let Some(step) = problem.step(step_number).filter(matches) {
        return Some(step);
    }

    (1..=STEP_DRIFT).find_map(|offset| {
        let before = step_number
            .checked_sub(offset)
            .and_then(|n| problem.step(n))
            .filter(matches);
        before.or_else(|| {
            step_number
                .checked_add(offset)
                .and_then(|n| problem.step(n))
                .filter(matches)
        })
    })
}

/// 错误分类：括号不配对 > 运算方向相反 > 计算错误
pub fn classify_error(student_expression: &str, expected: Option<&ExpectedStep>) -> StepErrorKind {
    if !parens_balanced(student_expression) {
        return StepErrorKind::Syntax;
    }
    let normalized = normalize_latex(student_expression);
    let expected_op = expected.and_then(|step| Operation::from_label(&step.operation_label));
    match expected_op {
        Some(op) if is_opposite_operation(&normalized, op) => StepErrorKind::Method,
        _ => StepErrorKind::Arithmetic,
    }
}

/// 本地校验
pub fn validate_locally(request: &ValidationRequest, problem: &Problem) -> ValidationResult {
    let normalized = normalize_latex(&request.student_step_expression);
    let matched = find_matching_step(problem, request.step_number, &normalized);
    let reached_answer = is_final_answer(&request.student_step_expression, problem);

    let is_correct = matched.is_some() || reached_answer;
    let is_useful = is_useful_step(&normalized, &request.previous_steps);
    let expected_here = problem.step(request.step_number);

    let (error_kind, description, expected_next) = if is_correct {
        // 匹配到第几步，下一步就是提示
        let matched_number = matched.map(|s| s.step_number).unwrap_or(request.step_number);
        let next_step = matched_number
            .checked_add(1)
            .and_then(|n| problem.step(n))
            .filter(|_| !reached_answer);
        // 无用的一步要指向下一步该做什么
        let description = if is_useful {
            matched.or(expected_here)
        } else {
            next_step.or(expected_here)
        }
        .map(|s| s.description.as_str());
        (None, description, next_step.map(|s| s.expression.clone()))
    } else {
        let kind = classify_error(&request.student_step_expression, expected_here);
        let description = expected_here.map(|s| s.description.as_str());
        (Some(kind), description, expected_here.map(|s| s.expression.clone()))
    };

    debug!(
        "本地校验 {} 第 {} 步: correct={}, useful={}, error={:?}",
        problem.id, request.step_number, is_correct, is_useful, error_kind
    );

    ValidationResult {
        id: uuid::Uuid::new_v4().to_string(),
        step_id: ValidationResult::step_id_for(&request.problem_id, request.step_number),
        is_correct,
        is_useful,
        error_kind,
        feedback_text: feedback_for(is_correct, is_useful, error_kind, description),
        suggested_next_expressions: expected_next.iter().cloned().collect(),
        expected_next_expression: expected_next,
        confidence: None,
        was_cached: false,
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    }
}
