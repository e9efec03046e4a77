use ink_step_check::clients::RecognitionClient;
use ink_step_check::config::{Config, RequestShape};
use ink_step_check::infrastructure::{RateLimiter, ResultCache};
use ink_step_check::models::{load_problem_catalog, Stroke, StrokePoint, ValidationResult};
use ink_step_check::services::StepValidator;
use ink_step_check::utils::logging;
use ink_step_check::workflow::{
    AttemptCtx, RecognitionSession, SessionSettings, StepFlow, StepOutcome,
};
use ink_step_check::App;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LINEAR_TOML: &str = r#"
id = "linear-1"
title = "Solve for x"
statement = "x+5=12"
answer = "x=7"

[[steps]]
step_number = 1
description = "Subtract 5 from both sides"
expression = "x+5-5=12-5"
operation = "subtraction"

[[steps]]
step_number = 2
description = "Simplify"
expression = "x=7"
operation = "simplify"
"#;

fn stroke(id: &str, y: f64) -> Stroke {
    Stroke::new(
        id,
        vec![
            StrokePoint::new(0.0, y, 0.5, 0),
            StrokePoint::new(4.0, y + 2.0, 0.6, 16),
            StrokePoint::new(8.0, y + 1.0, 0.4, 32),
        ],
    )
}

fn recognition_body(latex: &str) -> serde_json::Value {
    json!({
        "exports": [
            { "mime-type": "application/x-latex", "data": latex },
            { "mime-type": "text/plain", "data": latex }
        ],
        "confidence": { "overall": 0.9 }
    })
}

/// 识别服务：第一次返回第一步，之后返回最终答案
async fn mount_recognition(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v4.0/iink/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recognition_body("x+5-5=12-5")))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4.0/iink/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recognition_body("x=7")))
        .mount(server)
        .await;
}

fn test_config(recognition_uri: &str, validation_uri: &str, problem_dir: &str) -> Config {
    Config {
        recognition_base_url: recognition_uri.to_string(),
        recognition_request_shape: RequestShape::StrokeGroups,
        validation_base_url: validation_uri.to_string(),
        pause_duration_ms: 50,
        debounce_interval_ms: 50,
        retry_base_delay_ms: 10,
        problem_folder: problem_dir.to_string(),
        ..Config::default()
    }
}

async fn build_pipeline(
    config: &Config,
) -> (Arc<RecognitionClient>, Arc<StepValidator>) {
    let catalog = load_problem_catalog(&config.problem_folder)
        .await
        .expect("加载题库失败");
    let validator = StepValidator::new(
        config,
        Arc::new(catalog),
        Arc::new(ResultCache::new(config.cache_ttl())),
        Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_window(),
        )),
    );
    (
        Arc::new(RecognitionClient::new(config)),
        Arc::new(validator),
    )
}

fn expect_validated(outcome: StepOutcome) -> (ValidationResult, bool) {
    match outcome {
        StepOutcome::Validated { result, is_final } => (result, is_final),
        other => panic!("应当完成校验: {other:?}"),
    }
}

fn problem_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    std::fs::write(dir.path().join("linear-1.toml"), LINEAR_TOML).expect("写入题目失败");
    dir
}

#[tokio::test]
async fn test_end_to_end_linear_equation() {
    logging::init(false);

    let recognition = MockServer::start().await;
    mount_recognition(&recognition).await;

    let validation = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/solve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "solving_steps": [
                { "latex": "x+5-5=12-5", "description": "Subtract 5 from both sides" },
                { "latex": "x=7", "description": "Simplify" }
            ]},
            "err_msg": null
        })))
        .mount(&validation)
        .await;

    let dir = problem_dir();
    let config = test_config(
        &recognition.uri(),
        &validation.uri(),
        dir.path().to_str().unwrap(),
    );
    let (recognizer, validator) = build_pipeline(&config).await;

    let (session, mut results) =
        RecognitionSession::new(recognizer, SessionSettings::from_config(&config));
    let mut flow = StepFlow::new(validator.clone(), AttemptCtx::new("linear-1", 1)).unwrap();

    // 第一步：x+5-5=12-5
    for i in 0..3 {
        session.stroke_started();
        session.stroke_completed(stroke(&format!("a{i}"), 0.0));
    }
    let recognized = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("等待识别结果超时")
        .unwrap();
    assert!(recognized.is_success());
    assert_eq!(recognized.confidence, Some(0.9));

    let (result, is_final) = expect_validated(flow.submit(&recognized).await.unwrap());
    assert!(result.is_correct);
    assert!(result.is_useful);
    assert!(!is_final);
    assert!(result
        .feedback_text
        .to_lowercase()
        .contains("subtract 5 from both sides"));
    assert_eq!(result.expected_next_expression.as_deref(), Some("x=7"));

    // 第二步：x=7
    session.stroke_started();
    session.stroke_completed(stroke("b0", 40.0));
    let recognized = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("等待识别结果超时")
        .unwrap();
    assert_eq!(recognized.latex.as_deref(), Some("x=7"));

    let (result, is_final) = expect_validated(flow.submit(&recognized).await.unwrap());
    assert!(result.is_correct);
    assert!(result.is_useful);
    assert!(is_final);
    assert!(validator.is_final_answer("linear-1", "x = 7").unwrap());
    assert!(flow.is_finished());

    session.close();
}

#[tokio::test]
async fn test_validation_outage_falls_back_to_local_rules() {
    let recognition = MockServer::start().await;
    mount_recognition(&recognition).await;

    let validation = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&validation)
        .await;

    let dir = problem_dir();
    let config = test_config(
        &recognition.uri(),
        &validation.uri(),
        dir.path().to_str().unwrap(),
    );
    let (recognizer, validator) = build_pipeline(&config).await;

    let (session, mut results) =
        RecognitionSession::new(recognizer, SessionSettings::from_config(&config));
    let mut flow = StepFlow::new(validator, AttemptCtx::new("linear-1", 1)).unwrap();

    session.stroke_completed(stroke("a0", 0.0));
    let recognized = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("等待识别结果超时")
        .unwrap();

    let (result, _) = expect_validated(flow.submit(&recognized).await.unwrap());
    assert!(result.is_correct);
    assert!(result.is_useful);
    assert_eq!(result.confidence, None);
    assert!(result
        .feedback_text
        .to_lowercase()
        .contains("subtract 5 from both sides"));
}

#[tokio::test]
async fn test_low_confidence_ends_attempt() {
    let recognition = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exports": [{ "mime-type": "application/x-latex", "data": "x+5-5=12-5" }],
            "confidence": { "overall": 0.3 }
        })))
        .mount(&recognition)
        .await;

    let dir = problem_dir();
    let config = test_config(&recognition.uri(), "http://127.0.0.1:9", dir.path().to_str().unwrap());
    let (recognizer, validator) = build_pipeline(&config).await;

    let (session, mut results) =
        RecognitionSession::new(recognizer, SessionSettings::from_config(&config));
    let mut flow = StepFlow::new(validator, AttemptCtx::new("linear-1", 1)).unwrap();

    session.stroke_completed(stroke("a0", 0.0));
    let recognized = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("等待识别结果超时")
        .unwrap();
    assert!(!recognized.is_success());

    let outcome = flow.submit(&recognized).await.unwrap();
    assert!(matches!(outcome, StepOutcome::RecognitionFailed { .. }));
    assert!(flow.is_finished());
}

#[tokio::test]
async fn test_app_replays_attempt_file() {
    let recognition = MockServer::start().await;
    mount_recognition(&recognition).await;

    let validation = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&validation)
        .await;

    let dir = problem_dir();
    let attempt_path = dir.path().join("attempt.json");
    let attempt = json!({
        "problem_id": "linear-1",
        "steps": [
            [stroke("a0", 0.0), stroke("a1", 1.0)],
            [stroke("b0", 40.0)]
        ]
    });
    std::fs::write(&attempt_path, attempt.to_string()).unwrap();

    let config = Config {
        attempt_file: attempt_path.to_str().unwrap().to_string(),
        max_retries: 1,
        ..test_config(&recognition.uri(), &validation.uri(), dir.path().to_str().unwrap())
    };

    let app = App::initialize(config).await.expect("初始化失败");
    tokio_test::assert_ok!(app.run().await);
}

#[tokio::test]
async fn test_app_rejects_missing_problem_folder() {
    let config = Config {
        problem_folder: "/definitely/not/a/folder".into(),
        ..Config::default()
    };
    assert!(App::initialize(config).await.is_err());
}
