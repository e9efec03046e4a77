/// 解题服务 API 客户端
///
/// 把题干发给远程解题服务，取回完整的分步解答
use crate::config::Config;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SOLVE_PATH: &str = "/v1/solve";

#[derive(Debug, Serialize)]
struct SolveRequest<'a> {
    input: &'a str,
    lang: &'static str,
}

/// 解题服务响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SolveResponse {
    #[serde(default)]
    pub data: Option<SolveData>,
    #[serde(default)]
    pub err_msg: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SolveData {
    #[serde(default)]
    pub solving_steps: Vec<SolvingStep>,
}

/// 解答中的一步；表达式可能出现在 `latex`、`expression` 或 `result` 中
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SolvingStep {
    #[serde(default)]
    pub latex: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SolvingStep {
    pub fn expression_text(&self) -> Option<&str> {
        [&self.latex, &self.expression, &self.result]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

impl SolveResponse {
    /// 有表达式的步骤
    pub fn steps(&self) -> impl Iterator<Item = &SolvingStep> {
        self.data
            .iter()
            .flat_map(|d| d.solving_steps.iter())
            .filter(|s| s.expression_text().is_some())
    }

    pub fn has_solution(&self) -> bool {
        self.steps().next().is_some()
    }
}

/// 解题服务客户端
pub struct ValidationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ValidationClient {
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            config.validation_base_url.clone(),
            config.validation_api_key.clone(),
            Duration::from_millis(config.validation_timeout_ms),
        )
    }

    pub fn with_endpoint(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// 请求题目的分步解答
    ///
    /// # 参数
    /// - `problem_statement`: 题干表达式
    ///
    /// # 返回
    /// 服务的原始响应；非 2xx 状态按错误分类返回
    pub async fn solve(&self, problem_statement: &str) -> Result<SolveResponse, ApiError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), SOLVE_PATH);
        debug!("调用解题服务: {} input={}", url, problem_statement);

        let mut request = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&SolveRequest {
                input: problem_statement,
                lang: "EN",
            });
        if !self.api_key.is_empty() {
            request = request.header("x-api-key", self.api_key.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(SOLVE_PATH, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(SOLVE_PATH, status.as_u16(), body));
        }

        let parsed: SolveResponse = response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(SOLVE_PATH, e))?;

        if let Some(msg) = parsed.err_msg.as_deref().filter(|m| !m.is_empty()) {
            debug!("解题服务附带错误信息: {}", msg);
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_step_expression_fallback_order() {
        let step: SolvingStep = serde_json::from_value(json!({
            "expression": " ",
            "result": "x=7",
            "description": "Simplify"
        }))
        .unwrap();
        assert_eq!(step.expression_text(), Some("x=7"));

        let empty = SolvingStep::default();
        assert_eq!(empty.expression_text(), None);
    }

    #[tokio::test]
    async fn test_solve_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/solve"))
            .and(header("x-api-key", "k"))
            .and(body_json(json!({ "input": "x+5=12", "lang": "EN" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "solving_steps": [
                    { "latex": "x+5-5=12-5", "description": "Subtract 5 from both sides" },
                    { "latex": "x=7", "description": "Simplify" }
                ]},
                "err_msg": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ValidationClient::with_endpoint(server.uri(), "k", Duration::from_secs(2));
        let response = client.solve("x+5=12").await.unwrap();

        assert!(response.has_solution());
        let steps: Vec<_> = response.steps().filter_map(|s| s.expression_text()).collect();
        assert_eq!(steps, vec!["x+5-5=12-5", "x=7"]);
    }

    #[tokio::test]
    async fn test_solve_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let client = ValidationClient::with_endpoint(server.uri(), "", Duration::from_secs(2));
        let err = client.solve("x+5=12").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_solve_bad_request_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
            .mount(&server)
            .await;

        let client = ValidationClient::with_endpoint(server.uri(), "", Duration::from_secs(2));
        let err = client.solve("???").await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_empty_solution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "err_msg": "cannot solve"
            })))
            .mount(&server)
            .await;

        let client = ValidationClient::with_endpoint(server.uri(), "", Duration::from_secs(2));
        let response = client.solve("x").await.unwrap();
        assert!(!response.has_solution());
        assert_eq!(response.err_msg.as_deref(), Some("cannot solve"));
    }
}
