/// 手写识别 API 客户端
///
/// 封装所有与识别服务相关的调用逻辑：请求体构建、签名、响应解析、置信度门槛
use crate::clients::Recognizer;
use crate::config::{Config, RequestShape};
use crate::error::{ApiError, AppError, AppResult, RecognitionError};
use crate::models::{PointerType, RecognitionResult, Stroke};
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha512;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const MIME_LATEX: &str = "application/x-latex";
const MIME_MATHML: &str = "application/mathml+xml";
const MIME_TEXT: &str = "text/plain";

/// 识别服务设置
///
/// 不可变值；运行时切换引擎或密钥时整体替换
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSettings {
    pub base_url: String,
    pub application_key: String,
    pub hmac_key: Option<String>,
    pub shape: RequestShape,
    pub lang: String,
    pub timeout: Duration,
    pub min_confidence: f64,
}

impl RecognitionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.recognition_base_url.clone(),
            application_key: config.recognition_app_key.clone(),
            hmac_key: config.recognition_hmac_key.clone(),
            shape: config.recognition_request_shape,
            lang: config.recognition_lang.clone(),
            timeout: Duration::from_millis(config.recognition_timeout_ms),
            min_confidence: config.min_confidence,
        }
    }

    /// 不同请求体结构对应不同的端点
    pub fn path(&self) -> &'static str {
        match self.shape {
            RequestShape::StrokeGroups => "/api/v4.0/iink/batch",
            RequestShape::Flat => "/api/v4.0/iink/recognize",
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path())
    }
}

// ========== 请求体 ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionRequest {
    content_type: &'static str,
    configuration: RequestConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    stroke_groups: Option<Vec<StrokeGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strokes: Option<Vec<WireStroke>>,
}

#[derive(Debug, Serialize)]
struct RequestConfiguration {
    lang: String,
    math: MathConfiguration,
    export: ExportConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MathConfiguration {
    mime_types: Vec<&'static str>,
    solver: SolverConfiguration,
    grammar: GrammarConfiguration,
}

#[derive(Debug, Serialize)]
struct SolverConfiguration {
    enable: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrammarConfiguration {
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct ExportConfiguration {
    mathml: MathmlExport,
}

#[derive(Debug, Serialize)]
struct MathmlExport {
    flavor: &'static str,
}

#[derive(Debug, Serialize)]
struct StrokeGroup {
    strokes: Vec<WireStroke>,
}

/// 线路上的一笔：x/y/t/p 四个数组等长
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStroke {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub t: Vec<i64>,
    pub p: Vec<f64>,
    pub pointer_id: u32,
    pub pointer_type: PointerType,
}

impl WireStroke {
    pub fn from_stroke(stroke: &Stroke, pointer_id: u32) -> Self {
        let len = stroke.points.len();
        let mut wire = Self {
            x: Vec::with_capacity(len),
            y: Vec::with_capacity(len),
            t: Vec::with_capacity(len),
            p: Vec::with_capacity(len),
            pointer_id,
            pointer_type: stroke.pointer_type,
        };
        for point in &stroke.points {
            wire.x.push(point.x);
            wire.y.push(point.y);
            wire.t.push(point.timestamp_ms);
            wire.p.push(point.pressure);
        }
        wire
    }

    fn vertical_range(&self) -> (f64, f64) {
        self.y
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| {
                (lo.min(y), hi.max(y))
            })
    }
}

/// 按书写行分组：纵向范围有重叠的笔画归为同一行，行按从上到下排序
fn group_by_line(strokes: Vec<WireStroke>) -> Vec<StrokeGroup> {
    let mut lines: Vec<((f64, f64), Vec<WireStroke>)> = Vec::new();

    for stroke in strokes {
        let (lo, hi) = stroke.vertical_range();
        match lines
            .iter_mut()
            .find(|((line_lo, line_hi), _)| lo <= *line_hi && hi >= *line_lo)
        {
            Some((range, members)) => {
                range.0 = range.0.min(lo);
                range.1 = range.1.max(hi);
                members.push(stroke);
            }
            None => lines.push(((lo, hi), vec![stroke])),
        }
    }

    lines.sort_by(|a, b| a.0 .0.total_cmp(&b.0 .0));
    lines
        .into_iter()
        .map(|(_, strokes)| StrokeGroup { strokes })
        .collect()
}

fn build_request(settings: &RecognitionSettings, strokes: &[Stroke]) -> RecognitionRequest {
    let wire: Vec<WireStroke> = strokes
        .iter()
        .enumerate()
        .map(|(idx, s)| WireStroke::from_stroke(s, idx as u32))
        .collect();

    let (stroke_groups, strokes) = match settings.shape {
        RequestShape::StrokeGroups => (Some(group_by_line(wire)), None),
        RequestShape::Flat => (None, Some(wire)),
    };

    RecognitionRequest {
        content_type: "Math",
        configuration: RequestConfiguration {
            lang: settings.lang.clone(),
            math: MathConfiguration {
                mime_types: vec![MIME_LATEX, MIME_MATHML],
                solver: SolverConfiguration { enable: false },
                grammar: GrammarConfiguration { name: "standard" },
            },
            export: ExportConfiguration {
                mathml: MathmlExport { flavor: "standard" },
            },
        },
        stroke_groups,
        strokes,
    }
}

// ========== 签名 ==========

/// HMAC-SHA512(`METHOD + PATH + BODY`)，十六进制小写；密钥不可用时返回 `None`
pub fn sign_request(method: &str, path: &str, body: &str, key: &str) -> Option<String> {
    type HmacSha512 = Hmac<Sha512>;
    let mut mac = HmacSha512::new_from_slice(key.as_bytes()).ok()?;
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Some(
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect(),
    )
}

// ========== 响应解析 ==========

/// 从导出列表中提取出的内容
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedExports {
    pub latex: Option<String>,
    pub mathml: Option<String>,
    pub plain_text: Option<String>,
}

impl ParsedExports {
    pub fn is_empty(&self) -> bool {
        self.latex.is_none() && self.mathml.is_none() && self.plain_text.is_none()
    }

    fn assign(&mut self, mime_type: &str, data: &Value) {
        let Some(text) = data.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        let slot = match mime_type {
            MIME_LATEX => &mut self.latex,
            MIME_MATHML => &mut self.mathml,
            MIME_TEXT => &mut self.plain_text,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(text.to_string());
        }
    }
}

/// 解析 `exports`
///
/// 兼容两种形式：`[{ "mime-type": ..., "data": ... }]` 列表，或 `{ mime: data }` 对象；
/// 无法识别的条目直接跳过
pub fn extract_exports(exports: &Value) -> ParsedExports {
    let mut parsed = ParsedExports::default();
    match exports {
        Value::Array(items) => {
            for item in items {
                let mime_type = item
                    .get("mime-type")
                    .or_else(|| item.get("mimeType"))
                    .and_then(Value::as_str);
                if let (Some(mime_type), Some(data)) = (mime_type, item.get("data")) {
                    parsed.assign(mime_type, data);
                }
            }
        }
        Value::Object(map) => {
            for (mime_type, data) in map {
                parsed.assign(mime_type, data);
            }
        }
        _ => {}
    }
    parsed
}

fn extract_confidence(body: &Value) -> Option<f64> {
    let confidence = body.get("confidence")?;
    confidence
        .get("overall")
        .and_then(Value::as_f64)
        .or_else(|| confidence.as_f64())
        .map(|c| c.clamp(0.0, 1.0))
}

/// 把响应体转换为识别结果（不检查置信度）
pub fn parse_response(
    body: &Value,
    source_stroke_ids: BTreeSet<String>,
) -> Result<RecognitionResult, RecognitionError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .or_else(|| error.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| error.to_string());
        return Err(RecognitionError::Service { message });
    }

    let exports = body
        .get("exports")
        .map(extract_exports)
        .unwrap_or_default();
    if exports.is_empty() {
        return Err(RecognitionError::EmptyExports);
    }

    Ok(RecognitionResult::success(
        exports.latex,
        exports.mathml,
        exports.plain_text,
        extract_confidence(body),
        source_stroke_ids,
    ))
}

/// 低置信度的成功结果不能当作可信输出
pub fn enforce_confidence(
    result: RecognitionResult,
    min_confidence: f64,
) -> Result<RecognitionResult, RecognitionError> {
    match result.confidence {
        Some(confidence) if result.is_success() && confidence < min_confidence => {
            Err(RecognitionError::LowConfidence {
                confidence,
                threshold: min_confidence,
            })
        }
        _ => Ok(result),
    }
}

// ========== 客户端 ==========

/// 识别客户端
pub struct RecognitionClient {
    http: reqwest::Client,
    settings: RwLock<Arc<RecognitionSettings>>,
}

impl RecognitionClient {
    /// 创建新的识别客户端
    pub fn new(config: &Config) -> Self {
        Self::with_settings(RecognitionSettings::from_config(config))
    }

    pub fn with_settings(settings: RecognitionSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings: RwLock::new(Arc::new(settings)),
        }
    }

    /// 当前设置的快照
    pub async fn settings(&self) -> Arc<RecognitionSettings> {
        self.settings.read().await.clone()
    }

    /// 整体替换设置（切换端点/密钥），进行中的请求继续使用旧快照
    pub async fn swap_settings(&self, settings: RecognitionSettings) {
        info!(
            "🔁 切换识别设置: {} ({:?})",
            settings.base_url, settings.shape
        );
        *self.settings.write().await = Arc::new(settings);
    }

    /// 识别一批笔画
    ///
    /// # 参数
    /// - `strokes`: 非空笔画批次
    /// - `use_signature`: 是否签名（未配置签名密钥时跳过）
    ///
    /// # 返回
    /// 成功且置信度达标的识别结果；其余情况返回错误
    pub async fn recognize(
        &self,
        strokes: &[Stroke],
        use_signature: bool,
    ) -> AppResult<RecognitionResult> {
        if strokes.is_empty() {
            return Err(RecognitionError::EmptyBatch.into());
        }

        let settings = self.settings().await;
        let path = settings.path();
        let body = serde_json::to_string(&build_request(&settings, strokes))?;
        let source_ids: BTreeSet<String> = strokes.iter().map(|s| s.id.clone()).collect();

        debug!(
            "调用识别服务 {}，笔画数: {}，请求体 {} 字节",
            path,
            strokes.len(),
            body.len()
        );

        let mut request = self
            .http
            .post(settings.url())
            .timeout(settings.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, application/vnd.myscript.jiix")
            .header("applicationKey", settings.application_key.as_str());

        if use_signature {
            match settings.hmac_key.as_deref() {
                Some(key) => match sign_request("POST", path, &body, key) {
                    Some(signature) => request = request.header("hmac", signature),
                    None => warn!("签名密钥不可用，请求不带签名"),
                },
                None => debug!("未配置签名密钥，跳过签名"),
            }
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(path, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(path, e))?;

        if !status.is_success() {
            warn!("识别服务返回错误状态 {}: {}", status, text);
            return Err(ApiError::from_status(path, status.as_u16(), text).into());
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| ApiError::Unknown {
            endpoint: path.to_string(),
            status: Some(status.as_u16()),
            message: format!("响应不是合法 JSON: {}", e),
        })?;

        let result = parse_response(&json, source_ids)?;
        let result = enforce_confidence(result, settings.min_confidence)?;

        debug!(
            "识别成功: latex={:?}, confidence={:?}",
            result.latex, result.confidence
        );
        Ok(result)
    }
}

impl Recognizer for RecognitionClient {
    fn recognize(
        &self,
        strokes: &[Stroke],
        use_signature: bool,
    ) -> impl Future<Output = Result<RecognitionResult, AppError>> + Send {
        RecognitionClient::recognize(self, strokes, use_signature)
    }
}
