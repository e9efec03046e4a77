use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 外部服务调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 识别错误
    #[error("识别错误: {0}")]
    Recognition(#[from] RecognitionError),
    /// 校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 对外暴露的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Auth,
    InvalidRequest,
    Timeout,
    LowConfidence,
    RateLimitExceeded,
    ProblemNotFound,
    Unknown,
}

/// 外部服务调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 没有收到响应
    #[error("网络请求失败 ({endpoint}): {source}")]
    Network {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// 401 / 403
    #[error("认证失败 ({endpoint}): status={status}, {message}")]
    Auth {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 400
    #[error("请求无效 ({endpoint}): {message}")]
    InvalidRequest { endpoint: String, message: String },
    /// 408 / 504 或本地超时
    #[error("请求超时 ({endpoint})")]
    Timeout {
        endpoint: String,
        #[source]
        source: Option<BoxError>,
    },
    /// 其他状态码或无法解析的响应
    #[error("未知错误 ({endpoint}): status={status:?}, {message}")]
    Unknown {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
}

impl ApiError {
    /// 根据 HTTP 状态码归类
    pub fn from_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let message = body.into();
        match status {
            401 | 403 => ApiError::Auth {
                endpoint,
                status,
                message,
            },
            400 => ApiError::InvalidRequest { endpoint, message },
            408 | 504 => ApiError::Timeout {
                endpoint,
                source: None,
            },
            _ => ApiError::Unknown {
                endpoint,
                status: Some(status),
                message,
            },
        }
    }

    /// 传输层错误（没有拿到响应）
    pub fn from_transport(endpoint: impl Into<String>, err: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if err.is_timeout() {
            ApiError::Timeout {
                endpoint,
                source: Some(Box::new(err)),
            }
        } else if let Some(status) = err.status() {
            ApiError::from_status(endpoint, status.as_u16(), err.to_string())
        } else if err.is_decode() {
            ApiError::Unknown {
                endpoint,
                status: None,
                message: format!("响应解析失败: {}", err),
            }
        } else {
            ApiError::Network {
                endpoint,
                source: Box::new(err),
            }
        }
    }

    /// 网络、超时、429、5xx 可以重试；认证和请求无效直接失败
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } | ApiError::Timeout { .. } => true,
            ApiError::Unknown {
                status: Some(status),
                ..
            } => *status == 429 || (500..=599).contains(status),
            ApiError::Auth { .. } | ApiError::InvalidRequest { .. } | ApiError::Unknown { .. } => {
                false
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Unknown { .. } => ErrorKind::Unknown,
        }
    }
}

/// 识别错误
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// 识别成功但置信度低于阈值
    #[error("识别置信度过低: {confidence:.2} < {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },
    /// 响应中没有 LaTeX / MathML / 纯文本
    #[error("识别结果中没有可用的导出内容")]
    EmptyExports,
    /// 没有可识别的笔画
    #[error("笔画批次为空")]
    EmptyBatch,
    /// 服务在响应体中返回的错误
    #[error("识别服务返回错误: {message}")]
    Service { message: String },
}

/// 校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 超出限流配额
    #[error("请求过于频繁: 每 {window:?} 最多 {limit} 次，{retry_after:?} 后重试")]
    RateLimitExceeded {
        limit: u32,
        window: Duration,
        retry_after: Duration,
    },
    /// 题目不存在
    #[error("题目不存在: {problem_id}")]
    ProblemNotFound { problem_id: String },
    /// 防抖校验在触发前被取消
    #[error("校验请求已取消")]
    Cancelled,
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件或目录不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: BoxError,
    },
    /// 解析失败
    #[error("解析文件失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: BoxError,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置项 {field} 的值 '{value}' 无效: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl AppError {
    /// 投射到对外的错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Api(e) => e.kind(),
            AppError::Recognition(RecognitionError::LowConfidence { .. }) => {
                ErrorKind::LowConfidence
            }
            AppError::Validation(ValidationError::RateLimitExceeded { .. }) => {
                ErrorKind::RateLimitExceeded
            }
            AppError::Validation(ValidationError::ProblemNotFound { .. }) => {
                ErrorKind::ProblemNotFound
            }
            _ => ErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Api(e) if e.is_retryable())
    }

    /// 创建题目不存在错误
    pub fn problem_not_found(problem_id: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::ProblemNotFound {
            problem_id: problem_id.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件解析错误
    pub fn file_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
