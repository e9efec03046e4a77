use crate::error::ConfigError;
use std::time::Duration;

/// 请求体结构（识别服务的两种线路格式）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestShape {
    /// 按行分组：`strokeGroups: [{ strokes: [...] }]`
    StrokeGroups,
    /// 平铺数组：`strokes: [...]`
    Flat,
}

impl RequestShape {
    /// 从配置字符串解析
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "stroke_groups" | "groups" | "grouped" => Some(RequestShape::StrokeGroups),
            "flat" | "strokes" => Some(RequestShape::Flat),
            _ => None,
        }
    }
}

/// 程序配置
///
/// 所有字段都有默认值，未设置环境变量时流水线依然可以运行；
/// 只有签名密钥是"未设置即跳过"。
#[derive(Clone, Debug)]
pub struct Config {
    // --- 手写识别服务 ---
    pub recognition_base_url: String,
    pub recognition_app_key: String,
    /// 签名密钥，未配置时请求不签名
    pub recognition_hmac_key: Option<String>,
    pub recognition_request_shape: RequestShape,
    pub recognition_lang: String,
    pub recognition_timeout_ms: u64,
    /// 识别结果最低置信度
    pub min_confidence: f64,
    /// 停笔检测时长
    pub pause_duration_ms: u64,
    /// 两次识别之间的最小间隔
    pub debounce_interval_ms: u64,

    // --- 数学校验服务 ---
    pub validation_base_url: String,
    pub validation_api_key: String,
    pub validation_timeout_ms: u64,
    /// 防抖校验器的静默期
    pub validation_debounce_ms: u64,

    // --- 缓存 / 限流 / 重试 ---
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_window_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,

    // --- 运行 ---
    /// 题目 TOML 文件存放目录
    pub problem_folder: String,
    /// 回放用的笔迹文件
    pub attempt_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognition_base_url: "https://cloud.myscript.com".to_string(),
            recognition_app_key: String::new(),
            recognition_hmac_key: None,
            recognition_request_shape: RequestShape::StrokeGroups,
            recognition_lang: "en_US".to_string(),
            recognition_timeout_ms: 10_000,
            min_confidence: 0.85,
            pause_duration_ms: 500,
            debounce_interval_ms: 500,
            validation_base_url: "http://localhost:8787".to_string(),
            validation_api_key: String::new(),
            validation_timeout_ms: 10_000,
            validation_debounce_ms: 300,
            cache_enabled: true,
            cache_ttl_secs: 7 * 24 * 60 * 60,
            rate_limit_per_minute: 60,
            rate_limit_window_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_multiplier: 2.0,
            problem_folder: "problems".to_string(),
            attempt_file: "attempt.json".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            recognition_base_url: std::env::var("RECOGNITION_BASE_URL").unwrap_or(default.recognition_base_url),
            recognition_app_key: std::env::var("RECOGNITION_APP_KEY").unwrap_or(default.recognition_app_key),
            recognition_hmac_key: std::env::var("RECOGNITION_HMAC_KEY").ok().filter(|v| !v.trim().is_empty()),
            recognition_request_shape: std::env::var("RECOGNITION_REQUEST_SHAPE").ok().and_then(|v| RequestShape::parse(&v)).unwrap_or(default.recognition_request_shape),
            recognition_lang: std::env::var("RECOGNITION_LANG").unwrap_or(default.recognition_lang),
            recognition_timeout_ms: parse_env("RECOGNITION_TIMEOUT_MS").unwrap_or(default.recognition_timeout_ms),
            min_confidence: parse_env("MIN_CONFIDENCE").unwrap_or(default.min_confidence),
            pause_duration_ms: parse_env("PAUSE_DURATION_MS").unwrap_or(default.pause_duration_ms),
            debounce_interval_ms: parse_env("DEBOUNCE_INTERVAL_MS").unwrap_or(default.debounce_interval_ms),
            validation_base_url: std::env::var("VALIDATION_BASE_URL").unwrap_or(default.validation_base_url),
            validation_api_key: std::env::var("VALIDATION_API_KEY").unwrap_or(default.validation_api_key),
            validation_timeout_ms: parse_env("VALIDATION_TIMEOUT_MS").unwrap_or(default.validation_timeout_ms),
            validation_debounce_ms: parse_env("VALIDATION_DEBOUNCE_MS").unwrap_or(default.validation_debounce_ms),
            cache_enabled: parse_env("CACHE_ENABLED").unwrap_or(default.cache_enabled),
            cache_ttl_secs: parse_env("CACHE_TTL_SECS").unwrap_or(default.cache_ttl_secs),
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE").unwrap_or(default.rate_limit_per_minute),
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS").unwrap_or(default.rate_limit_window_secs),
            max_retries: parse_env("MAX_RETRIES").unwrap_or(default.max_retries),
            retry_base_delay_ms: parse_env("RETRY_BASE_DELAY_MS").unwrap_or(default.retry_base_delay_ms),
            retry_multiplier: parse_env("RETRY_MULTIPLIER").unwrap_or(default.retry_multiplier),
            problem_folder: std::env::var("PROBLEM_FOLDER").unwrap_or(default.problem_folder),
            attempt_file: std::env::var("ATTEMPT_FILE").unwrap_or(default.attempt_file),
            verbose_logging: parse_env("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "MIN_CONFIDENCE".to_string(),
                value: self.min_confidence.to_string(),
                reason: "必须在 [0, 1] 之间".to_string(),
            });
        }
        if self.retry_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "RETRY_MULTIPLIER".to_string(),
                value: self.retry_multiplier.to_string(),
                reason: "不能小于 1".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_RETRIES".to_string(),
                value: "0".to_string(),
                reason: "至少需要一次尝试".to_string(),
            });
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "RATE_LIMIT_WINDOW_SECS".to_string(),
                value: "0".to_string(),
                reason: "窗口长度必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_millis(self.pause_duration_ms)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_runnable() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pause_duration(), Duration::from_millis(500));
        assert_eq!(config.debounce_interval(), Duration::from_millis(500));
        assert_eq!(config.cache_ttl(), Duration::from_secs(604_800));
        assert!(config.recognition_hmac_key.is_none());
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_request_shape_parse() {
        assert_eq!(RequestShape::parse("flat"), Some(RequestShape::Flat));
        assert_eq!(RequestShape::parse(" Stroke_Groups "), Some(RequestShape::StrokeGroups));
        assert_eq!(RequestShape::parse("lines"), None);
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let config = Config {
            min_confidence: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "MIN_CONFIDENCE"
        ));
    }
}
