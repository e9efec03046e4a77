//! 校验结果缓存 - 基础设施层
//!
//! 以 (题目, 步骤号, 规范化表达式摘要) 为键，带 TTL 的内存缓存。
//! 过期条目视为不存在，在读取时惰性删除。

use crate::models::ValidationResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// 默认 TTL：7 天
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub result: ValidationResult,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// `now - cached_at > ttl` 即过期
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.cached_at) > self.ttl
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 校验结果缓存
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 生成缓存键：`{problem_id}:{step}:{sha256(normalized)[..16]}`
    pub fn key_for(problem_id: &str, step_number: u32, normalized_expression: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized_expression.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        format!("{}:{}:{}", problem_id, step_number, hex)
    }

    /// 读取；过期的条目会被删除并按未命中计
    pub async fn get(&self, key: &str) -> Option<ValidationResult> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("缓存命中: {}", key);
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            debug!("缓存过期，已删除: {}", key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn set(&self, key: impl Into<String>, result: ValidationResult) {
        self.set_with_ttl(key, result, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: impl Into<String>, result: ValidationResult, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            result,
            cached_at: Instant::now(),
            ttl,
        };
        self.entries.lock().await.insert(key, entry);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// 主动清理所有过期条目，返回清理数量
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().await.len(),
        }
    }
}
