//! TTL 结果缓存
//!
//! 只用于压低重复的 list-tables 元数据查询（防击穿），
//! 条目按写入时间过期，除 TTL 外没有淘汰策略。

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    created_at: Instant,
    ttl: Duration,
    value: String,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// 进程内 TTL 缓存，key 为固定字符串（如 "mysql:tables"）
pub struct TtlCache {
    inner: RwLock<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    /// 取出未过期的条目
    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().ok()?;
        let entry = map.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// 写入条目，顺带清掉已过期的旧条目
    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|_, e| !e.is_expired());
            map.insert(
                key.to_string(),
                Entry { created_at: Instant::now(), ttl, value },
            );
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_before_expiry() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(5));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_get_after_expiry() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_missing_key() {
        let cache = TtlCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_set_prunes_expired() {
        let cache = TtlCache::new();
        cache.set("old", "v".to_string(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        cache.set("new", "v".to_string(), Duration::from_secs(5));
        let map = cache.inner.read().unwrap();
        assert!(!map.contains_key("old"));
        assert!(map.contains_key("new"));
    }
}
