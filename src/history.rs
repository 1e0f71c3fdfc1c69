// src/history.rs - 有界、去重、写穿持久化的生成历史

use crate::store::KvStore;
use crate::types::QrRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

pub const STORAGE_KEY: &str = "airqr-history";
pub const MAX_HISTORY_ITEMS: usize = 50;

/// 列表里显示的最大字符数，超出部分用 `...` 代替
const SUMMARY_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    /// 规范化载荷
    pub text: String,
    pub request: QrRequest,
    pub created_at: DateTime<Utc>,
    /// PNG data URL，没有时按 `request` 重新生成
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_image: Option<String>,
}

impl HistoryEntry {
    pub fn summary(&self) -> String {
        if self.text.chars().count() > SUMMARY_LEN {
            let head: String = self.text.chars().take(SUMMARY_LEN).collect();
            format!("{head}...")
        } else {
            self.text.clone()
        }
    }

    /// "Just now" / "5m ago" / "3h ago" / "2d ago"，一周以上显示日期
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        let diff = now.signed_duration_since(self.created_at);
        let mins = diff.num_minutes();
        let hours = diff.num_hours();
        let days = diff.num_days();
        if mins < 1 {
            "Just now".into()
        } else if mins < 60 {
            format!("{mins}m ago")
        } else if hours < 24 {
            format!("{hours}h ago")
        } else if days < 7 {
            format!("{days}d ago")
        } else {
            self.created_at.format("%Y-%m-%d").to_string()
        }
    }

    /// `qr-<前 20 个字符，非字母数字换成 _>-<毫秒>`
    pub fn download_stem(&self, millis: i64) -> String {
        let slug: String = self
            .text
            .chars()
            .take(20)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("qr-{slug}-{millis}")
    }
}

fn new_id(now: DateTime<Utc>) -> String {
    let rand = Uuid::new_v4().simple().to_string();
    format!("qr-{}-{}", now.timestamp_millis(), &rand[..9])
}

/// 历史记录的唯一持有者，也是持久化存储的唯一写入者
pub struct HistoryStore<S: KvStore> {
    store: S,
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl<S: KvStore> HistoryStore<S> {
    pub fn load(store: S) -> Self {
        Self::load_with_limit(store, MAX_HISTORY_ITEMS)
    }

    /// 读取持久化数据；读失败或格式损坏时记日志并从空列表开始
    pub fn load_with_limit(store: S, limit: usize) -> Self {
        let entries = match store.load(STORAGE_KEY) {
            Ok(Some(text)) => match serde_json::from_str::<Vec<HistoryEntry>>(&text) {
                Ok(mut entries) => {
                    entries.truncate(limit);
                    entries
                }
                Err(e) => {
                    warn!("历史记录数据损坏，已忽略: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("读取历史记录失败: {e}");
                Vec::new()
            }
        };
        debug!(count = entries.len(), "历史记录已加载");
        Self {
            store,
            entries,
            limit,
        }
    }

    /// 新记录插到最前；载荷和尺寸都相同的旧记录先被移除。
    /// 空载荷不记录，返回 `None`。
    pub fn add(&mut self, request: &QrRequest, image: Option<String>) -> Option<String> {
        if request.text.trim().is_empty() {
            debug!("载荷为空，不写入历史记录");
            return None;
        }
        let now = Utc::now();
        let entry = HistoryEntry {
            id: new_id(now),
            text: request.text.clone(),
            request: request.clone(),
            created_at: now,
            cached_image: image,
        };
        let id = entry.id.clone();

        self.entries.retain(|e| {
            !(e.text == request.text && e.request.options.size == request.options.size)
        });
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);

        self.persist();
        Some(id)
    }

    /// id 不存在时什么也不做
    pub fn remove(&mut self, id: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() != before {
            self.persist();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.clear(STORAGE_KEY) {
            warn!("清除历史记录失败: {e}");
        }
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// 最新的在前
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 整表写回；失败只记日志，内存中的列表仍然有效
    fn persist(&mut self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("序列化历史记录失败: {e}");
                return;
            }
        };
        if let Err(e) = self.store.save(STORAGE_KEY, &json) {
            warn!("保存历史记录失败: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::store::{FileStore, MemoryStore};
    use crate::types::{ContentInput, RenderOptions};
    use chrono::Duration;
    use tempfile::TempDir;

    mod common {
        use super::*;

        pub(super) fn request(text: &str, size: u32) -> QrRequest {
            QrRequest::new(
                ContentInput::Text(text.into()),
                RenderOptions {
                    size,
                    ..RenderOptions::default()
                },
            )
        }

        pub(super) fn entry_at(text: &str, created_at: DateTime<Utc>) -> HistoryEntry {
            HistoryEntry {
                id: "qr-1".into(),
                text: text.into(),
                request: request(text, 256),
                created_at,
                cached_image: None,
            }
        }

        /// 每次写入都失败，模拟存储配额已满
        pub(super) struct FullStore;

        impl KvStore for FullStore {
            fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
                Ok(None)
            }
            fn save(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
                Err(std::io::Error::other("quota exceeded").into())
            }
            fn clear(&mut self, _key: &str) -> Result<(), StorageError> {
                Err(std::io::Error::other("quota exceeded").into())
            }
        }
    }

    mod add {
        use super::common::*;
        use super::*;

        #[test]
        fn newest_first() {
            let mut history = HistoryStore::load(MemoryStore::new());
            history.add(&request("a", 256), None);
            history.add(&request("b", 256), None);
            let texts: Vec<_> = history.entries().iter().map(|e| e.text.as_str()).collect();
            assert_eq!(texts, ["b", "a"]);
        }

        #[test]
        fn caps_at_fifty_evicting_oldest() {
            let mut history = HistoryStore::load(MemoryStore::new());
            for i in 0..51 {
                history.add(&request(&format!("item-{i}"), 256), None);
            }
            assert_eq!(history.len(), MAX_HISTORY_ITEMS);
            assert!(history.entries().iter().all(|e| e.text != "item-0"));
            assert_eq!(history.entries()[0].text, "item-50");
            assert_eq!(history.entries()[49].text, "item-1");
        }

        #[test]
        fn duplicate_text_and_size_moves_to_front() {
            let mut history = HistoryStore::load(MemoryStore::new());
            let first = history.add(&request("a", 256), None).unwrap();
            history.add(&request("b", 256), None);
            let again = history.add(&request("a", 256), None).unwrap();

            assert_eq!(history.len(), 2);
            assert_ne!(first, again);
            assert_eq!(history.entries()[0].id, again);
            assert_eq!(history.entries()[0].text, "a");
            assert!(history.get(&first).is_none());
        }

        #[test]
        fn empty_payload_is_not_recorded() {
            let mut history = HistoryStore::load(MemoryStore::new());
            let empty_email = QrRequest::new(ContentInput::Email(String::new()), RenderOptions::default());
            assert_eq!(empty_email.text, "");
            assert!(history.add(&empty_email, None).is_none());
            assert!(history.add(&request("   ", 256), None).is_none());
            assert!(history.is_empty());
            assert!(history.store().get(STORAGE_KEY).is_none());
        }

        #[test]
        fn same_text_different_size_is_kept() {
            let mut history = HistoryStore::load(MemoryStore::new());
            history.add(&request("a", 256), None);
            history.add(&request("a", 512), None);
            assert_eq!(history.len(), 2);
        }

        #[test]
        fn ids_are_unique() {
            let mut history = HistoryStore::load(MemoryStore::new());
            let ids: std::collections::HashSet<_> = (0..20)
                .map(|i| history.add(&request(&i.to_string(), 256), None))
                .collect();
            assert_eq!(ids.len(), 20);
        }

        #[test]
        fn write_through() {
            let mut history = HistoryStore::load(MemoryStore::new());
            history.add(&request("a", 256), Some("data:image/png;base64,AA==".into()));
            let saved = history.store().get(STORAGE_KEY).unwrap();
            let parsed: Vec<HistoryEntry> = serde_json::from_str(saved).unwrap();
            assert_eq!(parsed, history.entries());
            assert!(saved.contains("\"createdAt\""));
            assert!(saved.contains("\"cachedImage\""));
        }

        #[test]
        fn storage_failure_keeps_memory_state() {
            let mut history = HistoryStore::load(FullStore);
            history.add(&request("a", 256), None);
            history.add(&request("b", 256), None);
            assert_eq!(history.len(), 2);
            history.clear();
            assert!(history.is_empty());
        }
    }

    mod remove_and_clear {
        use super::common::*;
        use super::*;

        #[test]
        fn remove_by_id() {
            let mut history = HistoryStore::load(MemoryStore::new());
            let a = history.add(&request("a", 256), None).unwrap();
            history.add(&request("b", 256), None);
            history.remove(&a);
            assert_eq!(history.len(), 1);
            assert_eq!(history.entries()[0].text, "b");
        }

        #[test]
        fn remove_missing_is_noop() {
            let mut history = HistoryStore::load(MemoryStore::new());
            history.add(&request("a", 256), None);
            history.remove("qr-does-not-exist");
            assert_eq!(history.len(), 1);
        }

        #[test]
        fn clear_empties_and_persists() {
            let mut history = HistoryStore::load(MemoryStore::new());
            history.add(&request("a", 256), None);
            history.clear();
            assert!(history.is_empty());
            assert_eq!(history.store().get(STORAGE_KEY), None);
        }
    }

    mod load {
        use super::common::*;
        use super::*;

        #[test]
        fn malformed_data_starts_empty() {
            let store = MemoryStore::new().with_value(STORAGE_KEY, "{not json");
            let history = HistoryStore::load(store);
            assert!(history.is_empty());
        }

        #[test]
        fn survives_restart_on_disk() {
            let dir = TempDir::new().unwrap();
            let mut history = HistoryStore::load(FileStore::new(dir.path()));
            history.add(&request("https://example.com", 256), None);
            history.add(&request("hello", 128), None);
            let expected = history.entries().to_vec();

            let reloaded = HistoryStore::load(FileStore::new(dir.path()));
            assert_eq!(reloaded.entries(), expected.as_slice());
        }

        #[test]
        fn oversized_persisted_list_is_truncated() {
            let mut source = HistoryStore::load(MemoryStore::new());
            for i in 0..10 {
                source.add(&request(&i.to_string(), 256), None);
            }
            let json = source.store().get(STORAGE_KEY).unwrap().to_string();
            let history =
                HistoryStore::load_with_limit(MemoryStore::new().with_value(STORAGE_KEY, &json), 3);
            assert_eq!(history.len(), 3);
            assert_eq!(history.entries()[0].text, "9");
        }
    }

    mod display {
        use super::common::*;
        use super::*;

        #[test]
        fn relative_time_labels() {
            let now = Utc::now();
            assert_eq!(entry_at("x", now).relative_time(now), "Just now");
            assert_eq!(entry_at("x", now - Duration::minutes(5)).relative_time(now), "5m ago");
            assert_eq!(entry_at("x", now - Duration::hours(3)).relative_time(now), "3h ago");
            assert_eq!(entry_at("x", now - Duration::days(2)).relative_time(now), "2d ago");
            let old = now - Duration::days(30);
            assert_eq!(
                entry_at("x", old).relative_time(now),
                old.format("%Y-%m-%d").to_string()
            );
        }

        #[test]
        fn summary_truncates_long_text() {
            let long = "x".repeat(60);
            assert_eq!(entry_at(&long, Utc::now()).summary(), format!("{}...", "x".repeat(50)));
            assert_eq!(entry_at("short", Utc::now()).summary(), "short");
        }

        #[test]
        fn download_stem_slugifies() {
            let entry = entry_at("https://example.com/some/long/path", Utc::now());
            assert_eq!(entry.download_stem(7), "qr-https___example_com_-7");
        }
    }
}
