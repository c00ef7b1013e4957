pub mod memory;

use crate::errors::{AppError, AppResult};
use crate::models::Department;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
    fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;

    fn replace_prefixed(&self, prefix: &str, entries: &BTreeMap<String, String>) -> AppResult<()> {
        for key in self.keys_with_prefix(prefix)? {
            self.remove(&key)?;
        }
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    Tasks,
    Safety,
    Lease,
    Asset,
    Infra,
    Tenants,
    Facilities,
    CustomTabs,
    DynamicData,
}

impl CollectionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Safety => "safety",
            Self::Lease => "lease",
            Self::Asset => "asset",
            Self::Infra => "infra",
            Self::Tenants => "tenants",
            Self::Facilities => "facilities",
            Self::CustomTabs => "custom-tabs",
            Self::DynamicData => "dynamic-data",
        }
    }

    pub fn for_department(department: Department) -> Self {
        match department {
            Department::Safety => Self::Safety,
            Department::Lease => Self::Lease,
            Department::Asset => Self::Asset,
            Department::Infra => Self::Infra,
        }
    }
}

#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        Self {
            backend,
            prefix: prefix.to_string(),
        }
    }

    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::new(Arc::clone(&self.backend), prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn scan_prefix(&self) -> String {
        format!("{}-", self.prefix)
    }

    pub fn storage_key(&self, key: CollectionKey) -> String {
        format!("{}-{}", self.prefix, key.as_str())
    }

    /// Reads one collection. Absent, blank, `"undefined"`/`"null"` and
    /// unparsable values all yield `default()`; a bad key never affects others.
    pub fn load<T, F>(&self, key: CollectionKey, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let storage_key = self.storage_key(key);
        let raw = match self.backend.get(&storage_key) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(key = %storage_key, error = %error, "storage read failed; using default");
                return default();
            }
        };

        let Some(raw) = raw else {
            return default();
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
            return default();
        }

        match serde_json::from_str::<T>(trimmed) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key = %storage_key, error = %error, "failed to parse stored collection; using default");
                default()
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: CollectionKey, value: &T) -> AppResult<()> {
        let storage_key = self.storage_key(key);
        let raw = serde_json::to_string(value)?;
        self.backend.set(&storage_key, &raw)?;
        tracing::debug!(key = %storage_key, bytes = raw.len(), "collection persisted");
        Ok(())
    }

    pub fn snapshot(&self) -> AppResult<BTreeMap<String, String>> {
        let mut snapshot = BTreeMap::new();
        for key in self.backend.keys_with_prefix(&self.scan_prefix())? {
            if let Some(value) = self.backend.get(&key)? {
                snapshot.insert(key, value);
            }
        }
        Ok(snapshot)
    }

    pub fn export_document(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot()?)?)
    }

    pub fn backup_file_name(&self, date: NaiveDate) -> String {
        format!("{}-backup-{}.json", self.prefix, date.format("%Y-%m-%d"))
    }

    pub fn parse_document(&self, text: &str) -> AppResult<BTreeMap<String, String>> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|error| AppError::ImportFormat(format!("backup is not valid JSON: {}", error)))?;
        let serde_json::Value::Object(map) = value else {
            return Err(AppError::ImportFormat("backup must be a JSON object".to_string()));
        };

        let scan_prefix = self.scan_prefix();
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let serde_json::Value::String(raw) = value else {
                return Err(AppError::ImportFormat(format!("value for {} must be a string", key)));
            };
            if !key.starts_with(&scan_prefix) {
                tracing::warn!(key = %key, "skipping backup entry outside the storage prefix");
                continue;
            }
            entries.insert(key, raw);
        }
        Ok(entries)
    }

    pub fn restore(&self, entries: &BTreeMap<String, String>) -> AppResult<usize> {
        self.backend.replace_prefixed(&self.scan_prefix(), entries)?;
        Ok(entries.len())
    }
}
