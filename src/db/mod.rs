use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use crate::store::KeyValueStore;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_default_settings()?;

        Ok(db)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal(format!("database mutex poisoned ({})", self.db_path.display())))
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_default()),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings = serde_json::from_value(merged)
            .map_err(|error| AppError::Validation(format!("invalid settings: {}", error)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![
                    serde_json::to_string(&AppSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM kv_entries WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(AppError::from)
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt.query_map([prefix], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn replace_prefixed(&self, prefix: &str, entries: &BTreeMap<String, String>) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::store::KeyValueStore;
    use std::collections::BTreeMap;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("state.sqlite")).expect("db");
        (dir, db)
    }

    #[test]
    fn default_settings_are_seeded() {
        let (_dir, db) = temp_db();
        let settings = db.get_settings().expect("settings");
        assert_eq!(settings.key_prefix, "complex-mgt-v4");
        assert_eq!(settings.lease_kpi_id, "default-lease");
        assert!(settings.seed_baseline);
    }

    #[test]
    fn settings_update_merges_partial_json() {
        let (_dir, db) = temp_db();
        let updated = db
            .update_settings(serde_json::json!({ "seedBaseline": false }))
            .expect("update");
        assert!(!updated.seed_baseline);
        assert_eq!(updated.key_prefix, "complex-mgt-v4");
        assert!(!db.get_settings().expect("settings").seed_baseline);
        assert!(db.update_settings(serde_json::json!({ "seedBaseline": "nope" })).is_err());
    }

    #[test]
    fn kv_entries_round_trip_and_scan_by_prefix() {
        let (_dir, db) = temp_db();
        db.set("app-tasks", "[]").expect("set");
        db.set("app-tenants", "[1]").expect("set");
        db.set("apple", "x").expect("set");
        db.set("app-tasks", "[2]").expect("overwrite");

        assert_eq!(db.get("app-tasks").expect("get").as_deref(), Some("[2]"));
        assert_eq!(db.keys_with_prefix("app-").expect("keys"), vec!["app-tasks", "app-tenants"]);

        db.remove("app-tasks").expect("remove");
        assert_eq!(db.get("app-tasks").expect("get"), None);
    }

    #[test]
    fn replace_prefixed_is_scoped_to_prefix() {
        let (_dir, db) = temp_db();
        db.set("app-old", "1").expect("set");
        db.set("keep", "2").expect("set");

        let mut entries = BTreeMap::new();
        entries.insert("app-new".to_string(), "3".to_string());
        db.replace_prefixed("app-", &entries).expect("replace");

        assert_eq!(db.get("app-old").expect("get"), None);
        assert_eq!(db.get("app-new").expect("get").as_deref(), Some("3"));
        assert_eq!(db.get("keep").expect("get").as_deref(), Some("2"));
    }
}
