use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::BotError;
use crate::history::Message;

/// Flat-file data directory: one history snapshot per channel and day, plus
/// the cached user list and channel info.
#[derive(Debug, Clone)]
pub struct DataStore {
    dir: PathBuf,
    channel_name: String,
}

#[derive(Debug, Deserialize)]
struct UsersList {
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    name: String,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>, channel_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            channel_name: channel_name.into(),
        }
    }

    pub fn snapshot_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "history-{}_{}.json",
            self.channel_name,
            day.format("%Y-%m-%d")
        ))
    }

    pub fn users_list_path(&self) -> PathBuf {
        self.dir.join("users_list.json")
    }

    pub fn channel_info_path(&self) -> PathBuf {
        self.dir.join(format!("channels_info-{}.json", self.channel_name))
    }

    pub fn has_snapshot(&self, day: NaiveDate) -> bool {
        self.snapshot_path(day).exists()
    }

    /// Overwrite the snapshot for `day` with the messages exactly as fetched.
    pub fn write_snapshot(&self, day: NaiveDate, messages: &[Value]) -> Result<PathBuf> {
        let path = self.snapshot_path(day);
        let body = serde_json::to_string(messages).context("Failed to encode snapshot")?;
        self.write_file(&path, &body)?;
        info!("Wrote {} messages to {}", messages.len(), path.display());
        Ok(path)
    }

    pub fn read_snapshot(&self, day: NaiveDate) -> Result<Vec<Message>> {
        let path = self.snapshot_path(day);
        let content = read_data_file(&path)?;
        let messages: Vec<Message> = serde_json::from_str(&content)
            .map_err(|e| BotError::data(path.display(), e))?;
        Ok(messages)
    }

    pub fn write_users_list(&self, body: &Value) -> Result<PathBuf> {
        let path = self.users_list_path();
        self.write_pretty(&path, body)?;
        Ok(path)
    }

    pub fn write_channel_info(&self, body: &Value) -> Result<PathBuf> {
        let path = self.channel_info_path();
        self.write_pretty(&path, body)?;
        Ok(path)
    }

    /// User id to display name, from the cached user list.
    pub fn read_display_names(&self) -> Result<HashMap<String, String>> {
        let path = self.users_list_path();
        let content = read_data_file(&path)?;
        let list: UsersList =
            serde_json::from_str(&content).map_err(|e| BotError::data(path.display(), e))?;
        Ok(list
            .members
            .into_iter()
            .map(|member| (member.id, member.name))
            .collect())
    }

    fn write_pretty(&self, path: &Path, body: &Value) -> Result<()> {
        let pretty = serde_json::to_string_pretty(body).context("Failed to encode JSON")?;
        self.write_file(path, &pretty)
    }

    fn write_file(&self, path: &Path, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn read_data_file(path: &Path) -> Result<String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| BotError::data(path.display(), e))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::exit_code;
    use serde_json::json;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_snapshot_path_names_channel_and_day() {
        let store = DataStore::new("/data", "dev");
        assert_eq!(
            store.snapshot_path(day()),
            PathBuf::from("/data/history-dev_2024-03-05.json")
        );
        assert_eq!(
            store.channel_info_path(),
            PathBuf::from("/data/channels_info-dev.json")
        );
    }

    #[test]
    fn test_snapshot_written_verbatim() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::new(temp.path().join("nested"), "dev");
        let raw = vec![json!({"user": "U1", "text": "hi", "ts": "1000.5", "team": "T1"})];

        let path = store.write_snapshot(day(), &raw).unwrap();
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(on_disk, Value::Array(raw.clone()));

        let messages = store.read_snapshot(day()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].ts.as_str(), "1000.5");
    }

    #[test]
    fn test_missing_snapshot_is_data_error() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::new(temp.path(), "dev");
        let err = store.read_snapshot(day()).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn test_malformed_snapshot_is_data_error() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::new(temp.path(), "dev");
        std::fs::write(store.snapshot_path(day()), r#"[{"user":"U1","ts":"soon"}]"#).unwrap();
        let err = store.read_snapshot(day()).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn test_out_of_range_ts_is_data_error() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::new(temp.path(), "dev");
        for ts in ["99999999999999999", "-1"] {
            let content = format!(r#"[{{"user":"U1","ts":"{}"}}]"#, ts);
            std::fs::write(store.snapshot_path(day()), content).unwrap();
            let err = store.read_snapshot(day()).unwrap_err();
            assert_eq!(exit_code(&err), 4, "ts {}", ts);
        }
    }

    #[test]
    fn test_display_names_from_users_list() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::new(temp.path(), "dev");
        store
            .write_users_list(&json!({
                "ok": true,
                "members": [
                    {"id": "U1", "name": "manic", "real_name": "M"},
                    {"id": "U2", "name": "alice"}
                ]
            }))
            .unwrap();
        let names = store.read_display_names().unwrap();
        assert_eq!(names.get("U2").map(String::as_str), Some("alice"));
        assert_eq!(names.len(), 2);
    }
}
