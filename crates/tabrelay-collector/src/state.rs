//! Shared collector state.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tabrelay_core::{json, CollectorConfig, Result};
use tokio::sync::Mutex;

/// State shared by all collector handlers.
pub struct CollectorState {
    log_path: PathBuf,
    latest: RwLock<Option<serde_json::Value>>,
    /// Serializes file replacement and the `latest` update.
    write_lock: Mutex<()>,
    received: AtomicU64,
}

impl CollectorState {
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_log_path(&config.log_path)
    }

    pub fn with_log_path(log_path: &Path) -> Self {
        Self {
            log_path: log_path.to_path_buf(),
            latest: RwLock::new(None),
            write_lock: Mutex::new(()),
            received: AtomicU64::new(0),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Store a payload: replace the log file and keep it in memory.
    ///
    /// The file is written to a sibling temp file and renamed into place, so
    /// readers never see a partial snapshot.
    pub async fn record(&self, payload: serde_json::Value) -> Result<()> {
        let pretty = json::to_string_indented(&payload)?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, pretty).await?;
        tokio::fs::rename(&tmp_path, &self.log_path).await?;

        *self.latest.write() = Some(payload);
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .log_path
            .file_name()
            .unwrap_or(OsStr::new("log.json"))
            .to_os_string();
        name.push(".tmp");
        self.log_path.with_file_name(name)
    }

    pub fn latest(&self) -> Option<serde_json::Value> {
        self.latest.read().clone()
    }

    /// Payloads accepted since startup.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_overwrites_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.json");
        let state = CollectorState::with_log_path(&path);

        state.record(serde_json::json!([{"id": 1}, {"id": 2}])).await.unwrap();
        state.record(serde_json::json!([{"id": 1}])).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 1);
        assert_eq!(state.latest(), Some(written));
        assert_eq!(state.received(), 2);
        assert!(!dir.path().join("nested").join("log.json.tmp").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_keep_file_and_latest_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let state = Arc::new(CollectorState::with_log_path(&path));

        for round in 0..25 {
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let state = state.clone();
                    tokio::spawn(async move {
                        // Different sizes so interleaved writes would leave trailing bytes.
                        let tabs: Vec<serde_json::Value> = (0..(1 + i * 40))
                            .map(|id| serde_json::json!({"id": id, "title": format!("round {}", round)}))
                            .collect();
                        state.record(serde_json::Value::Array(tabs)).await.unwrap();
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap();
            }

            let written: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(state.latest(), Some(written));
        }
        assert_eq!(state.received(), 25 * 8);
    }
}
