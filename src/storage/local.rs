//! Local filesystem event store.
//!
//! All records live in a single JSON document:
//!
//! ```text
//! {
//!   "updated_at": "...",
//!   "count": 2,
//!   "records": {
//!     "foodspider:3f2a...": { "key": ..., "source_tag": ..., "saved_at": ..., "event": {...} },
//!     ...
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::FreeFoodEvent;
use crate::storage::{EventSink, record_key};

/// Write `value` as pretty JSON to `path` atomically (temp file, then rename).
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// One persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub key: String,
    pub source_tag: String,
    pub saved_at: DateTime<Utc>,
    pub event: FreeFoodEvent,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    updated_at: Option<DateTime<Utc>>,
    count: usize,
    #[serde(default)]
    records: BTreeMap<String, StoredEvent>,
}

/// JSON-file backed [`EventSink`].
pub struct LocalEventStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl LocalEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// All stored records, ordered by key.
    pub async fn load(&self) -> Result<Vec<StoredEvent>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.records.into_values().collect())
    }

    async fn read(&self) -> Result<StoreData> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::storage(format!("Corrupt event store {:?}: {e}", self.path))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl EventSink for LocalEventStore {
    async fn upsert(&self, event: &FreeFoodEvent, source_tag: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let mut data = self.read().await?;

        let key = record_key(source_tag, &event.event_id);
        let replaced = data
            .records
            .insert(
                key.clone(),
                StoredEvent {
                    key: key.clone(),
                    source_tag: source_tag.to_string(),
                    saved_at: Utc::now(),
                    event: event.clone(),
                },
            )
            .is_some();

        data.count = data.records.len();
        data.updated_at = Some(Utc::now());
        write_json_atomic(&self.path, &data).await?;

        log::debug!(
            "{} event {} in {:?}",
            if replaced { "Updated" } else { "Stored" },
            key,
            self.path
        );
        Ok(Some(key))
    }
}
