use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tender_search_core::{
    IngestionStatus, PersistError, QueryCacheEntry, QueryLog, SearchLogEntry, StatusStore,
    SummarySink,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    status: IngestionStatus,
    reason: Option<String>,
    updated_at: DateTime<Utc>,
}

/// JSON-file ingestion-status ledger.
///
/// The process-wide mutex is the atomicity domain for the
/// `Uploaded | Failed -> Processing` compare-and-swap; that covers the CLI's
/// single-process use. A multi-process deployment needs a backing store with
/// its own CAS.
pub struct FileStatusStore {
    path: PathBuf,
    state: Mutex<HashMap<String, LedgerEntry>>,
}

impl FileStatusStore {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn flush(&self, state: &HashMap<String, LedgerEntry>) -> Result<(), PersistError> {
        let payload = serde_json::to_vec_pretty(state)
            .map_err(|error| PersistError(error.to_string()))?;
        fs::write(&self.path, payload).map_err(|error| PersistError(error.to_string()))
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn status(&self, upload_id: &str) -> Result<IngestionStatus, PersistError> {
        let state = self
            .state
            .lock()
            .map_err(|error| PersistError(error.to_string()))?;
        Ok(state
            .get(upload_id)
            .map(|entry| entry.status)
            .unwrap_or(IngestionStatus::Uploaded))
    }

    async fn begin_processing(&self, upload_id: &str) -> Result<bool, PersistError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| PersistError(error.to_string()))?;

        let current = state
            .get(upload_id)
            .map(|entry| entry.status)
            .unwrap_or(IngestionStatus::Uploaded);

        if !matches!(
            current,
            IngestionStatus::Uploaded | IngestionStatus::Failed
        ) {
            return Ok(false);
        }

        state.insert(
            upload_id.to_string(),
            LedgerEntry {
                status: IngestionStatus::Processing,
                reason: None,
                updated_at: Utc::now(),
            },
        );
        self.flush(&state)?;
        Ok(true)
    }

    async fn finish(
        &self,
        upload_id: &str,
        status: IngestionStatus,
        reason: Option<&str>,
    ) -> Result<(), PersistError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| PersistError(error.to_string()))?;

        state.insert(
            upload_id.to_string(),
            LedgerEntry {
                status,
                reason: reason.map(str::to_string),
                updated_at: Utc::now(),
            },
        );
        self.flush(&state)
    }
}

/// Append-only JSONL files for the query cache and the search log.
pub struct FileQueryLog {
    cache_path: PathBuf,
    searches_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileQueryLog {
    pub fn open(cache_path: impl Into<PathBuf>, searches_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            searches_path: searches_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append_line<T: Serialize>(&self, path: &Path, entry: &T) -> Result<(), PersistError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|error| PersistError(error.to_string()))?;
        let mut line =
            serde_json::to_vec(entry).map_err(|error| PersistError(error.to_string()))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|error| PersistError(error.to_string()))?;
        file.write_all(&line)
            .map_err(|error| PersistError(error.to_string()))
    }
}

#[async_trait]
impl QueryLog for FileQueryLog {
    async fn entries(&self) -> Result<Vec<QueryCacheEntry>, PersistError> {
        if !self.cache_path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.cache_path)
            .map_err(|error| PersistError(error.to_string()))?;

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|error| PersistError(error.to_string()))
            })
            .collect()
    }

    async fn append(&self, entry: QueryCacheEntry) -> Result<(), PersistError> {
        self.append_line(&self.cache_path, &entry)
    }

    async fn log_search(&self, entry: SearchLogEntry) -> Result<(), PersistError> {
        self.append_line(&self.searches_path, &entry)
    }
}

/// Writes each document's summary next to the others as
/// `<stem>_ai_summarized.json`.
pub struct DirSummarySink {
    dir: PathBuf,
}

impl DirSummarySink {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn artifact_path(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);
        self.dir.join(format!("{stem}_ai_summarized.json"))
    }
}

#[async_trait]
impl SummarySink for DirSummarySink {
    async fn persist(
        &self,
        file_name: &str,
        summary: &serde_json::Value,
    ) -> Result<(), PersistError> {
        let payload = serde_json::to_vec_pretty(summary)
            .map_err(|error| PersistError(error.to_string()))?;
        fs::write(self.artifact_path(file_name), payload)
            .map_err(|error| PersistError(error.to_string()))
    }
}
