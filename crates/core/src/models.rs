use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One enrichment-owned record in the document store. At most one record
/// exists per distinct `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub file_name: String,
    pub time_created: DateTime<Utc>,
    pub text_content: String,
    pub content_hash: String,
    pub summary: Option<Value>,
}

impl DocumentRecord {
    pub fn new(
        file_name: impl Into<String>,
        text_content: impl Into<String>,
        content_hash: impl Into<String>,
        summary: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            time_created: Utc::now(),
            text_content: text_content.into(),
            content_hash: content_hash.into(),
            summary,
        }
    }
}

/// Lifecycle of one upload. `Uploaded -> Processing -> {Processed | Failed |
/// Rejected}`; only `Failed` may re-enter `Processing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
    Rejected,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

/// Raw bytes of one upload, handed over by the surrounding application's
/// file storage.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub upload_id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Tagged result of one enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Processed { record_id: Uuid },
    AlreadyProcessed,
    AlreadyInFlight,
    DuplicateRejected,
    Failed { reason: String },
}

/// Result of a store insert attempt, distinguished without exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    DuplicateRejected,
}

/// One nearest-neighbor hit from the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub file_name: String,
    pub text_content: String,
    pub summary: Option<Value>,
    pub score: f64,
}

/// Cached question/answer pair. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheEntry {
    pub question: String,
    pub response: String,
    pub asked_by: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one freshly resolved search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub asked_by: String,
    pub query: String,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

/// Answer returned to the caller of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub response: String,
    pub cached: bool,
    pub similarity: Option<f32>,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_processed_and_rejected() {
        assert!(IngestionStatus::Processed.is_terminal());
        assert!(IngestionStatus::Rejected.is_terminal());
        assert!(!IngestionStatus::Failed.is_terminal());
        assert!(!IngestionStatus::Processing.is_terminal());
        assert!(!IngestionStatus::Uploaded.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&IngestionStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn new_records_get_distinct_ids() {
        let first = DocumentRecord::new("a.pdf", "text", "hash-a", None);
        let second = DocumentRecord::new("b.pdf", "text", "hash-b", None);
        assert_ne!(first.id, second.id);
    }
}
