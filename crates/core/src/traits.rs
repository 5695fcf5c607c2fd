use crate::error::{LlmError, PersistError, StoreError};
use crate::models::{
    DocumentRecord, IngestionStatus, QueryCacheEntry, ScoredDocument, SearchLogEntry, UpsertOutcome,
};
use async_trait::async_trait;

/// Vector/document store backend. One capability set covers every caller:
/// schema bootstrap, insert, exact-hash lookup, nearest-neighbor query.
///
/// Implementations surface backend failures as typed errors; they never
/// return fabricated empty data when the service is unreachable.
#[async_trait]
pub trait DocumentStore {
    /// Create the document schema if absent. Idempotent and safe to race:
    /// concurrent callers all observe success once the schema exists.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, StoreError>;

    async fn find_by_hash(&self, content_hash: &str)
        -> Result<Option<DocumentRecord>, StoreError>;

    async fn semantic_query(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError>;
}

/// Chat-completion backend. The returned text may be non-JSON even when JSON
/// was requested; callers must tolerate and wrap.
#[async_trait]
pub trait LlmBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

/// Durable ingestion-status ledger owned by the surrounding application.
#[async_trait]
pub trait StatusStore {
    async fn status(&self, upload_id: &str) -> Result<IngestionStatus, PersistError>;

    /// Atomically transition `Uploaded | Failed -> Processing`. Returns false
    /// when the upload is in any other state, so that of two concurrent
    /// callers exactly one proceeds.
    async fn begin_processing(&self, upload_id: &str) -> Result<bool, PersistError>;

    async fn finish(
        &self,
        upload_id: &str,
        status: IngestionStatus,
        reason: Option<&str>,
    ) -> Result<(), PersistError>;
}

/// Durable home for cached question/answer pairs and the search log.
#[async_trait]
pub trait QueryLog {
    async fn entries(&self) -> Result<Vec<QueryCacheEntry>, PersistError>;

    async fn append(&self, entry: QueryCacheEntry) -> Result<(), PersistError>;

    async fn log_search(&self, entry: SearchLogEntry) -> Result<(), PersistError>;
}

/// Destination for the per-document summary artifact.
#[async_trait]
pub trait SummarySink {
    async fn persist(
        &self,
        file_name: &str,
        summary: &serde_json::Value,
    ) -> Result<(), PersistError>;
}
