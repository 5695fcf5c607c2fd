use crate::dedupe::{content_hash, is_duplicate};
use crate::error::{EnrichError, StoreError};
use crate::extractor::TextExtractor;
use crate::models::{
    DocumentRecord, DocumentUpload, EnrichmentOutcome, IngestionStatus, UpsertOutcome,
};
use crate::summarize::Summarizer;
use crate::traits::{DocumentStore, LlmBackend, StatusStore, SummarySink};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Upper bound on each external call (summarization, store round trips).
    pub call_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
        }
    }
}

enum PipelineSuccess {
    Inserted(Uuid),
    Duplicate,
}

/// Drives one upload through extraction, dedup, summarization and store
/// upsert, with the status ledger recording every transition.
///
/// The `Uploaded | Failed -> Processing` edge is a compare-and-swap in the
/// ledger, so of two concurrent callers exactly one runs the pipeline; the
/// other observes the in-flight state. No path leaves a document parked in
/// `Processing`.
pub struct EnrichmentPipeline<S, L, T, K, X>
where
    S: DocumentStore,
    L: LlmBackend,
    T: StatusStore,
    K: SummarySink,
    X: TextExtractor,
{
    store: S,
    summarizer: Summarizer<L>,
    status: T,
    sink: K,
    extractor: X,
    config: EnrichmentConfig,
}

impl<S, L, T, K, X> EnrichmentPipeline<S, L, T, K, X>
where
    S: DocumentStore + Send + Sync,
    L: LlmBackend + Send + Sync,
    T: StatusStore + Send + Sync,
    K: SummarySink + Send + Sync,
    X: TextExtractor + Send + Sync,
{
    pub fn new(
        store: S,
        summarizer: Summarizer<L>,
        status: T,
        sink: K,
        extractor: X,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            summarizer,
            status,
            sink,
            extractor,
            config,
        }
    }

    pub async fn enrich(
        &self,
        upload: &DocumentUpload,
    ) -> Result<EnrichmentOutcome, EnrichError> {
        let current = self
            .status
            .status(&upload.upload_id)
            .await
            .map_err(|error| EnrichError::Status(error.to_string()))?;

        match current {
            IngestionStatus::Processed => return Ok(EnrichmentOutcome::AlreadyProcessed),
            IngestionStatus::Rejected => return Ok(EnrichmentOutcome::DuplicateRejected),
            IngestionStatus::Processing => return Ok(EnrichmentOutcome::AlreadyInFlight),
            IngestionStatus::Uploaded | IngestionStatus::Failed => {}
        }

        let claimed = self
            .status
            .begin_processing(&upload.upload_id)
            .await
            .map_err(|error| EnrichError::Status(error.to_string()))?;

        if !claimed {
            // Lost the race; report what the winner left behind.
            let now = self
                .status
                .status(&upload.upload_id)
                .await
                .map_err(|error| EnrichError::Status(error.to_string()))?;
            return Ok(match now {
                IngestionStatus::Processed => EnrichmentOutcome::AlreadyProcessed,
                IngestionStatus::Rejected => EnrichmentOutcome::DuplicateRejected,
                _ => EnrichmentOutcome::AlreadyInFlight,
            });
        }

        match self.run_pipeline(upload).await {
            Ok(PipelineSuccess::Inserted(record_id)) => {
                self.finish(upload, IngestionStatus::Processed, None).await?;
                Ok(EnrichmentOutcome::Processed { record_id })
            }
            Ok(PipelineSuccess::Duplicate) => {
                self.finish(upload, IngestionStatus::Rejected, Some("duplicate content"))
                    .await?;
                Ok(EnrichmentOutcome::DuplicateRejected)
            }
            Err(error) => {
                let reason = error.to_string();
                self.finish(upload, IngestionStatus::Failed, Some(&reason))
                    .await?;
                Ok(EnrichmentOutcome::Failed { reason })
            }
        }
    }

    async fn run_pipeline(&self, upload: &DocumentUpload) -> Result<PipelineSuccess, EnrichError> {
        let text = self
            .extractor
            .extract_text(&upload.bytes, &upload.file_name)?;

        let hash = content_hash(&text);
        match self
            .bounded("dedup check", is_duplicate(&self.store, &hash))
            .await
        {
            Ok(true) => return Ok(PipelineSuccess::Duplicate),
            Ok(false) => {}
            // Fail-open: an unreachable store must not block uploads.
            Err(EnrichError::Store(StoreError::Unavailable(_))) => {}
            Err(error) => return Err(error),
        }

        let summary = self
            .bounded(
                "summarization",
                self.summarizer.summarize(&upload.file_name, &text),
            )
            .await?;

        self.sink
            .persist(&upload.file_name, &summary)
            .await
            .map_err(|error| EnrichError::Artifact(error.to_string()))?;

        let record = DocumentRecord::new(
            upload.file_name.clone(),
            text,
            hash,
            Some(summary),
        );

        self.bounded("schema bootstrap", self.store.ensure_schema())
            .await?;

        match self.bounded("store upsert", self.store.upsert(&record)).await? {
            UpsertOutcome::Inserted => Ok(PipelineSuccess::Inserted(record.id)),
            UpsertOutcome::DuplicateRejected => Ok(PipelineSuccess::Duplicate),
        }
    }

    async fn finish(
        &self,
        upload: &DocumentUpload,
        status: IngestionStatus,
        reason: Option<&str>,
    ) -> Result<(), EnrichError> {
        self.status
            .finish(&upload.upload_id, status, reason)
            .await
            .map_err(|error| EnrichError::Status(error.to_string()))
    }

    async fn bounded<F, V, E>(&self, stage: &'static str, call: F) -> Result<V, EnrichError>
    where
        F: Future<Output = Result<V, E>>,
        E: Into<EnrichError>,
    {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_elapsed) => Err(EnrichError::Timeout {
                stage,
                seconds: self.config.call_timeout.as_secs(),
            }),
        }
    }
}
