pub mod cache;
pub mod dedupe;
pub mod embeddings;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod stores;
pub mod summarize;
pub mod traits;

pub use cache::{find_similar, SimilarityMatch, DEFAULT_SIMILARITY_THRESHOLD};
pub use dedupe::{content_hash, is_duplicate};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use enrich::{EnrichmentConfig, EnrichmentPipeline};
pub use error::{
    EnrichError, ExtractError, IngestError, LlmError, PersistError, SearchError, StoreError,
};
pub use extractor::{OcrConfig, PdfTextExtractor, TextExtractor};
pub use ingest::{digest_file, discover_pdf_files, load_folder_uploads, load_upload};
pub use llm::{OpenAiBackend, OpenAiConfig};
pub use models::{
    Answer, DocumentRecord, DocumentUpload, EnrichmentOutcome, IngestionStatus, QueryCacheEntry,
    ScoredDocument, SearchLogEntry, UpsertOutcome,
};
pub use search::{SearchConfig, SearchCoordinator};
pub use stores::WeaviateStore;
pub use summarize::{Summarizer, SummarizerConfig, DEFAULT_MAX_PROMPT_CHARS, TRUNCATION_MARKER};
pub use traits::{DocumentStore, LlmBackend, QueryLog, StatusStore, SummarySink};
