use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("ocr fallback failed: {0}")]
    OcrFailed(String),

    #[error("no extractable text: {0}")]
    Empty(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("no pdf files found in {0}")]
    NoPdfFiles(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store not reachable: {0}")]
    Unavailable(String),

    #[error("store request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            StoreError::Unavailable(error.to_string())
        } else {
            StoreError::Request(error.to_string())
        }
    }
}

/// Failure reported by an LLM completion backend.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LlmError(pub String);

/// Failure from the surrounding application's durable stores (status ledger,
/// query log, summary artifacts).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PersistError(pub String);

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("summarization failed: {0}")]
    Llm(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("status ledger error: {0}")]
    Status(String),

    #[error("summary artifact error: {0}")]
    Artifact(String),
}

impl From<LlmError> for EnrichError {
    fn from(error: LlmError) -> Self {
        EnrichError::Llm(error.0)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("answer generation failed: {0}")]
    Llm(String),

    #[error("query log error: {0}")]
    Log(String),

    #[error("question is empty")]
    EmptyQuestion,
}

impl From<LlmError> for SearchError {
    fn from(error: LlmError) -> Self {
        SearchError::Llm(error.0)
    }
}

pub type Result<T, E = EnrichError> = std::result::Result<T, E>;
