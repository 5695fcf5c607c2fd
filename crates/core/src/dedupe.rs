use crate::error::StoreError;
use crate::traits::DocumentStore;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of extracted text; the uniqueness key for dedup.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read-only duplicate check against the document store, limit 1.
pub async fn is_duplicate<S: DocumentStore + Sync>(
    store: &S,
    content_hash: &str,
) -> Result<bool, StoreError> {
    Ok(store.find_by_hash(content_hash).await?.is_some())
}
