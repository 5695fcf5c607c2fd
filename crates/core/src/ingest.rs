use crate::error::IngestError;
use crate::models::DocumentUpload;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    Ok(digest_bytes(&bytes))
}

fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read one file into an upload. The upload id is the digest of the raw
/// bytes, so re-running the CLI over the same file resumes the same ledger
/// entry instead of minting a new one.
pub fn load_upload(path: &Path) -> Result<DocumentUpload, IngestError> {
    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?
        .to_string();

    Ok(DocumentUpload {
        upload_id: digest_bytes(&bytes),
        file_name,
        bytes,
    })
}

/// All uploads under a folder, recursively. Errors when the folder holds no
/// PDFs at all; unreadable files surface individually.
pub fn load_folder_uploads(
    folder: &Path,
) -> Result<Vec<Result<DocumentUpload, IngestError>>, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::NoPdfFiles(folder.display().to_string()));
    }

    Ok(files.iter().map(|path| load_upload(path)).collect())
}
