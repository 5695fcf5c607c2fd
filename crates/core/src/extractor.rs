use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    source_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// OCR service endpoint, supplied by the composition root. When absent, the
/// extractor only has the structured text layer to work with.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Plain-text extraction from uploaded document bytes.
pub trait TextExtractor {
    fn extract_text(&self, bytes: &[u8], file_name: &str) -> Result<String, ExtractError>;
}

/// Two-stage PDF text extraction: the structured text layer first, an OCR
/// service for scanned documents second. Deterministic per input, no retries.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor {
    ocr: Option<OcrConfig>,
}

impl PdfTextExtractor {
    pub fn new(ocr: Option<OcrConfig>) -> Self {
        Self { ocr }
    }

    fn ocr_pages(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<Option<Vec<PageText>>, ExtractError> {
        let cfg = match &self.ocr {
            Some(cfg) => cfg.clone(),
            None => return Ok(None),
        };

        // reqwest's blocking client must not run on the async reactor thread.
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(bytes),
            source_name: file_name.to_string(),
        };
        let response = tokio::task::block_in_place(|| run_ocr_request(&cfg, &payload))?;
        let pages = payload_to_pages(&response, file_name)?;

        if pages.is_empty() {
            return Err(ExtractError::OcrFailed(format!(
                "OCR response has no readable text: {file_name}"
            )));
        }

        Ok(Some(pages))
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8], file_name: &str) -> Result<String, ExtractError> {
        resolve_extraction(
            extract_text_layer(bytes),
            || self.ocr_pages(bytes, file_name),
            file_name,
        )
    }
}

/// Stage selection: a non-empty text layer wins outright; otherwise the OCR
/// fallback runs, and its absence or failure decides the final error.
fn resolve_extraction<F>(
    layer: Result<String, ExtractError>,
    ocr: F,
    file_name: &str,
) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<Option<Vec<PageText>>, ExtractError>,
{
    match layer {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => match ocr()? {
            Some(pages) => Ok(join_pages(&pages)),
            None => Err(ExtractError::Empty(format!(
                "pdf has an empty text layer and no OCR endpoint is configured: {file_name}"
            ))),
        },
        Err(parse_error) => match ocr() {
            Ok(Some(pages)) => Ok(join_pages(&pages)),
            Ok(None) => Err(parse_error),
            Err(ocr_error) => Err(ExtractError::OcrFailed(format!(
                "{parse_error}; OCR fallback failed: {ocr_error}"
            ))),
        },
    }
}

fn extract_text_layer(bytes: &[u8]) -> Result<String, ExtractError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(PageText {
                number: page_no,
                text,
            });
        }
    }

    Ok(join_pages(&pages))
}

fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_ocr_request(cfg: &OcrConfig, payload: &OcrRequest) -> Result<OcrResponse, ExtractError> {
    let client = Client::builder().timeout(cfg.timeout).build()?;
    let mut request = client
        .post(&cfg.endpoint)
        .header("content-type", "application/json")
        .json(payload);

    if let Some(api_key) = &cfg.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request.send()?;

    if !response.status().is_success() {
        return Err(ExtractError::OcrFailed(format!(
            "OCR request to {} returned {}",
            cfg.endpoint,
            response.status()
        )));
    }

    Ok(response.json()?)
}

fn payload_to_pages(payload: &OcrResponse, file_name: &str) -> Result<Vec<PageText>, ExtractError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_ref().map(|value| value.trim().to_string());
                text.and_then(|normalized| {
                    if normalized.is_empty() {
                        None
                    } else {
                        let page_number = page.page.unwrap_or(1);
                        Some(PageText {
                            number: page_number,
                            text: normalized,
                        })
                    }
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim().to_string();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized,
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(ExtractError::OcrFailed(format!(
        "OCR response was empty for {file_name}"
    )))
}
