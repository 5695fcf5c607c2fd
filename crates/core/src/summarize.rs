use crate::error::LlmError;
use crate::traits::LlmBackend;
use chrono::Utc;
use regex::Regex;
use serde_json::{json, Value};

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 12_000;
pub const TRUNCATION_MARKER: &str = "...";

const SYSTEM_PROMPT: &str =
    "You are an expert tender analyst. Extract and structure tender information accurately.";

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    pub max_prompt_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            max_tokens: 1_500,
            temperature: 0.3,
        }
    }
}

/// Turns extracted tender text into a structured summary via the LLM
/// backend. Output is always a JSON object: parsed model output when the
/// model returned JSON, a wrapping envelope otherwise, with a fixed
/// `metadata` object in both cases.
pub struct Summarizer<L> {
    llm: L,
    config: SummarizerConfig,
}

impl<L> Summarizer<L>
where
    L: LlmBackend + Send + Sync,
{
    pub fn new(llm: L, config: SummarizerConfig) -> Self {
        Self { llm, config }
    }

    pub async fn summarize(&self, file_name: &str, text: &str) -> Result<Value, LlmError> {
        let bounded = truncate_for_prompt(text, self.config.max_prompt_chars);
        let prompt = build_prompt(file_name, &bounded);

        let raw = self
            .llm
            .complete(
                SYSTEM_PROMPT,
                &prompt,
                self.config.max_tokens,
                self.config.temperature,
            )
            .await?;

        let mut summary = parse_structured(&raw, bounded.len());
        attach_metadata(
            &mut summary,
            file_name,
            &self.config.model,
            bounded.len(),
        );

        Ok(summary)
    }
}

/// Bound the text sent upstream; a trailing marker shows the cut happened.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut bounded: String = text.chars().take(max_chars).collect();
    bounded.push_str(TRUNCATION_MARKER);
    bounded
}

pub fn build_prompt(file_name: &str, text: &str) -> String {
    format!(
        "Analyze this tender/government document and extract key information. Focus on identifying:\n\
         \n\
         1. TENDER INFORMATION:\n\
            - Tender number/reference\n\
            - Title/description\n\
            - Procuring entity/organization\n\
            - Category (ICT, Construction, Consultancy, etc.)\n\
            - Location/region\n\
            - Estimated budget (if mentioned)\n\
         \n\
         2. IMPORTANT DATES:\n\
            - Closing date and time\n\
            - Site visit dates (if any)\n\
            - Pre-bid meeting dates\n\
         \n\
         3. REQUIREMENTS:\n\
            - Eligibility criteria\n\
            - Mandatory documents required\n\
            - Technical specifications (brief summary)\n\
            - Experience requirements\n\
         \n\
         4. SUBMISSION DETAILS:\n\
            - How to submit (online/physical)\n\
            - Where to submit\n\
            - Contact information\n\
         \n\
         5. BUSINESS OPPORTUNITY ASSESSMENT:\n\
            - Rate the opportunity (1-10) based on clarity and completeness\n\
            - Key risks or challenges\n\
            - Recommended next steps\n\
         \n\
         Document: {file_name}\n\
         \n\
         Content:\n\
         {text}\n\
         \n\
         Please provide a structured JSON response with all the extracted information."
    )
}

/// Parse the model output as a JSON object, tolerating Markdown code fences.
/// Anything else is wrapped rather than treated as a failure; structured
/// output is requested, not guaranteed.
fn parse_structured(raw: &str, text_length: usize) -> Value {
    let unfenced = strip_code_fence(raw);

    match serde_json::from_str::<Value>(unfenced) {
        Ok(value) if value.is_object() => value,
        _ => json!({
            "analysis": raw,
            "extracted_text_length": text_length,
            "processing_timestamp": Utc::now().to_rfc3339(),
        }),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let fence = Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("static fence pattern");
    match fence.captures(trimmed) {
        Some(captures) => captures.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

fn attach_metadata(summary: &mut Value, file_name: &str, model: &str, text_length: usize) {
    if let Some(object) = summary.as_object_mut() {
        object.insert(
            "metadata".to_string(),
            json!({
                "filename": file_name,
                "processed_at": Utc::now().to_rfc3339(),
                "model_used": model,
                "text_length": text_length,
            }),
        );
    }
}
