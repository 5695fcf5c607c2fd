use crate::embeddings::Embedder;
use crate::error::StoreError;
use crate::models::{DocumentRecord, ScoredDocument, UpsertOutcome};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

/// Weaviate-backed document store. Vectors are computed locally with the
/// injected embedder and shipped with each object, so the server needs no
/// vectorizer module.
pub struct WeaviateStore<E> {
    endpoint: String,
    class_name: String,
    client: Client,
    embedder: E,
}

impl<E> WeaviateStore<E>
where
    E: Embedder,
{
    pub fn new(
        endpoint: impl Into<String>,
        class_name: impl Into<String>,
        embedder: E,
    ) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint,
            class_name: class_name.into(),
            client: Client::new(),
            embedder,
        })
    }

    fn schema_url(&self) -> String {
        format!("{}/v1/schema", self.endpoint)
    }

    fn graphql_url(&self) -> String {
        format!("{}/v1/graphql", self.endpoint)
    }

    async fn graphql(&self, query: String) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.graphql_url())
            .json(&json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        if let Some(errors) = parsed.pointer("/errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(StoreError::BackendResponse {
                    backend: "weaviate".to_string(),
                    details: serde_json::to_string(errors)?,
                });
            }
        }

        Ok(parsed)
    }

    fn record_vector(&self, record: &DocumentRecord) -> Vec<f32> {
        // Mirror of the indexed source properties: full text plus summary.
        let summary_text = record
            .summary
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();
        self.embedder
            .embed(&format!("{} {}", record.text_content, summary_text))
    }
}

#[async_trait]
impl<E> DocumentStore for WeaviateStore<E>
where
    E: Embedder + Send + Sync,
{
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(format!("{}/{}", self.schema_url(), self.class_name))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .post(self.schema_url())
            .json(&json!({
                "class": self.class_name,
                "vectorizer": "none",
                "properties": [
                    {"name": "file_name", "dataType": ["text"], "indexFilterable": true},
                    {"name": "time_created", "dataType": ["date"]},
                    {"name": "text_content", "dataType": ["text"]},
                    {"name": "content_hash", "dataType": ["text"], "indexFilterable": true},
                    {"name": "summary", "dataType": ["text"]}
                ]
            }))
            .send()
            .await?;

        // 422 means another caller created the class first; that is success.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY || response.status().is_success()
        {
            return Ok(());
        }

        Err(StoreError::BackendResponse {
            backend: "weaviate".to_string(),
            details: response.status().to_string(),
        })
    }

    async fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, StoreError> {
        if self.find_by_hash(&record.content_hash).await?.is_some() {
            return Ok(UpsertOutcome::DuplicateRejected);
        }

        let summary_text = match &record.summary {
            Some(summary) => serde_json::to_string(summary)?,
            None => String::new(),
        };

        let response = self
            .client
            .post(format!("{}/v1/objects", self.endpoint))
            .json(&json!({
                "class": self.class_name,
                "id": record.id,
                "vector": self.record_vector(record),
                "properties": {
                    "file_name": record.file_name,
                    "time_created": record.time_created.to_rfc3339(),
                    "text_content": record.text_content,
                    "content_hash": record.content_hash,
                    "summary": summary_text,
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(UpsertOutcome::Inserted)
    }

    async fn find_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        // content_hash is a hex digest, safe to interpolate into GraphQL.
        let query = format!(
            "{{ Get {{ {class}(where: {{path: [\"content_hash\"], operator: Equal, \
             valueText: \"{content_hash}\"}}, limit: 1) \
             {{ file_name time_created text_content content_hash summary \
             _additional {{ id }} }} }} }}",
            class = self.class_name,
        );

        let parsed = self.graphql(query).await?;
        let mut records = records_from_graphql(&parsed, &self.class_name);
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    async fn semantic_query(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        let vector = serde_json::to_string(&self.embedder.embed(text))?;
        let query = format!(
            "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {limit}) \
             {{ file_name text_content summary _additional {{ id certainty }} }} }} }}",
            class = self.class_name,
        );

        let parsed = self.graphql(query).await?;
        Ok(scored_from_graphql(&parsed, &self.class_name))
    }
}

fn objects_in<'a>(parsed: &'a Value, class_name: &str) -> Vec<&'a Value> {
    parsed
        .pointer(&format!("/data/Get/{class_name}"))
        .and_then(Value::as_array)
        .map(|objects| objects.iter().collect())
        .unwrap_or_default()
}

fn string_at(object: &Value, field: &str) -> String {
    object
        .pointer(&format!("/{field}"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn summary_from_text(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(raw.to_string())),
    }
}

fn records_from_graphql(parsed: &Value, class_name: &str) -> Vec<DocumentRecord> {
    objects_in(parsed, class_name)
        .into_iter()
        .map(|object| {
            let time_created = object
                .pointer("/time_created")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            DocumentRecord {
                id: object
                    .pointer("/_additional/id")
                    .and_then(Value::as_str)
                    .and_then(|raw| Uuid::parse_str(raw).ok())
                    .unwrap_or_default(),
                file_name: string_at(object, "file_name"),
                time_created,
                text_content: string_at(object, "text_content"),
                content_hash: string_at(object, "content_hash"),
                summary: summary_from_text(&string_at(object, "summary")),
            }
        })
        .collect()
}

fn scored_from_graphql(parsed: &Value, class_name: &str) -> Vec<ScoredDocument> {
    objects_in(parsed, class_name)
        .into_iter()
        .map(|object| ScoredDocument {
            id: string_at(object, "_additional/id"),
            file_name: string_at(object, "file_name"),
            text_content: string_at(object, "text_content"),
            summary: summary_from_text(&string_at(object, "summary")),
            score: object
                .pointer("/_additional/certainty")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{records_from_graphql, scored_from_graphql, summary_from_text};
    use serde_json::json;

    #[test]
    fn hash_lookup_payload_parses_into_a_record() {
        let payload = json!({
            "data": {
                "Get": {
                    "TenderDocument": [{
                        "file_name": "roads.pdf",
                        "time_created": "2026-05-01T10:00:00Z",
                        "text_content": "tender text",
                        "content_hash": "abc123",
                        "summary": "{\"title\": \"Road works\"}",
                        "_additional": {"id": "9b2f4a18-9c1d-4f26-8f2e-0d1e2f3a4b5c"}
                    }]
                }
            }
        });

        let records = records_from_graphql(&payload, "TenderDocument");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "roads.pdf");
        assert_eq!(records[0].content_hash, "abc123");
        assert_eq!(
            records[0].summary.as_ref().unwrap()["title"],
            "Road works"
        );
    }

    #[test]
    fn missing_class_key_yields_no_records() {
        let payload = json!({"data": {"Get": {}}});
        assert!(records_from_graphql(&payload, "TenderDocument").is_empty());
    }

    #[test]
    fn near_vector_payload_parses_with_certainty_scores() {
        let payload = json!({
            "data": {
                "Get": {
                    "TenderDocument": [
                        {
                            "file_name": "a.pdf",
                            "text_content": "first",
                            "summary": "",
                            "_additional": {"id": "id-a", "certainty": 0.91}
                        },
                        {
                            "file_name": "b.pdf",
                            "text_content": "second",
                            "summary": "plain summary",
                            "_additional": {"id": "id-b", "certainty": 0.42}
                        }
                    ]
                }
            }
        });

        let hits = scored_from_graphql(&payload, "TenderDocument");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "id-a");
        assert!((hits[0].score - 0.91).abs() < 1e-9);
        assert_eq!(
            hits[1].summary,
            Some(serde_json::Value::String("plain summary".to_string()))
        );
    }

    #[test]
    fn empty_summary_text_maps_to_none() {
        assert_eq!(summary_from_text(""), None);
    }
}
