use crate::cache::{find_similar, DEFAULT_SIMILARITY_THRESHOLD};
use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::models::{Answer, QueryCacheEntry, ScoredDocument, SearchLogEntry};
use crate::traits::{DocumentStore, LlmBackend, QueryLog};
use chrono::Utc;
use std::time::Duration;

const ANSWER_SYSTEM_PROMPT: &str = "You are a tender research assistant. Answer questions using \
     only the provided document excerpts; say so when the excerpts do not contain the answer.";

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Cosine threshold above which a cached answer is reused.
    pub similarity_threshold: f32,
    /// Passages retrieved from the store on a cache miss.
    pub top_k: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub call_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: 2,
            max_tokens: 1_500,
            temperature: 0.3,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Answers questions over the enriched document corpus, reusing cached
/// answers for near-duplicate questions before paying for retrieval and a
/// fresh LLM round trip.
///
/// Cache lookups are global across asking parties; a hit may return an
/// answer originally generated for someone else's question.
pub struct SearchCoordinator<S, L, Q, E>
where
    S: DocumentStore,
    L: LlmBackend,
    Q: QueryLog,
    E: Embedder,
{
    store: S,
    llm: L,
    log: Q,
    embedder: E,
    config: SearchConfig,
}

impl<S, L, Q, E> SearchCoordinator<S, L, Q, E>
where
    S: DocumentStore + Send + Sync,
    L: LlmBackend + Send + Sync,
    Q: QueryLog + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(store: S, llm: L, log: Q, embedder: E, config: SearchConfig) -> Self {
        Self {
            store,
            llm,
            log,
            embedder,
            config,
        }
    }

    pub async fn search(&self, question: &str, asked_by: &str) -> Result<Answer, SearchError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SearchError::EmptyQuestion);
        }

        let history = self
            .log
            .entries()
            .await
            .map_err(|error| SearchError::Log(error.to_string()))?;

        let lookup = find_similar(
            &self.embedder,
            question,
            &history,
            self.config.similarity_threshold,
        );
        if let Some(index) = lookup.index {
            return Ok(Answer {
                response: history[index].response.clone(),
                cached: true,
                similarity: Some(lookup.score),
                sources: Vec::new(),
            });
        }

        let passages = tokio::time::timeout(
            self.config.call_timeout,
            self.store.semantic_query(question, self.config.top_k),
        )
        .await
        .map_err(|_| {
            SearchError::Store(crate::error::StoreError::Unavailable(
                "semantic query timed out".to_string(),
            ))
        })??;

        let prompt = build_answer_prompt(question, &passages);
        let response = tokio::time::timeout(
            self.config.call_timeout,
            self.llm.complete(
                ANSWER_SYSTEM_PROMPT,
                &prompt,
                self.config.max_tokens,
                self.config.temperature,
            ),
        )
        .await
        .map_err(|_| SearchError::Llm("answer generation timed out".to_string()))??;

        let now = Utc::now();
        self.log
            .append(QueryCacheEntry {
                question: question.to_string(),
                response: response.clone(),
                asked_by: asked_by.to_string(),
                created_at: now,
            })
            .await
            .map_err(|error| SearchError::Log(error.to_string()))?;
        self.log
            .log_search(SearchLogEntry {
                asked_by: asked_by.to_string(),
                query: question.to_string(),
                result: response.clone(),
                created_at: now,
            })
            .await
            .map_err(|error| SearchError::Log(error.to_string()))?;

        Ok(Answer {
            response,
            cached: false,
            similarity: None,
            sources: passages.into_iter().map(|passage| passage.id).collect(),
        })
    }
}

fn build_answer_prompt(question: &str, passages: &[ScoredDocument]) -> String {
    let mut context = String::new();
    for (index, passage) in passages.iter().enumerate() {
        context.push_str(&format!(
            "[{}] {} \n{}\n",
            index + 1,
            passage.file_name,
            passage.text_content
        ));
        if let Some(summary) = &passage.summary {
            context.push_str(&format!("summary: {summary}\n"));
        }
        context.push('\n');
    }

    if context.is_empty() {
        context.push_str("(no matching documents)\n");
    }

    format!("Question: {question}\n\nDocument excerpts:\n{context}")
}

#[cfg(test)]
mod tests {
    use super::{build_answer_prompt, SearchConfig, SearchCoordinator};
    use crate::embeddings::Embedder;
    use crate::error::{LlmError, PersistError, SearchError, StoreError};
    use crate::models::{
        DocumentRecord, QueryCacheEntry, ScoredDocument, SearchLogEntry, UpsertOutcome,
    };
    use crate::traits::{DocumentStore, LlmBackend, QueryLog};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            match text {
                "What is the submission deadline?" => vec![1.0, 0.0, 0.0],
                "When is the submission deadline?" => vec![0.95, 0.05, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeStore {
        hits: Vec<ScoredDocument>,
        fail: bool,
        queries: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn ensure_schema(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, _record: &DocumentRecord) -> Result<UpsertOutcome, StoreError> {
            Ok(UpsertOutcome::Inserted)
        }

        async fn find_by_hash(
            &self,
            _content_hash: &str,
        ) -> Result<Option<DocumentRecord>, StoreError> {
            Ok(None)
        }

        async fn semantic_query(
            &self,
            _text: &str,
            _limit: usize,
        ) -> Result<Vec<ScoredDocument>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unavailable("store down".to_string()));
            }
            Ok(self.hits.clone())
        }
    }

    #[derive(Clone)]
    struct FakeLlm {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    impl FakeLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for FakeLlm {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryLog {
        cache: Arc<Mutex<Vec<QueryCacheEntry>>>,
        searches: Arc<Mutex<Vec<SearchLogEntry>>>,
    }

    #[async_trait]
    impl QueryLog for MemoryLog {
        async fn entries(&self) -> Result<Vec<QueryCacheEntry>, PersistError> {
            Ok(self.cache.lock().unwrap().clone())
        }

        async fn append(&self, entry: QueryCacheEntry) -> Result<(), PersistError> {
            self.cache.lock().unwrap().push(entry);
            Ok(())
        }

        async fn log_search(&self, entry: SearchLogEntry) -> Result<(), PersistError> {
            self.searches.lock().unwrap().push(entry);
            Ok(())
        }
    }

    fn passage(id: &str, file_name: &str, text: &str) -> ScoredDocument {
        ScoredDocument {
            id: id.to_string(),
            file_name: file_name.to_string(),
            text_content: text.to_string(),
            summary: None,
            score: 0.9,
        }
    }

    fn coordinator(
        store: FakeStore,
        llm: FakeLlm,
        log: MemoryLog,
    ) -> SearchCoordinator<FakeStore, FakeLlm, MemoryLog, StubEmbedder> {
        SearchCoordinator::new(store, llm, log, StubEmbedder, SearchConfig::default())
    }

    #[tokio::test]
    async fn near_duplicate_question_is_served_from_cache() {
        let log = MemoryLog::default();
        log.append(QueryCacheEntry {
            question: "What is the submission deadline?".to_string(),
            response: "June 1st at noon.".to_string(),
            asked_by: "alice".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let store = FakeStore::default();
        let llm = FakeLlm::replying("fresh answer");
        let search = coordinator(store.clone(), llm.clone(), log);

        let answer = search
            .search("When is the submission deadline?", "bob")
            .await
            .unwrap();

        assert!(answer.cached);
        assert_eq!(answer.response, "June 1st at noon.");
        assert!(answer.similarity.unwrap() >= 0.8);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_miss_queries_store_calls_llm_and_appends_one_entry() {
        let log = MemoryLog::default();
        let store = FakeStore {
            hits: vec![passage("doc-1", "roads.pdf", "closing date June 1st")],
            ..FakeStore::default()
        };
        let llm = FakeLlm::replying("The tender closes June 1st.");
        let search = coordinator(store.clone(), llm.clone(), log.clone());

        let answer = search
            .search("What is the submission deadline?", "alice")
            .await
            .unwrap();

        assert!(!answer.cached);
        assert_eq!(answer.similarity, None);
        assert_eq!(answer.sources, vec!["doc-1".to_string()]);
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.cache.lock().unwrap().len(), 1);
        assert_eq!(log.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_surfaces_and_caches_nothing() {
        let log = MemoryLog::default();
        let store = FakeStore {
            fail: true,
            ..FakeStore::default()
        };
        let search = coordinator(store, FakeLlm::replying("x"), log.clone());

        let result = search.search("unseen question", "alice").await;

        assert!(matches!(result, Err(SearchError::Store(_))));
        assert!(log.cache.lock().unwrap().is_empty());
        assert!(log.searches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let search = coordinator(
            FakeStore::default(),
            FakeLlm::replying("x"),
            MemoryLog::default(),
        );
        let result = search.search("   ", "alice").await;
        assert!(matches!(result, Err(SearchError::EmptyQuestion)));
    }

    #[test]
    fn answer_prompt_lists_passages_in_order() {
        let prompt = build_answer_prompt(
            "deadline?",
            &[
                passage("a", "first.pdf", "alpha"),
                passage("b", "second.pdf", "beta"),
            ],
        );
        let first = prompt.find("first.pdf").unwrap();
        let second = prompt.find("second.pdf").unwrap();
        assert!(first < second);
        assert!(prompt.starts_with("Question: deadline?"));
    }
}
