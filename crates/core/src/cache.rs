use crate::embeddings::{cosine_similarity, Embedder};
use crate::models::QueryCacheEntry;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Outcome of a cache lookup: the matched history index when the best cosine
/// similarity reached the threshold, plus the observed maximum either way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    pub index: Option<usize>,
    pub score: f32,
}

impl SimilarityMatch {
    pub fn miss(score: f32) -> Self {
        Self { index: None, score }
    }
}

/// Scan `history` for the question most similar to `question`.
///
/// Highest cosine similarity above `threshold` wins; ties go to the
/// first-seen entry (strictly-greater comparison). Empty history is always a
/// miss with score 0. Linear in the history size; worth an ANN index once
/// history grows past a few thousand entries.
pub fn find_similar<E: Embedder>(
    embedder: &E,
    question: &str,
    history: &[QueryCacheEntry],
    threshold: f32,
) -> SimilarityMatch {
    if history.is_empty() {
        return SimilarityMatch::miss(0.0);
    }

    let question_vector = embedder.embed(question);

    let mut best_index = 0usize;
    let mut best_score = f32::MIN;
    for (index, entry) in history.iter().enumerate() {
        let score = cosine_similarity(&question_vector, &embedder.embed(&entry.question));
        if score > best_score {
            best_score = score;
            best_index = index;
        }
    }

    if best_score >= threshold {
        SimilarityMatch {
            index: Some(best_index),
            score: best_score,
        }
    } else {
        SimilarityMatch::miss(best_score)
    }
}

#[cfg(test)]
mod tests {
    use super::{find_similar, SimilarityMatch, DEFAULT_SIMILARITY_THRESHOLD};
    use crate::embeddings::Embedder;
    use crate::models::QueryCacheEntry;
    use chrono::Utc;

    /// Maps known phrases onto axis-aligned or blended vectors so similarity
    /// scores are exact.
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            match text {
                "What is the submission deadline?" => vec![1.0, 0.0, 0.0],
                "When is the submission deadline?" => vec![0.9, 0.1, 0.0],
                "How do I bake bread?" => vec![0.0, 0.0, 1.0],
                _ => vec![0.0, 1.0, 0.0],
            }
        }
    }

    fn entry(question: &str, response: &str) -> QueryCacheEntry {
        QueryCacheEntry {
            question: question.to_string(),
            response: response.to_string(),
            asked_by: "tester".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_is_a_miss_with_zero_score() {
        let result = find_similar(
            &StubEmbedder,
            "anything",
            &[],
            DEFAULT_SIMILARITY_THRESHOLD,
        );
        assert_eq!(result, SimilarityMatch { index: None, score: 0.0 });
    }

    #[test]
    fn near_duplicate_question_matches_above_threshold() {
        let history = vec![entry("What is the submission deadline?", "June 1st")];
        let result = find_similar(
            &StubEmbedder,
            "When is the submission deadline?",
            &history,
            DEFAULT_SIMILARITY_THRESHOLD,
        );
        assert_eq!(result.index, Some(0));
        assert!(result.score >= DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn unrelated_question_misses_but_reports_observed_max() {
        let history = vec![entry("What is the submission deadline?", "June 1st")];
        let result = find_similar(
            &StubEmbedder,
            "How do I bake bread?",
            &history,
            DEFAULT_SIMILARITY_THRESHOLD,
        );
        assert_eq!(result.index, None);
        assert!(result.score < DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn ties_resolve_to_first_seen_entry() {
        let history = vec![
            entry("What is the submission deadline?", "first answer"),
            entry("What is the submission deadline?", "second answer"),
        ];
        let result = find_similar(
            &StubEmbedder,
            "What is the submission deadline?",
            &history,
            DEFAULT_SIMILARITY_THRESHOLD,
        );
        assert_eq!(result.index, Some(0));
    }
}
