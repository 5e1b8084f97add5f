//! Keyword-overlap ranking for tenant document chunks.

use std::collections::HashSet;

use crate::models::content::{DocumentChunk, RetrievedChunk};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "your", "you", "are", "was", "were",
    "about", "into", "over", "how", "why", "what", "when", "our", "their", "its", "not", "but",
    "all", "can", "has", "have", "will", "one",
];

/// Lowercased, de-duplicated content words of a topic, in first-seen order.
pub fn topic_keywords(topic: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(topic)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Number of distinct keywords present as whole words in `text`.
pub fn keyword_score(keywords: &[String], text: &str) -> u32 {
    let present: HashSet<String> = words(text).collect();
    keywords.iter().filter(|kw| present.contains(*kw)).count() as u32
}

/// Scores candidates, drops zero scores, and keeps the top `k`.
/// Equal scores keep their retrieval order.
pub fn rank_chunks(
    keywords: &[String],
    candidates: Vec<DocumentChunk>,
    k: usize,
) -> Vec<RetrievedChunk> {
    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .filter_map(|chunk| {
            let score = keyword_score(keywords, &chunk.text);
            (score > 0).then(|| RetrievedChunk {
                text: chunk.text,
                source_title: chunk.source_title,
                url: chunk.url,
                score,
            })
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(id: i64, text: &str) -> DocumentChunk {
        DocumentChunk {
            id,
            tenant_id: Uuid::nil(),
            text: text.to_string(),
            source_title: format!("doc-{id}"),
            url: None,
        }
    }

    #[test]
    fn test_topic_keywords_lowercase_dedup_and_stopwords() {
        let kws = topic_keywords("The Power of Gratitude and GRATITUDE journaling");
        assert_eq!(kws, vec!["power", "gratitude", "journaling"]);
    }

    #[test]
    fn test_keyword_score_counts_distinct_whole_words() {
        let kws = topic_keywords("gratitude journaling");
        assert_eq!(keyword_score(&kws, "Gratitude, gratitude and more gratitude"), 1);
        assert_eq!(keyword_score(&kws, "Journaling builds gratitude."), 2);
        // substring of a longer word is not a match
        assert_eq!(keyword_score(&kws, "ingratitudes"), 0);
    }

    #[test]
    fn test_rank_chunks_orders_by_score_then_retrieval_order() {
        let kws = topic_keywords("gratitude journaling habit");
        let ranked = rank_chunks(
            &kws,
            vec![
                chunk(1, "A habit of gratitude"),
                chunk(2, "Nothing relevant here"),
                chunk(3, "Gratitude journaling is a habit"),
                chunk(4, "Gratitude matters"),
                chunk(5, "Journaling every habit"),
            ],
            10,
        );
        let titles: Vec<_> = ranked.iter().map(|c| c.source_title.as_str()).collect();
        assert_eq!(titles, vec!["doc-3", "doc-1", "doc-5", "doc-4"]);
        assert_eq!(ranked[0].score, 3);
    }

    #[test]
    fn test_rank_chunks_empty_when_nothing_matches() {
        let kws = topic_keywords("patience");
        assert!(rank_chunks(&kws, vec![chunk(1, "unrelated text")], 3).is_empty());
    }

    #[test]
    fn test_rank_chunks_truncates_to_k() {
        let kws = topic_keywords("faith");
        let chunks = (0..10).map(|i| chunk(i, "faith")).collect();
        assert_eq!(rank_chunks(&kws, chunks, 3).len(), 3);
    }
}
