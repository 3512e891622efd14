use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Contract the clustering engine depends on: a semantic similarity score
/// in [0,1] for two text snippets.
///
/// Implementations may call out to an embedding service or LLM; errors are
/// recovered per-comparison by the engine and treated as a non-match.
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64>;
}

/// Token-overlap similarity with an edit-distance component.
///
/// Texts are NFC-normalized, lowercased and segmented on UAX#29 word
/// boundaries, which also splits Japanese script runs. Token sets are
/// compared with Jaccard similarity, blended with normalized Levenshtein
/// over the raw strings so near-identical headlines with small token sets
/// still score high.
pub struct LexicalOracle {
    token_weight: f64,
    edit_weight: f64,
}

impl Default for LexicalOracle {
    fn default() -> Self {
        LexicalOracle {
            token_weight: 0.7,
            edit_weight: 0.3,
        }
    }
}

fn normalize(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.unicode_words().map(|w| w.to_string()).collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[async_trait]
impl SimilarityOracle for LexicalOracle {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64> {
        let a = normalize(text_a);
        let b = normalize(text_b);

        if a.trim().is_empty() || b.trim().is_empty() {
            return Err(anyhow::anyhow!("Empty comparison text"));
        }

        let token_score = jaccard(&tokens(&a), &tokens(&b));
        let edit_score = strsim::normalized_levenshtein(&a, &b);

        let score = self.token_weight * token_score + self.edit_weight * edit_score;

        Ok(score.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_texts_score_one() {
        let oracle = LexicalOracle::default();
        let score = oracle
            .similarity("首相が衆議院を解散", "首相が衆議院を解散")
            .await
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_case_and_normalization_insensitive() {
        let oracle = LexicalOracle::default();
        let score = oracle
            .similarity("Cabinet Approves Budget", "cabinet approves budget")
            .await
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unrelated_texts_score_low() {
        let oracle = LexicalOracle::default();
        let score = oracle
            .similarity(
                "Prime minister dissolves lower house for snap election",
                "Local fishing cooperative celebrates record tuna haul",
            )
            .await
            .unwrap();
        assert!(score < 0.3);
    }

    #[tokio::test]
    async fn test_empty_text_is_an_error() {
        let oracle = LexicalOracle::default();
        assert!(oracle.similarity("", "anything").await.is_err());
    }

    #[tokio::test]
    async fn test_score_stays_in_unit_interval() {
        let oracle = LexicalOracle::default();
        let score = oracle
            .similarity(
                "自民党総裁選の候補者が討論会に参加",
                "自民党総裁選の討論会が開催された",
            )
            .await
            .unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}
