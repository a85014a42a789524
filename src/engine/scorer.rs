//! Composite similarity scoring.
//!
//! [`SimilarityScorer`] combines four independent lexical signals — exact
//! match, LCS sequence ratio, normalized edit distance, and token-set
//! Jaccard — into a single weighted composite in `[0, 1]`. Every sub-score
//! is returned alongside the composite so a merge decision can be audited
//! with its component evidence.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::error::EngineError;
use super::types::{MemoryRecord, SimilarityScore, SubScores};

/// Volatile content stripped before comparison: dates, clock times,
/// `ID: n` markers, and `#n` hash numbers.
static VOLATILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{4}-\d{2}-\d{2}",
        r"\d{2}:\d{2}:\d{2}",
        r"(?i)ID:\s*\d+",
        r"#\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid pattern"));

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid pattern"));

/// Lowercase, strip volatile tokens and punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut normalized = text.to_lowercase();
    for pattern in VOLATILE_PATTERNS.iter() {
        normalized = pattern.replace_all(&normalized, "").into_owned();
    }
    let normalized = NON_WORD.replace_all(&normalized, "");
    let normalized = WHITESPACE.replace_all(&normalized, " ");
    normalized.trim().to_string()
}

/// Relative weights for the four similarity algorithms.
///
/// Part of the configuration surface so operators can retune without a
/// redeploy. Must sum to 1.0, each weight in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmWeights {
    pub exact_match: f64,
    pub sequence_similarity: f64,
    pub levenshtein_similarity: f64,
    pub jaccard_similarity: f64,
}

impl Default for AlgorithmWeights {
    fn default() -> Self {
        Self {
            exact_match: 0.3,
            sequence_similarity: 0.25,
            levenshtein_similarity: 0.25,
            jaccard_similarity: 0.2,
        }
    }
}

impl AlgorithmWeights {
    pub fn sum(&self) -> f64 {
        self.exact_match
            + self.sequence_similarity
            + self.levenshtein_similarity
            + self.jaccard_similarity
    }

    /// Check that every weight is in `[0, 1]` and the sum is 1.0.
    pub fn validate(&self) -> Result<(), EngineError> {
        let named = [
            ("exact_match", self.exact_match),
            ("sequence_similarity", self.sequence_similarity),
            ("levenshtein_similarity", self.levenshtein_similarity),
            ("jaccard_similarity", self.jaccard_similarity),
        ];
        for (algorithm, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::WeightRange { algorithm, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(EngineError::WeightSum { sum });
        }
        Ok(())
    }
}

/// Stateless pairwise scorer. Symmetric and deterministic:
/// `score(a, b).composite == score(b, a).composite` for all inputs.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: AlgorithmWeights,
}

impl SimilarityScorer {
    /// Weights are assumed validated (see [`AlgorithmWeights::validate`]).
    pub fn new(weights: AlgorithmWeights) -> Self {
        Self { weights }
    }

    /// Normalize both contents, then score.
    pub fn score(&self, a: &MemoryRecord, b: &MemoryRecord) -> SimilarityScore {
        self.score_normalized(&a.id, &normalize(&a.content), &b.id, &normalize(&b.content))
    }

    /// Score two already-normalized strings. Used by the pipeline, which
    /// normalizes each record once up front.
    pub fn score_normalized(
        &self,
        id_a: &str,
        norm_a: &str,
        id_b: &str,
        norm_b: &str,
    ) -> SimilarityScore {
        let parts = SubScores {
            exact_match: if norm_a == norm_b { 1.0 } else { 0.0 },
            sequence_similarity: sequence_similarity(norm_a, norm_b),
            levenshtein_similarity: levenshtein_similarity(norm_a, norm_b),
            jaccard_similarity: jaccard_similarity(norm_a, norm_b),
        };

        let composite = parts.exact_match * self.weights.exact_match
            + parts.sequence_similarity * self.weights.sequence_similarity
            + parts.levenshtein_similarity * self.weights.levenshtein_similarity
            + parts.jaccard_similarity * self.weights.jaccard_similarity;

        let pair = if id_a <= id_b {
            (id_a.to_string(), id_b.to_string())
        } else {
            (id_b.to_string(), id_a.to_string())
        };

        SimilarityScore {
            pair,
            parts,
            composite: composite.clamp(0.0, 1.0),
        }
    }
}

/// LCS-based sequence ratio: `2 * lcs(a, b) / (|a| + |b|)`, 1.0 when both empty.
fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let lcs = lcs_length(&a, &b);
    2.0 * lcs as f64 / (a.len() + b.len()) as f64
}

/// Longest common subsequence length, two-row DP.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - lev(a, b) / max(|a|, |b|)`; the degenerate all-empty case is 1.0.
fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Levenshtein edit distance, two-row DP.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Token-set Jaccard over whitespace-delimited tokens. Both sets empty is
/// defined as 0.0, exactly one empty is 0.0 as well.
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::RecordKind;

    fn record(id: &str, content: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            kind: RecordKind::Observation,
            content: content.to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            metadata: None,
        }
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(AlgorithmWeights::default())
    }

    #[test]
    fn identical_content_scores_one() {
        let a = record("a", "fix auth bug");
        let b = record("b", "fix auth bug");
        let score = scorer().score(&a, &b);
        assert!((score.composite - 1.0).abs() < 1e-9);
        assert_eq!(score.parts.exact_match, 1.0);
    }

    #[test]
    fn self_score_is_reflexive() {
        let a = record("a", "the deploy finished without errors");
        let score = scorer().score(&a, &a);
        assert!((score.composite - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_symmetric() {
        let a = record("a", "fix auth bug");
        let b = record("b", "fix auth bug v2");
        let ab = scorer().score(&a, &b);
        let ba = scorer().score(&b, &a);
        assert_eq!(ab.composite, ba.composite);
        assert_eq!(ab.pair, ba.pair);
    }

    #[test]
    fn all_scores_within_bounds() {
        let cases = [
            ("", ""),
            ("", "something"),
            ("alpha beta", "gamma delta"),
            ("fix auth bug", "fix auth bug v2"),
            ("x", "a completely different long sentence about nothing"),
        ];
        for (left, right) in cases {
            let score = scorer().score(&record("a", left), &record("b", right));
            assert!((0.0..=1.0).contains(&score.composite), "{left:?} vs {right:?}");
            for part in [
                score.parts.exact_match,
                score.parts.sequence_similarity,
                score.parts.levenshtein_similarity,
                score.parts.jaccard_similarity,
            ] {
                assert!((0.0..=1.0).contains(&part));
            }
        }
    }

    #[test]
    fn partial_overlap_stays_below_default_threshold() {
        // "fix auth bug v2" must not group with "fix auth bug" at the 0.85
        // default threshold.
        let score = scorer().score(&record("a", "fix auth bug"), &record("b", "fix auth bug v2"));
        assert!(score.composite < 0.85, "got {}", score.composite);
        assert!(score.composite > 0.0);
    }

    #[test]
    fn normalization_strips_volatile_tokens() {
        assert_eq!(
            normalize("Checkpoint at 2026-01-15 10:30:00, ID: 42 #7 done!"),
            "checkpoint at done"
        );
    }

    #[test]
    fn dates_do_not_break_exact_match() {
        let a = record("a", "sync completed 2026-01-01");
        let b = record("b", "sync completed 2026-02-15");
        let score = scorer().score(&a, &b);
        assert_eq!(score.parts.exact_match, 1.0);
    }

    #[test]
    fn empty_contents_degenerate_case() {
        let score = scorer().score(&record("a", ""), &record("b", ""));
        // exact + sequence + levenshtein fire, jaccard is defined as 0.0
        assert!((score.composite - 0.8).abs() < 1e-9);
        assert_eq!(score.parts.jaccard_similarity, 0.0);
    }

    #[test]
    fn weight_validation_rejects_bad_sums() {
        let mut weights = AlgorithmWeights::default();
        weights.exact_match = 0.9;
        assert!(matches!(
            weights.validate(),
            Err(EngineError::WeightSum { .. })
        ));

        let mut weights = AlgorithmWeights::default();
        weights.jaccard_similarity = -0.2;
        assert!(matches!(
            weights.validate(),
            Err(EngineError::WeightRange { .. })
        ));

        assert!(AlgorithmWeights::default().validate().is_ok());
    }

    #[test]
    fn levenshtein_distance_basics() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(levenshtein(&a, &b), 3);
        assert_eq!(levenshtein(&a, &a), 0);
        assert_eq!(levenshtein(&a, &[]), 6);
    }

    #[test]
    fn lcs_length_basics() {
        let a: Vec<char> = "abcde".chars().collect();
        let b: Vec<char> = "ace".chars().collect();
        assert_eq!(lcs_length(&a, &b), 3);
        assert_eq!(lcs_length(&a, &[]), 0);
    }
}
