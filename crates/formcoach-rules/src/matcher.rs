//! Approximate exercise-name matching.
//!
//! ## Similarity score (0–100)
//!
//! Both strings are normalized first. Then:
//!
//! - equal → 100
//! - one contains the other → `shorter / longer × 90`
//! - otherwise → `(1 − levenshtein / max_len) × 100`

use serde::{Deserialize, Serialize};

/// Minimum similarity each lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Floor for the primary name lookup
    pub primary: f64,
    /// Floor for lookups that report their confidence to the caller
    pub with_confidence: f64,
    /// Floor for "did you mean" suggestions
    pub suggestion: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            primary: 60.0,
            with_confidence: 50.0,
            suggestion: 40.0,
        }
    }
}

impl MatchThresholds {
    pub fn is_valid(&self) -> bool {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        in_range(self.primary) && in_range(self.with_confidence) && in_range(self.suggestion)
    }
}

/// Lowercase, trim, drop everything but letters, digits and spaces, and
/// collapse runs of whitespace
pub fn normalize(name: &str) -> String {
    let stripped: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity of two already-normalized names
pub fn similarity(query: &str, candidate: &str) -> f64 {
    if query == candidate {
        return 100.0;
    }
    let q_len = query.chars().count();
    let c_len = candidate.chars().count();
    if q_len == 0 || c_len == 0 {
        return 0.0;
    }

    let (shorter, longer) = if q_len <= c_len { (q_len, c_len) } else { (c_len, q_len) };

    if query.contains(candidate) || candidate.contains(query) {
        return shorter as f64 / longer as f64 * 90.0;
    }

    let distance = levenshtein(query, candidate) as f64;
    ((1.0 - distance / longer as f64) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Barbell   SQUAT "), "barbell squat");
        assert_eq!(normalize("Push-Up (Wide)"), "pushup wide");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("squat", "squat"), 0);
        assert_eq!(levenshtein("barrbell", "barbell"), 1);
    }

    #[test]
    fn test_similarity_exact_and_typo() {
        assert_eq!(similarity("barbell squat", "barbell squat"), 100.0);
        let typo = similarity("barrbell squat", "barbell squat");
        assert!(typo >= 60.0 && typo < 100.0, "typo similarity {}", typo);
    }

    #[test]
    fn test_similarity_containment() {
        // "squat" (5) inside "goblet squat" (12)
        let s = similarity("squat", "goblet squat");
        assert!((s - 5.0 / 12.0 * 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", "squat"), 0.0);
        let s = similarity("zzzzzzzz", "bench");
        assert!((0.0..=100.0).contains(&s));
    }

    #[test]
    fn test_thresholds_default() {
        let t = MatchThresholds::default();
        assert_eq!((t.primary, t.with_confidence, t.suggestion), (60.0, 50.0, 40.0));
        assert!(t.is_valid());
        assert!(!MatchThresholds { primary: 120.0, ..t }.is_valid());
    }
}
