use std::collections::HashSet;

use strsim::normalized_levenshtein;

/// Words that deal sites bolt onto product names without changing what is sold.
const BOILERPLATE: &[&str] = &[
    "a", "an", "the", "and", "for", "of", "with", "deal", "deals", "lifetime", "license",
    "licence", "plan", "offer", "access", "subscription", "bundle", "edition",
];

/// Decides whether two listing titles name the same deal.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn is_similar(&self, a: &str, b: &str, threshold: f64) -> bool {
        let a_lower = a.trim().to_lowercase();
        let b_lower = b.trim().to_lowercase();
        if a_lower.is_empty() || b_lower.is_empty() {
            return false;
        }

        if a_lower == b_lower || a_lower.contains(&b_lower) || b_lower.contains(&a_lower) {
            return true;
        }

        let threshold = if threshold.is_nan() { 1.0 } else { threshold.clamp(0.0, 1.0) };
        self.score(a, b) >= threshold
    }

    /// Similarity in [0, 1]; exposed for diagnostics.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let full_a = normalize(a);
        let full_b = normalize(b);
        if full_a.is_empty() || full_b.is_empty() {
            return 0.0;
        }

        let core_a = core_form(&full_a);
        let core_b = core_form(&full_b);

        normalized_levenshtein(&full_a, &full_b)
            .max(normalized_levenshtein(&core_a, &core_b))
            .max(token_dice(&core_a, &core_b))
    }
}

fn normalize(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn core_form(normalized: &str) -> String {
    let core = normalized
        .split_whitespace()
        .filter(|word| !BOILERPLATE.contains(word))
        .collect::<Vec<_>>()
        .join(" ");

    if core.is_empty() {
        normalized.to_string()
    } else {
        core
    }
}

fn token_dice(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let shared = a.intersection(&b).count();
    (2 * shared) as f64 / (a.len() + b.len()) as f64
}
