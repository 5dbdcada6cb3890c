use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Clamp a float into a closed interval.
///
/// Every score, probability, and confidence crosses this at its computation
/// boundary, so an absent rating or a bad delta can never leak an
/// out-of-range value.
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Clamp an integer score into a closed interval.
pub fn clamp_i64(value: i64, min: i64, max: i64) -> i64 {
    value.max(min).min(max)
}

/// Normalize free text before pattern matching: NFKC fold (full-width forms,
/// compatibility characters; intake text mixes Korean and English), then
/// lowercase.
pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Split normalized text into de-duplicated lower-cased tokens, preserving
/// first-seen order. Single-character fragments are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    let mut seen = std::collections::HashSet::new();
    let mut tokens = Vec::new();
    for raw in normalized.split(|c: char| !c.is_alphanumeric()) {
        if raw.chars().count() < 2 {
            continue;
        }
        if seen.insert(raw.to_string()) {
            tokens.push(raw.to_string());
        }
    }
    tokens
}

/// Merge string lists into one, de-duplicating case-insensitively on the
/// trimmed form, preserving first-seen order across the inputs, capped at
/// `cap` entries.
pub fn merge_dedup_capped(sources: &[&[String]], cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for source in sources {
        for item in source.iter() {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen.insert(key) {
                merged.push(trimmed.to_string());
                if merged.len() >= cap {
                    return merged;
                }
            }
        }
    }
    merged
}

/// Compute a dedup fingerprint from key components.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}
