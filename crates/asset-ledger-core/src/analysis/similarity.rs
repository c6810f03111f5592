/// Normalized Levenshtein similarity in `[0, 1]`:
/// `1 - distance / max(len(a), len(b))`, counted in chars.
///
/// Callers normalize case beforehand. Two empty strings are identical (1.0);
/// one empty string against a non-empty one scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// [`similarity`] over trimmed, lower-cased inputs.
pub fn similarity_ignore_case(a: &str, b: &str) -> f64 {
    similarity(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}
