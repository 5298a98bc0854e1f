//! Edit-distance similarity for fuzzy name resolution.

/// Levenshtein distance between two strings, by characters.
///
/// Single-row dynamic programming; inputs here are device names, so
/// lengths stay small and O(a·b) is fine.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut row: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, &ca) in a_chars.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b_chars.len()]
}

/// Normalized edit-distance similarity in [0, 1].
///
/// `1 - distance / max_len`, so identical strings score 1.0 and strings
/// with nothing in common score 0.0. Two empty strings are identical.
pub fn normalized_similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / max_len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(levenshtein("kitchen light", "kitchen light"), 0);
        assert_eq!(normalized_similarity("lamp", "lamp"), 1.0);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(normalized_similarity("", ""), 1.0);
        assert_eq!(normalized_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_known_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_similarity_scale() {
        // One edit over a 13-char name stays near 1.
        let sim = normalized_similarity("kitchen light", "kitchen lights");
        assert!(sim > 0.9, "one trailing edit should score high, got {sim}");

        // Unrelated names fall below the default 0.6 threshold.
        let sim = normalized_similarity("kitchen light", "garage door");
        assert!(sim < 0.6, "unrelated names should score low, got {sim}");
    }

    #[test]
    fn test_unicode_counted_by_chars() {
        // One char substitution in a 4-char string, not a byte-level diff.
        assert_eq!(levenshtein("über", "ober"), 1);
    }
}
