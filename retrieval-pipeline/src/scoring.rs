use std::cmp::Ordering;

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Cosine similarity between two vectors, clamped to [0, 1].
/// Mismatched or degenerate vectors score zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator <= f32::EPSILON || !denominator.is_finite() {
        return 0.0;
    }

    clamp_unit(dot / denominator)
}

/// Squash a raw cross-encoder logit into [0, 1].
pub fn sigmoid(logit: f32) -> f32 {
    if !logit.is_finite() {
        return 0.0;
    }
    1.0 / (1.0 + (-logit).exp())
}

/// Sort (score, id)-bearing items best-first. Identical scores fall back
/// to ascending id so ordering is deterministic across runs.
pub fn sort_by_score_desc<T>(items: &mut [T], score: impl Fn(&T) -> f32, id: impl Fn(&T) -> String) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| id(a).cmp(&id(b)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0]) - 0.0).abs() < f32::EPSILON);
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sigmoid_is_monotonic_and_bounded() {
        assert!(sigmoid(-10.0) < sigmoid(0.0));
        assert!(sigmoid(0.0) < sigmoid(10.0));
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(100.0) <= 1.0);
        assert!(sigmoid(-100.0) >= 0.0);
    }

    #[test]
    fn test_sort_breaks_ties_by_ascending_id() {
        let mut items = vec![
            ("doc_b".to_string(), 0.5),
            ("doc_a".to_string(), 0.5),
            ("doc_c".to_string(), 0.9),
        ];
        sort_by_score_desc(&mut items, |i| i.1, |i| i.0.clone());

        let ids: Vec<&str> = items.iter().map(|i| i.0.as_str()).collect();
        assert_eq!(ids, vec!["doc_c", "doc_a", "doc_b"]);
    }
}
