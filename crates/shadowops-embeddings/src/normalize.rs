//! Vector math shared by the embedders and the clusterer.

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scale `vector` to unit length in place. The zero vector stays zero.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm == 0.0 {
        return;
    }
    vector.iter_mut().for_each(|x| *x /= norm);
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths, empty inputs and zero vectors score 0.0, so a ticket
/// with no usable terms is never "similar" to anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let norms = l2_norm(a) * l2_norm(b);
    if norms == 0.0 {
        0.0
    } else {
        dot(a, b) / norms
    }
}

/// Squared Euclidean distance. k-means works in f64 to keep inertia stable.
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_untouched() {
        let mut zero = vec![0.0; 4];
        normalize_l2(&mut zero);
        assert!(zero.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_cosine_range_and_degenerate_inputs() {
        let a = [1.0, 0.0];
        assert!((cosine_similarity(&a, &[5.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 2.0]).abs() < 1e-6);
        assert!((cosine_similarity(&a, &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_squared_euclidean() {
        assert!((squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-9);
        assert_eq!(squared_euclidean(&[1.5, -2.0], &[1.5, -2.0]), 0.0);
    }
}
