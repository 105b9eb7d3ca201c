// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector helpers shared by graph stores and the memory engine.

/// Serializes an f32 vector into little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserializes little-endian bytes back into an f32 vector.
///
/// Trailing bytes that do not form a whole f32 are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity on the [-1.0, 1.0] scale.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Scales a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip() {
        let original = vec![1.0_f32, -2.5, 0.0, f32::MAX];
        assert_eq!(blob_to_vec(&vec_to_blob(&original)), original);
        assert_eq!(vec_to_blob(&vec![0.0; 384]).len(), 384 * 4);
    }

    #[test]
    fn cosine_identical_orthogonal_opposite() {
        let a = [3.0_f32, 4.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn normalize_to_unit_length() {
        let mut v = vec![3.0_f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let mut zero = vec![0.0_f32; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        fn vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
            prop::collection::vec(-100.0_f32..100.0, len)
        }

        fn pair() -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
            (1usize..32).prop_flat_map(|len| (vector(len), vector(len)))
        }

        proptest! {
            #[test]
            fn cosine_is_bounded_and_symmetric((a, b) in pair()) {
                let ab = cosine_similarity(&a, &b);
                prop_assert!((-1.0..=1.0).contains(&ab));
                prop_assert_eq!(ab, cosine_similarity(&b, &a));
            }

            #[test]
            fn normalized_vectors_have_unit_norm(mut v in (1usize..32).prop_flat_map(vector)) {
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assume!(norm > 1e-3);
                l2_normalize(&mut v);
                let unit = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assert!((unit - 1.0).abs() < 1e-4);
            }
        }
    }
}
