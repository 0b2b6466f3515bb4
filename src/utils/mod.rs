use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ndarray::ArrayView1;

pub mod validation;

/// 0 when either side has zero norm.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(&b) / (norm_a * norm_b)
    }
}

/// Descending by score, ties keep their input order.
pub fn sort_by_score_desc<T>(scored: &mut [(T, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

pub fn top_k<T>(mut scored: Vec<(T, f32)>, k: usize) -> Vec<(T, f32)> {
    sort_by_score_desc(&mut scored);
    scored.truncate(k);
    scored
}

/// Uppercase hex prefix of a hash of `input`; stable for a given build.
pub fn stable_short_id(input: &str, len: usize) -> String {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    let hex = format!("{:016X}", hasher.finish());
    hex[..len.min(hex.len())].to_string()
}

pub fn clamp_unit(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
