use crate::errors::DomainError;

/// Cosine similarity in `[-1, 1]`.
///
/// Empty or mismatched vectors are an error. A zero-norm vector has no
/// direction and scores 0.0.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f64, DomainError> {
    if left.is_empty() || right.is_empty() {
        return Err(DomainError::EmptyVector);
    }
    if left.len() != right.len() {
        return Err(DomainError::DimensionMismatch { left: left.len(), right: right.len() });
    }

    let mut dot = 0.0f64;
    let mut left_norm = 0.0f64;
    let mut right_norm = 0.0f64;
    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (left_norm.sqrt() * right_norm.sqrt())).clamp(-1.0, 1.0))
}
