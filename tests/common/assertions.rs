//! Assertion utilities for testing.
//!
//! Values stored as `f32` come back as `f64` JSON numbers, so exact comparison
//! against decimal literals is not meaningful.

use serde_json::Value;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f64 = 1e-4;

pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: Option<f64>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Compare a JSON series element-wise. `None` expects `null`.
pub fn assert_series_approx_eq(actual: &[Value], expected: &[Option<f64>], epsilon: Option<f64>) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Series have different lengths: actual = {}, expected = {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        match e {
            None => assert!(a.is_null(), "Expected null at index {}, got {}", i, a),
            Some(e) => {
                let a = a
                    .as_f64()
                    .unwrap_or_else(|| panic!("Expected a number at index {}, got {}", i, a));
                assert_approx_eq(a, *e, epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.00001, None);
        assert_approx_eq(1.0, 1.001, Some(0.01));
    }

    #[test]
    fn test_assert_series_approx_eq() {
        let series = vec![json!(280.10000610351562), Value::Null];
        assert_series_approx_eq(&series, &[Some(280.1), None], None);
    }
}
