//! Recursive smoothing of per-ticker daily scores.
//!
//! EMA: ema[0] = x[0]; ema[t] = alpha * x[t] + (1 - alpha) * ema[t-1],
//! with alpha = 2 / (span + 1). Seeded with the first value, no bias adjustment.

/// Smoothing factor for a span. A span of 0 is treated as 1 (no smoothing).
pub fn alpha_for_span(span: usize) -> f64 {
    2.0 / (span.max(1) as f64 + 1.0)
}

/// Recursive EMA of a date-ordered series.
///
/// A NaN input taints every later value, matching how the rest of the
/// pipeline treats void data.
pub fn ema_recursive(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = alpha_for_span(span);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &v in values {
        let ema = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        result.push(ema);
        prev = Some(ema);
    }
    result
}

/// Day-over-day change; the first element has no predecessor.
pub fn deltas(values: &[f64]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());
    if !values.is_empty() {
        result.push(None);
    }
    result.extend(values.windows(2).map(|w| Some(w[1] - w[0])));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn span_3_has_alpha_half() {
        assert!((alpha_for_span(3) - 0.5).abs() < EPS);
        assert!((alpha_for_span(0) - 1.0).abs() < EPS);
    }

    #[test]
    fn ema_constant_input_is_steady_state() {
        let ema = ema_recursive(&[5.0; 8], 3);
        assert!(ema.iter().all(|v| (v - 5.0).abs() < EPS));
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seeded with the first value (no SMA warmup)
        // 10 → 10; 11 → 10.5; 12 → 11.25; 13 → 12.125
        let ema = ema_recursive(&[10.0, 11.0, 12.0, 13.0], 3);
        let expected = [10.0, 10.5, 11.25, 12.125];
        for (got, want) in ema.iter().zip(expected) {
            assert!((got - want).abs() < EPS, "got {got}, want {want}");
        }
    }

    #[test]
    fn ema_span_1_equals_input() {
        let input = [1.0, -2.0, 3.5];
        assert_eq!(ema_recursive(&input, 1), input.to_vec());
    }

    #[test]
    fn ema_nan_propagates_forward() {
        let ema = ema_recursive(&[1.0, f64::NAN, 2.0], 3);
        assert_eq!(ema[0], 1.0);
        assert!(ema[1].is_nan());
        assert!(ema[2].is_nan());
    }

    #[test]
    fn ema_empty() {
        assert!(ema_recursive(&[], 3).is_empty());
    }

    #[test]
    fn deltas_first_is_none() {
        let d = deltas(&[1.0, 3.0, 2.5]);
        assert_eq!(d, vec![None, Some(2.0), Some(-0.5)]);
        assert!(deltas(&[]).is_empty());
        assert_eq!(deltas(&[4.0]), vec![None]);
    }
}
