use super::ProcessingError;
use crate::models::PriceMovement;

/// Quantile with linear interpolation between closest ranks
///
/// Matches numpy's default: `h = (n - 1) * q`, interpolate between
/// `x[floor(h)]` and `x[floor(h) + 1]`.
pub fn quantile(values: &[f64], q: f64) -> Result<f64, ProcessingError> {
    if values.is_empty() {
        return Err(ProcessingError::EmptySeries);
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(ProcessingError::InvalidQuantiles { fall: q, rise: q });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let h = (sorted.len() - 1) as f64 * q;
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = h - lower as f64;

    Ok(sorted[lower] + weight * (sorted[upper] - sorted[lower]))
}

/// Next-period labels for a series of percentage changes
///
/// Entry `i` holds the class of change `i + 1`; the last entry is `None`
/// because its next period is unknown.
pub fn next_period_labels(
    changes: &[f64],
    fall_threshold: f64,
    rise_threshold: f64,
) -> Vec<Option<PriceMovement>> {
    let mut labels: Vec<Option<PriceMovement>> = changes
        .iter()
        .skip(1)
        .map(|&c| Some(PriceMovement::classify(c, fall_threshold, rise_threshold)))
        .collect();

    if !changes.is_empty() {
        labels.push(None);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_eq!(quantile(&values, 1.0).unwrap(), 4.0);
        assert!((quantile(&values, 0.5).unwrap() - 2.5).abs() < 1e-12);
        // h = 3 * 0.33 = 0.99
        assert!((quantile(&values, 0.33).unwrap() - 1.99).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[7.0], 0.66).unwrap(), 7.0);
    }

    #[test]
    fn test_quantile_empty_is_error() {
        assert!(matches!(quantile(&[], 0.5), Err(ProcessingError::EmptySeries)));
    }

    #[test]
    fn test_quantile_out_of_range() {
        assert!(quantile(&[1.0, 2.0], 1.5).is_err());
    }

    #[test]
    fn test_labels_are_shifted() {
        let changes = [-0.05, 0.0, 0.05, -0.05];
        let labels = next_period_labels(&changes, -0.01, 0.01);

        assert_eq!(
            labels,
            vec![
                Some(PriceMovement::Neutral),
                Some(PriceMovement::Rise),
                Some(PriceMovement::Fall),
                None
            ]
        );
    }

    #[test]
    fn test_labels_empty() {
        assert!(next_period_labels(&[], 0.0, 0.0).is_empty());
    }
}
