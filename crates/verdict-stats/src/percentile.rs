/// Value at percentile `p` (0..=1) of `values`, interpolating linearly
/// between the closest ranks. `values` need not be sorted.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let v0 = sorted[lower];
    match sorted.get(lower + 1) {
        Some(v1) => Some(v0 + (v1 - v0) * (rank - lower as f64)),
        None => Some(v0),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates() {
        assert_eq!(percentile(&[10.0, 20.0, 30.0], 0.9), Some(28.0));
        assert_eq!(percentile(&[30.0, 10.0, 20.0], 0.5), Some(20.0));
        assert_eq!(percentile(&[1.0, 3.0], 0.5), Some(2.0));
    }

    #[test]
    fn test_edges() {
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&[7.0], 0.99), Some(7.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 1.0), Some(3.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.0), Some(1.0));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }
}
