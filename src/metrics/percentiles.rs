use hdrhistogram::Histogram;

/// Summary of the runtime scheduling delay, in milliseconds.
///
/// Built from an HdrHistogram recorded in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayStats {
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub count: u64,
}

impl DelayStats {
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            max_ms: us_to_ms(hist.max()),
            mean_ms: hist.mean() / 1000.0,
            p50_ms: us_to_ms(hist.value_at_quantile(0.5)),
            p99_ms: us_to_ms(hist.value_at_quantile(0.99)),
            count: hist.len(),
        }
    }

    pub fn empty() -> Self {
        Self {
            max_ms: 0.0,
            mean_ms: 0.0,
            p50_ms: 0.0,
            p99_ms: 0.0,
            count: 0,
        }
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_is_zeroed() {
        let hist = Histogram::<u64>::new(3).unwrap();
        let stats = DelayStats::from_histogram(&hist);
        assert_eq!(stats, DelayStats::empty());
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn converts_micros_to_millis() {
        let mut hist = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3).unwrap();
        hist.record(2_000).unwrap();
        hist.record(3_000).unwrap();
        hist.record(4_000).unwrap();

        let stats = DelayStats::from_histogram(&hist);
        assert_eq!(stats.count, 3);
        assert!((stats.mean_ms - 3.0).abs() < 0.01);
        assert!((stats.p50_ms - 3.0).abs() < 0.01);
        assert!((stats.max_ms - 4.0).abs() < 0.01);
    }
}
