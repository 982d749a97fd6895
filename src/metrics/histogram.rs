//! Request duration histogram keyed by `(method, path, code)`.
//!
//! Each distinct label tuple owns its own bucket vector behind its own lock,
//! so requests on unrelated routes never contend. The index of tuples is only
//! write-locked the first time a tuple is seen.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::exposition::{self, MetricKind};
use crate::error::{MetricsError, Result};

/// Bucket boundaries in milliseconds.
pub const DEFAULT_BUCKETS: &[f64] = &[0.10, 5.0, 15.0, 50.0, 100.0, 200.0, 300.0, 400.0, 500.0];

pub const REQUEST_DURATION_NAME: &str = "http_request_duration_ms";
const REQUEST_DURATION_HELP: &str = "Duration of HTTP requests in milliseconds";

/// One time series' identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestLabels {
    /// Lowercased HTTP verb.
    pub method: String,
    pub path: String,
    /// Status code as a string, e.g. `"200"`.
    pub code: String,
}

impl RequestLabels {
    pub fn new(method: &str, path: impl Into<String>, code: impl ToString) -> Self {
        Self {
            method: method.to_ascii_lowercase(),
            path: path.into(),
            code: code.to_string(),
        }
    }
}

/// Point-in-time copy of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub labels: RequestLabels,
    /// Cumulative count per boundary, same order as the histogram's buckets.
    pub buckets: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

struct SeriesCounts {
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

struct Series {
    labels: RequestLabels,
    counts: Mutex<SeriesCounts>,
}

impl Series {
    fn new(labels: RequestLabels, num_buckets: usize) -> Self {
        Self {
            labels,
            counts: Mutex::new(SeriesCounts {
                buckets: vec![0; num_buckets],
                sum: 0.0,
                count: 0,
            }),
        }
    }

    fn snapshot(&self) -> SeriesSnapshot {
        let counts = self.counts.lock();
        SeriesSnapshot {
            labels: self.labels.clone(),
            buckets: counts.buckets.clone(),
            sum: counts.sum,
            count: counts.count,
        }
    }
}

#[derive(Default)]
struct SeriesIndex {
    by_labels: HashMap<RequestLabels, Arc<Series>>,
    // First-use order, for deterministic rendering.
    order: Vec<Arc<Series>>,
}

/// Cumulative histogram of request durations.
pub struct RequestDurationHistogram {
    buckets: Box<[f64]>,
    series: RwLock<SeriesIndex>,
}

impl RequestDurationHistogram {
    pub fn new() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS.into(),
            series: RwLock::new(SeriesIndex::default()),
        }
    }

    /// Builds a histogram with custom boundaries (milliseconds).
    pub fn with_buckets(buckets: &[f64]) -> Result<Self> {
        let valid = !buckets.is_empty()
            && buckets.iter().all(|b| b.is_finite())
            && buckets.windows(2).all(|w| w[0] < w[1]);
        if !valid {
            return Err(MetricsError::InvalidBuckets(buckets.to_vec()));
        }
        Ok(Self {
            buckets: buckets.into(),
            series: RwLock::new(SeriesIndex::default()),
        })
    }

    pub fn name(&self) -> &'static str {
        REQUEST_DURATION_NAME
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Records one request. A value equal to a boundary lands in that bucket.
    pub fn observe(&self, value_ms: f64, mut labels: RequestLabels) {
        labels.method.make_ascii_lowercase();
        let series = self.series_for(labels);

        let mut counts = series.counts.lock();
        for (slot, bound) in counts.buckets.iter_mut().zip(self.buckets.iter()) {
            if value_ms <= *bound {
                *slot += 1;
            }
        }
        counts.sum += value_ms;
        counts.count += 1;
    }

    /// Copy of one series, if it has been observed at least once.
    pub fn series(&self, labels: &RequestLabels) -> Option<SeriesSnapshot> {
        self.series.read().by_labels.get(labels).map(|s| s.snapshot())
    }

    /// Copies of every series, in first-use order.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let order = self.series.read().order.clone();
        order.iter().map(|s| s.snapshot()).collect()
    }

    pub fn render(&self, out: &mut String) {
        exposition::write_header(out, REQUEST_DURATION_NAME, REQUEST_DURATION_HELP, MetricKind::Histogram);

        let bucket_name = format!("{REQUEST_DURATION_NAME}_bucket");
        let sum_name = format!("{REQUEST_DURATION_NAME}_sum");
        let count_name = format!("{REQUEST_DURATION_NAME}_count");

        for series in self.snapshot() {
            let RequestLabels { method, path, code } = &series.labels;
            let base = [("method", method.as_str()), ("path", path.as_str()), ("code", code.as_str())];

            for (bound, count) in self.buckets.iter().zip(series.buckets.iter()) {
                let le = bound.to_string();
                let labels = [base[0], base[1], base[2], ("le", le.as_str())];
                exposition::write_sample(out, &bucket_name, &labels, count);
            }
            let labels = [base[0], base[1], base[2], ("le", "+Inf")];
            exposition::write_sample(out, &bucket_name, &labels, series.count);
            exposition::write_sample(out, &sum_name, &base, series.sum);
            exposition::write_sample(out, &count_name, &base, series.count);
        }
    }

    fn series_for(&self, labels: RequestLabels) -> Arc<Series> {
        if let Some(series) = self.series.read().by_labels.get(&labels) {
            return Arc::clone(series);
        }

        let mut index = self.series.write();
        // Another request may have created it between the two locks.
        if let Some(series) = index.by_labels.get(&labels) {
            return Arc::clone(series);
        }
        let series = Arc::new(Series::new(labels.clone(), self.buckets.len()));
        index.by_labels.insert(labels, Arc::clone(&series));
        index.order.push(Arc::clone(&series));
        series
    }
}

impl Default for RequestDurationHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(path: &str, code: u16) -> RequestLabels {
        RequestLabels::new("GET", path, code)
    }

    #[test]
    fn method_is_lowercased() {
        let hist = RequestDurationHistogram::new();
        hist.observe(1.0, RequestLabels {
            method: "POST".into(),
            path: "/a".into(),
            code: "201".into(),
        });
        let snap = hist.snapshot();
        assert_eq!(snap[0].labels.method, "post");
    }

    #[test]
    fn boundary_value_is_inclusive_and_cumulative() {
        let hist = RequestDurationHistogram::new();
        hist.observe(5.0, labels("/a", 200));

        let series = hist.series(&labels("/a", 200)).unwrap();
        // 0.1 excludes 5.0, every bound from 5 upward includes it.
        assert_eq!(series.buckets, vec![0, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(series.count, 1);
        assert_eq!(series.sum, 5.0);
    }

    #[test]
    fn values_above_last_bound_only_hit_inf() {
        let hist = RequestDurationHistogram::new();
        hist.observe(750.0, labels("/slow", 200));
        hist.observe(0.05, labels("/slow", 200));

        let series = hist.series(&labels("/slow", 200)).unwrap();
        assert!(series.buckets.iter().all(|&c| c == 1));
        assert_eq!(series.count, 2);
        assert!(series.buckets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn renders_buckets_sum_and_count() {
        let hist = RequestDurationHistogram::with_buckets(&[1.0, 10.0]).unwrap();
        hist.observe(2.5, labels("/foo", 200));

        let mut out = String::new();
        hist.render(&mut out);
        let expected = "\
# HELP http_request_duration_ms Duration of HTTP requests in milliseconds
# TYPE http_request_duration_ms histogram
http_request_duration_ms_bucket{method=\"get\",path=\"/foo\",code=\"200\",le=\"1\"} 0
http_request_duration_ms_bucket{method=\"get\",path=\"/foo\",code=\"200\",le=\"10\"} 1
http_request_duration_ms_bucket{method=\"get\",path=\"/foo\",code=\"200\",le=\"+Inf\"} 1
http_request_duration_ms_sum{method=\"get\",path=\"/foo\",code=\"200\"} 2.5
http_request_duration_ms_count{method=\"get\",path=\"/foo\",code=\"200\"} 1
";
        assert_eq!(out, expected);
    }

    #[test]
    fn default_bounds_render_ascending() {
        let hist = RequestDurationHistogram::new();
        hist.observe(3.0, labels("/", 200));
        let mut out = String::new();
        hist.render(&mut out);
        assert!(out.contains("le=\"0.1\"} 0"));
        let le_positions: Vec<usize> = ["\"0.1\"", "\"5\"", "\"15\"", "\"500\"", "\"+Inf\""]
            .iter()
            .map(|le| out.find(le).unwrap())
            .collect();
        assert!(le_positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn series_render_in_first_use_order() {
        let hist = RequestDurationHistogram::new();
        hist.observe(1.0, labels("/b", 200));
        hist.observe(1.0, labels("/a", 200));
        hist.observe(1.0, labels("/b", 200));

        let paths: Vec<String> = hist.snapshot().into_iter().map(|s| s.labels.path).collect();
        assert_eq!(paths, vec!["/b", "/a"]);
    }

    #[test]
    fn render_is_idempotent() {
        let hist = RequestDurationHistogram::new();
        hist.observe(12.0, labels("/x", 404));
        let (mut a, mut b) = (String::new(), String::new());
        hist.render(&mut a);
        hist.render(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_buckets() {
        assert!(RequestDurationHistogram::with_buckets(&[]).is_err());
        assert!(RequestDurationHistogram::with_buckets(&[5.0, 1.0]).is_err());
        assert!(RequestDurationHistogram::with_buckets(&[1.0, 1.0]).is_err());
        assert!(RequestDurationHistogram::with_buckets(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn concurrent_observations_are_not_lost() {
        let hist = Arc::new(RequestDurationHistogram::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let hist = Arc::clone(&hist);
                std::thread::spawn(move || {
                    let path = if i % 2 == 0 { "/even" } else { "/odd" };
                    for _ in 0..1_000 {
                        hist.observe(1.0, labels(path, 200));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let even = hist.series(&labels("/even", 200)).unwrap();
        let odd = hist.series(&labels("/odd", 200)).unwrap();
        assert_eq!(even.count + odd.count, 8_000);
        assert_eq!(even.count, 4_000);
        assert_eq!(*even.buckets.last().unwrap(), 4_000);
    }

    #[test]
    fn reads_during_writes_stay_consistent() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let hist = Arc::new(RequestDurationHistogram::new());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let hist = Arc::clone(&hist);
                std::thread::spawn(move || {
                    for n in 0..2_000u32 {
                        // Spread over every bucket, including past the last bound.
                        let value = f64::from((n * 7 + i) % 700);
                        hist.observe(value, labels("/shared", 200));
                    }
                })
            })
            .collect();

        let reader = {
            let hist = Arc::clone(&hist);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut last_count = 0;
                while !done.load(Ordering::Acquire) {
                    for series in hist.snapshot() {
                        assert!(series.buckets.windows(2).all(|w| w[0] <= w[1]));
                        assert!(*series.buckets.last().unwrap() <= series.count);
                        assert!(series.count >= last_count);
                        last_count = series.count;
                    }

                    let mut out = String::new();
                    hist.render(&mut out);
                    let inf = out.lines().find(|l| l.contains("le=\"+Inf\"")).map(sample_value);
                    let count = out
                        .lines()
                        .find(|l| l.starts_with("http_request_duration_ms_count{"))
                        .map(sample_value);
                    assert_eq!(inf, count);
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();

        let series = hist.series(&labels("/shared", 200)).unwrap();
        assert_eq!(series.count, 8_000);
        assert!(*series.buckets.last().unwrap() < series.count);
    }

    fn sample_value(line: &str) -> u64 {
        line.rsplit(' ').next().unwrap().parse().unwrap()
    }
}
