use hdrhistogram::Histogram;
use std::time::Duration;

/// Response-time aggregation for one engine run.
pub struct Timer {
    name: &'static str,
    histogram: Histogram<u64>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Timer {
            name,
            // UNWRAP: 3 significant figures is always a valid configuration.
            histogram: Histogram::new(3).unwrap(),
        }
    }

    pub fn record(&mut self, sample: Duration) {
        self.histogram.saturating_record(sample.as_nanos() as u64);
    }

    pub fn record_all<'a>(&mut self, samples: impl IntoIterator<Item = &'a Duration>) {
        for sample in samples {
            self.record(*sample);
        }
    }

    /// Mean response time in microseconds.
    pub fn mean_us(&self) -> f64 {
        self.histogram.mean() / 1_000.0
    }

    pub fn print(&self) {
        let quantile_us = |q: f64| self.histogram.value_at_quantile(q) as f64 / 1_000.0;
        println!(
            "{:<8} mean {:>10.2} us  p50 {:>10.2} us  p90 {:>10.2} us  p99 {:>10.2} us",
            self.name,
            self.mean_us(),
            quantile_us(0.50),
            quantile_us(0.90),
            quantile_us(0.99),
        );
    }
}
