//! Capacity estimates from sample counts.
//!
//! A sample count is treated as the number of hits in `total_samples`
//! Bernoulli draws. The hit ratio estimates the share of total capacity, and
//! a normal approximation gives a 95% confidence interval around it.

use serde::{Deserialize, Serialize};

use crate::config::ReportConfig;
use crate::error::ReportError;

/// z-score of a two-sided 95% normal interval.
pub const CONFIDENCE_Z: f64 = 1.96;

/// Decimal terabyte used for cost conversion.
pub const BYTES_PER_TERABYTE: f64 = 1_000_000_000_000.0;

const BYTE_UNITS: [(u32, &str); 7] = [
    (6, "E"),
    (5, "P"),
    (4, "T"),
    (3, "G"),
    (2, "M"),
    (1, "K"),
    (0, "b"),
];

/// Estimated share of capacity attributable to a sample count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Fraction of all samples that were hits.
    pub mean: f64,
    /// Standard deviation of a single draw.
    pub stddev: f64,
    /// Half-width of the 95% interval on `mean`.
    pub confidence_radius: f64,
    /// Capacity the fractions are scaled by, in bytes.
    pub total_capacity: u64,
}

impl Estimate {
    /// Estimate the capacity share of `sample_count` hits out of
    /// `total_samples` draws over `total_capacity` bytes.
    pub fn new(
        sample_count: u64,
        total_samples: u64,
        total_capacity: u64,
    ) -> Result<Self, ReportError> {
        if total_samples == 0 {
            return Err(ReportError::NoSamples);
        }
        if sample_count > total_samples {
            return Err(ReportError::CountExceedsTotal {
                count: sample_count,
                total: total_samples,
            });
        }

        Ok(Self::compute(sample_count, total_samples, total_capacity))
    }

    // Callers guarantee 0 < total_samples and sample_count <= total_samples.
    fn compute(sample_count: u64, total_samples: u64, total_capacity: u64) -> Self {
        let hits = sample_count as f64;
        let draws = total_samples as f64;
        let mean = hits / draws;
        let variance = ((1.0 - mean).powi(2) * hits + mean.powi(2) * (draws - hits)) / draws;
        let stddev = variance.sqrt();

        Self {
            mean,
            stddev,
            confidence_radius: CONFIDENCE_Z * stddev / draws.sqrt(),
            total_capacity,
        }
    }

    /// Point estimate of the capacity in bytes.
    pub fn capacity(&self) -> f64 {
        self.mean * self.total_capacity as f64
    }

    /// 95% interval on the capacity in bytes.
    pub fn capacity_interval(&self) -> (f64, f64) {
        let total = self.total_capacity as f64;
        (
            (self.mean - self.confidence_radius) * total,
            (self.mean + self.confidence_radius) * total,
        )
    }

    /// Point estimate of the monthly cost at `dollars_per_terabyte`.
    pub fn monthly_cost(&self, dollars_per_terabyte: f64) -> f64 {
        self.cost_of(self.mean, dollars_per_terabyte)
    }

    /// 95% interval on the monthly cost at `dollars_per_terabyte`.
    pub fn monthly_cost_interval(&self, dollars_per_terabyte: f64) -> (f64, f64) {
        (
            self.cost_of(self.mean - self.confidence_radius, dollars_per_terabyte),
            self.cost_of(self.mean + self.confidence_radius, dollars_per_terabyte),
        )
    }

    fn cost_of(&self, fraction: f64, dollars_per_terabyte: f64) -> f64 {
        fraction * self.total_capacity as f64 / BYTES_PER_TERABYTE * dollars_per_terabyte
    }
}

/// Estimate the capacity share of a sample count. See [`Estimate::new`].
pub fn estimate(
    sample_count: u64,
    total_samples: u64,
    total_capacity: u64,
) -> Result<Estimate, ReportError> {
    Estimate::new(sample_count, total_samples, total_capacity)
}

/// Format a byte count with the largest binary unit it reaches.
///
/// `1536.0` becomes `1.50K`. Anything below one byte, negative lower
/// interval bounds included, is `0`.
pub fn format_byte_magnitude(value: f64) -> String {
    BYTE_UNITS
        .iter()
        .map(|&(power, unit)| (1024f64.powi(power as i32), unit))
        .find(|&(size, _)| value >= size)
        .map(|(size, unit)| format!("{:.2}{unit}", value / size))
        .unwrap_or_else(|| "0".to_string())
}

/// Renders sample counts as capacity or cost strings for one report.
#[derive(Debug, Clone)]
pub struct CapacityFormatter {
    total_samples: u64,
    total_capacity: u64,
    dollars_per_terabyte: Option<f64>,
    confidence_interval: bool,
}

impl CapacityFormatter {
    /// Create a formatter for a run of `total_samples` draws over
    /// `total_capacity` bytes.
    pub fn new(
        total_samples: u64,
        total_capacity: u64,
        config: &ReportConfig,
    ) -> Result<Self, ReportError> {
        if total_samples == 0 {
            return Err(ReportError::NoSamples);
        }
        Ok(Self {
            total_samples,
            total_capacity,
            dollars_per_terabyte: config.dollars_per_terabyte,
            confidence_interval: config.confidence_interval,
        })
    }

    /// Total number of draws in the run.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Estimate for `samples` out of the run's draws.
    ///
    /// Fails with [`ReportError::CountExceedsTotal`] like [`estimate`].
    pub fn estimate(&self, samples: u64) -> Result<Estimate, ReportError> {
        Estimate::new(samples, self.total_samples, self.total_capacity)
    }

    /// Percentage of all draws that `samples` represents.
    pub fn percent(&self, samples: u64) -> f64 {
        samples as f64 / self.total_samples as f64 * 100.0
    }

    /// Display string for `samples`.
    ///
    /// Bytes render as `23.28G` or `[21.00G-25.57G]`; with a rate set, costs
    /// render as `$12.50/month` or `[$11.27-$13.73]/month`.
    ///
    /// Counts above the run's draws are formatted as if they were equal to
    /// it, so a display never fails; [`CapacityFormatter::estimate`] reports
    /// them as errors instead.
    pub fn format(&self, samples: u64) -> String {
        let estimate = Estimate::compute(
            samples.min(self.total_samples),
            self.total_samples,
            self.total_capacity,
        );
        match (self.dollars_per_terabyte, self.confidence_interval) {
            (Some(rate), true) => {
                let (low, high) = estimate.monthly_cost_interval(rate);
                format!("[${low:.2}-${high:.2}]/month")
            }
            (Some(rate), false) => format!("${:.2}/month", estimate.monthly_cost(rate)),
            (None, true) => {
                let (low, high) = estimate.capacity_interval();
                format!(
                    "[{}-{}]",
                    format_byte_magnitude(low),
                    format_byte_magnitude(high)
                )
            }
            (None, false) => format_byte_magnitude(estimate.capacity()),
        }
    }
}
