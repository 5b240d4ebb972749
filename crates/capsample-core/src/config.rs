//! Sampling and report configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, SampleError};

/// Default number of samples drawn per run.
pub const DEFAULT_SAMPLES: u64 = 2000;
/// Default number of concurrent sampling workers.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Default maximum number of leaves shown per owner.
pub const DEFAULT_MAX_LEAVES: usize = 30;
/// Default minimum weight a leaf needs to survive pruning.
pub const DEFAULT_MIN_SAMPLES: u64 = 5;

/// Configuration for drawing samples from a backend.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SamplingConfig {
    /// Root path to sample.
    pub root: PathBuf,

    /// Total sample budget.
    #[builder(default = "DEFAULT_SAMPLES")]
    #[serde(default = "default_samples")]
    pub samples: u64,

    /// Number of workers issuing sample and attribute requests.
    #[builder(default = "DEFAULT_CONCURRENCY")]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_samples() -> u64 {
    DEFAULT_SAMPLES
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl SamplingConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.samples == Some(0) {
            return Err("Sample count must be positive".to_string());
        }
        if self.concurrency == Some(0) {
            return Err("Concurrency must be positive".to_string());
        }
        Ok(())
    }
}

impl SamplingConfig {
    /// Create a new sampling config builder.
    pub fn builder() -> SamplingConfigBuilder {
        SamplingConfigBuilder::default()
    }

    /// Create a config for sampling a path with default budget and concurrency.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            samples: DEFAULT_SAMPLES,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Samples each worker requests.
    ///
    /// Rounds up so the workers together request at least the full budget.
    pub fn per_worker_samples(&self) -> u64 {
        let workers = self.concurrency.max(1) as u64;
        self.samples.div_ceil(workers)
    }
}

/// Configuration for pruning and formatting the per-owner report.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ReportConfig {
    /// Maximum number of leaves kept per owner tree.
    #[builder(default = "DEFAULT_MAX_LEAVES")]
    #[serde(default = "default_max_leaves")]
    pub max_leaves: usize,

    /// Leaves at or below this weight are merged into their parent.
    #[builder(default = "DEFAULT_MIN_SAMPLES")]
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Show capacity as a monthly cost at this rate ($/TB/month).
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub dollars_per_terabyte: Option<f64>,

    /// Show 95% confidence intervals instead of point estimates.
    #[builder(default = "false")]
    #[serde(default)]
    pub confidence_interval: bool,
}

fn default_max_leaves() -> usize {
    DEFAULT_MAX_LEAVES
}

fn default_min_samples() -> u64 {
    DEFAULT_MIN_SAMPLES
}

impl ReportConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(rate)) = self.dollars_per_terabyte {
            if !rate.is_finite() || rate < 0.0 {
                return Err(format!("Invalid dollars per terabyte: {rate}"));
            }
        }
        Ok(())
    }
}

impl ReportConfig {
    /// Create a new report config builder.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_leaves: DEFAULT_MAX_LEAVES,
            min_samples: DEFAULT_MIN_SAMPLES,
            dollars_per_terabyte: None,
            confidence_interval: false,
        }
    }
}

impl From<SamplingConfigBuilderError> for SampleError {
    fn from(err: SamplingConfigBuilderError) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

impl From<ReportConfigBuilderError> for ReportError {
    fn from(err: ReportConfigBuilderError) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_config_builder() {
        let config = SamplingConfig::builder()
            .root("/mnt/data")
            .samples(1337u64)
            .concurrency(13usize)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/mnt/data"));
        assert_eq!(config.samples, 1337);
        assert_eq!(config.concurrency, 13);
    }

    #[test]
    fn test_sampling_config_defaults() {
        let config = SamplingConfig::new("/mnt/data");
        assert_eq!(config.samples, 2000);
        assert_eq!(config.concurrency, 10);
    }

    #[test]
    fn test_sampling_config_rejects_zero_budget() {
        let result = SamplingConfig::builder()
            .root("/mnt/data")
            .samples(0u64)
            .build();
        assert!(result.is_err());

        let result = SamplingConfig::builder()
            .root("/mnt/data")
            .concurrency(0usize)
            .build();
        assert!(result.is_err());

        assert!(SamplingConfig::builder().build().is_err());
    }

    #[test]
    fn test_per_worker_samples_rounds_up() {
        let mut config = SamplingConfig::new("/mnt/data");
        assert_eq!(config.per_worker_samples(), 200);

        config.samples = 2001;
        assert_eq!(config.per_worker_samples(), 201);

        config.samples = 5;
        config.concurrency = 10;
        assert_eq!(config.per_worker_samples(), 1);
    }

    #[test]
    fn test_report_config_builder() {
        let config = ReportConfig::builder()
            .max_leaves(21usize)
            .min_samples(7u64)
            .dollars_per_terabyte(0.45)
            .confidence_interval(true)
            .build()
            .unwrap();

        assert_eq!(config.max_leaves, 21);
        assert_eq!(config.min_samples, 7);
        assert_eq!(config.dollars_per_terabyte, Some(0.45));
        assert!(config.confidence_interval);
    }

    #[test]
    fn test_report_config_defaults() {
        let config = ReportConfig::builder().build().unwrap();
        assert_eq!(config.max_leaves, 30);
        assert_eq!(config.min_samples, 5);
        assert!(config.dollars_per_terabyte.is_none());
        assert!(!config.confidence_interval);
    }

    #[test]
    fn test_report_config_rejects_negative_rate() {
        let result = ReportConfig::builder().dollars_per_terabyte(-1.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_errors_convert() {
        let err = SampleError::from(SamplingConfig::builder().samples(0u64).build().unwrap_err());
        assert!(matches!(err, SampleError::InvalidConfig { .. }));

        let err = ReportError::from(
            ReportConfig::builder()
                .dollars_per_terabyte(f64::NAN)
                .build()
                .unwrap_err(),
        );
        match err {
            ReportError::InvalidConfig { message } => assert!(message.contains("NaN"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
