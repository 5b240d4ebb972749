//! Bounded fan-out of sample and owner requests.

use compact_str::CompactString;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use capsample_core::{SampleError, SamplingConfig};

use crate::owner::OwnerResolver;
use crate::source::{AttributeSource, IdentityDirectory, SampleRecord, SampleSource};

/// Number of file ids resolved per owner-lookup task.
pub const OWNER_BATCH_SIZE: usize = 100;

/// Fixed-size pool of workers issuing backend requests.
pub struct WorkerPool {
    pool: ThreadPool,
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool of `concurrency` workers.
    pub fn new(concurrency: usize) -> Result<Self, SampleError> {
        if concurrency == 0 {
            return Err(SampleError::InvalidConfig {
                message: "Concurrency must be positive".to_string(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("capsample-worker-{i}"))
            .build()
            .map_err(|e| SampleError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(Self { pool, concurrency })
    }

    /// Number of workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Draw the sample budget of `config` from `source`.
    ///
    /// Every worker requests [`SamplingConfig::per_worker_samples`] samples;
    /// results keep worker order and are cut down to the budget. Any worker
    /// failure fails the whole draw.
    pub fn collect_samples<S: SampleSource>(
        &self,
        source: &S,
        config: &SamplingConfig,
    ) -> Result<Vec<SampleRecord>, SampleError> {
        let per_worker = config.per_worker_samples();
        info!(
            root = %config.root.display(),
            samples = config.samples,
            workers = self.concurrency,
            per_worker,
            "collecting samples"
        );

        let batches = self.pool.install(|| {
            (0..self.concurrency)
                .into_par_iter()
                .map(|_| source.sample(&config.root, per_worker))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut samples: Vec<SampleRecord> = batches.into_iter().flatten().collect();
        samples.truncate(usize::try_from(config.samples).unwrap_or(usize::MAX));
        Ok(samples)
    }

    /// Owner label of every sample, index-aligned with `samples`.
    ///
    /// Ids are resolved in batches of [`OWNER_BATCH_SIZE`] across the pool.
    pub fn resolve_owners<A, D>(
        &self,
        resolver: &OwnerResolver<'_, A, D>,
        samples: &[SampleRecord],
    ) -> Vec<CompactString>
    where
        A: AttributeSource,
        D: IdentityDirectory,
    {
        info!(samples = samples.len(), "resolving owners");
        let batches: Vec<Vec<CompactString>> = self.pool.install(|| {
            samples
                .par_chunks(OWNER_BATCH_SIZE)
                .map(|batch| batch.iter().map(|s| resolver.resolve(&s.id)).collect())
                .collect()
        });
        batches.concat()
    }
}
