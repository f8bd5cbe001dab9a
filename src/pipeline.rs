//! The augmentation job: turns every source example into `multiplier` augmented copies.

use crate::config::{seed_or_clock, AugmentConfig, FailurePolicy};
use crate::dataset::annotation::write_annotations;
use crate::dataset::data_loaders::example_loader::{
    load_example, AugmentationPlan, AugmentationTask,
};
use crate::dataset::DataLoader;
use crate::error::{Error, Result};
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs;
use tracing::{debug, error, info, warn};

/// What happened to one output index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Written { kept: usize, dropped: usize },
    /// Every box left the frame and `skip_empty` is set
    SkippedEmpty { dropped: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub written: usize,
    pub skipped_empty: usize,
    /// Output indices that failed, with the error message
    pub failed: Vec<(usize, String)>,
    pub boxes_kept: usize,
    pub boxes_dropped: usize,
}

impl JobSummary {
    fn record(&mut self, index: usize, result: Result<IterationOutcome>) {
        match result {
            Ok(IterationOutcome::Written { kept, dropped }) => {
                self.written += 1;
                self.boxes_kept += kept;
                self.boxes_dropped += dropped;
            }
            Ok(IterationOutcome::SkippedEmpty { dropped }) => {
                self.skipped_empty += 1;
                self.boxes_dropped += dropped;
            }
            Err(e) => self.failed.push((index, e.to_string())),
        }
    }
}

pub struct AugmentJob {
    config: AugmentConfig,
    seed: u64,
}

impl AugmentJob {
    pub fn new(config: AugmentConfig) -> Result<Self> {
        config.validate()?;
        let seed = seed_or_clock(config.seed);
        Ok(AugmentJob { config, seed })
    }

    /// The seed actually used, logged so a run can be repeated
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    pub fn plan(&self) -> AugmentationPlan {
        AugmentationPlan::new(
            self.config.layout.clone(),
            self.config.num_examples,
            self.config.multiplier,
        )
    }

    /// Random source for output `k`, independent of every other iteration
    fn rng_for(&self, k: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn run(&self, progress: &ProgressBar) -> Result<JobSummary> {
        for dir in self.config.layout.output_dirs() {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        let plan = self.plan();
        progress.set_length(plan.max_elem_index() as u64);
        info!(
            "augmenting {} examples x{} with seed {} on {} worker(s)",
            self.config.num_examples, self.config.multiplier, self.seed, self.config.workers
        );

        let summary = if self.config.workers > 1 {
            self.run_parallel(plan, progress)?
        } else {
            self.run_sequential(plan, progress)?
        };
        progress.finish();
        info!(
            "done: {} written, {} skipped as empty, {} failed, {} boxes kept, {} dropped",
            summary.written,
            summary.skipped_empty,
            summary.failed.len(),
            summary.boxes_kept,
            summary.boxes_dropped
        );
        Ok(summary)
    }

    fn run_sequential(&self, plan: AugmentationPlan, progress: &ProgressBar) -> Result<JobSummary> {
        let mut summary = JobSummary::default();
        for task in plan {
            let result = self.checked_iteration(&task)?;
            summary.record(task.index, result);
            progress.inc(1);
        }
        Ok(summary)
    }

    fn run_parallel(&self, plan: AugmentationPlan, progress: &ProgressBar) -> Result<JobSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| Error::Config(format!("cannot start worker pool: {}", e)))?;
        let tasks: Vec<AugmentationTask> = plan.collect();
        let results: Vec<(usize, Result<IterationOutcome>)> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let result = self.checked_iteration(task);
                    progress.inc(1);
                    result.map(|outcome| (task.index, outcome))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let mut summary = JobSummary::default();
        for (index, result) in results {
            summary.record(index, result);
        }
        Ok(summary)
    }

    /// Runs one iteration, turning its failure into a recorded one under the skip policy.
    /// Under the abort policy the error is returned instead.
    fn checked_iteration(&self, task: &AugmentationTask) -> Result<Result<IterationOutcome>> {
        match self.run_iteration(task) {
            Ok(outcome) => Ok(Ok(outcome)),
            Err(e) => match self.config.on_error {
                FailurePolicy::Abort => Err(e),
                FailurePolicy::Skip => {
                    error!("skipping output {}: {}", task.index, e);
                    Ok(Err(e))
                }
            },
        }
    }

    /// Loads source `task.source`, augments it and writes output `task.index`
    pub fn run_iteration(&self, task: &AugmentationTask) -> Result<IterationOutcome> {
        let example = load_example(&task.image, &task.annotation)?;
        let mut rng = self.rng_for(task.index);
        let augmented = self.config.augmentation.augment(example, &mut rng);
        let kept = augmented.sample.bboxes.len();
        let dropped = augmented.dropped;

        if kept == 0 && self.config.skip_empty {
            warn!(
                "output {} (from example {}) has no boxes left, skipping",
                task.index, task.source
            );
            return Ok(IterationOutcome::SkippedEmpty { dropped });
        }

        write_annotations(&task.aug_annotation, &augmented.sample.bboxes)?;
        augmented
            .sample
            .image
            .save(&task.aug_image)
            .map_err(|e| Error::image(&task.aug_image, e))?;
        debug!(
            "output {} from example {}: {} boxes kept, {} dropped",
            task.index, task.source, kept, dropped
        );
        Ok(IterationOutcome::Written { kept, dropped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_seed_is_kept() {
        let config = AugmentConfig {
            seed: Some(1234),
            ..AugmentConfig::default()
        };
        let job = AugmentJob::new(config).unwrap();
        assert_eq!(job.seed(), 1234);
    }

    #[test]
    fn iteration_rngs_differ_per_index() {
        use rand::Rng;
        let job = AugmentJob::new(AugmentConfig {
            seed: Some(5),
            ..AugmentConfig::default()
        })
        .unwrap();
        let a: u64 = job.rng_for(0).gen();
        let b: u64 = job.rng_for(1).gen();
        let a_again: u64 = job.rng_for(0).gen();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AugmentConfig {
            num_examples: 0,
            ..AugmentConfig::default()
        };
        assert!(matches!(AugmentJob::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = JobSummary::default();
        summary.record(0, Ok(IterationOutcome::Written { kept: 2, dropped: 1 }));
        summary.record(1, Ok(IterationOutcome::SkippedEmpty { dropped: 3 }));
        summary.record(2, Err(Error::Config("boom".into())));
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped_empty, 1);
        assert_eq!(summary.boxes_kept, 2);
        assert_eq!(summary.boxes_dropped, 4);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, 2);
    }
}
