//! Configuration of the augmentation job, loaded from JSON.
//!
//! Every field has a default, so an empty object `{}` reproduces the stock job:
//! 1500 examples read from `./examples`, five augmented copies each written to `./aug`.

use crate::dataset::data_augmenters::sequence::AugmentationSequence;
use crate::dataset::naming::DatasetLayout;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// What to do when one iteration fails to read, parse or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the whole job on the first failure
    #[default]
    Abort,
    /// Log the failure and carry on with the next output index
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub layout: DatasetLayout,
    /// Number of source examples
    pub num_examples: usize,
    /// Augmented copies produced per source example
    pub multiplier: usize,
    /// Run seed, derived from the clock when unset
    pub seed: Option<u64>,
    /// Worker threads, 1 runs the iterations in order on the calling thread
    pub workers: usize,
    pub on_error: FailurePolicy,
    /// Skip writing outputs whose boxes all fell outside the image
    pub skip_empty: bool,
    pub augmentation: AugmentationSequence,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        AugmentConfig {
            layout: DatasetLayout::default(),
            num_examples: 1500,
            multiplier: 5,
            seed: None,
            workers: 1,
            on_error: FailurePolicy::Abort,
            skip_empty: false,
            augmentation: AugmentationSequence::default(),
        }
    }
}

impl AugmentConfig {
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if self.num_examples == 0 {
            return Err(Error::Config("num_examples must be at least 1".into()));
        }
        if self.multiplier == 0 {
            return Err(Error::Config("multiplier must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        self.augmentation.validate()
    }

    pub fn total_outputs(&self) -> usize {
        self.num_examples * self.multiplier
    }
}

/// The given seed, or one taken from the clock
pub fn seed_or_clock(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    })
}

/// Reads any of the JSON config structs from a file
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
