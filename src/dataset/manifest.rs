//! Training manifest (`train.txt`) listing one image path per line.

use crate::dataset::naming::PathTemplate;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Where the training tool finds the original examples
    pub examples_template: PathTemplate,
    /// Where the training tool finds the augmented examples
    pub aug_template: PathTemplate,
    pub num_examples: usize,
    pub multiplier: usize,
    pub output: PathBuf,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        ManifestConfig {
            examples_template: PathTemplate::from("build/darknet/x64/data/obj/example_{}.png"),
            aug_template: PathTemplate::from("build/darknet/x64/data/obj/aug_example_{}.png"),
            num_examples: 1500,
            multiplier: 5,
            output: PathBuf::from("train.txt"),
        }
    }
}

impl ManifestConfig {
    pub fn validate(&self) -> Result<()> {
        self.examples_template.validate()?;
        self.aug_template.validate()?;
        if self.num_examples == 0 || self.multiplier == 0 {
            return Err(Error::Config(
                "manifest needs at least one example and a multiplier of at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Manifest lines in order: for every output index `k`, the original example `k`
    /// when `k < num_examples`, followed by the augmented example `k`.
    pub fn entries(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.num_examples * self.multiplier).flat_map(move |k| {
            let original = (k < self.num_examples).then(|| self.examples_template.format(k));
            original
                .into_iter()
                .chain(std::iter::once(self.aug_template.format(k)))
        })
    }

    /// Writes the manifest to `self.output`, returning the number of lines written
    pub fn write(&self) -> Result<usize> {
        write_manifest(&self.output, self.entries())
    }
}

pub fn write_manifest<I>(path: &Path, entries: I) -> Result<usize>
where
    I: IntoIterator<Item = String>,
{
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;
    for entry in entries {
        writeln!(writer, "{}", entry).map_err(|e| Error::io(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(count)
}
