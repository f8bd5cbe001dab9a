use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const PLACEHOLDER: &str = "{}";

/// A file path with a single `{}` placeholder for the example index,
/// e.g. `./examples/example_{}.png`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate(String);

impl PathTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = PathTemplate(template.into());
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<()> {
        match self.0.matches(PLACEHOLDER).count() {
            1 => Ok(()),
            n => Err(Error::Config(format!(
                "path template `{}` must contain exactly one `{}`, found {}",
                self.0, PLACEHOLDER, n
            ))),
        }
    }

    pub fn format(&self, index: usize) -> String {
        self.0.replacen(PLACEHOLDER, &index.to_string(), 1)
    }

    pub fn path(&self, index: usize) -> PathBuf {
        PathBuf::from(self.format(index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unchecked conversion, call [`PathTemplate::validate`] before use
impl From<&str> for PathTemplate {
    fn from(template: &str) -> Self {
        PathTemplate(template.to_string())
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where source examples are read from and augmented ones are written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub image: PathTemplate,
    pub annotation: PathTemplate,
    pub aug_image: PathTemplate,
    pub aug_annotation: PathTemplate,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        DatasetLayout {
            image: "./examples/example_{}.png".into(),
            annotation: "./examples/example_{}.txt".into(),
            aug_image: "./aug/aug_example_{}.png".into(),
            aug_annotation: "./aug/aug_example_{}.txt".into(),
        }
    }
}

impl DatasetLayout {
    pub fn validate(&self) -> Result<()> {
        self.image.validate()?;
        self.annotation.validate()?;
        self.aug_image.validate()?;
        self.aug_annotation.validate()
    }

    /// Directories the augmented outputs land in
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = [&self.aug_image, &self.aug_annotation]
            .iter()
            .filter_map(|template| template.path(0).parent().map(|p| p.to_path_buf()))
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        dirs.dedup();
        dirs
    }
}

/// Index of the source example an augmented output `k` is generated from
pub fn source_index(k: usize, num_examples: usize) -> usize {
    k % num_examples
}
