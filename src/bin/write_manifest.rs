use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use yolo_augment::config::load_json;
use yolo_augment::dataset::manifest::ManifestConfig;
use yolo_augment::dataset::naming::PathTemplate;
use yolo_augment::logging::init_tracing;

/// Writes the training manifest listing original and augmented example images
#[derive(Parser, Debug)]
struct Args {
    /// JSON manifest configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    examples_template: Option<String>,

    #[arg(long)]
    aug_template: Option<String>,

    #[arg(short = 'n', long)]
    num_examples: Option<usize>,

    #[arg(short, long)]
    multiplier: Option<usize>,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_json::<ManifestConfig>(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ManifestConfig::default(),
    };
    if let Some(template) = args.examples_template {
        config.examples_template = PathTemplate::new(template)?;
    }
    if let Some(template) = args.aug_template {
        config.aug_template = PathTemplate::new(template)?;
    }
    if let Some(n) = args.num_examples {
        config.num_examples = n;
    }
    if let Some(m) = args.multiplier {
        config.multiplier = m;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    config.validate()?;

    let lines = config
        .write()
        .with_context(|| format!("writing {}", config.output.display()))?;
    info!("{} lines written to {}", lines, config.output.display());
    Ok(())
}
