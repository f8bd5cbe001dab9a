use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use yolo_augment::config::{load_json, AugmentConfig, FailurePolicy};
use yolo_augment::logging::{init_tracing, progress_bar};
use yolo_augment::pipeline::AugmentJob;

/// Writes `multiplier` randomly augmented copies of every YOLO example
#[derive(Parser, Debug)]
#[command(name = "yolo-augment", version)]
struct Args {
    /// JSON job configuration, missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short = 'n', long)]
    num_examples: Option<usize>,

    #[arg(short, long)]
    multiplier: Option<usize>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long)]
    workers: Option<usize>,

    /// Log failed outputs and continue instead of stopping
    #[arg(long)]
    skip_failed: bool,

    /// Print the default configuration as JSON and exit
    #[arg(long)]
    print_default_config: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<AugmentConfig> {
        let mut config = match &self.config {
            Some(path) => load_json::<AugmentConfig>(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AugmentConfig::default(),
        };
        if let Some(n) = self.num_examples {
            config.num_examples = n;
        }
        if let Some(m) = self.multiplier {
            config.multiplier = m;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.skip_failed {
            config.on_error = FailurePolicy::Skip;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.print_default_config {
        println!("{}", serde_json::to_string_pretty(&AugmentConfig::default())?);
        return Ok(());
    }
    init_tracing();

    let job = AugmentJob::new(args.into_config()?)?;
    info!(
        "reading {} and {}, writing {} and {}",
        job.config().layout.image,
        job.config().layout.annotation,
        job.config().layout.aug_image,
        job.config().layout.aug_annotation
    );
    let summary = job.run(&progress_bar()?).context("augmentation job failed")?;

    for (index, message) in &summary.failed {
        warn!("output {} failed: {}", index, message);
    }
    println!(
        "{} outputs written, {} skipped as empty, {} failed (seed {})",
        summary.written,
        summary.skipped_empty,
        summary.failed.len(),
        job.seed()
    );
    Ok(())
}
