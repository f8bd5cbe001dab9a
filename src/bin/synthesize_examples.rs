use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use yolo_augment::dataset::data_transformers::background_composer::{synthesize, SynthesisConfig};
use yolo_augment::logging::{init_tracing, progress_bar};

/// Pastes cropped objects over backgrounds to create annotated examples
#[derive(Parser, Debug)]
struct Args {
    #[arg(default_value_t = 1500)]
    n_examples: usize,
    #[arg(default_value_t = 0)]
    min_objects: usize,
    #[arg(default_value_t = 4)]
    max_objects: usize,
    /// Object crops on a white background, named `<anything>NN.<ext>` with NN the class
    #[arg(default_value = "../db_project/obj_cropped")]
    obj_folder: PathBuf,
    #[arg(default_value = "../db_project/bg")]
    bg_folder: PathBuf,
    #[arg(default_value = "../examples")]
    out_folder: PathBuf,
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = SynthesisConfig {
        n_examples: args.n_examples,
        min_objects: args.min_objects,
        max_objects: args.max_objects,
        obj_folder: args.obj_folder,
        bg_folder: args.bg_folder,
        out_folder: args.out_folder,
        seed: args.seed,
    };
    let written = synthesize(&config, &progress_bar()?)?;
    info!("{} examples written to {}", written, config.out_folder.display());
    Ok(())
}
