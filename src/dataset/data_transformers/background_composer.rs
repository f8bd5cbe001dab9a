//! Builds artificial training examples by pasting cropped object images at random
//! places over background images, recording where each object landed in YOLO form.

use crate::config::seed_or_clock;
use crate::dataset::annotation::write_annotations;
use crate::dataset::common_structs::{AnnotatedImage, BoundingBox};
use crate::error::{Error, Result};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Object crops use pure white as their transparent background
const TRANSPARENT: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    pub n_examples: usize,
    pub min_objects: usize,
    /// Inclusive
    pub max_objects: usize,
    /// Cropped objects, the last two digits of each file stem are its class
    pub obj_folder: PathBuf,
    pub bg_folder: PathBuf,
    pub out_folder: PathBuf,
    pub seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            n_examples: 1500,
            min_objects: 0,
            max_objects: 4,
            obj_folder: PathBuf::from("../db_project/obj_cropped"),
            bg_folder: PathBuf::from("../db_project/bg"),
            out_folder: PathBuf::from("../examples"),
            seed: None,
        }
    }
}

/// Photometric change applied to every pasted object pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorAdjustment {
    /// `alpha * v + beta`
    Linear { alpha: f64, beta: i32 },
    /// `255 * (v / 255) ^ gamma`
    Gamma(f64),
}

impl ColorAdjustment {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            ColorAdjustment::Linear {
                alpha: rng.gen_range(0.5..1.5),
                beta: rng.gen_range(-40..=40),
            }
        } else {
            ColorAdjustment::Gamma(rng.gen_range(0.5..1.5))
        }
    }

    fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (value, out) in lut.iter_mut().enumerate() {
            let v = value as f64;
            let adjusted = match *self {
                ColorAdjustment::Linear { alpha, beta } => alpha * v + beta as f64,
                ColorAdjustment::Gamma(gamma) => (v / 255.).powf(gamma) * 255.,
            };
            *out = adjusted.round().clamp(0., 255.) as u8;
        }
        lut
    }
}

/// Class id encoded as the last two characters of the file stem, e.g. `mug_07.png` is class 7
pub fn class_from_filename(path: &Path) -> Result<u32> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let chars: Vec<char> = stem.chars().collect();
    let digits: String = chars[chars.len().saturating_sub(2)..].iter().collect();
    digits.parse().map_err(|_| {
        Error::Config(format!(
            "object file {} does not end with a two digit class",
            path.display()
        ))
    })
}

/// Resizes `obj` so its larger side is `scale` times the smaller side of the background,
/// keeping its aspect ratio
pub fn scale_object(obj: &RgbImage, bg_dims: (u32, u32), scale: f64) -> RgbImage {
    let (w, h) = obj.dimensions();
    let new_max_dim = (scale * bg_dims.0.min(bg_dims.1) as f64).round().max(1.);
    let (new_w, new_h) = if h > w {
        let ratio = new_max_dim / h as f64;
        ((ratio * w as f64).round(), new_max_dim)
    } else {
        let ratio = new_max_dim / w as f64;
        (new_max_dim, (ratio * h as f64).round())
    };
    imageops::resize(
        obj,
        (new_w as u32).max(1),
        (new_h as u32).max(1),
        FilterType::CatmullRom,
    )
}

/// Copies the non white pixels of `obj` to a random place of `bg` and returns its box
pub fn paste_object<R: Rng + ?Sized>(
    obj: &RgbImage,
    bg: &mut RgbImage,
    class_id: u32,
    rng: &mut R,
) -> Result<BoundingBox> {
    let (obj_w, obj_h) = obj.dimensions();
    let (bg_w, bg_h) = bg.dimensions();
    if obj_w > bg_w || obj_h > bg_h {
        return Err(Error::Config(format!(
            "object of {}x{} does not fit in background of {}x{}",
            obj_w, obj_h, bg_w, bg_h
        )));
    }
    let left = random_offset(bg_w - obj_w, rng);
    let top = random_offset(bg_h - obj_h, rng);
    let lut = ColorAdjustment::random(rng).lookup_table();

    for (x, y, pixel) in obj.enumerate_pixels() {
        if *pixel == TRANSPARENT {
            continue;
        }
        bg.put_pixel(left + x, top + y, Rgb(pixel.0.map(|v| lut[v as usize])));
    }

    let (bg_w, bg_h) = (bg_w as f64, bg_h as f64);
    let center_x = (2. * left as f64 + obj_w as f64) / 2.;
    let center_y = (2. * top as f64 + obj_h as f64) / 2.;
    BoundingBox::from_normalized(
        class_id,
        center_x / bg_w,
        center_y / bg_h,
        obj_w as f64 / bg_w,
        obj_h as f64 / bg_h,
        bg.width(),
        bg.height(),
    )
    .map_err(|e| Error::Config(e.to_string()))
}

// Uniform in [0, span), 0 when the object fills the background exactly
fn random_offset<R: Rng + ?Sized>(span: u32, rng: &mut R) -> u32 {
    if span == 0 {
        0
    } else {
        rng.gen_range(0..span)
    }
}

fn open_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .map_err(|e| Error::image(path, e))?
        .to_rgb8())
}

fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", folder.display());
    let entries = glob::glob(&pattern).map_err(|e| Error::Config(e.to_string()))?;
    let mut files = vec![];
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io(path, e.into())
        })?;
        if !path.is_file() {
            continue;
        }
        if ImageFormat::from_path(&path).is_ok() {
            files.push(path);
        } else {
            debug!("ignoring {}, not an image", path.display());
        }
    }
    if files.is_empty() {
        return Err(Error::Config(format!(
            "no images found in {}",
            folder.display()
        )));
    }
    Ok(files)
}

pub struct BackgroundComposer {
    objects: Vec<(PathBuf, u32)>,
    backgrounds: Vec<PathBuf>,
}

impl BackgroundComposer {
    pub fn from_folders(obj_folder: &Path, bg_folder: &Path) -> Result<Self> {
        let objects = list_files(obj_folder)?
            .into_iter()
            .map(|path| class_from_filename(&path).map(|class_id| (path, class_id)))
            .collect::<Result<Vec<_>>>()?;
        let backgrounds = list_files(bg_folder)?;
        info!(
            "{} object crops, {} backgrounds",
            objects.len(),
            backgrounds.len()
        );
        Ok(BackgroundComposer {
            objects,
            backgrounds,
        })
    }

    /// One background with between `min_objects` and `max_objects` objects pasted on it
    pub fn compose<R: Rng + ?Sized>(
        &self,
        min_objects: usize,
        max_objects: usize,
        rng: &mut R,
    ) -> Result<AnnotatedImage> {
        let bg_path = self
            .backgrounds
            .choose(rng)
            .ok_or_else(|| Error::Config("no backgrounds".into()))?;
        let mut image = open_rgb(bg_path)?;
        let n_objects = rng.gen_range(min_objects..=max_objects);
        let mut bboxes = Vec::with_capacity(n_objects);
        for _ in 0..n_objects {
            let (obj_path, class_id) = self
                .objects
                .choose(rng)
                .ok_or_else(|| Error::Config("no object crops".into()))?;
            let obj = open_rgb(obj_path)?;
            let scale = rng.gen_range(0.1..0.5);
            let obj = scale_object(&obj, image.dimensions(), scale);
            bboxes.push(paste_object(&obj, &mut image, *class_id, rng)?);
        }
        Ok(AnnotatedImage { image, bboxes })
    }
}

/// Writes `example_{index}.png` and `example_{index}.txt` into `out_folder`
pub fn write_example(out_folder: &Path, index: usize, example: &AnnotatedImage) -> Result<()> {
    let img_path = out_folder.join(format!("example_{}.png", index));
    example
        .image
        .save(&img_path)
        .map_err(|e| Error::image(&img_path, e))?;
    write_annotations(
        &out_folder.join(format!("example_{}.txt", index)),
        &example.bboxes,
    )
}

/// Generates `config.n_examples` examples, returning how many were written
pub fn synthesize(config: &SynthesisConfig, progress: &ProgressBar) -> Result<usize> {
    if config.min_objects > config.max_objects {
        return Err(Error::Config(format!(
            "min_objects {} is above max_objects {}",
            config.min_objects, config.max_objects
        )));
    }
    let composer = BackgroundComposer::from_folders(&config.obj_folder, &config.bg_folder)?;
    fs::create_dir_all(&config.out_folder).map_err(|e| Error::io(&config.out_folder, e))?;

    let seed = seed_or_clock(config.seed);
    info!("synthesizing {} examples with seed {}", config.n_examples, seed);
    let mut rng = StdRng::seed_from_u64(seed);
    progress.set_length(config.n_examples as u64);
    for i in 0..config.n_examples {
        let example = composer.compose(config.min_objects, config.max_objects, &mut rng)?;
        debug!("example {} has {} objects", i, example.bboxes.len());
        write_example(&config.out_folder, i, &example)?;
        progress.inc(1);
    }
    progress.finish();
    Ok(config.n_examples)
}
