use super::affine::AffineTransform;
use crate::dataset::common_structs::PixelBox;
use crate::error::{Error, Result};
use image::{imageops, Rgb, RgbImage};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` range a stage parameter is uniformly sampled from.
/// Serialized as a two element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange(pub f64, pub f64);

impl ParamRange {
    pub fn fixed(value: f64) -> Self {
        ParamRange(value, value)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.0 == self.1 {
            self.0
        } else {
            rng.gen_range(self.0..=self.1)
        }
    }

    fn validate(&self, stage: &str, name: &str) -> Result<()> {
        if !(self.0.is_finite() && self.1.is_finite()) || self.0 > self.1 {
            return Err(Error::Config(format!(
                "{}: `{}` range [{}, {}] is not a valid interval",
                stage, name, self.0, self.1
            )));
        }
        Ok(())
    }

    fn validate_non_negative(&self, stage: &str, name: &str) -> Result<()> {
        self.validate(stage, name)?;
        if self.0 < 0. {
            return Err(Error::Config(format!(
                "{}: `{}` must not be negative",
                stage, name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    #[default]
    Horizontal,
    Vertical,
}

fn always() -> f64 {
    1.0
}

fn unit_range() -> ParamRange {
    ParamRange::fixed(1.0)
}

fn zero_range() -> ParamRange {
    ParamRange::fixed(0.0)
}

/// One step of an augmentation sequence.
///
/// `probability` is the chance the stage runs at all for a given image. Every other
/// parameter is sampled once per run, so the image and its boxes see the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    Flip {
        #[serde(default = "always")]
        probability: f64,
        #[serde(default)]
        axis: FlipAxis,
    },
    /// Multiplies every pixel value by a factor
    Multiply {
        #[serde(default = "always")]
        probability: f64,
        factor: ParamRange,
        /// Chance of sampling one factor per channel instead of one for the whole image
        #[serde(default)]
        per_channel: f64,
    },
    /// `128 + alpha * (v - 128)`
    Contrast {
        #[serde(default = "always")]
        probability: f64,
        alpha: ParamRange,
    },
    /// Blends the image with its grayscale version, alpha 1.0 being fully gray
    Grayscale {
        #[serde(default = "always")]
        probability: f64,
        alpha: ParamRange,
    },
    Sharpen {
        #[serde(default = "always")]
        probability: f64,
        alpha: ParamRange,
        lightness: ParamRange,
    },
    /// Gaussian blur, sigmas below 0.01 leave the image untouched
    Blur {
        #[serde(default = "always")]
        probability: f64,
        sigma: ParamRange,
    },
    /// Gaussian noise with mean `loc` and a standard deviation sampled from `scale`,
    /// in pixel value units (0-255)
    AdditiveNoise {
        #[serde(default = "always")]
        probability: f64,
        #[serde(default)]
        loc: f64,
        scale: ParamRange,
        #[serde(default)]
        per_channel: f64,
    },
    /// Scale, rotation (degrees) and translation (fraction of the image size) around the image center
    Affine {
        #[serde(default = "always")]
        probability: f64,
        #[serde(default = "unit_range")]
        scale_x: ParamRange,
        #[serde(default = "unit_range")]
        scale_y: ParamRange,
        #[serde(default = "zero_range")]
        translate_x: ParamRange,
        #[serde(default = "zero_range")]
        translate_y: ParamRange,
        #[serde(default = "zero_range")]
        rotate: ParamRange,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Flip { .. } => "flip",
            Stage::Multiply { .. } => "multiply",
            Stage::Contrast { .. } => "contrast",
            Stage::Grayscale { .. } => "grayscale",
            Stage::Sharpen { .. } => "sharpen",
            Stage::Blur { .. } => "blur",
            Stage::AdditiveNoise { .. } => "additive_noise",
            Stage::Affine { .. } => "affine",
        }
    }

    pub fn probability(&self) -> f64 {
        match *self {
            Stage::Flip { probability, .. }
            | Stage::Multiply { probability, .. }
            | Stage::Contrast { probability, .. }
            | Stage::Grayscale { probability, .. }
            | Stage::Sharpen { probability, .. }
            | Stage::Blur { probability, .. }
            | Stage::AdditiveNoise { probability, .. }
            | Stage::Affine { probability, .. } => probability,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        let probability = self.probability();
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::Config(format!(
                "{}: probability {} is outside [0, 1]",
                name, probability
            )));
        }
        let check_probability = |what: &str, p: f64| {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "{}: `{}` {} is outside [0, 1]",
                    name, what, p
                )))
            }
        };
        match self {
            Stage::Flip { .. } => Ok(()),
            Stage::Multiply {
                factor,
                per_channel,
                ..
            } => {
                factor.validate_non_negative(name, "factor")?;
                check_probability("per_channel", *per_channel)
            }
            Stage::Contrast { alpha, .. } => alpha.validate_non_negative(name, "alpha"),
            Stage::Grayscale { alpha, .. } => {
                alpha.validate_non_negative(name, "alpha")?;
                check_probability("alpha", alpha.1)
            }
            Stage::Sharpen {
                alpha, lightness, ..
            } => {
                alpha.validate_non_negative(name, "alpha")?;
                check_probability("alpha", alpha.1)?;
                lightness.validate_non_negative(name, "lightness")
            }
            Stage::Blur { sigma, .. } => sigma.validate_non_negative(name, "sigma"),
            Stage::AdditiveNoise {
                loc,
                scale,
                per_channel,
                ..
            } => {
                if !loc.is_finite() {
                    return Err(Error::Config(format!("{}: `loc` must be finite", name)));
                }
                scale.validate_non_negative(name, "scale")?;
                check_probability("per_channel", *per_channel)
            }
            Stage::Affine {
                scale_x,
                scale_y,
                translate_x,
                translate_y,
                rotate,
                ..
            } => {
                scale_x.validate(name, "scale_x")?;
                scale_y.validate(name, "scale_y")?;
                if scale_x.0 <= 0. || scale_y.0 <= 0. {
                    return Err(Error::Config(format!("{}: scales must be positive", name)));
                }
                translate_x.validate(name, "translate_x")?;
                translate_y.validate(name, "translate_y")?;
                rotate.validate(name, "rotate")
            }
        }
    }

    /// Runs the stage unconditionally, updating the image and the pixel boxes together.
    pub fn apply<R: Rng + ?Sized>(&self, img: &mut RgbImage, boxes: &mut [PixelBox], rng: &mut R) {
        match self {
            Stage::Flip { axis, .. } => flip(img, boxes, *axis),
            Stage::Multiply {
                factor,
                per_channel,
                ..
            } => {
                let factors = if rng.gen_bool(*per_channel) {
                    [factor.sample(rng), factor.sample(rng), factor.sample(rng)]
                } else {
                    [factor.sample(rng); 3]
                };
                multiply(img, factors);
            }
            Stage::Contrast { alpha, .. } => linear_contrast(img, alpha.sample(rng)),
            Stage::Grayscale { alpha, .. } => grayscale_blend(img, alpha.sample(rng)),
            Stage::Sharpen {
                alpha, lightness, ..
            } => {
                let alpha = alpha.sample(rng);
                let lightness = lightness.sample(rng);
                sharpen(img, alpha, lightness);
            }
            Stage::Blur { sigma, .. } => gaussian_blur(img, sigma.sample(rng)),
            Stage::AdditiveNoise {
                loc,
                scale,
                per_channel,
                ..
            } => {
                let scale = scale.sample(rng);
                let per_channel = rng.gen_bool(*per_channel);
                additive_gaussian_noise(img, *loc, scale, per_channel, rng);
            }
            Stage::Affine {
                scale_x,
                scale_y,
                translate_x,
                translate_y,
                rotate,
                ..
            } => {
                let (width, height) = img.dimensions();
                let transform = AffineTransform::about_center(
                    width,
                    height,
                    (scale_x.sample(rng), scale_y.sample(rng)),
                    (
                        translate_x.sample(rng) * width as f64,
                        translate_y.sample(rng) * height as f64,
                    ),
                    rotate.sample(rng),
                );
                if let Some(warped) = transform.warp(img) {
                    *img = warped;
                    for bb in boxes.iter_mut() {
                        *bb = transform.transform_box(bb);
                    }
                }
            }
        }
    }
}

fn to_subpixel(value: f64) -> u8 {
    value.round().clamp(0., 255.) as u8
}

pub fn flip(img: &mut RgbImage, boxes: &mut [PixelBox], axis: FlipAxis) {
    let (width, height) = img.dimensions();
    match axis {
        FlipAxis::Horizontal => {
            imageops::flip_horizontal_in_place(img);
            boxes
                .iter_mut()
                .for_each(|bb| *bb = bb.flip_horizontally(width));
        }
        FlipAxis::Vertical => {
            imageops::flip_vertical_in_place(img);
            boxes
                .iter_mut()
                .for_each(|bb| *bb = bb.flip_vertically(height));
        }
    }
}

// Reasonable values are 0.6 to 1.2
pub fn multiply(img: &mut RgbImage, factors: [f64; 3]) {
    for pixel in img.pixels_mut() {
        for (channel, factor) in pixel.0.iter_mut().zip(factors) {
            *channel = to_subpixel(*channel as f64 * factor);
        }
    }
}

// Reasonable values are 0.5 to 1.25
pub fn linear_contrast(img: &mut RgbImage, alpha: f64) {
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = to_subpixel(128. + alpha * (*channel as f64 - 128.));
        }
    }
}

pub fn grayscale_blend(img: &mut RgbImage, alpha: f64) {
    if alpha <= 0. {
        return;
    }
    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0.map(f64::from);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        for channel in pixel.0.iter_mut() {
            *channel = to_subpixel((1. - alpha) * *channel as f64 + alpha * luma);
        }
    }
}

/// 3x3 sharpening, blending the identity kernel with
/// `[[-1, -1, -1], [-1, 8 + lightness, -1], [-1, -1, -1]]` by `alpha`.
pub fn sharpen(img: &mut RgbImage, alpha: f64, lightness: f64) {
    if alpha <= 0. {
        return;
    }
    let alpha = alpha as f32;
    let center = (1. - alpha) + alpha * (8. + lightness as f32);
    let kernel = [
        -alpha, -alpha, -alpha, //
        -alpha, center, -alpha, //
        -alpha, -alpha, -alpha,
    ];
    *img = imageproc::filter::filter3x3::<Rgb<u8>, f32, u8>(img, &kernel);
}

// Reasonable values are 0.0 to 1.0
pub fn gaussian_blur(img: &mut RgbImage, sigma: f64) {
    if sigma < 0.01 {
        return;
    }
    *img = imageproc::filter::gaussian_blur_f32(img, sigma as f32);
}

pub fn additive_gaussian_noise<R: Rng + ?Sized>(
    img: &mut RgbImage,
    loc: f64,
    scale: f64,
    per_channel: bool,
    rng: &mut R,
) {
    if scale <= 0. && loc == 0. {
        return;
    }
    let normal = match Normal::new(loc, scale) {
        Ok(normal) => normal,
        Err(_) => return,
    };
    for pixel in img.pixels_mut() {
        if per_channel {
            for channel in pixel.0.iter_mut() {
                *channel = to_subpixel(*channel as f64 + normal.sample(rng));
            }
        } else {
            let noise = normal.sample(rng);
            for channel in pixel.0.iter_mut() {
                *channel = to_subpixel(*channel as f64 + noise);
            }
        }
    }
}
