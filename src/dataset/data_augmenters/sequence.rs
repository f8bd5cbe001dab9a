use super::image_augmentations::{FlipAxis, ParamRange, Stage};
use crate::dataset::common_structs::{AnnotatedImage, PixelBox};
use crate::error::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Ordered list of augmentation stages applied to an image together with its boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationSequence {
    /// Shuffle the stage order for every image
    pub random_order: bool,
    pub stages: Vec<Stage>,
}

/// Result of augmenting one annotated image
#[derive(Debug, Clone, PartialEq)]
pub struct Augmented {
    /// The augmented image with the boxes still intersecting it, clipped to its frame
    pub sample: AnnotatedImage,
    /// Boxes pushed completely out of the frame
    pub dropped: usize,
}

impl Default for AugmentationSequence {
    fn default() -> Self {
        AugmentationSequence {
            random_order: true,
            stages: vec![
                Stage::Flip {
                    probability: 0.5,
                    axis: FlipAxis::Horizontal,
                },
                Stage::Multiply {
                    probability: 1.0,
                    factor: ParamRange(0.6, 1.2),
                    per_channel: 0.0,
                },
                Stage::Contrast {
                    probability: 1.0,
                    alpha: ParamRange(0.5, 1.25),
                },
                Stage::Grayscale {
                    probability: 1.0,
                    alpha: ParamRange(0.0, 0.5),
                },
                Stage::Sharpen {
                    probability: 0.4,
                    alpha: ParamRange(0.0, 0.65),
                    lightness: ParamRange(0.75, 1.15),
                },
                Stage::Blur {
                    probability: 0.5,
                    sigma: ParamRange(0.0, 1.0),
                },
                Stage::AdditiveNoise {
                    probability: 1.0,
                    loc: 0.0,
                    scale: ParamRange(0.0, 0.05 * 255.),
                    per_channel: 0.0,
                },
                Stage::Affine {
                    probability: 0.5,
                    scale_x: ParamRange(0.5, 1.2),
                    scale_y: ParamRange(0.5, 1.2),
                    translate_x: ParamRange(-0.2, 0.2),
                    translate_y: ParamRange(-0.2, 0.2),
                    rotate: ParamRange(-30., 30.),
                },
            ],
        }
    }
}

impl AugmentationSequence {
    /// A sequence that leaves images and boxes untouched, apart from clipping
    pub fn identity() -> Self {
        AugmentationSequence {
            random_order: false,
            stages: vec![],
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.stages.iter().try_for_each(Stage::validate)
    }

    /// Applies the stages to the image and every box with the same random draws,
    /// then clips the boxes to the frame and drops the ones left outside of it.
    pub fn augment<R: Rng + ?Sized>(&self, sample: AnnotatedImage, rng: &mut R) -> Augmented {
        let AnnotatedImage { mut image, bboxes } = sample;
        let mut corners: Vec<PixelBox> = bboxes.iter().map(|bb| bb.to_absolute()).collect();

        let mut order: Vec<usize> = (0..self.stages.len()).collect();
        if self.random_order {
            order.shuffle(rng);
        }
        for stage in order.into_iter().map(|idx| &self.stages[idx]) {
            if rng.gen_bool(stage.probability()) {
                trace!("applying {}", stage.name());
                stage.apply(&mut image, &mut corners, rng);
            }
        }

        let (width, height) = image.dimensions();
        let mut kept = Vec::with_capacity(bboxes.len());
        let mut dropped = 0;
        // every box keeps its own class, whatever happens to its neighbours
        for (mut bbox, corner) in bboxes.into_iter().zip(corners) {
            match corner.clip(width, height) {
                Some(clipped) => {
                    bbox.apply_absolute(clipped);
                    kept.push(bbox);
                }
                None => dropped += 1,
            }
        }
        Augmented {
            sample: AnnotatedImage {
                image,
                bboxes: kept,
            },
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::common_structs::BoundingBox;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(bboxes: Vec<BoundingBox>) -> AnnotatedImage {
        AnnotatedImage {
            image: RgbImage::from_fn(40, 20, |x, y| Rgb([(x * 6) as u8, (y * 12) as u8, 77])),
            bboxes,
        }
    }

    fn translate_right(fraction: f64) -> AugmentationSequence {
        AugmentationSequence {
            random_order: false,
            stages: vec![Stage::Affine {
                probability: 1.0,
                scale_x: ParamRange::fixed(1.),
                scale_y: ParamRange::fixed(1.),
                translate_x: ParamRange::fixed(fraction),
                translate_y: ParamRange::fixed(0.),
                rotate: ParamRange::fixed(0.),
            }],
        }
    }

    #[test]
    fn identity_keeps_boxes() {
        let bb = BoundingBox::from_normalized(2, 0.5, 0.5, 0.4, 0.2, 40, 20).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let out = AugmentationSequence::identity().augment(sample(vec![bb.clone()]), &mut rng);
        assert_eq!(out.dropped, 0);
        assert_eq!(out.sample.bboxes.len(), 1);
        let (class, cx, cy, w, h) = out.sample.bboxes[0].to_normalized_record();
        assert_eq!(class, 2);
        assert_abs_diff_eq!(cx, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(cy, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(h, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn boxes_pushed_out_are_dropped_and_partial_ones_clipped() {
        // x in [0.1, 0.3] * 40 = [4, 12] and [26, 34]
        let left = BoundingBox::from_normalized(0, 0.2, 0.5, 0.2, 0.5, 40, 20).unwrap();
        let right = BoundingBox::from_normalized(1, 0.75, 0.5, 0.2, 0.5, 40, 20).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        // shift by 20 px: left -> [24, 32], right -> [46, 54] out of the frame
        let out = translate_right(0.5).augment(sample(vec![left, right]), &mut rng);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.sample.bboxes.len(), 1);
        assert_eq!(out.sample.bboxes[0].class_id(), 0);

        let partial = BoundingBox::from_normalized(5, 0.6, 0.5, 0.4, 0.5, 40, 20).unwrap();
        // [16, 32] shifted by 12 px -> [28, 44], clipped to [28, 40]
        let out = translate_right(0.3).augment(sample(vec![partial]), &mut rng);
        assert_eq!(out.dropped, 0);
        let abs = out.sample.bboxes[0].to_absolute();
        assert_abs_diff_eq!(abs.x1, 28., epsilon = 1e-9);
        assert_abs_diff_eq!(abs.x2, 40., epsilon = 1e-9);
        let (class, cx, _, w, _) = out.sample.bboxes[0].to_normalized_record();
        assert_eq!(class, 5);
        assert_abs_diff_eq!(cx, 34. / 40., epsilon = 1e-9);
        assert_abs_diff_eq!(w, 12. / 40., epsilon = 1e-9);
    }

    #[test]
    fn same_seed_gives_same_result() {
        let bb = BoundingBox::from_normalized(0, 0.4, 0.6, 0.3, 0.3, 40, 20).unwrap();
        let seq = AugmentationSequence::default();
        let a = seq.augment(sample(vec![bb.clone()]), &mut StdRng::seed_from_u64(99));
        let b = seq.augment(sample(vec![bb]), &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn flip_moves_image_and_boxes_together() {
        let seq = AugmentationSequence {
            random_order: true,
            stages: vec![Stage::Flip {
                probability: 1.0,
                axis: FlipAxis::Horizontal,
            }],
        };
        let mut img = RgbImage::new(40, 20);
        // paint the box region white so we can find it after the flip
        for x in 4..12 {
            for y in 5..15 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let bb = BoundingBox::from_normalized(0, 0.2, 0.5, 0.2, 0.5, 40, 20).unwrap();
        let out = seq.augment(
            AnnotatedImage {
                image: img,
                bboxes: vec![bb],
            },
            &mut StdRng::seed_from_u64(3),
        );
        let abs = out.sample.bboxes[0].to_absolute();
        assert_abs_diff_eq!(abs.x1, 28., epsilon = 1e-9);
        assert_abs_diff_eq!(abs.x2, 36., epsilon = 1e-9);
        assert_eq!(out.sample.image.get_pixel(30, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.sample.image.get_pixel(6, 10), &Rgb([0, 0, 0]));
    }

    // Continuous extent (x1, y1, x2, y2) of the pixels brighter than mid gray
    fn bright_bounds(img: &RgbImage) -> (f64, f64, f64, f64) {
        let bright: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 127)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = bright.iter().map(|p| p.0).min().unwrap();
        let max_x = bright.iter().map(|p| p.0).max().unwrap();
        let min_y = bright.iter().map(|p| p.1).min().unwrap();
        let max_y = bright.iter().map(|p| p.1).max().unwrap();
        (min_x as f64, min_y as f64, max_x as f64 + 1., max_y as f64 + 1.)
    }

    #[test]
    fn affine_moves_image_and_boxes_together() {
        // (scale, translate_x, translate_y, rotate)
        let cases = [
            (1.0, 0.2, 0.0, 0.0),
            (0.5, -0.1, 0.1, 0.0),
            (1.2, -0.1, 0.0, 0.0),
            (0.8, 0.1, -0.05, 30.0),
            (1.0, 0.0, 0.0, -20.0),
        ];
        for (scale, tx, ty, rotate) in cases {
            let seq = AugmentationSequence {
                random_order: false,
                stages: vec![Stage::Affine {
                    probability: 1.0,
                    scale_x: ParamRange::fixed(scale),
                    scale_y: ParamRange::fixed(scale),
                    translate_x: ParamRange::fixed(tx),
                    translate_y: ParamRange::fixed(ty),
                    rotate: ParamRange::fixed(rotate),
                }],
            };
            // box over pixels x 60..100, y 30..70 of a 200x120 frame
            let mut img = RgbImage::new(200, 120);
            for x in 60..100 {
                for y in 30..70 {
                    img.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
            let bb = BoundingBox::from_normalized(1, 0.4, 0.5, 0.2, 1. / 3., 200, 120).unwrap();
            let out = seq.augment(
                AnnotatedImage {
                    image: img,
                    bboxes: vec![bb],
                },
                &mut StdRng::seed_from_u64(4),
            );
            assert_eq!(out.dropped, 0);
            let abs = out.sample.bboxes[0].to_absolute();
            let (x1, y1, x2, y2) = bright_bounds(&out.sample.image);
            for (boxed, painted) in [(abs.x1, x1), (abs.y1, y1), (abs.x2, x2), (abs.y2, y2)] {
                assert!(
                    (boxed - painted).abs() <= 1.5,
                    "case {:?}: box {:?} vs pixels {:?}",
                    (scale, tx, ty, rotate),
                    abs,
                    (x1, y1, x2, y2)
                );
            }
        }
    }

    #[test]
    fn default_sequence_is_valid() {
        assert!(AugmentationSequence::default().validate().is_ok());
        assert_eq!(AugmentationSequence::default().stages.len(), 8);
    }
}
