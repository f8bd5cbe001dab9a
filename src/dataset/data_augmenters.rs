pub mod affine;
pub mod image_augmentations;
pub mod sequence;
