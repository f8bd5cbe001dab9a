use crate::dataset::annotation::read_annotations;
use crate::dataset::common_structs::AnnotatedImage;
use crate::dataset::naming::{source_index, DatasetLayout};
use crate::dataset::DataLoader;
use crate::error::{Error, Result};
use image::ImageError;
use std::path::{Path, PathBuf};

/// Everything needed to produce augmented output `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentationTask {
    pub index: usize,
    pub source: usize,
    pub image: PathBuf,
    pub annotation: PathBuf,
    pub aug_image: PathBuf,
    pub aug_annotation: PathBuf,
}

/// Walks output indices `k = 0..num_examples * multiplier` in order,
/// pairing each with source example `k mod num_examples`
pub struct AugmentationPlan {
    layout: DatasetLayout,
    num_examples: usize,
    max_elem_index: usize,
    next_element_index: usize,
}

impl AugmentationPlan {
    pub fn new(layout: DatasetLayout, num_examples: usize, multiplier: usize) -> Self {
        AugmentationPlan {
            layout,
            num_examples,
            max_elem_index: num_examples * multiplier,
            next_element_index: 0,
        }
    }

    pub fn task(&self, k: usize) -> AugmentationTask {
        let i = source_index(k, self.num_examples);
        AugmentationTask {
            index: k,
            source: i,
            image: self.layout.image.path(i),
            annotation: self.layout.annotation.path(i),
            aug_image: self.layout.aug_image.path(k),
            aug_annotation: self.layout.aug_annotation.path(k),
        }
    }
}

impl Iterator for AugmentationPlan {
    type Item = AugmentationTask;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_element_index >= self.max_elem_index {
            return None;
        }
        let task = self.task(self.next_element_index);
        self.next_element_index += 1;
        Some(task)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.max_elem_index - self.next_element_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AugmentationPlan {}

impl DataLoader for AugmentationPlan {
    fn next_element_index(&self) -> usize {
        self.next_element_index
    }

    fn max_elem_index(&self) -> usize {
        self.max_elem_index
    }
}

/// Loads an image as RGB8 together with the boxes of its annotation file
pub fn load_example(image_path: &Path, annotation_path: &Path) -> Result<AnnotatedImage> {
    let image = image::open(image_path)
        .map_err(|e| match e {
            ImageError::IoError(source) => Error::io(image_path, source),
            other => Error::image(image_path, other),
        })?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let bboxes = read_annotations(annotation_path, width, height)?;
    Ok(AnnotatedImage { image, bboxes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn plan_cycles_through_sources() {
        let plan = AugmentationPlan::new(DatasetLayout::default(), 3, 5);
        assert_eq!(plan.len(), 15);
        let sources: Vec<usize> = plan.map(|task| task.source).collect();
        assert_eq!(sources, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn tasks_are_named_by_output_index() {
        let plan = AugmentationPlan::new(DatasetLayout::default(), 3, 5);
        let task = plan.task(7);
        assert_eq!(task.image, PathBuf::from("./examples/example_1.png"));
        assert_eq!(task.annotation, PathBuf::from("./examples/example_1.txt"));
        assert_eq!(task.aug_image, PathBuf::from("./aug/aug_example_7.png"));
        assert_eq!(task.aug_annotation, PathBuf::from("./aug/aug_example_7.txt"));
    }

    #[test]
    fn progress_indices_advance() {
        let mut plan = AugmentationPlan::new(DatasetLayout::default(), 2, 2);
        assert_eq!(plan.max_elem_index(), 4);
        plan.next();
        plan.next();
        assert_eq!(plan.next_element_index(), 2);
        assert_eq!(plan.by_ref().count(), 2);
        assert!(plan.next().is_none());
    }

    #[test]
    fn loads_image_and_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("example_0.png");
        let txt_path = dir.path().join("example_0.txt");
        RgbImage::from_pixel(100, 50, Rgb([1, 2, 3]))
            .save(&img_path)
            .unwrap();
        std::fs::write(&txt_path, "0 0.5 0.5 0.4 0.2\n").unwrap();

        let example = load_example(&img_path, &txt_path).unwrap();
        assert_eq!(example.image.dimensions(), (100, 50));
        assert_eq!(example.bboxes.len(), 1);
        assert_eq!(example.bboxes[0].img_width(), 100);
    }

    #[test]
    fn missing_image_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_example(&dir.path().join("nope.png"), &dir.path().join("nope.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
