use crate::error::ParseError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
/// Frequently used structs in the provided data loaders/augmenters

/// An image with its Bounding Boxes
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    pub image: RgbImage,
    pub bboxes: Vec<BoundingBox>,
}

/// A box in absolute pixel corners, (x1, y1) top left and (x2, y2) bottom right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PixelBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        PixelBox { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x1, self.y1),
            (self.x2, self.y1),
            (self.x2, self.y2),
            (self.x1, self.y2),
        ]
    }

    /// Smallest axis aligned box containing all the given points.
    pub fn enclosing(points: &[(f64, f64)]) -> Self {
        let mut out = PixelBox::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for &(x, y) in points {
            out.x1 = out.x1.min(x);
            out.y1 = out.y1.min(y);
            out.x2 = out.x2.max(x);
            out.y2 = out.y2.max(y);
        }
        out
    }

    /// Cuts the box to the `[0, width] x [0, height]` frame.
    /// Returns None when nothing of positive area is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<PixelBox> {
        let clipped = PixelBox {
            x1: self.x1.max(0.),
            y1: self.y1.max(0.),
            x2: self.x2.min(width as f64),
            y2: self.y2.min(height as f64),
        };
        if clipped.width() > 0. && clipped.height() > 0. {
            Some(clipped)
        } else {
            None
        }
    }

    pub fn flip_horizontally(&self, img_width: u32) -> PixelBox {
        let w = img_width as f64;
        PixelBox::new(w - self.x2, self.y1, w - self.x1, self.y2)
    }

    pub fn flip_vertically(&self, img_height: u32) -> PixelBox {
        let h = img_height as f64;
        PixelBox::new(self.x1, h - self.y2, self.x2, h - self.y1)
    }
}

/// A YOLO bounding box, kept both in normalized center form and in absolute pixel corners.
///
/// Both forms always describe the same region: the normalized form is only ever
/// changed through [`BoundingBox::apply_absolute`], which recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    class_id: u32,
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
    absolute: PixelBox,
    img_width: u32,
    img_height: u32,
}

impl BoundingBox {
    pub fn from_normalized(
        class_id: u32,
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
        img_width: u32,
        img_height: u32,
    ) -> Result<Self, ParseError> {
        for (field, value) in [
            ("center_x", center_x),
            ("center_y", center_y),
            ("width", width),
            ("height", height),
        ] {
            if !value.is_finite() {
                return Err(ParseError::NonNumeric {
                    field,
                    value: value.to_string(),
                });
            }
        }
        let (img_w, img_h) = (img_width as f64, img_height as f64);
        let absolute = PixelBox {
            x1: (center_x - width / 2.) * img_w,
            y1: (center_y - height / 2.) * img_h,
            x2: (center_x + width / 2.) * img_w,
            y2: (center_y + height / 2.) * img_h,
        };
        Ok(BoundingBox {
            class_id,
            center_x,
            center_y,
            width,
            height,
            absolute,
            img_width,
            img_height,
        })
    }

    /// (class, center_x, center_y, width, height) as written to annotation files
    pub fn to_normalized_record(&self) -> (u32, f64, f64, f64, f64) {
        (
            self.class_id,
            self.center_x,
            self.center_y,
            self.width,
            self.height,
        )
    }

    pub fn to_absolute(&self) -> PixelBox {
        self.absolute
    }

    /// Replaces the pixel corners with an augmented box and recomputes the normalized form.
    pub fn apply_absolute(&mut self, absolute: PixelBox) {
        let (img_w, img_h) = (self.img_width as f64, self.img_height as f64);
        self.absolute = absolute;
        self.center_x = (absolute.x1 + absolute.x2) / 2. / img_w;
        self.center_y = (absolute.y1 + absolute.y2) / 2. / img_h;
        self.width = absolute.width() / img_w;
        self.height = absolute.height() / img_h;
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn img_width(&self) -> u32 {
        self.img_width
    }

    pub fn img_height(&self) -> u32 {
        self.img_height
    }
}
