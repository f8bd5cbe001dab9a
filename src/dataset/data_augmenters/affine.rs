use crate::dataset::common_structs::PixelBox;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};

/// 3x3 homogeneous matrix mapping input pixel coordinates to output ones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: [[f64; 3]; 3],
}

impl AffineTransform {
    pub fn identity() -> Self {
        AffineTransform {
            matrix: [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
        }
    }

    /// Scales and rotates around the image center, then translates by `translation` pixels.
    /// Positive angles turn clockwise on screen since y grows downwards.
    pub fn about_center(
        width: u32,
        height: u32,
        (scale_x, scale_y): (f64, f64),
        (tx, ty): (f64, f64),
        rotate_degrees: f64,
    ) -> Self {
        let (cx, cy) = (width as f64 / 2., height as f64 / 2.);
        let (sin, cos) = rotate_degrees.to_radians().sin_cos();
        // T(c + t) * R * S * T(-c)
        let a = cos * scale_x;
        let b = -sin * scale_y;
        let c = sin * scale_x;
        let d = cos * scale_y;
        AffineTransform {
            matrix: [
                [a, b, cx + tx - a * cx - b * cy],
                [c, d, cy + ty - c * cx - d * cy],
                [0., 0., 1.],
            ],
        }
    }

    pub fn apply_point(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let m = &self.matrix;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    /// Box enclosing the four transformed corners
    pub fn transform_box(&self, bb: &PixelBox) -> PixelBox {
        let corners = bb.corners().map(|corner| self.apply_point(corner));
        PixelBox::enclosing(&corners)
    }

    // Box corners are continuous edges while `warp` maps pixel indices, so pixel `i`
    // is moved as its center `i + 0.5` and shifted back afterwards.
    fn projection(&self) -> Option<Projection> {
        let m = &self.matrix;
        let tx = m[0][2] + 0.5 * (m[0][0] + m[0][1]) - 0.5;
        let ty = m[1][2] + 0.5 * (m[1][0] + m[1][1]) - 0.5;
        Projection::from_matrix([
            m[0][0] as f32,
            m[0][1] as f32,
            tx as f32,
            m[1][0] as f32,
            m[1][1] as f32,
            ty as f32,
            m[2][0] as f32,
            m[2][1] as f32,
            m[2][2] as f32,
        ])
    }

    /// Warps the image with bilinear sampling, areas with no source pixel become black.
    /// None when the matrix cannot be inverted.
    pub fn warp(&self, img: &RgbImage) -> Option<RgbImage> {
        let projection = self.projection()?;
        Some(warp(
            img,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_keeps_points() {
        let t = AffineTransform::identity();
        assert_eq!(t.apply_point((10., 20.)), (10., 20.));
    }

    #[test]
    fn center_is_fixed_without_translation() {
        let t = AffineTransform::about_center(100, 50, (0.5, 1.2), (0., 0.), 30.);
        let (x, y) = t.apply_point((50., 25.));
        assert_abs_diff_eq!(x, 50., epsilon = 1e-9);
        assert_abs_diff_eq!(y, 25., epsilon = 1e-9);
    }

    #[test]
    fn rotation_by_90_degrees() {
        let t = AffineTransform::about_center(100, 100, (1., 1.), (0., 0.), 90.);
        // a point right of the center ends up below it
        let (x, y) = t.apply_point((60., 50.));
        assert_abs_diff_eq!(x, 50., epsilon = 1e-9);
        assert_abs_diff_eq!(y, 60., epsilon = 1e-9);
    }

    #[test]
    fn rotated_box_grows_to_enclose_corners() {
        let t = AffineTransform::about_center(100, 100, (1., 1.), (0., 0.), 45.);
        let bb = t.transform_box(&PixelBox::new(40., 40., 60., 60.));
        let half_diag = 10. * std::f64::consts::SQRT_2;
        assert_abs_diff_eq!(bb.x1, 50. - half_diag, epsilon = 1e-9);
        assert_abs_diff_eq!(bb.y2, 50. + half_diag, epsilon = 1e-9);
    }

    #[test]
    fn warp_keeps_dimensions() {
        let img = RgbImage::from_pixel(16, 8, Rgb([10, 20, 30]));
        let t = AffineTransform::about_center(16, 8, (0.5, 0.5), (2., 1.), 10.);
        let warped = t.warp(&img).unwrap();
        assert_eq!(warped.dimensions(), (16, 8));
        // shrunk content leaves black borders
        assert_eq!(warped.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn pure_translation_keeps_pixel_grid() {
        let mut img = RgbImage::new(16, 8);
        img.put_pixel(3, 2, Rgb([255, 255, 255]));
        let t = AffineTransform::about_center(16, 8, (1., 1.), (4., 1.), 0.);
        let warped = t.warp(&img).unwrap();
        assert_eq!(warped.get_pixel(7, 3), &Rgb([255, 255, 255]));
        assert_eq!(warped.get_pixel(3, 2), &Rgb([0, 0, 0]));
    }
}
