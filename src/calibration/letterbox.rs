/// Canonicalizing-resize geometry for a known image size.
///
/// The longer image side maps onto the canonical span; the shorter side is
/// either padded symmetrically (letterbox) or left short (fitMax). The cover
/// geometry scales the shorter side instead and center-crops the longer one.
use serde::Serialize;

use crate::calibration::types::{ImageDescriptor, CANONICAL_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LetterboxGeometry {
    pub image_width: f64,
    pub image_height: f64,
    /// `CANONICAL_MAX / max(width, height)`.
    pub scale: f64,
    pub scaled_width: f64,
    pub scaled_height: f64,
    pub pad_x: f64,
    pub pad_y: f64,
}

impl LetterboxGeometry {
    /// Returns `None` when the dimensions are non-positive or non-finite.
    pub fn for_image(image: &ImageDescriptor) -> Option<Self> {
        if !image.is_valid() {
            return None;
        }
        let scale = CANONICAL_MAX / image.longer_side();
        let scaled_width = image.width * scale;
        let scaled_height = image.height * scale;
        Some(Self {
            image_width: image.width,
            image_height: image.height,
            scale,
            scaled_width,
            scaled_height,
            pad_x: (CANONICAL_MAX - scaled_width) / 2.0,
            pad_y: (CANONICAL_MAX - scaled_height) / 2.0,
        })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.image_width / self.image_height
    }

    pub fn is_square(&self) -> bool {
        self.image_width == self.image_height
    }

    /// Scaled extent of the shorter side when it, rather than the longer
    /// side, is mapped onto the canonical span.
    pub fn cover_span(&self) -> f64 {
        let long = self.image_width.max(self.image_height);
        let short = self.image_width.min(self.image_height);
        let ratio = long / short;
        CANONICAL_MAX * ratio
    }

    /// Amount trimmed from each end of the longer axis by the cover crop.
    pub fn cover_offset(&self) -> f64 {
        (self.cover_span() - CANONICAL_MAX) / 2.0
    }

    /// Axis cropped by cover: the longer one. `None` for square images.
    pub fn cover_cropped_axis(&self) -> Option<Axis> {
        if self.image_width > self.image_height {
            Some(Axis::X)
        } else if self.image_height > self.image_width {
            Some(Axis::Y)
        } else {
            None
        }
    }

    pub fn scaled(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.scaled_width,
            Axis::Y => self.scaled_height,
        }
    }

    pub fn pad(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.pad_x,
            Axis::Y => self.pad_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];

    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_pads_vertically() {
        let g = LetterboxGeometry::for_image(&ImageDescriptor::new(2000.0, 1000.0)).unwrap();
        assert_eq!(g.scale, 0.5);
        assert_eq!(g.scaled_width, 1000.0);
        assert_eq!(g.scaled_height, 500.0);
        assert_eq!(g.pad_x, 0.0);
        assert_eq!(g.pad_y, 250.0);
    }

    #[test]
    fn tall_image_pads_horizontally() {
        let g = LetterboxGeometry::for_image(&ImageDescriptor::new(500.0, 1000.0)).unwrap();
        assert_eq!(g.scaled_height, 1000.0);
        assert_eq!(g.scaled_width, 500.0);
        assert_eq!(g.pad_x, 250.0);
        assert_eq!(g.pad_y, 0.0);
        assert_eq!(g.cover_cropped_axis(), Some(Axis::Y));
    }

    #[test]
    fn square_image_has_no_padding_or_crop() {
        let g = LetterboxGeometry::for_image(&ImageDescriptor::new(640.0, 640.0)).unwrap();
        assert_eq!((g.pad_x, g.pad_y), (0.0, 0.0));
        assert!(g.is_square());
        assert_eq!(g.cover_cropped_axis(), None);
        assert_eq!(g.cover_offset(), 0.0);
    }

    #[test]
    fn cover_offset_matches_center_crop() {
        let g = LetterboxGeometry::for_image(&ImageDescriptor::new(1200.0, 800.0)).unwrap();
        assert!((g.cover_span() - 1500.0).abs() < 1e-9);
        assert!((g.cover_offset() - 250.0).abs() < 1e-9);
        assert_eq!(g.cover_cropped_axis(), Some(Axis::X));
    }

    #[test]
    fn invalid_dimensions_yield_no_model() {
        assert!(LetterboxGeometry::for_image(&ImageDescriptor::new(0.0, 100.0)).is_none());
        assert!(LetterboxGeometry::for_image(&ImageDescriptor::new(-4.0, 100.0)).is_none());
        assert!(LetterboxGeometry::for_image(&ImageDescriptor::new(f64::NAN, 100.0)).is_none());
    }
}
