/// Transform engine: undoes the chosen canonicalizing resize.
///
/// Inputs are scale-normalized rectangles; outputs are canonical rectangles
/// aligned to the true image aspect ratio, reordered and clamped to the
/// canonical frame. Nothing is ever dropped.
use crate::calibration::geometry::{clamp_to_frame, order_rectangle};
use crate::calibration::letterbox::{Axis, LetterboxGeometry};
use crate::calibration::types::{BoundingBox, GeometricMode, CANONICAL_MAX};

/// Map one scale-normalized rectangle into the canonical frame.
///
/// Without geometry every mode degrades to identity.
pub fn to_canonical(
    rect: &BoundingBox,
    mode: GeometricMode,
    geometry: Option<&LetterboxGeometry>,
) -> BoundingBox {
    let r = order_rectangle(rect);
    let mapped = match (mode, geometry) {
        (GeometricMode::Raw, _) | (_, None) => r,
        (GeometricMode::Letterbox, Some(g)) => r.map_axes(
            |x| (x - g.pad_x) / g.scaled_width * CANONICAL_MAX,
            |y| (y - g.pad_y) / g.scaled_height * CANONICAL_MAX,
        ),
        (GeometricMode::FitMax, Some(g)) => r.map_axes(
            |x| x / g.scaled_width * CANONICAL_MAX,
            |y| y / g.scaled_height * CANONICAL_MAX,
        ),
        (GeometricMode::Cover, Some(g)) => uncover(&r, g),
    };
    clamp_to_frame(&order_rectangle(&mapped), CANONICAL_MAX)
}

pub fn transform_batch(
    rects: &[BoundingBox],
    mode: GeometricMode,
    geometry: Option<&LetterboxGeometry>,
) -> Vec<BoundingBox> {
    rects
        .iter()
        .map(|r| to_canonical(r, mode, geometry))
        .collect()
}

fn cover_factor(g: &LetterboxGeometry) -> f64 {
    g.cover_span() / CANONICAL_MAX
}

fn uncover(r: &BoundingBox, g: &LetterboxGeometry) -> BoundingBox {
    let offset = g.cover_offset();
    let factor = cover_factor(g);
    match g.cover_cropped_axis() {
        None => *r,
        Some(Axis::X) => r.map_axes(|x| (x + offset) / factor, |y| y),
        Some(Axis::Y) => r.map_axes(|x| x, |y| (y + offset) / factor),
    }
}

/// Express a canonical rectangle the way a producer reasoning under `mode`
/// would have reported it. Not clamped.
pub fn from_canonical(
    rect: &BoundingBox,
    mode: GeometricMode,
    geometry: &LetterboxGeometry,
) -> BoundingBox {
    let g = geometry;
    match mode {
        GeometricMode::Raw => *rect,
        GeometricMode::Letterbox => rect.map_axes(
            |x| x / CANONICAL_MAX * g.scaled_width + g.pad_x,
            |y| y / CANONICAL_MAX * g.scaled_height + g.pad_y,
        ),
        GeometricMode::FitMax => rect.map_axes(
            |x| x / CANONICAL_MAX * g.scaled_width,
            |y| y / CANONICAL_MAX * g.scaled_height,
        ),
        GeometricMode::Cover => {
            let offset = g.cover_offset();
            let factor = cover_factor(g);
            match g.cover_cropped_axis() {
                None => *rect,
                Some(Axis::X) => rect.map_axes(|x| x * factor - offset, |y| y),
                Some(Axis::Y) => rect.map_axes(|x| x, |y| y * factor - offset),
            }
        }
    }
}
