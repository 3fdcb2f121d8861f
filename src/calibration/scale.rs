/// Scale classifier: infers which numeric convention a rectangle batch uses
/// and rescales it into the canonical 0–1000 frame.
///
/// Rules run from least to most ambiguous; the first match wins. Unit and
/// percent ranges are nearly disjoint from pixel/normalized ranges, so only
/// the pixel-vs-normalized split needs the image size and a tie-break.
use serde::Serialize;

use crate::calibration::geometry::{order_rectangle, value_range};
use crate::calibration::types::{BoundingBox, Frame, ImageDescriptor, ScaleOverride, CANONICAL_MAX};

const UNIT_RANGE: (f64, f64) = (-0.1, 1.5);
const PERCENT_RANGE: (f64, f64) = (-1.0, 100.5);
const NORMALIZED_RANGE: (f64, f64) = (-50.0, 1200.0);

/// Slack, in source pixels, allowed past the image edge.
const PIXEL_TOLERANCE: f64 = 50.0;
/// Pixel reading requires values beyond the normalized span by this factor.
const PIXEL_MARGIN_RATIO: f64 = 1.2;

const GUARD_LONG_SIDE_RATIO: f64 = 1.5;
const GUARD_MIN_BOXES: usize = 3;
const GUARD_MAX_NORMALIZED_Y: f64 = 450.0;
const GUARD_MIN_NORMALIZED_X: f64 = 550.0;

/// Which rule settled the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleBasis {
    Override,
    EmptyBatch,
    UnitRange,
    PercentRange,
    PixelBounds,
    /// Pixel reading rejected as implausibly flattened.
    PixelGuardFallback,
    NormalizedRange,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleOutcome {
    pub frame: Frame,
    pub basis: ScaleBasis,
    /// Ordered rectangles in canonical units.
    pub boxes: Vec<BoundingBox>,
}

/// Classify and rescale a batch. An explicit override wins outright.
pub fn classify_scale(
    rects: &[BoundingBox],
    image: Option<&ImageDescriptor>,
    scale_override: ScaleOverride,
) -> ScaleOutcome {
    let ordered: Vec<BoundingBox> = rects.iter().map(order_rectangle).collect();
    let image = image.filter(|i| i.is_valid());

    let (frame, basis) = match scale_override.frame() {
        Some(frame) => (frame, ScaleBasis::Override),
        None => infer_frame(&ordered, image),
    };

    tracing::debug!(
        frame = %frame,
        basis = ?basis,
        count = ordered.len(),
        "scale classified"
    );

    let boxes = normalize(&ordered, frame, image);
    ScaleOutcome {
        frame,
        basis,
        boxes,
    }
}

fn within(lo: f64, hi: f64, range: (f64, f64)) -> bool {
    lo >= range.0 && hi <= range.1
}

fn infer_frame(ordered: &[BoundingBox], image: Option<&ImageDescriptor>) -> (Frame, ScaleBasis) {
    let Some((lo, hi)) = value_range(ordered) else {
        return (Frame::Unknown, ScaleBasis::EmptyBatch);
    };

    if within(lo, hi, UNIT_RANGE) {
        return (Frame::Unit, ScaleBasis::UnitRange);
    }
    if within(lo, hi, PERCENT_RANGE) {
        return (Frame::Percent, ScaleBasis::PercentRange);
    }
    if let Some(image) = image {
        if let Some(decision) = pixel_rule(ordered, hi, image) {
            return decision;
        }
    }
    if within(lo, hi, NORMALIZED_RANGE) {
        return (Frame::Normalized1000, ScaleBasis::NormalizedRange);
    }
    (Frame::Unknown, ScaleBasis::Unrecognized)
}

fn pixel_rule(
    ordered: &[BoundingBox],
    hi: f64,
    image: &ImageDescriptor,
) -> Option<(Frame, ScaleBasis)> {
    let max_x = ordered.iter().map(|r| r.xmax).fold(f64::MIN, f64::max);
    let max_y = ordered.iter().map(|r| r.ymax).fold(f64::MIN, f64::max);

    let fits = max_x <= image.width + PIXEL_TOLERANCE && max_y <= image.height + PIXEL_TOLERANCE;
    let beyond_normalized = hi > CANONICAL_MAX * PIXEL_MARGIN_RATIO;
    if !(fits && beyond_normalized) {
        return None;
    }

    let large = image.longer_side() > CANONICAL_MAX * GUARD_LONG_SIDE_RATIO;
    if large && ordered.len() >= GUARD_MIN_BOXES {
        let normalized_x = max_x * CANONICAL_MAX / image.width;
        let normalized_y = max_y * CANONICAL_MAX / image.height;
        if normalized_y < GUARD_MAX_NORMALIZED_Y && normalized_x > GUARD_MIN_NORMALIZED_X {
            tracing::debug!(
                normalized_x,
                normalized_y,
                "pixel reading looks flattened, keeping normalized-1000"
            );
            return Some((Frame::Normalized1000, ScaleBasis::PixelGuardFallback));
        }
    }

    Some((Frame::Pixel, ScaleBasis::PixelBounds))
}

/// Rescale ordered rectangles from `frame` into canonical units.
pub fn normalize(
    ordered: &[BoundingBox],
    frame: Frame,
    image: Option<&ImageDescriptor>,
) -> Vec<BoundingBox> {
    let (fx, fy) = match frame {
        Frame::Unit => (CANONICAL_MAX, CANONICAL_MAX),
        Frame::Percent => (CANONICAL_MAX / 100.0, CANONICAL_MAX / 100.0),
        Frame::Pixel => match image.filter(|i| i.is_valid()) {
            Some(image) => (CANONICAL_MAX / image.width, CANONICAL_MAX / image.height),
            None => {
                tracing::warn!("pixel frame without image size, passing coordinates through");
                (1.0, 1.0)
            }
        },
        Frame::Normalized1000 | Frame::Unknown => (1.0, 1.0),
    };
    ordered
        .iter()
        .map(|r| r.map_axes(|x| x * fx, |y| y * fy))
        .collect()
}
