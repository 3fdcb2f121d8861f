/// Mode classifier: picks the canonicalizing resize a batch was most likely
/// produced under.
///
/// The decision is an ordered list of rules, each a pure predicate over a
/// small [`ModeEvidence`] value. The first rule that fires wins; when none
/// does the batch is treated as `raw`. Every rule leans towards not firing.
use serde::Serialize;

use crate::calibration::geometry::extents;
use crate::calibration::letterbox::{Axis, LetterboxGeometry};
use crate::calibration::scale::{ScaleBasis, ScaleOutcome};
use crate::calibration::types::{BoundingBox, Frame, GeometricMode, ModeOverride, CANONICAL_MAX};

/// Below this much shrink an axis counts as full-span.
const SHRINK_EPSILON: f64 = 2.0;
/// Below this much padding an axis counts as unpadded.
const PAD_EPSILON: f64 = 2.0;
/// How close, in canonical units, an extent must sit to an edge.
const EDGE_MARGIN: f64 = 40.0;
const WIDE_ASPECT: f64 = 1.2;
const TALL_ASPECT: f64 = 0.8;

/// Everything the rules are allowed to look at.
#[derive(Debug, Clone, Copy)]
pub struct ModeEvidence<'a> {
    pub frame: Frame,
    pub scale_basis: ScaleBasis,
    pub extents: Option<BoundingBox>,
    pub count: usize,
    pub geometry: Option<&'a LetterboxGeometry>,
}

impl<'a> ModeEvidence<'a> {
    pub fn gather(scale: &ScaleOutcome, geometry: Option<&'a LetterboxGeometry>) -> Self {
        Self {
            frame: scale.frame,
            scale_basis: scale.basis,
            extents: extents(&scale.boxes),
            count: scale.boxes.len(),
            geometry,
        }
    }

    fn spatial(&self) -> Option<(&'a LetterboxGeometry, BoundingBox)> {
        Some((self.geometry?, self.extents?))
    }
}

/// Which rule settled the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeRule {
    Override,
    PixelFrame,
    NoGeometry,
    FitMaxFlush,
    LetterboxBand,
    CoverFallback,
    CoverCrop,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeDecision {
    pub mode: GeometricMode,
    pub rule: ModeRule,
}

struct Rule {
    rule: ModeRule,
    mode: GeometricMode,
    fires: fn(&ModeEvidence) -> bool,
}

const RULES: [Rule; 6] = [
    Rule {
        rule: ModeRule::PixelFrame,
        mode: GeometricMode::Raw,
        fires: is_pixel_frame,
    },
    Rule {
        rule: ModeRule::NoGeometry,
        mode: GeometricMode::Raw,
        fires: lacks_geometry,
    },
    Rule {
        rule: ModeRule::FitMaxFlush,
        mode: GeometricMode::FitMax,
        fires: fit_max_flush,
    },
    Rule {
        rule: ModeRule::LetterboxBand,
        mode: GeometricMode::Letterbox,
        fires: letterbox_band,
    },
    Rule {
        rule: ModeRule::CoverFallback,
        mode: GeometricMode::Cover,
        fires: cover_fallback,
    },
    Rule {
        rule: ModeRule::CoverCrop,
        mode: GeometricMode::Cover,
        fires: cover_crop,
    },
];

/// Select a mode for the scale-normalized batch. An explicit override wins outright.
pub fn classify_mode(
    scale: &ScaleOutcome,
    geometry: Option<&LetterboxGeometry>,
    mode_override: ModeOverride,
) -> ModeDecision {
    if let Some(mode) = mode_override.mode() {
        tracing::debug!(mode = %mode, "mode overridden");
        return ModeDecision {
            mode,
            rule: ModeRule::Override,
        };
    }
    let decision = decide(&ModeEvidence::gather(scale, geometry));
    tracing::debug!(mode = %decision.mode, rule = ?decision.rule, "mode classified");
    decision
}

/// Evaluate the rule list top-down.
pub fn decide(evidence: &ModeEvidence) -> ModeDecision {
    RULES
        .iter()
        .find(|r| (r.fires)(evidence))
        .map(|r| ModeDecision {
            mode: r.mode,
            rule: r.rule,
        })
        .unwrap_or(ModeDecision {
            mode: GeometricMode::Raw,
            rule: ModeRule::Default,
        })
}

fn span(r: &BoundingBox, axis: Axis) -> (f64, f64) {
    match axis {
        Axis::X => (r.xmin, r.xmax),
        Axis::Y => (r.ymin, r.ymax),
    }
}

fn near(value: f64, target: f64) -> bool {
    (value - target).abs() <= EDGE_MARGIN
}

fn is_pixel_frame(e: &ModeEvidence) -> bool {
    e.frame == Frame::Pixel
}

fn lacks_geometry(e: &ModeEvidence) -> bool {
    e.geometry.is_none()
}

/// Content flush to `[0, scaled]` on every shrunk axis.
fn fit_max_flush(e: &ModeEvidence) -> bool {
    let Some((g, ext)) = e.spatial() else {
        return false;
    };
    let shrunk: Vec<Axis> = Axis::BOTH
        .into_iter()
        .filter(|&a| g.scaled(a) < CANONICAL_MAX - SHRINK_EPSILON)
        .collect();
    !shrunk.is_empty()
        && shrunk.iter().all(|&a| {
            let (lo, hi) = span(&ext, a);
            near(lo, 0.0) && near(hi, g.scaled(a))
        })
}

/// On every padded axis: content inside the band, touching at least one band edge.
fn letterbox_band(e: &ModeEvidence) -> bool {
    let Some((g, ext)) = e.spatial() else {
        return false;
    };
    let padded: Vec<Axis> = Axis::BOTH
        .into_iter()
        .filter(|&a| g.pad(a) > PAD_EPSILON)
        .collect();
    !padded.is_empty()
        && padded.iter().all(|&a| {
            let pad = g.pad(a);
            let far = CANONICAL_MAX - pad;
            let (lo, hi) = span(&ext, a);
            let inside = lo >= pad - EDGE_MARGIN && hi <= far + EDGE_MARGIN;
            inside && (near(lo, pad) || near(hi, far))
        })
}

fn clearly_oblong(g: &LetterboxGeometry) -> bool {
    let aspect = g.aspect_ratio();
    aspect >= WIDE_ASPECT || aspect <= TALL_ASPECT
}

/// Normalized frame reached only because a pixel reading was rejected.
fn cover_fallback(e: &ModeEvidence) -> bool {
    let Some(g) = e.geometry else {
        return false;
    };
    clearly_oblong(g)
        && e.count > 0
        && e.frame == Frame::Normalized1000
        && e.scale_basis == ScaleBasis::PixelGuardFallback
}

/// Full span on the uncropped axis, flush to exactly one edge of the cropped axis.
fn cover_crop(e: &ModeEvidence) -> bool {
    let Some((g, ext)) = e.spatial() else {
        return false;
    };
    let Some(cropped) = g.cover_cropped_axis() else {
        return false;
    };
    if !clearly_oblong(g) {
        return false;
    }
    let (dlo, dhi) = span(&ext, cropped.other());
    let full_span = dlo <= EDGE_MARGIN && dhi >= CANONICAL_MAX - EDGE_MARGIN;

    let (clo, chi) = span(&ext, cropped);
    let flush_start = clo <= EDGE_MARGIN;
    let flush_end = chi >= CANONICAL_MAX - EDGE_MARGIN;
    full_span && (flush_start != flush_end)
}
