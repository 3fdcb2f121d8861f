/// Calibration pipeline: scale classification, mode classification and the
/// inverse transform chained into one pure pass, plus the session that
/// re-runs it whenever one of its inputs changes.
///
/// Derived state is keyed to the [`ImageId`] of the current decode so a
/// render pass can never pair a fresh layout with stale rectangles.
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::calibration::diagnostics::{DiagnosticSnapshot, ModeReport, ScaleReport};
use crate::calibration::letterbox::LetterboxGeometry;
use crate::calibration::mode::{classify_mode, ModeDecision};
use crate::calibration::render::{hit_test, to_pixels, LayoutReport, OverlayShape, PixelRect};
use crate::calibration::scale::{classify_scale, ScaleOutcome};
use crate::calibration::transform::transform_batch;
use crate::calibration::types::{BoundingBox, ImageDescriptor, ImageId, OverrideSet};

/// Result of one calibration pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub image: Option<ImageDescriptor>,
    pub overrides: OverrideSet,
    pub scale: ScaleOutcome,
    pub mode: ModeDecision,
    pub geometry: Option<LetterboxGeometry>,
    /// Canonical rectangles, one per input rectangle, in input order.
    pub canonical: Vec<BoundingBox>,
}

/// Run scale → mode → transform over a rectangle batch.
///
/// Pure: the same inputs always give the same output, and the render size
/// plays no part.
pub fn calibrate(
    rects: &[BoundingBox],
    image: Option<&ImageDescriptor>,
    overrides: OverrideSet,
) -> Calibration {
    let image = image.filter(|i| i.is_valid()).copied();
    let geometry = image.as_ref().and_then(LetterboxGeometry::for_image);

    let scale = classify_scale(rects, image.as_ref(), overrides.scale);
    let mode = classify_mode(&scale, geometry.as_ref(), overrides.mode);
    let canonical = transform_batch(&scale.boxes, mode.mode, geometry.as_ref());

    tracing::info!(
        count = canonical.len(),
        frame = %scale.frame,
        mode = %mode.mode,
        has_image = image.is_some(),
        "calibration complete"
    );

    Calibration {
        image,
        overrides,
        scale,
        mode,
        geometry,
        canonical,
    }
}

#[derive(Debug, Clone)]
struct Cached {
    image_id: Option<ImageId>,
    calibration: Calibration,
}

/// Event-driven owner of one analysis view.
#[derive(Debug, Default)]
pub struct CalibrationSession {
    result: Option<AnalysisResult>,
    image: Option<(ImageId, ImageDescriptor)>,
    overrides: OverrideSet,
    cache: Option<Cached>,
    selected: Option<String>,
}

impl CalibrationSession {
    pub fn new(overrides: OverrideSet) -> Self {
        Self {
            overrides,
            ..Self::default()
        }
    }

    /// The structured model result arrived. Selects its first problem.
    pub fn on_result(&mut self, result: AnalysisResult) {
        self.selected = result.problems.first().map(|p| p.id.clone());
        tracing::debug!(problems = result.problems.len(), "analysis result received");
        self.result = Some(result);
        self.invalidate();
    }

    /// The image finished decoding. Returns the identity derived state is keyed to.
    pub fn on_image_decoded(&mut self, image: ImageDescriptor) -> ImageId {
        let id = ImageId::new();
        tracing::debug!(%id, width = image.width, height = image.height, "image decoded");
        self.image = Some((id, image));
        self.invalidate();
        id
    }

    pub fn on_image_cleared(&mut self) {
        self.image = None;
        self.invalidate();
    }

    /// Apply a new override pair; recomputation happens on the next pass.
    pub fn set_overrides(&mut self, overrides: OverrideSet) {
        if self.overrides != overrides {
            tracing::info!(scale = %overrides.scale, mode = %overrides.mode, "overrides changed");
            self.overrides = overrides;
            self.invalidate();
        }
    }

    pub fn overrides(&self) -> OverrideSet {
        self.overrides
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image.map(|(id, _)| id)
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Current calibration, recomputed only if something it depends on changed.
    pub fn calibration(&mut self) -> &Calibration {
        let current = self.image_id();
        if self.cache.as_ref().is_some_and(|c| c.image_id != current) {
            self.cache = None;
        }
        let result = &self.result;
        let image = self.image.map(|(_, d)| d);
        let overrides = self.overrides;
        &self
            .cache
            .get_or_insert_with(|| {
                let rects = result.as_ref().map(|r| r.boxes()).unwrap_or_default();
                Cached {
                    image_id: current,
                    calibration: calibrate(&rects, image.as_ref(), overrides),
                }
            })
            .calibration
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a problem by id. Unknown ids leave the selection unchanged.
    pub fn select(&mut self, id: &str) -> bool {
        let known = self
            .result
            .as_ref()
            .is_some_and(|r| r.problem(id).is_some());
        if known {
            self.selected = Some(id.to_string());
        }
        known
    }

    /// Pixel rectangles for `report`, or `None` when the report belongs to a
    /// different decode than the current image.
    fn pixel_rects(&mut self, report: Option<LayoutReport>) -> Option<Vec<PixelRect>> {
        let current = self.image_id()?;
        let report = report.filter(|r| r.image_id == current)?;
        let calibration = self.calibration();
        Some(
            calibration
                .canonical
                .iter()
                .map(|r| to_pixels(r, &report.render))
                .collect(),
        )
    }

    /// Overlay shapes for the latest layout report. Empty when stale.
    pub fn overlay(&mut self, report: Option<LayoutReport>) -> Vec<OverlayShape> {
        let Some(rects) = self.pixel_rects(report) else {
            return Vec::new();
        };
        let Some(result) = &self.result else {
            return Vec::new();
        };
        result
            .problems
            .iter()
            .zip(rects)
            .map(|(problem, rect)| {
                let selected = self.selected.as_deref() == Some(problem.id.as_str());
                OverlayShape::new(&problem.id, rect, problem.is_correct, selected)
            })
            .collect()
    }

    /// Route a pointer press to the topmost problem under it and select it.
    pub fn select_at(&mut self, report: Option<LayoutReport>, x: f64, y: f64) -> Option<String> {
        let rects = self.pixel_rects(report)?;
        let index = hit_test(&rects, x, y)?;
        let id = self.result.as_ref()?.problems.get(index)?.id.clone();
        tracing::debug!(problem = %id, x, y, "problem selected");
        self.selected = Some(id.clone());
        Some(id)
    }

    pub fn diagnostics(&mut self, report: Option<LayoutReport>) -> DiagnosticSnapshot {
        let raw = self.result.as_ref().map(|r| r.boxes()).unwrap_or_default();
        let current = self.image_id();
        let render = report
            .filter(|r| Some(r.image_id) == current)
            .map(|r| r.render);
        let calibration = self.calibration();
        DiagnosticSnapshot::new(
            calibration.image,
            render,
            calibration.overrides,
            ScaleReport {
                frame: calibration.scale.frame,
                basis: calibration.scale.basis,
            },
            ModeReport {
                mode: calibration.mode.mode,
                rule: calibration.mode.rule,
            },
            &raw,
            &calibration.scale.boxes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::HomeworkProblem;
    use crate::calibration::mode::ModeRule;
    use crate::calibration::render::layout_channel;
    use crate::calibration::scale::ScaleBasis;
    use crate::calibration::types::{
        Frame, GeometricMode, ModeOverride, RenderDescriptor, ScaleOverride,
    };

    fn problem(id: &str, is_correct: bool, bbox: BoundingBox) -> HomeworkProblem {
        HomeworkProblem {
            id: id.to_string(),
            subject: "Math".into(),
            question_text: String::new(),
            student_answer: String::new(),
            is_correct,
            correct_answer: String::new(),
            verification_code: None,
            hint: String::new(),
            solution_steps: Vec::new(),
            error_type: None,
            bounding_box: bbox,
        }
    }

    fn letterboxed_result() -> AnalysisResult {
        AnalysisResult {
            problems: vec![
                problem("q1", true, BoundingBox::new(40.0, 250.0, 480.0, 262.0)),
                problem("q2", false, BoundingBox::new(520.0, 738.0, 960.0, 750.0)),
            ],
            overall_summary: String::new(),
        }
    }

    fn assert_close(a: &BoundingBox, b: &BoundingBox) {
        for (x, y) in a.coords().iter().zip(b.coords()) {
            assert!((x - y).abs() < 1e-6, "{a} != {b}");
        }
    }

    #[test]
    fn cover_end_to_end() {
        let image = ImageDescriptor::new(1200.0, 800.0);
        let overrides = OverrideSet::new(ScaleOverride::Auto, ModeOverride::Cover);
        let input = [BoundingBox::new(300.0, 100.0, 700.0, 900.0)];
        let out = calibrate(&input, Some(&image), overrides);
        assert_eq!(out.scale.frame, Frame::Normalized1000);
        assert_eq!(out.mode.mode, GeometricMode::Cover);
        assert_close(&out.canonical[0], &BoundingBox::new(550.0 / 1.5, 100.0, 950.0 / 1.5, 900.0));
    }

    #[test]
    fn without_image_everything_degrades_to_raw() {
        let out = calibrate(&[BoundingBox::new(0.1, 0.2, 0.5, 0.6)], None, OverrideSet::default());
        assert_eq!(out.scale.frame, Frame::Unit);
        assert_eq!(out.mode.rule, ModeRule::NoGeometry);
        assert_close(&out.canonical[0], &BoundingBox::new(100.0, 200.0, 500.0, 600.0));
    }

    #[test]
    fn invalid_image_size_is_treated_as_missing() {
        let image = ImageDescriptor::new(0.0, 0.0);
        let input = [BoundingBox::new(100.0, 100.0, 200.0, 200.0)];
        let out = calibrate(&input, Some(&image), OverrideSet::default());
        assert!(out.image.is_none());
        assert!(out.geometry.is_none());
        assert_eq!(out.mode.mode, GeometricMode::Raw);
    }

    #[test]
    fn session_recomputes_once_image_decodes() {
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        assert_eq!(session.selected(), Some("q1"));
        assert_eq!(session.calibration().mode.rule, ModeRule::NoGeometry);

        session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        let calibration = session.calibration();
        assert_eq!(calibration.mode.mode, GeometricMode::Letterbox);
        assert_close(&calibration.canonical[0], &BoundingBox::new(40.0, 0.0, 480.0, 24.0));
        assert_close(&calibration.canonical[1], &BoundingBox::new(520.0, 976.0, 960.0, 1000.0));
    }

    #[test]
    fn override_change_invalidates_decision() {
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        assert_eq!(session.calibration().mode.mode, GeometricMode::Letterbox);

        session.set_overrides(OverrideSet::new(ScaleOverride::Auto, ModeOverride::Raw));
        let calibration = session.calibration();
        assert_eq!(calibration.mode.rule, ModeRule::Override);
        assert_eq!(calibration.canonical[0], BoundingBox::new(40.0, 250.0, 480.0, 262.0));
    }

    #[test]
    fn overlay_follows_layout_and_rejects_stale_reports() {
        let (observer, mapper) = layout_channel();
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        let old = session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));

        observer.report(old, RenderDescriptor::sized(1000.0, 500.0));
        let shapes = session.overlay(mapper.latest());
        assert_eq!(shapes.len(), 2);
        assert!(shapes[0].selected);
        assert!(!shapes[1].selected);
        assert!((shapes[1].rect.top - 488.0).abs() < 1e-6);

        observer.report(old, RenderDescriptor::sized(2000.0, 1000.0));
        let shapes = session.overlay(mapper.latest());
        assert!((shapes[1].rect.top - 976.0).abs() < 1e-6);

        // A new decode makes the old layout report stale.
        let new = session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        assert!(session.overlay(mapper.latest()).is_empty());
        observer.report(new, RenderDescriptor::sized(1000.0, 500.0));
        assert_eq!(session.overlay(mapper.latest()).len(), 2);
    }

    #[test]
    fn pointer_selects_topmost_problem() {
        let (observer, mapper) = layout_channel();
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        let id = session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        observer.report(id, RenderDescriptor::sized(1000.0, 500.0));

        assert_eq!(session.select_at(mapper.latest(), 700.0, 495.0).as_deref(), Some("q2"));
        assert_eq!(session.selected(), Some("q2"));
        assert_eq!(session.select_at(mapper.latest(), 10.0, 300.0), None);
        assert_eq!(session.selected(), Some("q2"));
        assert!(session.select("q1"));
        assert!(!session.select("missing"));
        assert_eq!(session.selected(), Some("q1"));
    }

    #[test]
    fn diagnostics_reflect_decision() {
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        let id = session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        let report = LayoutReport {
            image_id: id,
            render: RenderDescriptor::sized(1000.0, 500.0),
        };
        let snapshot = session.diagnostics(Some(report));
        assert_eq!(snapshot.scale.basis, ScaleBasis::NormalizedRange);
        assert_eq!(snapshot.mode.mode, GeometricMode::Letterbox);
        assert_eq!(snapshot.render_size, Some(RenderDescriptor::sized(1000.0, 500.0)));
        assert_eq!(snapshot.box_count, 2);
        assert_eq!(
            snapshot.raw_extents,
            Some(BoundingBox::new(40.0, 250.0, 960.0, 750.0))
        );
    }

    #[test]
    fn clearing_the_image_drops_overlay_and_geometry() {
        let (observer, mapper) = layout_channel();
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        let id = session.on_image_decoded(ImageDescriptor::new(2000.0, 1000.0));
        observer.report(id, RenderDescriptor::sized(1000.0, 500.0));
        assert_eq!(session.overlay(mapper.latest()).len(), 2);

        session.on_image_cleared();
        assert!(session.image_id().is_none());
        assert!(session.overlay(mapper.latest()).is_empty());
        assert_eq!(session.calibration().mode.rule, ModeRule::NoGeometry);
        assert_eq!(session.selected(), Some("q1"));
    }

    #[test]
    fn text_only_result_has_no_overlay() {
        let mut session = CalibrationSession::default();
        session.on_result(letterboxed_result());
        assert!(session.overlay(None).is_empty());
        assert_eq!(session.selected(), Some("q1"));
    }
}
