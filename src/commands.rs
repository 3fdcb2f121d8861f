use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{parse_model_text, AnalysisResult};
use crate::args::{CalibrateArgs, Command, PrefsAction};
use crate::calibration::annotator::annotate_image;
use crate::calibration::diagnostics::{export_diagnostics, ExportStatus, FileSink, WriterSink};
use crate::calibration::mode::ModeRule;
use crate::calibration::scale::ScaleBasis;
use crate::calibration::{
    layout_channel, BoundingBox, CalibrationSession, Frame, GeometricMode, ImageDescriptor, ImageId,
    LayoutReport, OverlayShape, OverrideSet, RenderDescriptor,
};
use crate::config::{self, Preferences};
use crate::errors::{CalibError, CalibResult};

/// What `calibrate` prints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrateReport {
    pub image_id: Option<ImageId>,
    pub image: Option<ImageDescriptor>,
    pub render: Option<RenderDescriptor>,
    pub overrides: OverrideSet,
    pub frame: Frame,
    pub scale_basis: ScaleBasis,
    pub mode: GeometricMode,
    pub mode_rule: ModeRule,
    pub canonical: Vec<BoundingBox>,
    pub overlay: Vec<OverlayShape>,
    pub selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ExportStatus>,
}

/// Read an analysis result file. Plain JSON and free model text both work.
pub fn load_result(path: &Path) -> CalibResult<AnalysisResult> {
    let text = std::fs::read_to_string(path)?;
    let result = parse_model_text(&text)?;
    tracing::info!(
        path = %path.display(),
        problems = result.problems.len(),
        "analysis result loaded"
    );
    Ok(result)
}

fn image_descriptor(args: &CalibrateArgs) -> CalibResult<Option<ImageDescriptor>> {
    if let Some(path) = &args.image {
        let (w, h) = image::image_dimensions(path)?;
        tracing::debug!(path = %path.display(), width = w, height = h, "image decoded");
        return Ok(Some(ImageDescriptor::from_pixels(w, h)));
    }
    Ok(args.image_size.map(|(w, h)| ImageDescriptor::new(w, h)))
}

/// Overrides for one `calibrate` call: flags, then query, then environment,
/// then the persisted preference.
pub fn effective_overrides(args: &CalibrateArgs, persisted: OverrideSet) -> OverrideSet {
    let flags = config::lenient_overrides(args.scale.as_deref(), args.mode.as_deref());
    let query = args
        .query
        .as_deref()
        .map(config::overrides_from_query)
        .unwrap_or_default();
    config::resolve_overrides(&[flags, query, config::overrides_from_env(), persisted])
}

pub fn calibrate(args: &CalibrateArgs, persisted: OverrideSet) -> CalibResult<CalibrateReport> {
    check_annotate_target(args)?;
    let result = load_result(&args.result)?;
    let image = image_descriptor(args)?;
    let overrides = effective_overrides(args, persisted);

    let mut session = CalibrationSession::new(overrides);
    session.on_result(result);
    let image_id = image.map(|desc| session.on_image_decoded(desc));

    let (observer, mapper) = layout_channel();
    let render = args
        .render_size
        .map(|(w, h)| RenderDescriptor::sized(w, h))
        .or_else(|| image.map(|i| RenderDescriptor::sized(i.width, i.height)));
    match (image_id, render) {
        (Some(id), Some(render)) => observer.report(id, render),
        _ => observer.clear(),
    }

    if let Some((x, y)) = args.pick {
        if session.select_at(mapper.latest(), x, y).is_none() {
            tracing::info!(x, y, "no problem under pick point");
        }
    }
    let overlay = session.overlay(mapper.latest());

    let annotated = match (&args.annotate, &args.image, image_id, image) {
        (Some(out), Some(src), Some(id), Some(desc)) => {
            // Burn-in happens at natural resolution regardless of the render size.
            observer.report(id, RenderDescriptor::sized(desc.width, desc.height));
            let shapes = session.overlay(mapper.latest());
            let bytes = std::fs::read(src)?;
            let png = annotate_image(&bytes, &shapes)?;
            std::fs::write(out, png)?;
            tracing::info!(path = %out.display(), shapes = shapes.len(), "annotated image written");
            Some(out.clone())
        }
        _ => None,
    };

    let diagnostics = args.diagnostics.as_ref().map(|target| {
        let report = image_id
            .zip(render)
            .map(|(image_id, render)| LayoutReport { image_id, render });
        let snapshot = session.diagnostics(report);
        match target {
            Some(path) => export_diagnostics(&snapshot, &mut FileSink { path: path.clone() }),
            None => export_diagnostics(&snapshot, &mut WriterSink(std::io::stderr())),
        }
    });

    let calibration = session.calibration().clone();
    Ok(CalibrateReport {
        image_id,
        image: calibration.image,
        render: image_id.and(render),
        overrides: calibration.overrides,
        frame: calibration.scale.frame,
        scale_basis: calibration.scale.basis,
        mode: calibration.mode.mode,
        mode_rule: calibration.mode.rule,
        canonical: calibration.canonical,
        overlay,
        selected: session.selected().map(str::to_string),
        annotated,
        diagnostics,
    })
}

#[derive(Debug, Serialize)]
pub struct PrefsReport {
    pub path: Option<PathBuf>,
    pub overrides: OverrideSet,
}

pub fn prefs(action: &PrefsAction) -> CalibResult<PrefsReport> {
    match action {
        PrefsAction::Show => Ok(PrefsReport {
            path: config::resolve_preferences_path(),
            overrides: config::load_preferences()?.overrides,
        }),
        PrefsAction::Set { scale, mode } => {
            let path = config::preferences_target()?;
            let prefs = config::update_preferences_at(&path, scale.as_deref(), mode.as_deref())?;
            Ok(PrefsReport {
                path: Some(path),
                overrides: prefs.overrides,
            })
        }
        PrefsAction::Reset => {
            let prefs = Preferences::default();
            let path = config::save_preferences(&prefs)?;
            Ok(PrefsReport { path: Some(path), overrides: prefs.overrides })
        }
    }
}

/// Run a parsed command and print its JSON report to stdout.
pub fn execute(command: &Command) -> CalibResult<()> {
    let json = match command {
        Command::Calibrate(args) => {
            let persisted = config::load_preferences().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load preferences; using automatic inference");
                Preferences::default()
            });
            serde_json::to_string_pretty(&calibrate(args, persisted.overrides)?)?
        }
        Command::Prefs { action } => serde_json::to_string_pretty(&prefs(action)?)?,
    };
    println!("{json}");
    Ok(())
}

/// Reject an `--annotate` target that would overwrite the source image.
pub fn check_annotate_target(args: &CalibrateArgs) -> CalibResult<()> {
    match (&args.annotate, &args.image) {
        (Some(out), Some(src)) if out == src => Err(CalibError::Image(format!(
            "refusing to overwrite source image {}",
            src.display()
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{ModeOverride, ScaleOverride};

    const RESULT: &str = r#"{
        "problems": [
            {
                "id": "q1",
                "isCorrect": true,
                "boundingBox": {"ymin": 15, "xmin": 10, "ymax": 480, "xmax": 600}
            },
            {
                "id": "q2",
                "isCorrect": false,
                "boundingBox": {"ymin": 520, "xmin": 20, "ymax": 985, "xmax": 700}
            }
        ],
        "overallSummary": "ok"
    }"#;

    fn args(dir: &Path) -> CalibrateArgs {
        let result = dir.join("result.json");
        std::fs::write(&result, RESULT).unwrap();
        CalibrateArgs {
            result,
            image: None,
            image_size: None,
            render_size: None,
            scale: None,
            mode: None,
            query: None,
            pick: None,
            annotate: None,
            diagnostics: None,
        }
    }

    #[test]
    fn calibrate_with_image_size_detects_cover() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.image_size = Some((1600.0, 1000.0));
        a.render_size = Some((800.0, 500.0));

        let report = calibrate(&a, OverrideSet::default()).unwrap();
        assert_eq!(report.frame, Frame::Normalized1000);
        assert_eq!(report.mode, GeometricMode::Cover);
        assert_eq!(report.overlay.len(), 2);
        assert_eq!(report.selected.as_deref(), Some("q1"));
        assert!(report.overlay[0].selected);
        assert!(report.overlay.iter().all(|s| s.rect.right() <= 800.0 + 1e-9));
    }

    #[test]
    fn without_image_there_is_no_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let report = calibrate(&args(dir.path()), OverrideSet::default()).unwrap();
        assert_eq!(report.mode, GeometricMode::Raw);
        assert!(report.overlay.is_empty());
        assert!(report.render.is_none());
        assert_eq!(report.canonical.len(), 2);
    }

    #[test]
    fn flags_beat_query_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.mode = Some("raw".into());
        a.query = Some("mode=letterbox&scale=percent".into());
        let persisted = OverrideSet::new(ScaleOverride::Unit, ModeOverride::Cover);
        let set = effective_overrides(&a, persisted);
        assert_eq!(set.mode, ModeOverride::Raw);
        assert_eq!(set.scale, ScaleOverride::Percent);
    }

    #[test]
    fn pick_selects_topmost_problem() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.image_size = Some((1600.0, 1000.0));
        a.render_size = Some((1000.0, 1000.0));
        a.pick = Some((400.0, 700.0));
        let report = calibrate(&a, OverrideSet::default()).unwrap();
        assert_eq!(report.selected.as_deref(), Some("q2"));
    }

    #[test]
    fn annotate_and_diagnostics_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("page.png");
        image::RgbaImage::from_pixel(160, 100, image::Rgba([255, 255, 255, 255]))
            .save(&src)
            .unwrap();

        let mut a = args(dir.path());
        a.image = Some(src);
        a.annotate = Some(dir.path().join("out.png"));
        let diag = dir.path().join("diag.json");
        a.diagnostics = Some(Some(diag.clone()));

        let report = calibrate(&a, OverrideSet::default()).unwrap();
        assert_eq!(report.image.map(|i| i.width), Some(160.0));
        assert_eq!(report.diagnostics, Some(ExportStatus::Copied));
        let out = image::open(dir.path().join("out.png")).unwrap();
        assert_eq!((out.width(), out.height()), (160, 100));
        assert!(std::fs::read_to_string(diag).unwrap().contains("\"mode\""));
    }

    #[test]
    fn annotate_over_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.image = Some(dir.path().join("page.png"));
        a.annotate = a.image.clone();
        assert!(check_annotate_target(&a).is_err());
    }

    #[test]
    fn model_text_result_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, format!("Sure!\n```json\n{RESULT}\n```")).unwrap();
        assert_eq!(load_result(&path).unwrap().problems.len(), 2);
    }
}
