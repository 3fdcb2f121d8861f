/// Copyable diagnostic snapshot for bug reports.
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::calibration::geometry::extents;
use crate::calibration::mode::ModeRule;
use crate::calibration::scale::ScaleBasis;
use crate::calibration::types::{
    BoundingBox, Frame, GeometricMode, ImageDescriptor, OverrideSet, RenderDescriptor,
};
use crate::errors::{CalibError, CalibResult};

/// How many raw rectangles a snapshot carries.
pub const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ScaleReport {
    pub frame: Frame,
    pub basis: ScaleBasis,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    pub mode: GeometricMode,
    pub rule: ModeRule,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSnapshot {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub image_size: Option<ImageDescriptor>,
    pub render_size: Option<RenderDescriptor>,
    pub overrides: OverrideSet,
    pub scale: ScaleReport,
    pub mode: ModeReport,
    pub raw_extents: Option<BoundingBox>,
    pub normalized_extents: Option<BoundingBox>,
    pub box_count: usize,
    pub raw_sample: Vec<BoundingBox>,
}

impl DiagnosticSnapshot {
    pub fn new(
        image_size: Option<ImageDescriptor>,
        render_size: Option<RenderDescriptor>,
        overrides: OverrideSet,
        scale: ScaleReport,
        mode: ModeReport,
        raw: &[BoundingBox],
        normalized: &[BoundingBox],
    ) -> Self {
        Self {
            generated_at: chrono::Utc::now(),
            image_size,
            render_size,
            overrides,
            scale,
            mode,
            raw_extents: extents(raw),
            normalized_extents: extents(normalized),
            box_count: raw.len(),
            raw_sample: raw.iter().take(SAMPLE_SIZE).copied().collect(),
        }
    }

    /// Pretty JSON, suitable for pasting into an issue.
    pub fn to_text(&self) -> CalibResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Destination for exported diagnostic text (clipboard, file, stdout...).
pub trait DiagnosticSink {
    fn write_text(&mut self, text: &str) -> CalibResult<()>;
}

pub struct WriterSink<W: Write>(pub W);

impl<W: Write> DiagnosticSink for WriterSink<W> {
    fn write_text(&mut self, text: &str) -> CalibResult<()> {
        self.0.write_all(text.as_bytes())?;
        self.0.write_all(b"\n")?;
        self.0.flush()?;
        Ok(())
    }
}

pub struct FileSink {
    pub path: PathBuf,
}

impl DiagnosticSink for FileSink {
    fn write_text(&mut self, text: &str) -> CalibResult<()> {
        std::fs::write(&self.path, text)
            .map_err(|e| CalibError::Export(format!("{}: {e}", self.path.display())))?;
        tracing::info!(path = %self.path.display(), "diagnostics written");
        Ok(())
    }
}

/// Transient status shown after an export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ExportStatus {
    Copied,
    Failed(String),
}

/// Export never fails outward; problems come back as [`ExportStatus::Failed`].
pub fn export_diagnostics(
    snapshot: &DiagnosticSnapshot,
    sink: &mut dyn DiagnosticSink,
) -> ExportStatus {
    let result = snapshot.to_text().and_then(|text| sink.write_text(&text));
    match result {
        Ok(()) => ExportStatus::Copied,
        Err(e) => {
            tracing::warn!(error = %e, "diagnostics export failed");
            ExportStatus::Failed(e.to_string())
        }
    }
}
