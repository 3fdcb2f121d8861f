/// Render mapper: canonical rectangles → on-screen pixel rectangles.
///
/// The UI side owns a [`LayoutObserver`] and reports the image element's
/// box on every layout change; the [`RenderMapper`] end reads the latest
/// report. Classification never runs here.
use serde::Serialize;
use tokio::sync::watch;

use crate::calibration::types::{BoundingBox, ImageId, RenderDescriptor, CANONICAL_MAX};

/// Hit regions are widened to at least this many pixels per axis so that
/// degenerate rectangles stay selectable.
pub const MIN_HIT_SPAN: f64 = 8.0;

pub const STROKE_WIDTH: f64 = 3.0;
pub const SELECTED_STROKE_WIDTH: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Inclusive containment over the widened hit region.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let grow_x = ((MIN_HIT_SPAN - self.width) / 2.0).max(0.0);
        let grow_y = ((MIN_HIT_SPAN - self.height) / 2.0).max(0.0);
        x >= self.left - grow_x
            && x <= self.right() + grow_x
            && y >= self.top - grow_y
            && y <= self.bottom() + grow_y
    }
}

/// Map a canonical rectangle onto the rendered image box.
pub fn to_pixels(rect: &BoundingBox, render: &RenderDescriptor) -> PixelRect {
    let sx = render.width / CANONICAL_MAX;
    let sy = render.height / CANONICAL_MAX;
    PixelRect {
        left: render.left + rect.xmin * sx,
        top: render.top + rect.ymin * sy,
        width: rect.width() * sx,
        height: rect.height() * sy,
    }
}

/// Index of the topmost (last drawn) rectangle containing the pointer.
pub fn hit_test(rects: &[PixelRect], x: f64, y: f64) -> Option<usize> {
    rects.iter().rposition(|r| r.contains(x, y))
}

/// One drawable overlay entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayShape {
    pub problem_id: String,
    pub rect: PixelRect,
    pub is_correct: bool,
    pub selected: bool,
    pub stroke_width: f64,
}

impl OverlayShape {
    pub fn new(problem_id: &str, rect: PixelRect, is_correct: bool, selected: bool) -> Self {
        Self {
            problem_id: problem_id.to_string(),
            rect,
            is_correct,
            selected,
            stroke_width: if selected {
                SELECTED_STROKE_WIDTH
            } else {
                STROKE_WIDTH
            },
        }
    }
}

/// A render box measured for a particular image decode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutReport {
    pub image_id: ImageId,
    pub render: RenderDescriptor,
}

/// Create a connected observer/mapper pair.
pub fn layout_channel() -> (LayoutObserver, RenderMapper) {
    let (tx, rx) = watch::channel(None);
    (LayoutObserver { tx }, RenderMapper { rx })
}

/// Publishing side, driven by resize/reflow notifications.
#[derive(Debug)]
pub struct LayoutObserver {
    tx: watch::Sender<Option<LayoutReport>>,
}

impl LayoutObserver {
    pub fn report(&self, image_id: ImageId, render: RenderDescriptor) {
        tracing::trace!(%image_id, width = render.width, height = render.height, "layout changed");
        self.tx.send_replace(Some(LayoutReport { image_id, render }));
    }

    /// The image element left the layout.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> RenderMapper {
        RenderMapper {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderMapper {
    rx: watch::Receiver<Option<LayoutReport>>,
}

impl RenderMapper {
    pub fn latest(&self) -> Option<LayoutReport> {
        *self.rx.borrow()
    }

    /// Latest render box, but only if it was measured for `image_id`.
    pub fn render_for(&self, image_id: ImageId) -> Option<RenderDescriptor> {
        self.latest()
            .filter(|report| report.image_id == image_id)
            .map(|report| report.render)
    }

    /// Wait for the next layout report. Returns `false` once the observer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    pub fn map(&self, image_id: ImageId, rects: &[BoundingBox]) -> Option<Vec<PixelRect>> {
        let render = self.render_for(image_id)?;
        Some(rects.iter().map(|r| to_pixels(r, &render)).collect())
    }
}
