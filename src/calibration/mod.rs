pub mod annotator;
pub mod diagnostics;
pub mod geometry;
pub mod letterbox;
pub mod mode;
pub mod pipeline;
pub mod render;
pub mod scale;
pub mod transform;
pub mod types;

pub use pipeline::{calibrate, Calibration, CalibrationSession};
pub use render::{
    layout_channel, LayoutObserver, LayoutReport, OverlayShape, PixelRect, RenderMapper,
};
pub use types::{
    BoundingBox, Frame, GeometricMode, ImageDescriptor, ImageId, ModeOverride, OverrideSet,
    RenderDescriptor, ScaleOverride, CANONICAL_MAX,
};
