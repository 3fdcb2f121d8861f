use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CalibError;

/// Side length of the canonical square frame.
pub const CANONICAL_MAX: f64 = 1000.0;

/// Axis-aligned rectangle in some coordinate frame.
///
/// Deserializes from either `{"ymin":..,"xmin":..,"ymax":..,"xmax":..}` or the
/// `[ymin, xmin, ymax, xmax]` array vision models tend to emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoxRepr")]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoxRepr {
    Object {
        ymin: f64,
        xmin: f64,
        ymax: f64,
        xmax: f64,
    },
    Array([f64; 4]),
}

impl From<BoxRepr> for BoundingBox {
    fn from(repr: BoxRepr) -> Self {
        match repr {
            BoxRepr::Object {
                ymin,
                xmin,
                ymax,
                xmax,
            } => Self::new(xmin, ymin, xmax, ymax),
            BoxRepr::Array([ymin, xmin, ymax, xmax]) => Self::new(xmin, ymin, xmax, ymax),
        }
    }
}

impl BoundingBox {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// The four coordinates in `[xmin, ymin, xmax, ymax]` order.
    pub fn coords(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Applies `f` to the x pair and `g` to the y pair.
    pub fn map_axes(&self, f: impl Fn(f64) -> f64, g: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.xmin), g(self.ymin), f(self.xmax), g(self.ymax))
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x {:.1}..{:.1}, y {:.1}..{:.1}",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Numeric convention a whole rectangle batch is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    #[serde(rename = "unit")]
    Unit,
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "normalized-1000")]
    Normalized1000,
    #[serde(rename = "pixel")]
    Pixel,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Frame {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frame::Unit => "unit",
            Frame::Percent => "percent",
            Frame::Normalized1000 => "normalized-1000",
            Frame::Pixel => "pixel",
            Frame::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalizing resize the producer of a batch is assumed to have reasoned under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometricMode {
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "letterbox")]
    Letterbox,
    #[serde(rename = "fitMax")]
    FitMax,
    #[serde(rename = "cover")]
    Cover,
}

impl GeometricMode {
    pub const ALL: [GeometricMode; 4] = [
        GeometricMode::Raw,
        GeometricMode::Letterbox,
        GeometricMode::FitMax,
        GeometricMode::Cover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometricMode::Raw => "raw",
            GeometricMode::Letterbox => "letterbox",
            GeometricMode::FitMax => "fitMax",
            GeometricMode::Cover => "cover",
        }
    }
}

impl fmt::Display for GeometricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural pixel size of the decoded source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: f64,
    pub height: f64,
}

impl ImageDescriptor {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn longer_side(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// On-screen box the image element currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderDescriptor {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderDescriptor {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A box anchored at the origin, e.g. the image drawn at natural size.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Identity of one image decode. Derived state is keyed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(uuid::Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator choice for the scale convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScaleOverride {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "unit")]
    Unit,
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "normalized-1000", alias = "normalized", alias = "1000")]
    Normalized1000,
    #[serde(rename = "pixel")]
    Pixel,
}

impl ScaleOverride {
    pub fn frame(&self) -> Option<Frame> {
        match self {
            ScaleOverride::Auto => None,
            ScaleOverride::Unit => Some(Frame::Unit),
            ScaleOverride::Percent => Some(Frame::Percent),
            ScaleOverride::Normalized1000 => Some(Frame::Normalized1000),
            ScaleOverride::Pixel => Some(Frame::Pixel),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.frame().map_or("auto", |f| f.as_str())
    }
}

impl FromStr for ScaleOverride {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ScaleOverride::Auto),
            "unit" => Ok(ScaleOverride::Unit),
            "percent" => Ok(ScaleOverride::Percent),
            "normalized-1000" | "normalized" | "1000" => Ok(ScaleOverride::Normalized1000),
            "pixel" | "px" => Ok(ScaleOverride::Pixel),
            _ => Err(CalibError::InvalidOverride {
                kind: "scale",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ScaleOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator choice for the geometric mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModeOverride {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "letterbox")]
    Letterbox,
    #[serde(rename = "fitMax", alias = "fit-max", alias = "fitmax")]
    FitMax,
    #[serde(rename = "cover")]
    Cover,
}

impl ModeOverride {
    pub fn mode(&self) -> Option<GeometricMode> {
        match self {
            ModeOverride::Auto => None,
            ModeOverride::Raw => Some(GeometricMode::Raw),
            ModeOverride::Letterbox => Some(GeometricMode::Letterbox),
            ModeOverride::FitMax => Some(GeometricMode::FitMax),
            ModeOverride::Cover => Some(GeometricMode::Cover),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.mode().map_or("auto", |m| m.as_str())
    }
}

impl FromStr for ModeOverride {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ModeOverride::Auto),
            "raw" => Ok(ModeOverride::Raw),
            "letterbox" => Ok(ModeOverride::Letterbox),
            "fitmax" | "fit-max" | "fit_max" => Ok(ModeOverride::FitMax),
            "cover" => Ok(ModeOverride::Cover),
            _ => Err(CalibError::InvalidOverride {
                kind: "mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ModeOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of operator overrides fed into a classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default)]
    pub scale: ScaleOverride,
    #[serde(default)]
    pub mode: ModeOverride,
}

impl OverrideSet {
    pub fn new(scale: ScaleOverride, mode: ModeOverride) -> Self {
        Self { scale, mode }
    }

    pub fn is_auto(&self) -> bool {
        self.scale == ScaleOverride::Auto && self.mode == ModeOverride::Auto
    }
}
