use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bounding-box calibration for homework analysis overlays.
#[derive(Parser, Debug)]
#[command(name = "overlay-calib", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Calibrate the rectangles of an analysis result and print the overlay as JSON
    Calibrate(CalibrateArgs),

    /// Show or change the persisted overrides
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct CalibrateArgs {
    /// Analysis result: JSON, or free model text containing a JSON object
    #[arg(long, value_name = "FILE")]
    pub result: PathBuf,

    /// Source image; its natural size drives the geometric modes
    #[arg(long, value_name = "FILE", conflicts_with = "image_size")]
    pub image: Option<PathBuf>,

    /// Natural image size when the image itself is not at hand
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub image_size: Option<(f64, f64)>,

    /// On-screen size of the rendered image (defaults to the natural size)
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub render_size: Option<(f64, f64)>,

    /// Scale override: auto, unit, percent, normalized-1000, pixel
    #[arg(long, value_name = "SCALE")]
    pub scale: Option<String>,

    /// Mode override: auto, raw, letterbox, fitMax, cover
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Overrides as a query string, e.g. "scale=pixel&mode=cover"
    #[arg(long, value_name = "QUERY")]
    pub query: Option<String>,

    /// Select the topmost problem under this render-space point
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub pick: Option<(f64, f64)>,

    /// Write the image with the overlay burned in (requires --image)
    #[arg(long, value_name = "OUT.png", requires = "image")]
    pub annotate: Option<PathBuf>,

    /// Export a diagnostic snapshot to FILE, or stderr when no FILE is given
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    pub diagnostics: Option<Option<PathBuf>>,
}

#[derive(Subcommand, Debug)]
pub enum PrefsAction {
    /// Print the persisted overrides and where they were read from
    Show,

    /// Persist overrides; omitted values are left unchanged
    Set {
        #[arg(long, value_name = "SCALE")]
        scale: Option<String>,
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,
    },

    /// Reset both overrides to auto
    Reset,
}

fn parse_pair(s: &str, sep: char, what: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(sep)
        .ok_or_else(|| format!("expected {what}"))?;
    let a: f64 = a.trim().parse().map_err(|e| format!("{what}: {e}"))?;
    let b: f64 = b.trim().parse().map_err(|e| format!("{what}: {e}"))?;
    Ok((a, b))
}

fn parse_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = parse_pair(&s.to_ascii_lowercase(), 'x', "WxH")?;
    if w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite() {
        Ok((w, h))
    } else {
        Err(format!("size must be positive, got {s}"))
    }
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    parse_pair(s, ',', "X,Y")
}
