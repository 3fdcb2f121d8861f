use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calibration::types::{ModeOverride, OverrideSet, ScaleOverride};
use crate::errors::{CalibError, CalibResult};

const PREFERENCES_FILE: &str = "preferences.toml";
const APP_DIR: &str = "overlay-calib";

pub const SCALE_ENV: &str = "OVERLAY_CALIB_SCALE";
pub const MODE_ENV: &str = "OVERLAY_CALIB_MODE";

/// Persisted operator preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Preferences {
    pub overrides: OverrideSet,
}

/// On-disk shape. Unrecognized values load as `auto`.
#[derive(Debug, Default, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    overrides: StoredOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct StoredOverrides {
    scale: Option<String>,
    mode: Option<String>,
}

impl From<StoredPreferences> for Preferences {
    fn from(stored: StoredPreferences) -> Self {
        Preferences {
            overrides: lenient_overrides(
                stored.overrides.scale.as_deref(),
                stored.overrides.mode.as_deref(),
            ),
        }
    }
}

// ── Override parsing ────────────────────────────────────────────────────────

/// Parse a scale/mode pair, warning about and dropping anything unrecognized.
pub fn lenient_overrides(scale: Option<&str>, mode: Option<&str>) -> OverrideSet {
    let scale = scale
        .map(|s| {
            s.parse::<ScaleOverride>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring scale override");
                ScaleOverride::Auto
            })
        })
        .unwrap_or_default();
    let mode = mode
        .map(|m| {
            m.parse::<ModeOverride>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring mode override");
                ModeOverride::Auto
            })
        })
        .unwrap_or_default();
    OverrideSet::new(scale, mode)
}

/// One-shot overrides from a query string such as `scale=pixel&mode=cover`.
/// A leading `?` is accepted; unknown keys are ignored.
pub fn overrides_from_query(query: &str) -> OverrideSet {
    let query = query.trim_start_matches('?');
    let mut scale = None;
    let mut mode = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "scale" => scale = Some(value.into_owned()),
            "mode" => mode = Some(value.into_owned()),
            other => tracing::debug!(key = other, "ignoring query parameter"),
        }
    }
    lenient_overrides(scale.as_deref(), mode.as_deref())
}

/// One-shot overrides from [`SCALE_ENV`] / [`MODE_ENV`].
pub fn overrides_from_env() -> OverrideSet {
    overrides_from_lookup(|key| std::env::var(key).ok())
}

fn overrides_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OverrideSet {
    lenient_overrides(lookup(SCALE_ENV).as_deref(), lookup(MODE_ENV).as_deref())
}

/// Stack override layers, highest precedence first. `auto` in a layer defers
/// to the next one down.
pub fn resolve_overrides(layers: &[OverrideSet]) -> OverrideSet {
    let scale = layers
        .iter()
        .map(|l| l.scale)
        .find(|s| *s != ScaleOverride::Auto)
        .unwrap_or_default();
    let mode = layers
        .iter()
        .map(|l| l.mode)
        .find(|m| *m != ModeOverride::Auto)
        .unwrap_or_default();
    OverrideSet::new(scale, mode)
}

// ── Preferences file ────────────────────────────────────────────────────────

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            paths.push(parent.join(PREFERENCES_FILE));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(PREFERENCES_FILE));
    }
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR).join(PREFERENCES_FILE));
    }
    paths
}

/// First existing preferences file: next to the executable, then the
/// working directory, then the per-user config directory.
pub fn resolve_preferences_path() -> Option<PathBuf> {
    let found = candidate_paths().into_iter().find(|p| p.exists());
    if let Some(path) = &found {
        tracing::debug!(path = %path.display(), "preferences found");
    }
    found
}

fn user_preferences_path() -> CalibResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(PREFERENCES_FILE))
        .ok_or_else(|| CalibError::Config("no per-user config directory on this platform".into()))
}

pub fn load_preferences() -> CalibResult<Preferences> {
    match resolve_preferences_path() {
        Some(path) => load_preferences_from(&path),
        None => {
            tracing::debug!("no preferences file; using automatic inference");
            Ok(Preferences::default())
        }
    }
}

/// A missing file yields defaults; a malformed one is an error.
pub fn load_preferences_from(path: &Path) -> CalibResult<Preferences> {
    if !path.exists() {
        return Ok(Preferences::default());
    }
    let content = std::fs::read_to_string(path)?;
    let stored: StoredPreferences = toml::from_str(&content)?;
    let prefs = Preferences::from(stored);
    tracing::info!(
        path = %path.display(),
        scale = %prefs.overrides.scale,
        mode = %prefs.overrides.mode,
        "preferences loaded"
    );
    Ok(prefs)
}

/// Where a save goes: the existing preferences file, or the per-user one.
pub fn preferences_target() -> CalibResult<PathBuf> {
    match resolve_preferences_path() {
        Some(path) => Ok(path),
        None => user_preferences_path(),
    }
}

pub fn save_preferences(prefs: &Preferences) -> CalibResult<PathBuf> {
    let path = preferences_target()?;
    save_preferences_to(&path, prefs)?;
    Ok(path)
}

/// Explicitly set stored overrides. Values parse strictly, so a typo is an
/// error and nothing is written; omitted values keep what is stored.
pub fn update_preferences_at(
    path: &Path,
    scale: Option<&str>,
    mode: Option<&str>,
) -> CalibResult<Preferences> {
    let scale = scale.map(str::parse::<ScaleOverride>).transpose()?;
    let mode = mode.map(str::parse::<ModeOverride>).transpose()?;

    let mut prefs = load_preferences_from(path)?;
    if let Some(scale) = scale {
        prefs.overrides.scale = scale;
    }
    if let Some(mode) = mode {
        prefs.overrides.mode = mode;
    }
    save_preferences_to(path, &prefs)?;
    Ok(prefs)
}

pub fn save_preferences_to(path: &Path, prefs: &Preferences) -> CalibResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(prefs)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "preferences saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_overrides() {
        let set = overrides_from_query("?scale=pixel&mode=cover");
        assert_eq!(set, OverrideSet::new(ScaleOverride::Pixel, ModeOverride::Cover));

        let set = overrides_from_query("mode=fit-max&lang=en");
        assert_eq!(set, OverrideSet::new(ScaleOverride::Auto, ModeOverride::FitMax));
    }

    #[test]
    fn unrecognized_values_fall_back_to_auto() {
        let set = overrides_from_query("scale=furlongs&mode=LETTERBOX");
        assert_eq!(set, OverrideSet::new(ScaleOverride::Auto, ModeOverride::Letterbox));
    }

    #[test]
    fn env_lookup_reads_both_keys() {
        let set = overrides_from_lookup(|key| match key {
            SCALE_ENV => Some("1000".into()),
            MODE_ENV => Some("raw".into()),
            _ => None,
        });
        assert_eq!(set, OverrideSet::new(ScaleOverride::Normalized1000, ModeOverride::Raw));
        assert!(overrides_from_lookup(|_| None).is_auto());
    }

    #[test]
    fn one_shot_beats_persisted_and_auto_defers() {
        let one_shot = OverrideSet::new(ScaleOverride::Auto, ModeOverride::Cover);
        let persisted = OverrideSet::new(ScaleOverride::Percent, ModeOverride::Letterbox);
        assert_eq!(
            resolve_overrides(&[one_shot, persisted]),
            OverrideSet::new(ScaleOverride::Percent, ModeOverride::Cover)
        );
        assert!(resolve_overrides(&[OverrideSet::default(), OverrideSet::default()]).is_auto());
        assert!(resolve_overrides(&[]).is_auto());
    }

    #[test]
    fn preferences_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PREFERENCES_FILE);
        let prefs = Preferences {
            overrides: OverrideSet::new(ScaleOverride::Pixel, ModeOverride::FitMax),
        };
        save_preferences_to(&path, &prefs).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("scale = \"pixel\""));
        assert!(written.contains("mode = \"fitMax\""));
        assert_eq!(load_preferences_from(&path).unwrap(), prefs);
    }

    #[test]
    fn explicit_set_rejects_typos_and_keeps_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        let stored = Preferences {
            overrides: OverrideSet::new(ScaleOverride::Pixel, ModeOverride::Auto),
        };
        save_preferences_to(&path, &stored).unwrap();

        let err = update_preferences_at(&path, Some("furlongs"), None).unwrap_err();
        assert!(matches!(err, CalibError::InvalidOverride { kind: "scale", .. }));
        let err = update_preferences_at(&path, None, Some("zoom")).unwrap_err();
        assert!(matches!(err, CalibError::InvalidOverride { kind: "mode", .. }));
        assert_eq!(load_preferences_from(&path).unwrap(), stored);

        let updated = update_preferences_at(&path, None, Some("cover")).unwrap();
        assert_eq!(updated.overrides, OverrideSet::new(ScaleOverride::Pixel, ModeOverride::Cover));
        assert_eq!(load_preferences_from(&path).unwrap(), updated);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = load_preferences_from(&dir.path().join(PREFERENCES_FILE)).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn hand_edited_typo_degrades_to_auto() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "[overrides]\nscale = \"percent\"\nmode = \"zoom\"\n").unwrap();
        let prefs = load_preferences_from(&path).unwrap();
        assert_eq!(prefs.overrides, OverrideSet::new(ScaleOverride::Percent, ModeOverride::Auto));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "[overrides\n").unwrap();
        assert!(matches!(load_preferences_from(&path), Err(CalibError::TomlDe(_))));
    }
}
