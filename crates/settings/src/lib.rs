use curve_api::{CurveKind, CurveSampling};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "markups";
const APPLICATION: &str = "markups";
const SETTINGS_FILE: &str = "settings.json";

/// Label format used when nothing else is configured: list name, dash, number.
pub const DEFAULT_LABEL_FORMAT: &str = "%N-%d";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unable to resolve platform config directory")]
    MissingProjectDirs,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupsSettings {
    pub labels: LabelSettings,
    pub curve: CurveSettings,
    pub placement: PlacementSettings,
    pub display: DisplaySettings,
}

/// Automatic control point naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    /// printf-like template: `%N` is the list name, `%d` the point number
    /// (width and zero flag allowed, as in `%03d`)
    pub format: String,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            format: DEFAULT_LABEL_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveSettings {
    pub kind: CurveKind,
    /// Generated points per segment between two control points
    pub points_per_segment: u32,
    /// Whether new curves connect the last control point back to the first
    pub closed: bool,
}

impl Default for CurveSettings {
    fn default() -> Self {
        Self {
            kind: CurveKind::default(),
            points_per_segment: CurveSampling::default().points_per_segment,
            closed: false,
        }
    }
}

impl CurveSettings {
    pub fn sampling(&self) -> CurveSampling {
        CurveSampling {
            points_per_segment: self.points_per_segment,
        }
    }
}

/// Advisory limits for interactive placement. 0 = no preference / unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub required_control_points: usize,
    pub maximum_control_points: usize,
}

/// Defaults handed to newly created markups display properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Glyph size relative to the view
    pub glyph_scale: f64,
    pub text_scale: f64,
    /// RGB color (0.0 - 1.0)
    pub selected_color: [f32; 3],
    /// RGB color (0.0 - 1.0)
    pub unselected_color: [f32; 3],
    pub line_thickness: f64,
    pub opacity: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            glyph_scale: 3.0,
            text_scale: 3.0,
            selected_color: [1.0, 0.5, 0.5],
            unselected_color: [1.0, 1.0, 0.4],
            line_thickness: 0.2,
            opacity: 1.0,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self, SettingsError> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or(SettingsError::MissingProjectDirs)?;
        let config_dir = dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        let path = config_dir.join(SETTINGS_FILE);
        Ok(Self { path })
    }

    /// Store backed by an explicit file, e.g. one passed on the command line.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<MarkupsSettings, SettingsError> {
        if !self.path.exists() {
            return Ok(MarkupsSettings::default());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let settings = serde_json::from_reader(reader)?;
        Ok(settings)
    }

    pub fn save(&self, settings: &MarkupsSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, settings)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clone for SettingsStore {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("markups-settings-{}-{name}", std::process::id()))
            .join(SETTINGS_FILE)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let store = SettingsStore::at_path(scratch_path("missing"));
        assert_eq!(store.load().unwrap(), MarkupsSettings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = scratch_path("roundtrip");
        let store = SettingsStore::at_path(&path);
        let mut settings = MarkupsSettings::default();
        settings.labels.format = "P%d".to_string();
        settings.curve.kind = CurveKind::CatmullRom;
        settings.placement.maximum_control_points = 2;
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: MarkupsSettings =
            serde_json::from_str(r#"{ "curve": { "kind": "CatmullRom" } }"#).unwrap();
        assert_eq!(parsed.curve.kind, CurveKind::CatmullRom);
        assert_eq!(parsed.curve.points_per_segment, 10);
        assert_eq!(parsed.labels.format, DEFAULT_LABEL_FORMAT);
    }
}
