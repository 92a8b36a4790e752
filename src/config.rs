use anyhow::{Context, Result};
use directories::ProjectDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Directory holding the handle database and the image list. `~` is expanded.
    pub data_dir: String,
    pub thumbnail: ThumbnailConfig,
    pub import: ImportConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Length of the longer thumbnail side in pixels.
    pub size: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Playback position of the frame used for video thumbnails.
    pub video_seek_secs: f64,
    /// Path or name of the ffmpeg binary.
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ImportConfig {
    /// Directories nested deeper than this below a dropped directory are skipped.
    pub max_directory_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReconcileConfig {
    pub on_denied: DeniedPolicy,
}

/// What reconciliation does when a handle is no longer readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeniedPolicy {
    /// Stop the pass at the first denied record.
    #[default]
    Halt,
    /// Refresh every readable record and report the denied ones together.
    Continue,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            thumbnail: ThumbnailConfig::default(),
            import: ImportConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: 512,
            jpeg_quality: 80,
            video_seek_secs: 1.0,
            ffmpeg_path: "ffmpeg".into(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_directory_depth: 64,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            on_denied: DeniedPolicy::Halt,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "localfile")
}

fn default_data_dir() -> String {
    project_dirs()
        .map(|dirs| dirs.data_dir().display().to_string())
        .unwrap_or_else(|| "~/.localfile".into())
}

impl Config {
    /// Default location of `config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(p) => p,
            None => return Ok(Self::default()),
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml(&raw)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }

    pub fn handle_db_path(&self) -> PathBuf {
        self.data_dir().join("localfile.db")
    }

    pub fn images_path(&self) -> PathBuf {
        self.data_dir().join("images.json")
    }

    pub fn json_schema() -> Result<String> {
        Ok(serde_json::to_string_pretty(&schemars::schema_for!(Config))?)
    }
}
