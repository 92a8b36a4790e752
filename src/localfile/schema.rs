use serde::{Deserialize, Serialize};

/// Media category of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageType {
    Image,
    AnimatedImage,
    Video,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::AnimatedImage => "animated-image",
            Self::Video => "video",
        }
    }
}

/// Where an image record's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageService {
    Local,
    E621,
    Booru,
}

/// One entry of the application-wide image list.
///
/// For local records `preview` and `full` are ephemeral `blob:` URLs that only
/// resolve inside the process that minted them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// Data URL of the thumbnail; empty until the background task finishes.
    #[serde(default)]
    pub thumbnail: String,
    pub preview: String,
    pub full: String,
    #[serde(rename = "type")]
    pub kind: ImageType,
    pub source: String,
    pub service: ImageService,
}

impl ImageRecord {
    /// A freshly imported local record whose thumbnail is still pending.
    pub fn local(id: String, url: String, kind: ImageType, source: String) -> Self {
        Self {
            id,
            thumbnail: String::new(),
            preview: url.clone(),
            full: url,
            kind,
            source,
            service: ImageService::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self.service == ImageService::Local
    }
}

/// One file registered by an import batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    pub id: String,
    pub name: String,
    /// False when the handle could not be written to the handle store; the
    /// record is usable for this session but will not survive a restart.
    pub persisted: bool,
}

/// One file an import batch could not register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one import batch. Every file settles; failures never abort siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<ImportedFile>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.imported.is_empty() && self.failures.is_empty()
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records whose preview/full URLs were replaced.
    pub refreshed: Vec<String>,
    /// Local records with no persisted handle.
    pub skipped: Vec<String>,
    /// Records whose handle is no longer readable.
    pub denied: Vec<String>,
    /// Records whose handle was readable but could not be resolved to a file.
    pub failed: Vec<String>,
    /// True when the pass stopped at the first denied record.
    pub halted: bool,
}
