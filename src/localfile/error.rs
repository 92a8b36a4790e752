use thiserror::Error;

/// Failures surfaced by the import pipeline, the thumbnail generator and the
/// reconciliation pass.
#[derive(Debug, Error)]
pub enum LocalFileError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("File picker was cancelled")]
    PickerCancelled,

    #[error("File picker was denied: {0}")]
    PickerDenied(String),

    #[error("{0}")]
    PickerUnsupported(String),

    #[error("Handle store failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("Read permission not granted for {0}")]
    PermissionNotGranted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LocalFileError {
    pub(crate) fn decode(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Cancellation is a benign outcome of the picker, not a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::PickerCancelled)
    }
}

pub type Result<T, E = LocalFileError> = std::result::Result<T, E>;
