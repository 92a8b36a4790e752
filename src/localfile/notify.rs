use super::schema::ImportFailure;
use std::fmt;

/// A user-facing message raised by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Some files of an import batch could not be registered.
    ImportFailed(Vec<ImportFailure>),
    PickerDenied(String),
    ThumbnailFailed { name: String, error: String },
    /// Reconciliation found handles that are no longer readable.
    PermissionNotGranted { denied: usize, halted: bool },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImportFailed(failures) => {
                write!(f, "Error importing {} file(s):", failures.len())?;
                for failure in failures {
                    write!(f, "\n  {}: {}", failure.name, failure.error)?;
                }
                Ok(())
            }
            Self::PickerDenied(reason) => write!(f, "Error importing file: {reason}"),
            Self::ThumbnailFailed { name, error } => {
                write!(f, "Could not create a thumbnail for {name}: {error}")
            }
            Self::PermissionNotGranted { .. } => f.write_str(
                "Some local files could not be loaded after the app was reloaded. \
                 Allow the app to always read local files.",
            ),
        }
    }
}

/// Sink for user-facing notices. Implementations must not block for long;
/// notices are raised from inside the pipeline.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Routes notices to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::warn!("{notice}");
    }
}
