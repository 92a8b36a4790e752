use super::classify::SUPPORTED_TYPES;
use super::error::Result;
use super::handle::FileHandle;
use async_trait::async_trait;

/// One extension filter shown by the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerFilter {
    pub description: String,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOptions {
    pub multiple: bool,
    pub filters: Vec<PickerFilter>,
}

impl PickerOptions {
    /// Multi-select restricted to the supported media extensions.
    pub fn supported_media() -> Self {
        Self {
            multiple: true,
            filters: SUPPORTED_TYPES
                .iter()
                .map(|(description, extensions)| PickerFilter {
                    description: (*description).to_string(),
                    extensions: extensions
                        .iter()
                        .map(|e| e.trim_start_matches('.').to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Native multi-file picker.
///
/// `pick` resolves to `LocalFileError::PickerCancelled` when the user closes
/// the dialog and to `LocalFileError::PickerDenied` when the platform refuses
/// to show it.
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// `None` when pickers work here, otherwise why they don't.
    fn unsupported_reason(&self) -> Option<String> {
        None
    }

    async fn pick(&self, options: &PickerOptions) -> Result<Vec<FileHandle>>;
}

/// Desktop file dialog backed by `rfd`.
#[cfg(feature = "native-picker")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RfdPicker;

#[cfg(feature = "native-picker")]
#[async_trait]
impl FilePicker for RfdPicker {
    async fn pick(&self, options: &PickerOptions) -> Result<Vec<FileHandle>> {
        use super::error::LocalFileError;

        let mut dialog = rfd::AsyncFileDialog::new().set_title("Import local files");
        for filter in &options.filters {
            dialog = dialog.add_filter(filter.description.as_str(), filter.extensions.as_slice());
        }
        let picked = if options.multiple {
            dialog.pick_files().await
        } else {
            dialog.pick_file().await.map(|f| vec![f])
        };
        match picked {
            Some(files) => Ok(files.iter().map(|f| FileHandle::new(f.path())).collect()),
            None => Err(LocalFileError::PickerCancelled),
        }
    }
}
