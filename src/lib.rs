pub mod config;
pub mod localfile;

pub use config::Config;
#[cfg(feature = "native-picker")]
pub use localfile::RfdPicker;
pub use localfile::{
    FilePicker, HandleStore, ImageList, ImageRecord, ImageService, ImageType, ImportReport,
    LocalFileError, LocalFileService, LogNotifier, Notice, Notifier, ReconcileReport,
};
