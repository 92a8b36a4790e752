//! Local file import, handle persistence and startup reconciliation.
//!
//! Imported files become image records immediately; thumbnails follow in the
//! background. File handles are kept in a SQLite store so the records can be
//! re-resolved after a restart.

pub mod classify;
pub mod error;
pub mod handle;
pub mod handle_store;
pub mod images;
pub mod import;
pub mod notify;
pub mod object_url;
pub mod picker;
pub mod reconcile;
pub mod schema;
pub mod service;
pub mod thumbnail;

pub use classify::{classify, guess_mime_type, SUPPORTED_TYPES};
pub use error::LocalFileError;
pub use handle::{DirectoryHandle, FileHandle, FsHandle, LocalFile, PermissionState};
pub use handle_store::HandleStore;
pub use images::ImageList;
pub use import::expand_dropped;
pub use notify::{LogNotifier, Notice, Notifier};
pub use object_url::ObjectUrlRegistry;
pub use picker::{FilePicker, PickerFilter, PickerOptions};
#[cfg(feature = "native-picker")]
pub use picker::RfdPicker;
pub use schema::{
    ImageRecord, ImageService, ImageType, ImportFailure, ImportReport, ImportedFile,
    ReconcileReport,
};
pub use service::LocalFileService;
pub use thumbnail::{FfmpegFrameDecoder, FrameDecoder, ThumbnailGenerator, THUMBNAIL_SIZE};
