use super::error::{LocalFileError, Result};
use super::handle_store::HandleStore;
use super::images::ImageList;
use super::notify::{LogNotifier, Notifier};
use super::object_url::ObjectUrlRegistry;
use super::thumbnail::{FfmpegFrameDecoder, FrameDecoder, ThumbnailGenerator};
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Entry point for importing, reconciling and removing local files.
///
/// Cheap to clone; clones share the store, the URL registry, the image list
/// and the background thumbnail tasks.
#[derive(Clone)]
pub struct LocalFileService {
    pub(super) store: Arc<HandleStore>,
    pub(super) urls: Arc<ObjectUrlRegistry>,
    pub(super) images: ImageList,
    pub(super) thumbnails: Arc<ThumbnailGenerator>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) tasks: TaskTracker,
    pub(super) config: Config,
}

impl LocalFileService {
    pub fn new(store: HandleStore, images: ImageList, config: Config) -> Self {
        let frames = Arc::new(FfmpegFrameDecoder::new(&config.thumbnail.ffmpeg_path));
        Self::with_frame_decoder(store, images, config, frames)
    }

    pub fn with_frame_decoder(
        store: HandleStore,
        images: ImageList,
        config: Config,
        frames: Arc<dyn FrameDecoder>,
    ) -> Self {
        let urls = Arc::new(ObjectUrlRegistry::new());
        let seek = Duration::try_from_secs_f64(config.thumbnail.video_seek_secs)
            .unwrap_or(super::thumbnail::DEFAULT_VIDEO_SEEK);
        let thumbnails = ThumbnailGenerator::new(Arc::clone(&urls), frames)
            .with_size(config.thumbnail.size)
            .with_quality(config.thumbnail.jpeg_quality)
            .with_video_seek(seek);
        Self {
            store: Arc::new(store),
            urls,
            images,
            thumbnails: Arc::new(thumbnails),
            notifier: Arc::new(LogNotifier),
            tasks: TaskTracker::new(),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn images(&self) -> &ImageList {
        &self.images
    }

    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    pub fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.urls
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drop a record from the image list. For local records the ephemeral URL
    /// is revoked and the persisted handle deleted. Returns false if no record
    /// had this id.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut removed = None;
        self.images.update(|mut images| {
            if let Some(pos) = images.iter().position(|r| r.id == id) {
                removed = Some(images.remove(pos));
            }
            images
        });
        let Some(record) = removed else {
            return Ok(false);
        };

        if record.is_local() {
            self.urls.revoke(&record.full);
            if record.preview != record.full {
                self.urls.revoke(&record.preview);
            }
            self.store
                .delete(id)
                .await
                .map_err(LocalFileError::Storage)?;
        }
        debug!(%id, source = %record.source, "Removed image");
        Ok(true)
    }

    /// Wait for every background thumbnail task started so far.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

impl std::fmt::Debug for LocalFileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileService")
            .field("images", &self.images)
            .field("object_urls", &self.urls.len())
            .field("pending_thumbnails", &self.tasks.len())
            .finish()
    }
}
