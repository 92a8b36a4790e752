use super::classify::classify;
use super::error::{LocalFileError, Result};
use super::handle::{DirectoryHandle, FileHandle, FsHandle, LocalFile};
use super::notify::Notice;
use super::picker::{FilePicker, PickerOptions};
use super::schema::{ImageRecord, ImportFailure, ImportReport, ImportedFile};
use super::service::LocalFileService;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

impl LocalFileService {
    /// Show the picker and import the chosen files. A cancelled picker is an
    /// empty report, not an error.
    pub async fn import_from_picker(&self, picker: &dyn FilePicker) -> Result<ImportReport> {
        if let Some(reason) = picker.unsupported_reason() {
            return Err(LocalFileError::PickerUnsupported(reason));
        }
        match picker.pick(&PickerOptions::supported_media()).await {
            Ok(handles) => Ok(self.import_files(handles).await),
            Err(e) if e.is_benign() => {
                debug!("File picker cancelled");
                Ok(ImportReport::default())
            }
            Err(e) => {
                self.notifier.notify(&Notice::PickerDenied(e.to_string()));
                Err(e)
            }
        }
    }

    /// Import dropped paths; directories are expanded.
    pub async fn import_paths<I>(&self, paths: I) -> ImportReport
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let mut dropped = Vec::new();
        let mut failures = Vec::new();
        for path in paths {
            let path = path.into();
            match FsHandle::from_path(&path).await {
                Ok(handle) => dropped.push(handle),
                Err(e) => failures.push(ImportFailure {
                    name: path.display().to_string(),
                    error: e.to_string(),
                }),
            }
        }
        self.import_dropped_with(dropped, failures).await
    }

    /// Import drop input. Nothing is filtered by extension; unsupported files
    /// fail individually.
    pub async fn import_dropped(&self, dropped: Vec<FsHandle>) -> ImportReport {
        self.import_dropped_with(dropped, Vec::new()).await
    }

    async fn import_dropped_with(
        &self,
        dropped: Vec<FsHandle>,
        mut failures: Vec<ImportFailure>,
    ) -> ImportReport {
        let (files, listing_failures) =
            expand_dropped(dropped, self.config.import.max_directory_depth).await;
        failures.extend(listing_failures);
        self.import_batch(files, failures).await
    }

    /// Register every file concurrently and wait for all of them to settle.
    pub async fn import_files(&self, handles: Vec<FileHandle>) -> ImportReport {
        self.import_batch(handles, Vec::new()).await
    }

    async fn import_batch(
        &self,
        handles: Vec<FileHandle>,
        failures: Vec<ImportFailure>,
    ) -> ImportReport {
        let mut set = JoinSet::new();
        for handle in handles {
            let this = self.clone();
            set.spawn(async move {
                let name = handle.name();
                (name, this.register(handle).await)
            });
        }

        let mut report = ImportReport {
            imported: Vec::new(),
            failures,
        };
        while let Some(joined) = set.join_next().await {
            let (name, error) = match joined {
                Ok((_, Ok(imported))) => {
                    report.imported.push(imported);
                    continue;
                }
                Ok((name, Err(e))) => (name, e.to_string()),
                Err(e) => ("<unknown>".to_string(), format!("import task failed: {e}")),
            };
            warn!(file = %name, %error, "Import failed");
            report.failures.push(ImportFailure { name, error });
        }

        info!(
            imported = report.imported.len(),
            failed = report.failures.len(),
            "Import batch settled"
        );
        if !report.failures.is_empty() {
            self.notifier.notify(&Notice::ImportFailed(report.failures.clone()));
        }
        report
    }

    async fn register(&self, handle: FileHandle) -> Result<ImportedFile> {
        let file = handle.get_file().await?;
        let url = self.urls.create(file.clone());
        let id = Uuid::new_v4().to_string();

        let kind = match classify(&file.mime_type) {
            Ok(kind) => kind,
            Err(e) => {
                self.urls.revoke(&url);
                return Err(e);
            }
        };

        let record = ImageRecord::local(id.clone(), url, kind, file.name.clone());
        self.images.update(|mut images| {
            images.push(record);
            images
        });
        debug!(%id, file = %file.name, "Registered local file");

        let persisted = match self.store.set(&id, &handle).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    %id,
                    file = %file.name,
                    error = %format!("{e:#}"),
                    "Handle not persisted; the file will not survive a restart"
                );
                false
            }
        };

        let name = file.name.clone();
        self.spawn_thumbnail(id.clone(), file);
        Ok(ImportedFile { id, name, persisted })
    }

    fn spawn_thumbnail(&self, id: String, file: LocalFile) {
        let this = self.clone();
        self.tasks.spawn(async move {
            match this.thumbnails.generate(&file).await {
                Ok(thumbnail) => {
                    if !this.images.update_record(&id, |r| r.thumbnail = thumbnail) {
                        debug!(%id, "Record removed before its thumbnail was ready");
                    }
                }
                Err(e) => {
                    warn!(%id, file = %file.name, error = %e, "Thumbnail generation failed");
                    this.notifier.notify(&Notice::ThumbnailFailed {
                        name: file.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        });
    }
}

/// Flatten drop input into file handles, walking directories depth-first.
///
/// Entries that are neither files nor directories are ignored. Directories
/// more than `max_depth` levels below a dropped directory are skipped.
pub async fn expand_dropped(
    dropped: Vec<FsHandle>,
    max_depth: usize,
) -> (Vec<FileHandle>, Vec<ImportFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    let mut pending: Vec<(DirectoryHandle, usize)> = Vec::new();

    for handle in dropped {
        match handle {
            FsHandle::File(file) => files.push(file),
            FsHandle::Directory(dir) => pending.push((dir, 0)),
            FsHandle::Other(path) => debug!(path = %path.display(), "Ignoring dropped entry"),
        }

        while let Some((dir, depth)) = pending.pop() {
            let entries = match dir.entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    failures.push(ImportFailure {
                        name: dir.path().display().to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            for entry in entries {
                match entry {
                    FsHandle::File(file) => files.push(file),
                    FsHandle::Directory(sub) if depth < max_depth => pending.push((sub, depth + 1)),
                    FsHandle::Directory(sub) => {
                        let path = sub.path().display();
                        warn!(path = %path, max_depth, "Directory too deep, skipped");
                    }
                    FsHandle::Other(path) => debug!(path = %path.display(), "Ignoring entry"),
                }
            }
        }
    }
    (files, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::localfile::handle_store::HandleStore;
    use crate::localfile::images::ImageList;
    use crate::localfile::notify::testing::RecordingNotifier;
    use crate::localfile::schema::ImageType;
    use crate::localfile::thumbnail::testing::FixedFrameDecoder;
    use crate::localfile::thumbnail::FrameDecoder;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    fn service_with(
        store: HandleStore,
        frames: Arc<dyn FrameDecoder>,
    ) -> (LocalFileService, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = LocalFileService::with_frame_decoder(
            store,
            ImageList::default(),
            Config::default(),
            frames,
        )
        .with_notifier(notifier.clone());
        (service, notifier)
    }

    fn service() -> (LocalFileService, Arc<RecordingNotifier>) {
        service_with(
            HandleStore::open_in_memory().unwrap(),
            Arc::new(FixedFrameDecoder { width: 640, height: 480 }),
        )
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(64, 32, image::Rgb([1, 2, 3])).save(&path).unwrap();
        path
    }

    /// Blocks every video frame until the test hands out a permit.
    struct GatedFrameDecoder {
        gate: Semaphore,
    }

    #[async_trait]
    impl FrameDecoder for GatedFrameDecoder {
        async fn first_frame(&self, _file: &LocalFile, _at: Duration) -> Result<DynamicImage> {
            self.gate.acquire().await.unwrap().forget();
            Ok(DynamicImage::ImageRgb8(RgbImage::new(100, 50)))
        }
    }

    #[tokio::test]
    async fn one_unsupported_file_does_not_abort_the_batch() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(tmp.path(), "a.png");
        let b = write_png(tmp.path(), "b.png");
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, "hi").unwrap();

        let (service, notifier) = service();
        let report = service
            .import_files(vec![FileHandle::new(a), FileHandle::new(&notes), FileHandle::new(b)])
            .await;
        service.settle().await;

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "notes.txt");
        assert!(report.failures[0].error.contains("text/plain"));
        assert!(report.imported.iter().all(|f| f.persisted));

        let images = service.images().read();
        assert_eq!(images.len(), 2);
        for record in &images {
            assert_eq!(record.kind, ImageType::Image);
            assert_eq!(record.preview, record.full);
            assert!(record.thumbnail.starts_with("data:image/jpeg;base64,"));
            assert!(service.store().get(&record.id).await.unwrap().is_some());
        }
        // Only the two records' own URLs stay alive.
        assert_eq!(service.object_urls().len(), 2);
        assert!(matches!(notifier.taken().as_slice(), [Notice::ImportFailed(f)] if f.len() == 1));
    }

    #[tokio::test]
    async fn undecodable_file_keeps_its_record_without_thumbnail() {
        let tmp = TempDir::new().unwrap();
        let broken = tmp.path().join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();
        let good = write_png(tmp.path(), "good.png");

        let (service, notifier) = service();
        let report = service
            .import_files(vec![FileHandle::new(&broken), FileHandle::new(good)])
            .await;
        service.settle().await;

        assert_eq!(report.imported.len(), 2);
        assert!(report.failures.is_empty());

        let images = service.images().read();
        let broken_record = images.iter().find(|r| r.source == "broken.png").unwrap();
        let good_record = images.iter().find(|r| r.source == "good.png").unwrap();
        assert!(broken_record.thumbnail.is_empty());
        assert!(!broken_record.full.is_empty());
        assert!(good_record.thumbnail.starts_with("data:image/jpeg;base64,"));
        assert!(service.store().get(&broken_record.id).await.unwrap().is_some());
        assert_eq!(service.object_urls().len(), 2);

        let notices = notifier.taken();
        assert!(
            matches!(
                notices.as_slice(),
                [Notice::ThumbnailFailed { name, .. }] if name == "broken.png"
            ),
            "unexpected notices: {notices:?}"
        );
    }

    #[tokio::test]
    async fn record_is_visible_before_its_thumbnail() {
        let tmp = TempDir::new().unwrap();
        let clip = tmp.path().join("clip.mp4");
        std::fs::write(&clip, b"frames").unwrap();

        let frames = Arc::new(GatedFrameDecoder { gate: Semaphore::new(0) });
        let (service, _) = service_with(HandleStore::open_in_memory().unwrap(), frames.clone());

        let report = service.import_files(vec![FileHandle::new(&clip)]).await;
        let id = &report.imported[0].id;
        let record = service.images().get(id).unwrap();
        assert_eq!(record.kind, ImageType::Video);
        assert!(record.thumbnail.is_empty());

        frames.gate.add_permits(1);
        service.settle().await;
        assert!(!service.images().get(id).unwrap().thumbnail.is_empty());
    }

    #[tokio::test]
    async fn late_thumbnail_for_removed_record_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let clip = tmp.path().join("clip.webm");
        std::fs::write(&clip, b"frames").unwrap();

        let frames = Arc::new(GatedFrameDecoder { gate: Semaphore::new(0) });
        let (service, _) = service_with(HandleStore::open_in_memory().unwrap(), frames.clone());

        let report = service.import_files(vec![FileHandle::new(&clip)]).await;
        let id = report.imported[0].id.clone();
        assert!(service.remove(&id).await.unwrap());

        frames.gate.add_permits(1);
        service.settle().await;
        assert!(service.images().is_empty());
        assert_eq!(service.store().get(&id).await.unwrap(), None);
        assert!(service.object_urls().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_keeps_the_record() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("localfile.db");
        let store = HandleStore::open(&db).unwrap();
        rusqlite::Connection::open(&db)
            .unwrap()
            .execute_batch("DROP TABLE localfile;")
            .unwrap();

        let (service, _) = service_with(store, Arc::new(FixedFrameDecoder { width: 8, height: 8 }));
        let png = write_png(tmp.path(), "kept.png");
        let report = service.import_files(vec![FileHandle::new(png)]).await;
        service.settle().await;

        assert!(report.failures.is_empty());
        assert!(!report.imported[0].persisted);
        assert_eq!(service.images().len(), 1);
    }

    #[tokio::test]
    async fn directories_expand_at_any_depth() {
        let tmp = TempDir::new().unwrap();
        let mut dir = tmp.path().join("drop");
        for level in 0..6 {
            std::fs::create_dir_all(&dir).unwrap();
            write_png(&dir, &format!("level{level}.png"));
            dir = dir.join(format!("sub{level}"));
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            tmp.path().join("drop").join("level0.png"),
            tmp.path().join("drop").join("link.png"),
        )
        .unwrap();

        let dropped = vec![FsHandle::from_path(tmp.path().join("drop")).await.unwrap()];
        let (files, failures) = expand_dropped(dropped, 64).await;
        assert!(failures.is_empty());
        let mut names: Vec<String> = files.iter().map(FileHandle::name).collect();
        names.sort();
        assert_eq!(
            names,
            ["level0.png", "level1.png", "level2.png", "level3.png", "level4.png", "level5.png"]
        );
    }

    #[tokio::test]
    async fn depth_limit_skips_deep_directories() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("top").join("one").join("two");
        std::fs::create_dir_all(&deep).unwrap();
        write_png(&tmp.path().join("top"), "top.png");
        write_png(&tmp.path().join("top").join("one"), "one.png");
        write_png(&deep, "two.png");

        let dropped = vec![FsHandle::Directory(DirectoryHandle::new(tmp.path().join("top")))];
        let (files, _) = expand_dropped(dropped, 1).await;
        let mut names: Vec<String> = files.iter().map(FileHandle::name).collect();
        names.sort();
        assert_eq!(names, ["one.png", "top.png"]);
    }

    #[tokio::test]
    async fn dropped_paths_mix_files_and_folders() {
        let tmp = TempDir::new().unwrap();
        let album = tmp.path().join("album");
        std::fs::create_dir(&album).unwrap();
        write_png(&album, "x.png");
        std::fs::write(album.join("readme.md"), "# album").unwrap();
        let single = write_png(tmp.path(), "single.png");

        let (service, notifier) = service();
        let report = service
            .import_paths([album, single, tmp.path().join("missing.png")])
            .await;
        service.settle().await;

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(notifier.taken().len(), 1);
    }

    struct StubPicker(Result<Vec<FileHandle>>, Option<String>);

    #[async_trait]
    impl FilePicker for StubPicker {
        fn unsupported_reason(&self) -> Option<String> {
            self.1.clone()
        }

        async fn pick(&self, options: &PickerOptions) -> Result<Vec<FileHandle>> {
            assert!(options.multiple);
            match &self.0 {
                Ok(handles) => Ok(handles.clone()),
                Err(LocalFileError::PickerCancelled) => Err(LocalFileError::PickerCancelled),
                Err(e) => Err(LocalFileError::PickerDenied(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn picker_outcomes() {
        let tmp = TempDir::new().unwrap();
        let png = write_png(tmp.path(), "picked.png");
        let (service, notifier) = service();

        let report = service
            .import_from_picker(&StubPicker(Ok(vec![FileHandle::new(png)]), None))
            .await
            .unwrap();
        assert_eq!(report.imported.len(), 1);

        let report = service
            .import_from_picker(&StubPicker(Err(LocalFileError::PickerCancelled), None))
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(notifier.taken().is_empty());

        let denied = StubPicker(
            Err(LocalFileError::PickerDenied("no user activation".into())),
            None,
        );
        let err = service.import_from_picker(&denied).await.unwrap_err();
        assert!(matches!(err, LocalFileError::PickerDenied(_)));
        assert!(matches!(notifier.taken().as_slice(), [Notice::PickerDenied(_)]));

        let unsupported = StubPicker(Ok(Vec::new()), Some("no display".into()));
        let err = service.import_from_picker(&unsupported).await.unwrap_err();
        assert!(matches!(err, LocalFileError::PickerUnsupported(ref r) if r == "no display"));
        service.settle().await;
    }
}
