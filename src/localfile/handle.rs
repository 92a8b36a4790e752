use super::classify::guess_mime_type;
use super::error::{LocalFileError, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Current read permission of a handle, as reported without prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

/// Capability referencing one file on the local file system.
///
/// Serializable so it can be kept in the handle store and re-resolved after a
/// restart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Probe read access by opening the file. Never prompts: a file that is
    /// gone or unreadable reports `Denied`.
    pub async fn query_permission(&self) -> Result<PermissionState> {
        match fs::File::open(&self.path).await {
            Ok(_) => Ok(PermissionState::Granted),
            Err(e) if matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound) => {
                Ok(PermissionState::Denied)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the handle to the file's current metadata.
    pub async fn get_file(&self) -> Result<LocalFile> {
        let meta = fs::metadata(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                LocalFileError::PermissionNotGranted(self.path.display().to_string())
            }
            _ => LocalFileError::Io(e),
        })?;
        if !meta.is_file() {
            return Err(LocalFileError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a file", self.path.display()),
            )));
        }
        let name = self.name();
        Ok(LocalFile {
            mime_type: guess_mime_type(&name).to_string(),
            name,
            size: meta.len(),
            path: self.path.clone(),
        })
    }
}

/// Capability referencing a directory; listed lazily when a drop is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHandle {
    path: PathBuf,
}

impl DirectoryHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Immediate children, unordered. Symlinks are reported as `Other` and
    /// not followed.
    pub async fn entries(&self) -> Result<Vec<FsHandle>> {
        let mut dir = fs::read_dir(&self.path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            entries.push(if file_type.is_file() {
                FsHandle::File(FileHandle::new(path))
            } else if file_type.is_dir() {
                FsHandle::Directory(DirectoryHandle::new(path))
            } else {
                FsHandle::Other(path)
            });
        }
        Ok(entries)
    }
}

/// Anything a drop can yield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsHandle {
    File(FileHandle),
    Directory(DirectoryHandle),
    Other(PathBuf),
}

impl FsHandle {
    /// Classify a dropped path. Top-level symlinks are followed.
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = fs::metadata(&path).await?;
        Ok(if meta.is_file() {
            Self::File(FileHandle::new(path))
        } else if meta.is_dir() {
            Self::Directory(DirectoryHandle::new(path))
        } else {
            Self::Other(path)
        })
    }
}

/// Resolved file content descriptor. Bytes are read on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    /// Declared content type, derived from the file extension.
    pub mime_type: String,
    pub size: u64,
    pub path: PathBuf,
}

impl LocalFile {
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn resolves_file_with_declared_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Photo.PNG");
        std::fs::write(&path, b"12345").unwrap();

        let file = FileHandle::new(&path).get_file().await.unwrap();
        assert_eq!(file.name, "Photo.PNG");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, 5);
        assert_eq!(file.read().await.unwrap(), b"12345");
    }

    #[tokio::test]
    async fn permission_follows_file_presence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let handle = FileHandle::new(&path);

        assert_eq!(handle.query_permission().await.unwrap(), PermissionState::Granted);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(handle.query_permission().await.unwrap(), PermissionState::Denied);
        assert!(handle.get_file().await.is_err());
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let tmp = TempDir::new().unwrap();
        let err = FileHandle::new(tmp.path()).get_file().await.unwrap_err();
        assert!(matches!(err, LocalFileError::Io(_)));
    }

    #[tokio::test]
    async fn handle_survives_json_roundtrip() {
        let handle = FileHandle::new("/srv/media/clip.webm");
        let json = serde_json::to_string(&handle).unwrap();
        let back: FileHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
        assert_eq!(back.name(), "clip.webm");
    }
}
