//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

/// Directory under the media root that holds post images.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Path relative to the media root, e.g. `posts/<uuid>-photo.gif`.
    pub stored_path: String,
    pub size_bytes: i64,
}

#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(POST_IMAGE_DIR))?;
        Ok(Self { root })
    }

    /// Write a post image and return where it landed.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let size_bytes =
            i64::try_from(data.len()).map_err(|_| UploadStorageError::SizeOverflow)?;

        debug!(
            target = "inkpost::infra::uploads",
            stored_path = %stored_path,
            size_bytes,
            "stored post image"
        );

        Ok(StoredUpload {
            stored_path,
            size_bytes,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored file. Missing files are treated as success.
    /// Used when an edit replaces or clears a post's image.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(original_name: &str) -> String {
    let identifier = Uuid::new_v4().simple();
    let filename = sanitize_filename(original_name);
    format!("{POST_IMAGE_DIR}/{identifier}-{filename}")
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_extension() {
        assert_eq!(sanitize_filename("Small Image.GIF"), "small-image.gif");
        assert_eq!(sanitize_filename("..."), "image");
    }

    #[tokio::test]
    async fn store_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path().to_path_buf()).unwrap();

        let stored = storage
            .store("small.gif", Bytes::from_static(b"GIF89a"))
            .await
            .unwrap();
        assert!(stored.stored_path.starts_with("posts/"));
        assert!(stored.stored_path.ends_with("-small.gif"));
        assert_eq!(stored.size_bytes, 6);

        let data = storage.read(&stored.stored_path).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"GIF89a"));

        storage.delete(&stored.stored_path).await.unwrap();
        assert!(storage.read(&stored.stored_path).await.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            storage.store("a.gif", Bytes::new()).await,
            Err(UploadStorageError::EmptyPayload)
        ));
        assert!(matches!(
            storage.read("../secret").await,
            Err(UploadStorageError::InvalidPath)
        ));
    }
}
