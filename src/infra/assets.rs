//! Static assets served from a filesystem directory.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset path")]
    InvalidPath,
    #[error("asset not found")]
    NotFound,
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound
        } else {
            AssetError::Io(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Filesystem-backed asset directory. Requested paths must stay inside the
/// root; absolute paths and parent-dir components are rejected before any
/// filesystem access.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub async fn read(&self, requested: &str) -> Result<Asset, AssetError> {
        let absolute = self.resolve(requested)?;
        let bytes = Bytes::from(fs::read(&absolute).await?);
        let content_type = mime_guess::from_path(&absolute)
            .first_or_octet_stream()
            .to_string();
        Ok(Asset {
            bytes,
            content_type,
        })
    }

    fn resolve(&self, requested: &str) -> Result<PathBuf, AssetError> {
        // Backslashes are not separators on this platform, so `a\..\b` would
        // otherwise pass as one plain component.
        if requested.contains('\\') {
            return Err(AssetError::InvalidPath);
        }
        let relative = Path::new(requested);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(AssetError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_existing_file_with_mime() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("app.css"), b"body{}").unwrap();
        let assets = AssetDir::new(dir.path().to_path_buf()).unwrap();

        let asset = assets.read("app.css").await.unwrap();
        assert_eq!(asset.bytes.as_ref(), b"body{}");
        assert_eq!(asset.content_type, "text/css");
    }

    #[tokio::test]
    async fn rejects_parent_dir_components() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = AssetDir::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            assets.read("../secrets.txt").await,
            Err(AssetError::InvalidPath)
        ));
        assert!(matches!(
            assets.read("nested/../../secrets.txt").await,
            Err(AssetError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn rejects_backslash_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = AssetDir::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            assets.read("foo\\..\\secrets.txt").await,
            Err(AssetError::InvalidPath)
        ));
        assert!(matches!(
            assets.read("styles\\app.css").await,
            Err(AssetError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn rejects_absolute_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = AssetDir::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            assets.read("/etc/passwd").await,
            Err(AssetError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = AssetDir::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            assets.read("nope.js").await,
            Err(AssetError::NotFound)
        ));
    }
}
