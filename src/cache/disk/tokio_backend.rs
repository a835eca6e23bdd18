//! Tokio-based filesystem backend (portable, works on all platforms)

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Portable filesystem backend using tokio::fs
#[derive(Default)]
pub struct TokioFsBackend;

impl TokioFsBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiskBackend for TokioFsBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, DiskCacheError> {
        let data = tokio::fs::read(path).await?;
        Ok(Bytes::from(data))
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DiskCacheError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers of one path never share a temp file
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, &data).await?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DiskCacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DiskCacheError> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), DiskCacheError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_size(&self, path: &Path) -> Result<u64, DiskCacheError> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(metadata.len())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_file() {
        let dir = TempDir::new().unwrap();
        let backend = TokioFsBackend::new();
        let path = dir.path().join("nested/file.data");

        backend
            .write_file_atomic(&path, Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(backend.read_file(&path).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(backend.file_size(&path).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let backend = TokioFsBackend::new();
        let path = dir.path().join("entry.meta");

        backend
            .write_file_atomic(&path, Bytes::from_static(b"one"))
            .await
            .unwrap();
        backend
            .write_file_atomic(&path, Bytes::from_static(b"two"))
            .await
            .unwrap();

        let files = backend.read_dir(dir.path()).await.unwrap();
        assert_eq!(files, vec![path.clone()]);
        assert_eq!(backend.read_file(&path).await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_delete_and_remove_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = TokioFsBackend::new();

        backend.delete_file(&dir.path().join("missing")).await.unwrap();
        backend.remove_dir_all(&dir.path().join("missing-dir")).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_dir_of_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let backend = TokioFsBackend::new();
        let files = backend.read_dir(&dir.path().join("nope")).await.unwrap();
        assert!(files.is_empty());
    }
}
