//! Physical file storage for Nimbus.
//!
//! Destination paths handed to the upload engine are relative storage paths
//! (`photos/2024/beach.jpg`). This module maps them onto a base directory and
//! owns every direct filesystem call outside the write pump.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{File, OpenOptions};

use crate::{NimbusError, Result};

/// File storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Base directory for file storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a storage path to its location on disk.
    ///
    /// Rejects empty paths, absolute paths and any `..` or `.` component, so a
    /// resolved path always stays below the base directory.
    pub fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        if storage_path.is_empty() {
            return Err(NimbusError::Validation("empty storage path".to_string()));
        }

        let mut resolved = self.base_path.clone();
        for component in Path::new(storage_path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => {
                    return Err(NimbusError::Validation(format!(
                        "path traversal not allowed: {storage_path}"
                    )))
                }
            }
        }
        Ok(resolved)
    }

    /// Open a destination file for positional writing.
    ///
    /// Parent directories and the file itself are created when missing; an
    /// existing file is opened without truncation so earlier fragments survive.
    pub async fn open_for_write(&self, storage_path: &str) -> Result<File> {
        let file_path = self.resolve(storage_path)?;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&file_path)
            .await?;
        Ok(file)
    }

    /// Delete a stored file.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    pub fn delete(&self, storage_path: &str) -> Result<bool> {
        let file_path = self.resolve(storage_path)?;

        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a stored file exists.
    pub fn exists(&self, storage_path: &str) -> bool {
        self.resolve(storage_path)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Get the size of a stored file.
    pub fn file_size(&self, storage_path: &str) -> Result<u64> {
        let file_path = self.resolve(storage_path)?;

        match fs::metadata(&file_path) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(NimbusError::NotFound(format!("File: {storage_path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Total bytes currently occupied by files under the base directory.
    pub fn used_bytes(&self) -> Result<u64> {
        fn walk(dir: &Path) -> io::Result<u64> {
            let mut total = 0;
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    total += walk(&entry.path())?;
                } else if file_type.is_file() {
                    total += entry.metadata()?.len();
                }
            }
            Ok(total)
        }

        Ok(walk(&self.base_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn setup_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("storage");

        assert!(!storage_path.exists());

        let storage = FileStorage::new(&storage_path).unwrap();

        assert!(storage_path.exists());
        assert_eq!(storage.base_path(), storage_path);
    }

    #[test]
    fn test_resolve_nested_path() {
        let (_temp_dir, storage) = setup_storage();

        let path = storage.resolve("photos/2024/beach.jpg").unwrap();

        assert_eq!(
            path,
            storage.base_path().join("photos").join("2024").join("beach.jpg")
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let (_temp_dir, storage) = setup_storage();

        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("a/../../b").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("./a.bin").is_err());
        assert!(storage.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_open_for_write_creates_parents() {
        let (_temp_dir, storage) = setup_storage();

        let mut file = storage.open_for_write("deep/dir/file.bin").await.unwrap();
        file.write_all(b"hello").await.unwrap();
        file.flush().await.unwrap();

        assert!(storage.exists("deep/dir/file.bin"));
        assert_eq!(storage.file_size("deep/dir/file.bin").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_open_for_write_keeps_existing_content() {
        let (_temp_dir, storage) = setup_storage();
        fs::write(storage.resolve("keep.bin").unwrap(), b"0123456789").unwrap();

        let file = storage.open_for_write("keep.bin").await.unwrap();
        drop(file);

        assert_eq!(storage.file_size("keep.bin").unwrap(), 10);
    }

    #[test]
    fn test_delete() {
        let (_temp_dir, storage) = setup_storage();
        fs::write(storage.resolve("gone.bin").unwrap(), b"x").unwrap();

        assert!(storage.delete("gone.bin").unwrap());
        assert!(!storage.exists("gone.bin"));
        assert!(!storage.delete("gone.bin").unwrap());
    }

    #[test]
    fn test_file_size_not_found() {
        let (_temp_dir, storage) = setup_storage();

        let result = storage.file_size("nonexistent.bin");
        assert!(matches!(result, Err(NimbusError::NotFound(_))));
    }

    #[test]
    fn test_used_bytes_recurses() {
        let (_temp_dir, storage) = setup_storage();
        fs::create_dir_all(storage.base_path().join("a/b")).unwrap();
        fs::write(storage.resolve("top.bin").unwrap(), vec![0u8; 100]).unwrap();
        fs::write(storage.resolve("a/b/inner.bin").unwrap(), vec![0u8; 28]).unwrap();

        assert_eq!(storage.used_bytes().unwrap(), 128);
    }
}
