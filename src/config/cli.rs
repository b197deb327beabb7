use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem storage rooted at `base_path`. Absolute paths bypass the root.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // 先寫暫存檔再改名，避免中途失敗留下半份帳本
        let tmp_path = full_path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(tmp_path, full_path)?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_creates_parents() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        assert!(!storage.exists("data/ledger.json").await);
        storage.write_file("data/ledger.json", b"{}").await.unwrap();

        assert!(storage.exists("data/ledger.json").await);
        assert_eq!(storage.read_file("data/ledger.json").await.unwrap(), b"{}");
        assert!(!dir.path().join("data/ledger.tmp").exists());
    }

    #[tokio::test]
    async fn test_absolute_path_ignores_base() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("zones.csv");
        fs::write(&file, "id,name,latitude,longitude\n").unwrap();

        let storage = LocalStorage::new(".");
        let data = storage.read_file(&file.to_string_lossy()).await.unwrap();
        assert!(data.starts_with(b"id,name"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let storage = LocalStorage::new(".");
        assert!(matches!(
            storage.read_file("definitely-missing.csv").await,
            Err(crate::utils::error::XpError::IoError(_))
        ));
    }
}
