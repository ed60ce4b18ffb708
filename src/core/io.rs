use anyhow::Result;
use async_trait::async_trait;

/// Byte storage addressed by path-like keys. Backs the device-local cache and
/// the device-local session file.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn delete(&self, path: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn read_string(&self, path: &str) -> Result<Option<String>> {
        if !self.exists(path).await? {
            return Ok(None);
        }
        let bytes = self.read(path).await?;
        Ok(Some(String::from_utf8(bytes)?))
    }
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write-then-rename so a crash mid-write never leaves a truncated file.
        let tmp = format!("{}.tmp", path);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_native_storage_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("value.json");
        let path = path.to_str().unwrap();
        let storage = NativeStorage::new();

        assert_eq!(storage.read_string(path).await?, None);

        storage.write(path, "{\"a\":1}".as_bytes()).await?;
        assert!(storage.exists(path).await?);
        assert_eq!(storage.read_string(path).await?.as_deref(), Some("{\"a\":1}"));

        storage.delete(path).await?;
        assert!(!storage.exists(path).await?);
        // Deleting twice is fine.
        storage.delete(path).await?;
        Ok(())
    }
}
