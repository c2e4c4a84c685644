//! File-backed BART blob store. Blobs are addressed by the MD5 of their
//! contents, the hash AIM clients embed in feedbag BART items.

use std::path::PathBuf;

use md5::{Digest, Md5};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// Largest icon blob accepted from a client.
const MAX_BLOB_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct BartStore {
    base_path: PathBuf,
}

impl BartStore {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;
        info!(path = %base_path.display(), "BART store initialized");
        Ok(Self { base_path })
    }

    /// Store a blob and return its content hash. Re-uploading identical
    /// bytes is a no-op that returns the same hash.
    pub async fn put(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() || data.len() > MAX_BLOB_SIZE {
            return Err(ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("blob size {} out of bounds", data.len()),
            )));
        }
        let hash = Md5::digest(data).to_vec();
        let path = self.blob_path(&hash);
        if !path.exists() {
            fs::write(&path, data).await?;
        }
        debug!(hash = %hex::encode(&hash), size = data.len(), "stored BART blob");
        Ok(hash)
    }

    pub async fn get(&self, hash: &[u8]) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        if !path.exists() {
            return Err(ServerError::BlobNotFound(hex::encode(hash)));
        }
        Ok(fs::read(&path).await?)
    }

    pub async fn exists(&self, hash: &[u8]) -> bool {
        self.blob_path(hash).exists()
    }

    fn blob_path(&self, hash: &[u8]) -> PathBuf {
        self.base_path.join(hex::encode(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (BartStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BartStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_get_by_hash() {
        let (store, _dir) = test_store().await;
        let hash = store.put(b"icon-bytes").await.unwrap();
        assert_eq!(hash, Md5::digest(b"icon-bytes").to_vec());
        assert_eq!(store.get(&hash).await.unwrap(), b"icon-bytes");
    }

    #[tokio::test]
    async fn test_reupload_is_idempotent() {
        let (store, _dir) = test_store().await;
        let h1 = store.put(b"same").await.unwrap();
        let h2 = store.put(b"same").await.unwrap();
        assert_eq!(h1, h2);
    }

    #[tokio::test]
    async fn test_missing_hash_errors() {
        let (store, _dir) = test_store().await;
        assert!(store.get(&[0u8; 16]).await.is_err());
        assert!(!store.exists(&[0u8; 16]).await);
    }

    #[tokio::test]
    async fn test_empty_blob_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.put(b"").await.is_err());
    }
}
