use std::{path::PathBuf, str::FromStr};

use crate::eid::VisitId;

/// Narrow byte-store interface. Keys are flat strings derived from record
/// ids; blobs are written once and never mutated.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, data: &[u8]) -> std::io::Result<()>;
    fn get(&self, key: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> std::io::Result<()>;
}

/// Flat-directory blob store.
#[derive(Clone)]
pub struct BlobBackendLocal {
    pub base_dir: PathBuf,
}

impl BlobBackendLocal {
    pub fn new(storage_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from_str(storage_dir).expect("infallible PathBuf::from_str for &str");
        std::fs::create_dir_all(&path)?;
        Ok(BlobBackendLocal { base_dir: path })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

impl BlobStore for BlobBackendLocal {
    fn put(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        // Write-then-rename so readers never observe a partial blob.
        let path = self.path_for(key);
        let temp_path = self.base_dir.join(format!("{}-{key}", VisitId::new()));

        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, &path)
    }

    fn get(&self, key: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path_for(key))
    }

    fn exists(&self, key: &str) -> bool {
        std::fs::metadata(self.path_for(key)).is_ok()
    }

    fn delete(&self, key: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_for(key))
    }
}
