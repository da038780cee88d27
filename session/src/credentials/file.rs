//! JSON-file credential store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::*;
use tokio::fs;

use super::{CredentialSnapshot, CredentialStore};
use crate::error::{persistence_error, Error};

/// Stores the latest credential snapshot as a single JSON file.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf, Error> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| persistence_error("Credentials path has no file name"))?;
        let mut temp_name = OsString::from(file_name);
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialSnapshot>, Error> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot: CredentialSnapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    "Loaded credential snapshot v{} from {}",
                    snapshot.version,
                    self.path.display()
                );
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No credential snapshot at {}, starting unpaired",
                    self.path.display()
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, snapshot: CredentialSnapshot) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Saved credential snapshot v{} to {}",
            snapshot.version,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("session.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories_and_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("creds").join("session.json");
        let store = FileCredentialStore::new(&path);

        store
            .save(CredentialSnapshot::new(1, json!({"me": "first"})))
            .await
            .unwrap();
        store
            .save(CredentialSnapshot::new(2, json!({"me": "second"})))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, CredentialSnapshot::new(2, json!({"me": "second"})));
        assert!(!path.with_file_name("session.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = FileCredentialStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Persistence);
    }
}
