use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use edubridge_types::Bucket;

use crate::error::{BackendError, BackendResult};

/// Objects on disk under `{root}/{bucket}/{path}`.
pub struct ObjectStore {
    root: PathBuf,
    public_base: String,
}

impl ObjectStore {
    pub fn new(root: PathBuf, public_base: String) -> Self {
        Self { root, public_base }
    }

    /// Only plain relative segments are accepted.
    pub fn resolve(&self, bucket: Bucket, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(bucket.as_str()).join(relative))
    }

    /// Writes a new object. An existing object at the same path is an error.
    pub async fn put(&self, bucket: Bucket, path: &str, bytes: &[u8]) -> BackendResult<()> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create storage directory {}: {}", parent.display(), e);
                e
            })?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BackendError::Api {
                    status: 409,
                    code: Some("Duplicate".into()),
                    message: "The resource already exists".into(),
                });
            }
            Err(e) => {
                error!("Failed to create object {}: {}", target.display(), e);
                return Err(e.into());
            }
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(bucket = bucket.as_str(), path, size = bytes.len(), "Stored object");
        Ok(())
    }

    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/{}/{}", self.public_base, bucket.as_str(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ObjectStore, PathBuf) {
        let root = std::env::temp_dir().join(format!("edubridge-store-{}", uuid::Uuid::new_v4()));
        (ObjectStore::new(root.clone(), "file:///objects".into()), root)
    }

    #[test]
    fn rejects_paths_that_leave_the_bucket() {
        let (store, _) = store();
        for bad in ["", "../etc/passwd", "/abs", "a/../../b", "./x"] {
            assert!(
                matches!(store.resolve(Bucket::PostImages, bad), Err(BackendError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
        assert!(store.resolve(Bucket::PostImages, "user/1_photo.png").is_ok());
    }

    #[tokio::test]
    async fn put_writes_once_and_refuses_overwrite() {
        let (store, root) = store();
        store.put(Bucket::VerificationUploads, "u/1_id.pdf", b"pdf").await.unwrap();

        let written = tokio::fs::read(root.join("verification-uploads/u/1_id.pdf")).await.unwrap();
        assert_eq!(written, b"pdf");

        let err = store.put(Bucket::VerificationUploads, "u/1_id.pdf", b"again").await.unwrap_err();
        assert_eq!(err.to_string(), "The resource already exists");

        assert_eq!(
            store.public_url(Bucket::PostImages, "u/2.png"),
            "file:///objects/post-images/u/2.png"
        );
        let _ = tokio::fs::remove_dir_all(root).await;
    }
}
