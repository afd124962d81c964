use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error};

use edubridge_types::Bucket;

use crate::error::BackendResult;

use super::{RemoteBackend, check_api};

impl RemoteBackend {
    pub(crate) async fn storage_upload(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        let size = bytes.len();
        let url = self
            .config()
            .endpoint(&format!("storage/v1/object/{}/{}", bucket.as_str(), path));
        let resp = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check_api(resp).await.map_err(|e| {
            error!(bucket = bucket.as_str(), path, "Upload failed: {}", e);
            e
        })?;
        debug!(bucket = bucket.as_str(), path, size, "Uploaded object");
        Ok(())
    }

    pub(crate) fn storage_public_url(&self, bucket: Bucket, path: &str) -> String {
        self.config()
            .endpoint(&format!("storage/v1/object/public/{}/{}", bucket.as_str(), path))
    }
}
