use chrono::Utc;
use tracing::info;

use edubridge_types::{Bucket, VerificationStatus};

use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};
use crate::upload::{Attachment, object_path};

/// Student ID upload. Submitting moves the profile to `pending`.
pub struct VerificationView {
    ctx: AppContext,
    pub file: Option<Attachment>,
}

impl VerificationView {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, file: None }
    }

    /// The form is only offered while unverified.
    pub fn can_upload(viewer: &Viewer) -> bool {
        viewer.verification_status() == Some(VerificationStatus::Unverified)
    }

    pub async fn submit(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let Some(viewer) = viewer else {
            self.ctx.toaster.error("You must be logged in to view this page.");
            return Err(AppError::Denied("not signed in".into()));
        };
        if !Self::can_upload(viewer) {
            return Err(AppError::Denied("Verification already requested.".into()));
        }
        let Some(file) = self.file.as_ref() else {
            self.ctx.toaster.error("Please select a file to upload.");
            return Err(AppError::Invalid("Please select a file to upload.".into()));
        };

        let path = object_path(viewer.id(), &file.name, Utc::now());
        let backend = &self.ctx.backend;
        let result = match backend
            .upload(Bucket::VerificationUploads, &path, file.bytes.clone(), &file.content_type)
            .await
        {
            Ok(()) => {
                backend
                    .set_verification_status(viewer.id(), VerificationStatus::Pending)
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            return Err(self.ctx.fail_with_message(
                "Failed to upload verification document.",
                "verification upload",
                err,
            ));
        }

        info!(user_id = %viewer.id(), path = %path, "Verification requested");
        self.file = None;
        self.ctx
            .toaster
            .success("Verification document uploaded! Your request is now pending review.");
        Ok(())
    }
}
