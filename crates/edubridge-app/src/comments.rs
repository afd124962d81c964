use tracing::warn;
use uuid::Uuid;

use edubridge_types::{NewComment, NewNotification, NotificationType, ThreadComment};

use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub comment_id: Uuid,
    pub content: String,
}

/// Comments under one post, seeded from the post's embedded comments.
pub struct CommentThread {
    ctx: AppContext,
    pub post_id: Uuid,
    /// Author of the post, notified of new comments.
    pub post_owner: Uuid,
    pub comments: Vec<ThreadComment>,
    pub draft: String,
    pub editing: Option<CommentEdit>,
}

impl CommentThread {
    pub fn new(ctx: AppContext, post_id: Uuid, post_owner: Uuid, comments: Vec<ThreadComment>) -> Self {
        Self {
            ctx,
            post_id,
            post_owner,
            comments,
            draft: String::new(),
            editing: None,
        }
    }

    /// Blank drafts and non-members are ignored. Returns whether a comment was added.
    pub async fn add(&mut self, viewer: Option<&Viewer>) -> AppResult<bool> {
        let Some(viewer) = viewer.filter(|v| v.is_member()) else {
            return Ok(false);
        };
        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return Ok(false);
        }

        let comment = NewComment {
            post_id: self.post_id,
            user_id: viewer.id(),
            content,
        };
        let created = self
            .ctx
            .backend
            .insert_comment(comment)
            .await
            .map_err(|err| self.ctx.fail("Failed to add comment.", "add comment", err))?;

        self.comments.push(created);
        self.draft.clear();
        self.ctx.toaster.success("Comment added!");

        if self.post_owner != viewer.id() {
            let notification = NewNotification {
                user_id: self.post_owner,
                kind: NotificationType::Comment,
                actor_id: viewer.id(),
                post_id: Some(self.post_id),
            };
            if let Err(err) = self.ctx.backend.create_notification(notification).await {
                warn!(post_id = %self.post_id, "Comment notification failed: {}", err);
            }
        }
        Ok(true)
    }

    pub fn start_edit(&mut self, comment_id: Uuid) -> AppResult<()> {
        let comment = self
            .comments
            .iter()
            .find(|c| c.comment.id == comment_id)
            .ok_or_else(|| AppError::NotFound("No such comment.".into()))?;
        self.editing = Some(CommentEdit {
            comment_id,
            content: comment.comment.content.clone(),
        });
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub async fn save_edit(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let Some(edit) = self.editing.clone() else {
            return Ok(());
        };
        let viewer = viewer.ok_or_else(|| AppError::Denied("Sign in to edit comments.".into()))?;

        self.ctx
            .backend
            .update_comment(edit.comment_id, viewer.id(), &edit.content)
            .await
            .map_err(|err| self.ctx.fail("Failed to update comment.", "update comment", err))?;

        if let Some(existing) = self
            .comments
            .iter_mut()
            .find(|c| c.comment.id == edit.comment_id)
        {
            existing.comment.content = edit.content;
        }
        self.editing = None;
        self.ctx.toaster.success("Comment updated!");
        Ok(())
    }

    pub async fn delete(&mut self, viewer: Option<&Viewer>, comment_id: Uuid) -> AppResult<()> {
        let viewer = viewer.ok_or_else(|| AppError::Denied("Sign in to delete comments.".into()))?;

        self.ctx
            .backend
            .delete_comment(comment_id, viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Failed to delete comment.", "delete comment", err))?;

        self.comments.retain(|c| c.comment.id != comment_id);
        self.ctx.toaster.success("Comment deleted.");
        Ok(())
    }
}
