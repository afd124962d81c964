use uuid::Uuid;

use edubridge_types::{NotificationType, NotificationWithActor};

use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};
use crate::shell::Page;

pub fn notification_text(notification: &NotificationWithActor) -> String {
    let actor = notification.actor_name();
    match notification.notification.kind {
        NotificationType::Like => format!("{} liked your post.", actor),
        NotificationType::Comment => format!("{} commented on your post.", actor),
    }
}

pub struct NotificationsView {
    ctx: AppContext,
    /// Newest first.
    pub items: Vec<NotificationWithActor>,
}

impl NotificationsView {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            items: Vec::new(),
        }
    }

    pub async fn load(&mut self, viewer: &Viewer) -> AppResult<()> {
        let items = self
            .ctx
            .backend
            .list_notifications(viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Could not fetch notifications.", "fetch notifications", err))?;
        self.items = items;
        Ok(())
    }

    pub fn unread_count(&self) -> usize {
        self.items
            .iter()
            .filter(|n| !n.notification.is_read)
            .count()
    }

    pub async fn mark_read(&mut self, id: Uuid) -> AppResult<()> {
        self.ctx
            .backend
            .mark_notification_read(id)
            .await
            .map_err(|err| self.ctx.fail("Failed to mark notification as read.", "mark notification read", err))?;

        if let Some(item) = self.items.iter_mut().find(|n| n.notification.id == id) {
            item.notification.is_read = true;
        }
        Ok(())
    }

    /// Marks an unread notification read, then points at its post, if it has
    /// one. A failed mark still navigates.
    pub async fn open(&mut self, id: Uuid) -> AppResult<Option<Page>> {
        let item = self
            .items
            .iter()
            .find(|n| n.notification.id == id)
            .ok_or_else(|| AppError::NotFound("Notification not found.".into()))?;
        let post = item.notification.post_id;

        if !item.notification.is_read {
            let _ = self.mark_read(id).await;
        }
        Ok(post.map(|id| Page::Feed { post: Some(id) }))
    }
}
