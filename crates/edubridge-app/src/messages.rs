use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use edubridge_types::{Message, NewMessage, Profile};

use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};

/// Direct messages: conversation list on the left, the open conversation on
/// the right.
pub struct MessagesView {
    ctx: AppContext,
    /// People the viewer has exchanged messages with, most recent first.
    pub conversations: Vec<Profile>,
    pub selected: Option<Profile>,
    /// History of the selected conversation, oldest first.
    pub messages: Vec<Message>,
    pub draft: String,
}

impl MessagesView {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            conversations: Vec::new(),
            selected: None,
            messages: Vec::new(),
            draft: String::new(),
        }
    }

    pub async fn load_conversations(&mut self, viewer: &Viewer) -> AppResult<()> {
        let conversations = self
            .ctx
            .backend
            .get_conversations(viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Failed to load conversations.", "load conversations", err))?;
        debug!(count = conversations.len(), "Loaded conversations");
        self.conversations = conversations;
        Ok(())
    }

    /// Open the conversation with `recipient`. Someone not yet in the list is
    /// looked up once and put at the front.
    pub async fn open(&mut self, viewer: &Viewer, recipient: Uuid) -> AppResult<()> {
        let profile = match self.conversations.iter().find(|p| p.id == recipient) {
            Some(profile) => profile.clone(),
            None => {
                let fetched = match self.ctx.backend.fetch_profile(recipient).await {
                    Ok(Some(profile)) => profile,
                    Ok(None) => {
                        self.ctx.toaster.error("User not found.");
                        return Err(AppError::NotFound("User not found.".into()));
                    }
                    Err(err) => return Err(self.ctx.fail("User not found.", "fetch recipient", err)),
                };
                // The list may have been reloaded while the profile was in flight.
                if !self.conversations.iter().any(|p| p.id == recipient) {
                    info!(recipient = %recipient, "Starting new conversation");
                    self.conversations.insert(0, fetched.clone());
                }
                fetched
            }
        };

        self.select(viewer, profile).await
    }

    pub async fn select(&mut self, viewer: &Viewer, profile: Profile) -> AppResult<()> {
        self.selected = Some(profile);
        self.messages.clear();
        self.load_messages(viewer).await
    }

    pub async fn load_messages(&mut self, viewer: &Viewer) -> AppResult<()> {
        let Some(other) = self.selected.as_ref().map(|p| p.id) else {
            return Ok(());
        };
        let messages = self
            .ctx
            .backend
            .get_messages(viewer.id(), other)
            .await
            .map_err(|err| self.ctx.fail("Failed to load messages.", "load messages", err))?;
        self.messages = messages;
        Ok(())
    }

    /// Appends the draft straight away and takes it back out if the insert fails.
    pub async fn send(&mut self, viewer: &Viewer) -> AppResult<()> {
        let content = self.draft.trim().to_string();
        let Some(recipient_id) = self.selected.as_ref().map(|p| p.id) else {
            return Err(AppError::Invalid("No conversation selected.".into()));
        };
        if content.is_empty() {
            return Ok(());
        }

        let pending = Message {
            id: Uuid::new_v4(),
            sender_id: viewer.id(),
            recipient_id,
            content: content.clone(),
            created_at: Utc::now(),
        };
        let pending_id = pending.id;
        self.messages.push(pending);
        self.draft.clear();

        let message = NewMessage {
            sender_id: viewer.id(),
            recipient_id,
            content,
        };
        if let Err(err) = self.ctx.backend.insert_message(message).await {
            self.messages.retain(|m| m.id != pending_id);
            return Err(self.ctx.fail("Failed to send message.", "send message", err));
        }
        Ok(())
    }

    /// A pushed message addressed to the viewer.
    pub async fn on_incoming(&mut self, viewer: &Viewer, message: Message) -> AppResult<()> {
        let open = self.selected.as_ref().map(|p| p.id);
        if open == Some(message.sender_id) {
            if !self.messages.iter().any(|m| m.id == message.id) {
                self.messages.push(message);
            }
            return Ok(());
        }

        self.ctx.toaster.info("You have a new message!");
        self.load_conversations(viewer).await
    }
}
