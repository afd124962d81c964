use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use edubridge_types::{
    Bucket, FeedPost, Message, NewComment, NewMessage, NewNotification, NewPost, NewWishlistItem,
    NotificationWithActor, OAuthProvider, PostUpdate, Profile, Session, SignUpOutcome,
    SignUpRequest, ThreadComment, VerificationStatus, WishlistItem,
};

use crate::error::BackendResult;

/// Everything the views ask of the hosted backend: auth, row reads and
/// writes, procedures, object storage and realtime message inserts.
#[async_trait]
pub trait Backend: Send + Sync {
    // -- Auth --

    async fn sign_up(&self, req: SignUpRequest) -> BackendResult<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;

    /// URL the browser is sent to for a third-party sign-in.
    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> BackendResult<String>;

    async fn sign_out(&self) -> BackendResult<()>;

    /// Current session, refreshed first when it is about to expire.
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    async fn resend_verification(&self, email: &str, redirect_to: Option<&str>) -> BackendResult<()>;

    /// Observes sign-in, sign-out and refresh.
    fn session_changes(&self) -> watch::Receiver<Option<Session>>;

    // -- Profiles --

    async fn fetch_profile(&self, user_id: Uuid) -> BackendResult<Option<Profile>>;

    async fn set_verification_status(&self, user_id: Uuid, status: VerificationStatus) -> BackendResult<()>;

    // -- Posts --

    /// All posts, newest first, with author, likes and comments.
    async fn list_posts(&self) -> BackendResult<Vec<FeedPost>>;

    async fn insert_post(&self, post: NewPost) -> BackendResult<FeedPost>;

    async fn update_post(&self, id: Uuid, owner: Uuid, update: PostUpdate) -> BackendResult<()>;

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> BackendResult<()>;

    // -- Likes --

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()>;

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()>;

    // -- Comments --

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<ThreadComment>;

    async fn update_comment(&self, id: Uuid, owner: Uuid, content: &str) -> BackendResult<()>;

    async fn delete_comment(&self, id: Uuid, owner: Uuid) -> BackendResult<()>;

    // -- Messages --

    async fn get_conversations(&self, current_user_id: Uuid) -> BackendResult<Vec<Profile>>;

    async fn get_messages(&self, user1_id: Uuid, user2_id: Uuid) -> BackendResult<Vec<Message>>;

    async fn insert_message(&self, message: NewMessage) -> BackendResult<()>;

    /// New messages addressed to `recipient_id`, until the subscription is dropped.
    async fn subscribe_messages(&self, recipient_id: Uuid) -> BackendResult<MessageSubscription>;

    // -- Notifications --

    async fn create_notification(&self, notification: NewNotification) -> BackendResult<()>;

    async fn list_notifications(&self, user_id: Uuid) -> BackendResult<Vec<NotificationWithActor>>;

    async fn mark_notification_read(&self, id: Uuid) -> BackendResult<()>;

    // -- Wishlist --

    async fn list_wishlist(&self, user_id: Uuid) -> BackendResult<Vec<WishlistItem>>;

    async fn insert_wishlist_item(&self, item: NewWishlistItem) -> BackendResult<WishlistItem>;

    async fn delete_wishlist_item(&self, id: Uuid, owner: Uuid) -> BackendResult<()>;

    // -- Storage --

    async fn upload(&self, bucket: Bucket, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<()>;

    fn public_url(&self, bucket: Bucket, path: &str) -> String;
}

/// Realtime feed of inserted messages. Dropping it stops the forwarding task
/// and leaves the channel.
pub struct MessageSubscription {
    rx: mpsc::UnboundedReceiver<Message>,
    task: JoinHandle<()>,
}

impl MessageSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Message>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next message, or None once the underlying channel has closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
