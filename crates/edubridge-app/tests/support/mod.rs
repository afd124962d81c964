//! Shared fixtures: an in-memory local backend behind a wrapper that records
//! every call and can be told to fail specific ones.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use edubridge_app::{AppContext, Toast, Toaster, Viewer};
use edubridge_backend::{
    Backend, BackendError, BackendResult, LocalBackend, LocalConfig, MessageSubscription,
};
use edubridge_types::{
    Bucket, FeedPost, Message, NewComment, NewMessage, NewNotification, NewPost, NewWishlistItem,
    NotificationWithActor, OAuthProvider, PostUpdate, Profile, Role, Session, SignUpOutcome,
    SignUpRequest, ThreadComment, VerificationStatus, WishlistItem,
};

pub const SITE: &str = "https://edubridgepeople.test";

pub struct RecordingBackend {
    pub local: LocalBackend,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        let dir = std::env::temp_dir().join(format!("edubridge-app-{}", Uuid::new_v4()));
        let config = LocalConfig::in_memory(dir);
        Arc::new(Self {
            local: LocalBackend::open(&config).unwrap(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().insert(call);
    }

    pub fn heal(&self, call: &'static str) {
        self.failing.lock().unwrap().remove(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: &'static str) -> BackendResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(call) {
            return Err(BackendError::Api {
                status: 500,
                code: None,
                message: format!("{} unavailable", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn sign_up(&self, req: SignUpRequest) -> BackendResult<SignUpOutcome> {
        self.record("sign_up")?;
        self.local.sign_up(req).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        self.record("sign_in_with_password")?;
        self.local.sign_in_with_password(email, password).await
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> BackendResult<String> {
        self.record("oauth_authorize_url")?;
        self.local.oauth_authorize_url(provider, redirect_to)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.record("sign_out")?;
        self.local.sign_out().await
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        self.record("get_session")?;
        self.local.get_session().await
    }

    async fn resend_verification(&self, email: &str, redirect_to: Option<&str>) -> BackendResult<()> {
        self.record("resend_verification")?;
        self.local.resend_verification(email, redirect_to).await
    }

    fn session_changes(&self) -> watch::Receiver<Option<Session>> {
        self.local.session_changes()
    }

    async fn fetch_profile(&self, user_id: Uuid) -> BackendResult<Option<Profile>> {
        self.record("fetch_profile")?;
        self.local.fetch_profile(user_id).await
    }

    async fn set_verification_status(&self, user_id: Uuid, status: VerificationStatus) -> BackendResult<()> {
        self.record("set_verification_status")?;
        self.local.set_verification_status(user_id, status).await
    }

    async fn list_posts(&self) -> BackendResult<Vec<FeedPost>> {
        self.record("list_posts")?;
        self.local.list_posts().await
    }

    async fn insert_post(&self, post: NewPost) -> BackendResult<FeedPost> {
        self.record("insert_post")?;
        self.local.insert_post(post).await
    }

    async fn update_post(&self, id: Uuid, owner: Uuid, update: PostUpdate) -> BackendResult<()> {
        self.record("update_post")?;
        self.local.update_post(id, owner, update).await
    }

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.record("delete_post")?;
        self.local.delete_post(id, owner).await
    }

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.record("insert_like")?;
        self.local.insert_like(post_id, user_id).await
    }

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.record("delete_like")?;
        self.local.delete_like(post_id, user_id).await
    }

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<ThreadComment> {
        self.record("insert_comment")?;
        self.local.insert_comment(comment).await
    }

    async fn update_comment(&self, id: Uuid, owner: Uuid, content: &str) -> BackendResult<()> {
        self.record("update_comment")?;
        self.local.update_comment(id, owner, content).await
    }

    async fn delete_comment(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.record("delete_comment")?;
        self.local.delete_comment(id, owner).await
    }

    async fn get_conversations(&self, current_user_id: Uuid) -> BackendResult<Vec<Profile>> {
        self.record("get_conversations")?;
        self.local.get_conversations(current_user_id).await
    }

    async fn get_messages(&self, user1_id: Uuid, user2_id: Uuid) -> BackendResult<Vec<Message>> {
        self.record("get_messages")?;
        self.local.get_messages(user1_id, user2_id).await
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<()> {
        self.record("insert_message")?;
        self.local.insert_message(message).await
    }

    async fn subscribe_messages(&self, recipient_id: Uuid) -> BackendResult<MessageSubscription> {
        self.record("subscribe_messages")?;
        self.local.subscribe_messages(recipient_id).await
    }

    async fn create_notification(&self, notification: NewNotification) -> BackendResult<()> {
        self.record("create_notification")?;
        self.local.create_notification(notification).await
    }

    async fn list_notifications(&self, user_id: Uuid) -> BackendResult<Vec<NotificationWithActor>> {
        self.record("list_notifications")?;
        self.local.list_notifications(user_id).await
    }

    async fn mark_notification_read(&self, id: Uuid) -> BackendResult<()> {
        self.record("mark_notification_read")?;
        self.local.mark_notification_read(id).await
    }

    async fn list_wishlist(&self, user_id: Uuid) -> BackendResult<Vec<WishlistItem>> {
        self.record("list_wishlist")?;
        self.local.list_wishlist(user_id).await
    }

    async fn insert_wishlist_item(&self, item: NewWishlistItem) -> BackendResult<WishlistItem> {
        self.record("insert_wishlist_item")?;
        self.local.insert_wishlist_item(item).await
    }

    async fn delete_wishlist_item(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.record("delete_wishlist_item")?;
        self.local.delete_wishlist_item(id, owner).await
    }

    async fn upload(&self, bucket: Bucket, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<()> {
        self.record("upload")?;
        self.local.upload(bucket, path, bytes, content_type).await
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.local.public_url(bucket, path)
    }
}

pub struct Harness {
    pub backend: Arc<RecordingBackend>,
    pub ctx: AppContext,
    pub toasts: mpsc::UnboundedReceiver<Toast>,
}

impl Harness {
    pub fn new() -> Self {
        let backend = RecordingBackend::new();
        let (toaster, toasts) = Toaster::channel();
        let ctx = AppContext::new(backend.clone(), toaster, SITE);
        Self {
            backend,
            ctx,
            toasts,
        }
    }

    /// Registers (auto-confirmed) and leaves the new user signed in.
    pub async fn member(&self, email: &str, role: Role) -> Viewer {
        let outcome = self
            .backend
            .local
            .sign_up(SignUpRequest {
                email: email.into(),
                password: "secret1".into(),
                username: email.split('@').next().unwrap().into(),
                role,
                redirect_to: None,
            })
            .await
            .unwrap();
        let user = outcome.user.unwrap();
        let profile = self.backend.local.fetch_profile(user.id).await.unwrap();
        Viewer { user, profile }
    }

    /// Makes `viewer` the signed-in user again.
    pub async fn act_as(&self, viewer: &Viewer) {
        let email = viewer.user.email.clone().unwrap();
        self.backend
            .local
            .sign_in_with_password(&email, "secret1")
            .await
            .unwrap();
    }

    /// Texts of the toasts raised since the last call.
    pub fn drain_toasts(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(toast) = self.toasts.try_recv() {
            texts.push(toast.text);
        }
        texts
    }
}

/// Marks a student verified straight in the store. Leaves them signed in.
pub async fn verify(harness: &Harness, viewer: &mut Viewer) {
    harness.act_as(viewer).await;
    harness
        .backend
        .local
        .set_verification_status(viewer.id(), VerificationStatus::Verified)
        .await
        .unwrap();
    viewer.profile = harness.backend.local.fetch_profile(viewer.id()).await.unwrap();
}
