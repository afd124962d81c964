//! Hosted backend over HTTP: auth under `/auth/v1`, rows under `/rest/v1`,
//! objects under `/storage/v1` and change feeds over the realtime websocket.

mod auth;
pub mod protocol;
pub mod realtime;
mod rest;
mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{Value, json};
use tokio::sync::watch;
use uuid::Uuid;

use edubridge_types::{
    Bucket, FeedPost, Message, NewComment, NewMessage, NewNotification, NewPost, NewWishlistItem,
    NotificationWithActor, OAuthProvider, PostUpdate, Profile, Session, SignUpOutcome,
    SignUpRequest, ThreadComment, VerificationStatus, WishlistItem,
};

use crate::backend::{Backend, MessageSubscription};
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};

use self::rest::eq;

/// Embeds for a feed post: author, likes, and comments with their authors.
const POST_SELECT: &str = "*,profiles(*),likes(*),comments(*,profiles(*))";
const COMMENT_SELECT: &str = "*,profiles(*)";
const NOTIFICATION_SELECT: &str = "*,profiles:actor_id(*)";

#[derive(Clone)]
pub struct RemoteBackend {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    http: Client,
    config: BackendConfig,
    session: watch::Sender<Option<Session>>,
}

impl RemoteBackend {
    pub fn new(config: BackendConfig) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Arc::new(RemoteInner {
                http: Client::new(),
                config,
                session,
            }),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    fn current_session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    fn set_session(&self, session: Option<Session>) {
        self.inner.session.send_replace(session);
    }

    /// Bearer is the session's access token, else the anon key.
    fn bearer(&self) -> String {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.inner.config.anon_key.clone())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .header("apikey", &self.inner.config.anon_key)
            .bearer_auth(self.bearer())
    }
}

/// Code and message out of an error body. Auth, row and storage services
/// each name the message field differently.
pub fn parse_error_body(status: u16, body: &str) -> (Option<String>, String) {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let message = ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("request failed with status {}", status)
            } else {
                trimmed.to_string()
            }
        });

    let code = ["error_code", "code", "statusCode"]
        .iter()
        .find_map(|key| value.get(key))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    (code, message)
}

async fn check_api(resp: Response) -> BackendResult<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let (code, message) = parse_error_body(status, &body);
    Err(BackendError::Api { status, code, message })
}

async fn check_auth(resp: Response) -> BackendResult<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let (_, message) = parse_error_body(status, &body);
    Err(BackendError::Auth(message))
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn sign_up(&self, req: SignUpRequest) -> BackendResult<SignUpOutcome> {
        self.auth_sign_up(req).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        self.auth_sign_in(email, password).await
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> BackendResult<String> {
        self.auth_authorize_url(provider, redirect_to)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.auth_sign_out().await
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        self.auth_get_session().await
    }

    async fn resend_verification(&self, email: &str, redirect_to: Option<&str>) -> BackendResult<()> {
        self.auth_resend(email, redirect_to).await
    }

    fn session_changes(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    async fn fetch_profile(&self, user_id: Uuid) -> BackendResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .select("profiles", "*", &[eq("id", user_id)], None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn set_verification_status(&self, user_id: Uuid, status: VerificationStatus) -> BackendResult<()> {
        self.update(
            "profiles",
            &[eq("id", user_id)],
            &json!({ "verification_status": status }),
        )
        .await
    }

    async fn list_posts(&self) -> BackendResult<Vec<FeedPost>> {
        self.select("posts", POST_SELECT, &[], Some("created_at.desc"))
            .await
    }

    async fn insert_post(&self, post: NewPost) -> BackendResult<FeedPost> {
        self.insert_returning("posts", POST_SELECT, &post).await
    }

    async fn update_post(&self, id: Uuid, owner: Uuid, update: PostUpdate) -> BackendResult<()> {
        self.update("posts", &[eq("id", id), eq("user_id", owner)], &update)
            .await
    }

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.delete("posts", &[eq("id", id), eq("user_id", owner)])
            .await
    }

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.insert("likes", &json!({ "post_id": post_id, "user_id": user_id }))
            .await
    }

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.delete("likes", &[eq("post_id", post_id), eq("user_id", user_id)])
            .await
    }

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<ThreadComment> {
        self.insert_returning("comments", COMMENT_SELECT, &comment)
            .await
    }

    async fn update_comment(&self, id: Uuid, owner: Uuid, content: &str) -> BackendResult<()> {
        self.update(
            "comments",
            &[eq("id", id), eq("user_id", owner)],
            &json!({ "content": content }),
        )
        .await
    }

    async fn delete_comment(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.delete("comments", &[eq("id", id), eq("user_id", owner)])
            .await
    }

    async fn get_conversations(&self, current_user_id: Uuid) -> BackendResult<Vec<Profile>> {
        let rows: Vec<Option<Profile>> = self
            .rpc("get_conversations", &json!({ "current_user_id": current_user_id }))
            .await?;
        Ok(rows.into_iter().flatten().collect())
    }

    async fn get_messages(&self, user1_id: Uuid, user2_id: Uuid) -> BackendResult<Vec<Message>> {
        self.rpc(
            "get_messages",
            &json!({ "user1_id": user1_id, "user2_id": user2_id }),
        )
        .await
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<()> {
        self.insert("messages", &message).await
    }

    async fn subscribe_messages(&self, recipient_id: Uuid) -> BackendResult<MessageSubscription> {
        realtime::subscribe_messages(&self.inner.config, &self.bearer(), recipient_id).await
    }

    async fn create_notification(&self, notification: NewNotification) -> BackendResult<()> {
        self.rpc_void("create_notification", &notification).await
    }

    async fn list_notifications(&self, user_id: Uuid) -> BackendResult<Vec<NotificationWithActor>> {
        self.select(
            "notifications",
            NOTIFICATION_SELECT,
            &[eq("user_id", user_id)],
            Some("created_at.desc"),
        )
        .await
    }

    async fn mark_notification_read(&self, id: Uuid) -> BackendResult<()> {
        self.update("notifications", &[eq("id", id)], &json!({ "is_read": true }))
            .await
    }

    async fn list_wishlist(&self, user_id: Uuid) -> BackendResult<Vec<WishlistItem>> {
        self.select(
            "wishlist_items",
            "*",
            &[eq("user_id", user_id)],
            Some("created_at.desc"),
        )
        .await
    }

    async fn insert_wishlist_item(&self, item: NewWishlistItem) -> BackendResult<WishlistItem> {
        self.insert_returning("wishlist_items", "*", &item).await
    }

    async fn delete_wishlist_item(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.delete("wishlist_items", &[eq("id", id), eq("user_id", owner)])
            .await
    }

    async fn upload(&self, bucket: Bucket, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<()> {
        self.storage_upload(bucket, path, bytes, content_type).await
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.storage_public_url(bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_body_yields_its_message() {
        let body = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        let (code, message) = parse_error_body(400, body);
        assert_eq!(message, "Invalid login credentials");
        assert_eq!(code.as_deref(), Some("invalid_credentials"));

        let legacy = r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#;
        assert_eq!(parse_error_body(400, legacy).1, "Email not confirmed");
    }

    #[test]
    fn row_error_body_yields_code_and_message() {
        let body = r#"{"code":"42501","details":null,"hint":null,"message":"new row violates row-level security policy for table \"posts\""}"#;
        let (code, message) = parse_error_body(403, body);
        assert_eq!(code.as_deref(), Some("42501"));
        assert!(message.starts_with("new row violates row-level security policy"));
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        assert_eq!(parse_error_body(502, "").1, "request failed with status 502");
        assert_eq!(parse_error_body(500, "upstream down").1, "upstream down");
    }

    #[test]
    fn urls_are_built_from_the_project_origin() {
        let backend = RemoteBackend::new(BackendConfig::new("https://abc.supabase.co", "anon"));
        assert_eq!(
            backend.public_url(Bucket::PostImages, "u/1_a.png"),
            "https://abc.supabase.co/storage/v1/object/public/post-images/u/1_a.png"
        );
        let url = backend
            .oauth_authorize_url(OAuthProvider::Google, "https://edubridgepeople.com")
            .unwrap();
        assert_eq!(
            url,
            "https://abc.supabase.co/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fedubridgepeople.com"
        );
    }
}
