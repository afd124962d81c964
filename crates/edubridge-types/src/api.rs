use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NotificationType, PostType, Role};

// -- Auth --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub role: Role,
    /// Where the confirmation link lands.
    pub redirect_to: Option<String>,
}

/// Profile fields carried in the auth user's metadata at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }

    /// Role recorded at sign-up, students when absent or unreadable.
    pub fn metadata_role(&self) -> Role {
        self.user_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Role::Student)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    /// True when the access token expires within `margin_secs`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at
            .map(|exp| exp <= now.timestamp() + margin_secs)
            .unwrap_or(false)
    }
}

/// Sign-up either signs the user straight in (auto-confirm) or returns the
/// unconfirmed user and waits for the email link.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
}

impl SignUpOutcome {
    pub fn needs_email_confirmation(&self) -> bool {
        self.user.as_ref().is_some_and(|user| !user.is_confirmed())
    }
}

// -- Posts --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub user_id: Uuid,
    pub post_type: PostType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewPost {
    pub fn new(user_id: Uuid, post_type: PostType) -> Self {
        Self {
            user_id,
            post_type,
            content: None,
            resource_title: None,
            resource_category: None,
            resource_contact: None,
            link_url: None,
            link_title: None,
            link_description: None,
            link_image: None,
            image_url: None,
        }
    }
}

/// Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostUpdate {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_image: Option<String>,
}

// -- Comments --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
}

// -- Notifications --

/// Arguments of the `create_notification` procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    #[serde(rename = "p_user_id")]
    pub user_id: Uuid,
    #[serde(rename = "p_type")]
    pub kind: NotificationType,
    #[serde(rename = "p_actor_id")]
    pub actor_id: Uuid,
    #[serde(rename = "p_post_id")]
    pub post_id: Option<Uuid>,
}

// -- Wishlist --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWishlistItem {
    pub user_id: Uuid,
    pub item_description: String,
    pub category: String,
}

// -- Storage --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    PostImages,
    VerificationUploads,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::PostImages => "post-images",
            Bucket::VerificationUploads => "verification-uploads",
        }
    }
}
