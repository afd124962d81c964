use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a stored or typed-in value is not one of an enum's wire names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lowercase wire-name enums shared by the row API, the SQLite store and the shell.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum!(
    /// Account role chosen at sign-up.
    Role, "role" {
        Student => "student",
        Donor => "donor",
    }
);

wire_enum!(
    /// Student verification state. Gates resource claiming.
    VerificationStatus, "verification status" {
        Unverified => "unverified",
        Pending => "pending",
        Verified => "verified",
    }
);

wire_enum!(
    PostType, "post type" {
        Wisdom => "wisdom",
        Donation => "donation",
        Seeking => "seeking",
    }
);

wire_enum!(
    NotificationType, "notification type" {
        Like => "like",
        Comment => "comment",
    }
);

wire_enum!(
    /// Categories offered by the post composer and the wishlist form.
    ResourceCategory, "category" {
        Books => "books",
        Electronics => "electronics",
        Courses => "courses",
        Other => "other",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub username: String,
    pub role: Role,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Donors are trusted by default; students only once verified.
    pub fn shows_verified_badge(&self) -> bool {
        self.role == Role::Donor || self.verification_status == VerificationStatus::Verified
    }

    pub fn is_verified_student(&self) -> bool {
        self.role == Role::Student && self.verification_status == VerificationStatus::Verified
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_type: PostType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub resource_title: Option<String>,
    #[serde(default)]
    pub resource_category: Option<String>,
    #[serde(default)]
    pub resource_contact: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub link_title: Option<String>,
    #[serde(default)]
    pub link_description: Option<String>,
    #[serde(default)]
    pub link_image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Uniqueness of (post_id, user_id) is the backend's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub post_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other side of the conversation, seen from `me`.
    pub fn counterpart(&self, me: Uuid) -> Uuid {
        if self.sender_id == me {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient.
    pub user_id: Uuid,
    pub actor_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub post_id: Option<Uuid>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_description: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

// -- Joined shapes --

/// A comment with its author embedded, as returned by `comments(*, profiles(*))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadComment {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(rename = "profiles", default)]
    pub author: Option<Profile>,
}

/// A post with author, likes and comments embedded, as rendered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(rename = "profiles", default)]
    pub author: Option<Profile>,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<ThreadComment>,
}

impl FeedPost {
    pub fn id(&self) -> Uuid {
        self.post.id
    }

    pub fn liked_by(&self, user_id: Uuid) -> bool {
        self.likes.iter().any(|like| like.user_id == user_id)
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|profile| profile.username.as_str())
            .unwrap_or("unknown")
    }
}

/// A notification with the acting user's profile, as returned by `profiles:actor_id(*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationWithActor {
    #[serde(flatten)]
    pub notification: Notification,
    #[serde(rename = "profiles", default)]
    pub actor: Option<Profile>,
}

impl NotificationWithActor {
    pub fn actor_name(&self) -> &str {
        self.actor
            .as_ref()
            .map(|profile| profile.username.as_str())
            .unwrap_or("Someone")
    }
}
