use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use edubridge_backend::{Backend, BackendError};
use edubridge_types::{AuthUser, Profile, Role, VerificationStatus};

use crate::error::AppError;
use crate::toast::Toaster;

/// Shared handles every view works through.
#[derive(Clone)]
pub struct AppContext {
    pub backend: Arc<dyn Backend>,
    pub toaster: Toaster,
    /// Origin used for redirect targets and share links.
    pub site_url: String,
}

impl AppContext {
    pub fn new(backend: Arc<dyn Backend>, toaster: Toaster, site_url: impl Into<String>) -> Self {
        let site_url = site_url.into().trim_end_matches('/').to_string();
        Self {
            backend,
            toaster,
            site_url,
        }
    }

    /// `{site}/?{query}`
    pub fn link(&self, query: &str) -> String {
        format!("{}/?{}", self.site_url, query)
    }

    /// Toast `text`, log the cause and wrap it.
    pub(crate) fn fail(&self, text: &str, context: &'static str, err: BackendError) -> AppError {
        warn!("{}: {}", context, err);
        self.toaster.error(text);
        AppError::backend(context, err)
    }

    /// Toast the backend's own message, or `fallback` when it has none.
    pub(crate) fn fail_with_message(&self, fallback: &str, context: &'static str, err: BackendError) -> AppError {
        warn!("{}: {}", context, err);
        let message = err.to_string();
        if message.trim().is_empty() {
            self.toaster.error(fallback);
        } else {
            self.toaster.error(message);
        }
        AppError::backend(context, err)
    }
}

/// The signed-in user as the shell knows them.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub user: AuthUser,
    /// None when the profile row is missing or could not be fetched.
    pub profile: Option<Profile>,
}

impl Viewer {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    /// Member features need a confirmed email and a profile.
    pub fn is_member(&self) -> bool {
        self.user.is_confirmed() && self.profile.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|profile| profile.role)
    }

    pub fn is_student(&self) -> bool {
        self.role() == Some(Role::Student)
    }

    pub fn verification_status(&self) -> Option<VerificationStatus> {
        self.profile.as_ref().map(|profile| profile.verification_status)
    }

    pub fn shows_verified_badge(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|profile| profile.shows_verified_badge())
    }
}
