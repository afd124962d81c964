use tracing::{debug, info, warn};
use url::form_urlencoded;
use uuid::Uuid;

use edubridge_types::Session;

use crate::auth::AuthMode;
use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};

/// Routed pages, addressed by `?page=…` query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Feed { post: Option<Uuid> },
    Profile,
    Privacy,
    Terms,
    Verification,
    Messages { recipient: Option<Uuid> },
    Notifications,
    Wishlist,
}

impl Default for Page {
    fn default() -> Self {
        Page::Feed { post: None }
    }
}

impl Page {
    /// Unknown or missing pages fall back to the feed.
    pub fn from_query(query: &str) -> Page {
        let query = query.trim_start_matches('?');
        let mut page = None;
        let mut post = None;
        let mut recipient = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => page = Some(value.into_owned()),
                "post" => post = Uuid::parse_str(&value).ok(),
                "recipient" => recipient = Uuid::parse_str(&value).ok(),
                _ => {}
            }
        }

        match page.as_deref() {
            Some("profile") => Page::Profile,
            Some("privacy") => Page::Privacy,
            Some("terms") => Page::Terms,
            Some("verification") => Page::Verification,
            Some("messages") => Page::Messages { recipient },
            Some("notifications") => Page::Notifications,
            Some("wishlist") => Page::Wishlist,
            _ => Page::Feed { post },
        }
    }

    pub fn to_query(&self) -> String {
        match self {
            Page::Feed { post: Some(id) } => format!("page=feed&post={}", id),
            Page::Feed { post: None } => "page=feed".into(),
            Page::Profile => "page=profile".into(),
            Page::Privacy => "page=privacy".into(),
            Page::Terms => "page=terms".into(),
            Page::Verification => "page=verification".into(),
            Page::Messages { recipient: Some(id) } => format!("page=messages&recipient={}", id),
            Page::Messages { recipient: None } => "page=messages".into(),
            Page::Notifications => "page=notifications".into(),
            Page::Wishlist => "page=wishlist".into(),
        }
    }
}

/// Root layout: who is signed in, which page is open, the header search box
/// and the auth modal.
pub struct Shell {
    ctx: AppContext,
    pub viewer: Option<Viewer>,
    pub page: Page,
    pub search: String,
    /// Open auth modal, if any.
    pub auth_modal: Option<AuthMode>,
}

impl Shell {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            viewer: None,
            page: Page::default(),
            search: String::new(),
            auth_modal: None,
        }
    }

    /// Start-up: restore whatever session the backend holds.
    pub async fn restore_session(&mut self) -> AppResult<()> {
        let session = self
            .ctx
            .backend
            .get_session()
            .await
            .map_err(|err| AppError::backend("restore session", err))?;
        self.apply_session(session).await;
        Ok(())
    }

    /// Re-derive the viewer from a session. A failed profile fetch leaves the
    /// viewer without a profile.
    pub async fn apply_session(&mut self, session: Option<Session>) {
        let Some(session) = session else {
            if self.viewer.take().is_some() {
                debug!("Viewer cleared");
            }
            return;
        };

        let user = session.user;
        let profile = match self.ctx.backend.fetch_profile(user.id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(user_id = %user.id, "Profile fetch failed: {}", err);
                None
            }
        };
        if profile.is_none() {
            info!(user_id = %user.id, "No profile found for user");
        }
        self.viewer = Some(Viewer { user, profile });
    }

    /// After verification changes, pick up the new profile row.
    pub async fn refresh_profile(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        match self.ctx.backend.fetch_profile(viewer.user.id).await {
            Ok(Some(profile)) => viewer.profile = Some(profile),
            Ok(None) => {}
            Err(err) => warn!("Profile refresh failed: {}", err),
        }
    }

    pub async fn sign_out(&mut self) -> AppResult<()> {
        match self.ctx.backend.sign_out().await {
            Ok(()) => {
                self.viewer = None;
                self.ctx.toaster.success("Signed out successfully");
                Ok(())
            }
            Err(err) => Err(self.ctx.fail("Error signing out", "sign out", err)),
        }
    }

    /// Handles a landing URL query: the email-confirmation redirect toasts and
    /// goes to the feed, anything else is routed as is.
    pub fn land(&mut self, query: &str) {
        let verified = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .any(|(key, value)| key == "verified" && value == "true");
        if verified {
            self.ctx
                .toaster
                .success("Email Verified! Welcome to Edubridgepeople.");
            self.page = Page::default();
        } else {
            self.page = Page::from_query(query);
        }
    }

    pub fn navigate(&mut self, page: Page) {
        debug!(page = %page.to_query(), "Navigate");
        self.page = page;
    }

    pub fn open_auth(&mut self, mode: AuthMode) {
        self.auth_modal = Some(mode);
    }

    pub fn close_auth(&mut self) {
        self.auth_modal = None;
    }

    /// Member UI needs a confirmed email and a profile.
    pub fn is_member(&self) -> bool {
        self.viewer.as_ref().is_some_and(Viewer::is_member)
    }

    pub fn member(&self) -> Option<&Viewer> {
        self.viewer.as_ref().filter(|viewer| viewer.is_member())
    }
}
