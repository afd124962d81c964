use chrono::Utc;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{info, warn};
use url::Url;

use edubridge_types::{AuthUser, OAuthProvider, Session, SignUpMetadata, SignUpOutcome, SignUpRequest};

use crate::error::{BackendError, BackendResult};

use super::{RemoteBackend, check_auth};

/// Refresh when the token has less than this many seconds left.
const REFRESH_MARGIN_SECS: i64 = 60;

impl RemoteBackend {
    pub(crate) async fn auth_sign_up(&self, req: SignUpRequest) -> BackendResult<SignUpOutcome> {
        let mut builder = self
            .request(Method::POST, &self.auth_url("signup"))
            .json(&json!({
                "email": req.email,
                "password": req.password,
                "data": SignUpMetadata { username: req.username, role: req.role },
            }));
        if let Some(redirect) = &req.redirect_to {
            builder = builder.query(&[("redirect_to", redirect)]);
        }

        let value: Value = check_auth(builder.send().await?).await?.json().await?;

        // Auto-confirmed projects answer with a session, the rest with the bare user.
        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)?;
            info!(user_id = %session.user.id, "Signed up and signed in");
            self.set_session(Some(session.clone()));
            return Ok(SignUpOutcome {
                user: Some(session.user.clone()),
                session: Some(session),
            });
        }

        let user: AuthUser = serde_json::from_value(value)?;
        info!(user_id = %user.id, "Signed up, awaiting email confirmation");
        Ok(SignUpOutcome {
            user: Some(user),
            session: None,
        })
    }

    pub(crate) async fn auth_sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        let resp = self
            .request(Method::POST, &self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: Session = check_auth(resp).await?.json().await?;
        info!(user_id = %session.user.id, "Signed in");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    pub(crate) fn auth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> BackendResult<String> {
        let url = Url::parse_with_params(
            &self.auth_url("authorize"),
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|e| BackendError::Auth(e.to_string()))?;
        Ok(url.into())
    }

    pub(crate) async fn auth_sign_out(&self) -> BackendResult<()> {
        let resp = self
            .request(Method::POST, &self.auth_url("logout"))
            .send()
            .await?;
        check_auth(resp).await?;
        self.set_session(None);
        info!("Signed out");
        Ok(())
    }

    pub(crate) async fn auth_get_session(&self) -> BackendResult<Option<Session>> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        if !session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            self.set_session(None);
            return Ok(None);
        };
        match self.refresh(refresh_token).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.set_session(None);
                Ok(None)
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let resp = self
            .request(Method::POST, &self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let session: Session = check_auth(resp).await?.json().await?;
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    pub(crate) async fn auth_resend(&self, email: &str, redirect_to: Option<&str>) -> BackendResult<()> {
        let mut builder = self
            .request(Method::POST, &self.auth_url("resend"))
            .json(&json!({ "type": "signup", "email": email }));
        if let Some(redirect) = redirect_to {
            builder = builder.query(&[("redirect_to", redirect)]);
        }
        check_auth(builder.send().await?).await?;
        Ok(())
    }

    fn auth_url(&self, path: &str) -> String {
        self.config().endpoint(&format!("auth/v1/{}", path))
    }
}
