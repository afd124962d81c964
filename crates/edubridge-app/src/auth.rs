use tracing::info;

use edubridge_backend::BackendError;
use edubridge_types::{OAuthProvider, Role, Session, SignUpRequest};

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignUp,
    SignIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    SignedIn(Session),
    /// Registered; the confirmation link has been sent.
    AwaitingVerification,
}

/// What the form does with a failed sign-up or sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub text: String,
    pub show_verification: bool,
    pub switch_to_sign_in: bool,
}

/// Maps the auth service's messages onto what the form shows.
pub fn translate_auth_error(message: &str) -> AuthFailure {
    let mut failure = AuthFailure {
        text: if message.is_empty() {
            "Authentication failed".to_string()
        } else {
            message.to_string()
        },
        show_verification: false,
        switch_to_sign_in: false,
    };
    if message.contains("Invalid login credentials") {
        failure.text = "Invalid email or password.".into();
    } else if message.contains("Email not confirmed") {
        failure.text = "Please verify your email before signing in.".into();
        failure.show_verification = true;
    } else if message.contains("User already registered") {
        failure.text = "An account with this email already exists. Try signing in.".into();
        failure.switch_to_sign_in = true;
    }
    failure
}

/// Sign-up / sign-in modal.
pub struct AuthForm {
    ctx: AppContext,
    /// Mode the modal was opened in; restored on close.
    initial_mode: AuthMode,
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Address waiting for its confirmation link, when the verification state is shown.
    pub pending_verification: Option<String>,
}

impl AuthForm {
    pub fn new(ctx: AppContext, mode: AuthMode) -> Self {
        Self {
            ctx,
            initial_mode: mode,
            mode,
            email: String::new(),
            password: String::new(),
            role: Role::Student,
            pending_verification: None,
        }
    }

    /// Checks run before any remote call.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err("Please fill in all fields");
        }
        if self.mode == AuthMode::SignUp && self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters");
        }
        Ok(())
    }

    pub async fn submit(&mut self) -> AppResult<AuthOutcome> {
        if let Err(text) = self.validate() {
            self.ctx.toaster.error(text);
            return Err(AppError::Invalid(text.into()));
        }

        let result = match self.mode {
            AuthMode::SignUp => self.sign_up().await,
            AuthMode::SignIn => self.sign_in().await,
        };

        result.map_err(|err| {
            let failure = translate_auth_error(&err.to_string());
            if failure.show_verification {
                self.pending_verification = Some(self.email.clone());
            }
            if failure.switch_to_sign_in {
                self.mode = AuthMode::SignIn;
            }
            self.ctx.toaster.error(failure.text);
            AppError::backend("authentication failed", err)
        })
    }

    async fn sign_up(&mut self) -> Result<AuthOutcome, BackendError> {
        let req = SignUpRequest {
            email: self.email.clone(),
            password: self.password.clone(),
            username: default_username(&self.email),
            role: self.role,
            redirect_to: Some(self.ctx.link("verified=true")),
        };
        let outcome = self.ctx.backend.sign_up(req).await?;

        if outcome.needs_email_confirmation() {
            info!(email = %self.email, "Awaiting email confirmation");
            self.pending_verification = Some(self.email.clone());
            self.ctx.toaster.success("Check your email for a verification link!");
            return Ok(AuthOutcome::AwaitingVerification);
        }

        self.ctx.toaster.success("Registration successful!");
        match outcome.session {
            Some(session) => Ok(AuthOutcome::SignedIn(session)),
            None => Ok(AuthOutcome::AwaitingVerification),
        }
    }

    async fn sign_in(&mut self) -> Result<AuthOutcome, BackendError> {
        let session = self
            .ctx
            .backend
            .sign_in_with_password(&self.email, &self.password)
            .await?;
        self.ctx.toaster.success("Welcome back!");
        Ok(AuthOutcome::SignedIn(session))
    }

    /// Where to send the browser for Google sign-in.
    pub fn google_url(&self) -> AppResult<String> {
        self.ctx
            .backend
            .oauth_authorize_url(OAuthProvider::Google, &self.ctx.link("page=feed"))
            .map_err(|err| {
                self.ctx
                    .fail_with_message("Failed to sign in with Google.", "google sign-in", err)
            })
    }

    pub async fn resend_verification(&mut self) -> AppResult<()> {
        let email = self
            .pending_verification
            .clone()
            .unwrap_or_else(|| self.email.clone());
        if email.is_empty() {
            self.ctx.toaster.error("Failed to resend verification email.");
            return Err(AppError::Invalid("no email to verify".into()));
        }

        let redirect = self.ctx.link("verified=true");
        match self
            .ctx
            .backend
            .resend_verification(&email, Some(&redirect))
            .await
        {
            Ok(()) => {
                self.ctx
                    .toaster
                    .success("Verification email sent! Please check your inbox.");
                Ok(())
            }
            Err(err) => Err(self.ctx.fail(
                "Failed to resend verification email.",
                "resend verification",
                err,
            )),
        }
    }

    /// Closing the modal forgets everything typed.
    pub fn close(&mut self) {
        self.mode = self.initial_mode;
        self.email.clear();
        self.password.clear();
        self.role = Role::Student;
        self.pending_verification = None;
    }
}

/// The part of the address before '@'.
pub fn default_username(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
