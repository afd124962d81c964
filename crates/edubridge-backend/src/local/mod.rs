//! Self-contained backend: SQLite rows, objects on disk and an in-process
//! realtime feed. Row-level rules mirror the hosted policies: anyone reads
//! posts and profiles, only the owner writes their rows.

pub mod auth;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use edubridge_db::Database;
use edubridge_db::models::UserRow;
use edubridge_db::queries::{ConstraintKind, constraint_violation};
use edubridge_types::{
    Bucket, FeedPost, Message, NewComment, NewMessage, NewNotification, NewPost, NewWishlistItem,
    NotificationWithActor, OAuthProvider, PostUpdate, Profile, RealtimeEvent, Session,
    SignUpMetadata, SignUpOutcome, SignUpRequest, ThreadComment, VerificationStatus, WishlistItem,
};

use crate::backend::{Backend, MessageSubscription};
use crate::config::LocalConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{
    BackendError, BackendResult, EMAIL_NOT_CONFIRMED, INVALID_CREDENTIALS, USER_ALREADY_REGISTERED,
};

use self::storage::ObjectStore;

#[derive(Clone)]
pub struct LocalBackend {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    db: Arc<Database>,
    objects: ObjectStore,
    dispatcher: Dispatcher,
    session: watch::Sender<Option<Session>>,
    jwt_secret: String,
    auto_confirm: bool,
}

impl LocalBackend {
    pub fn open(config: &LocalConfig) -> BackendResult<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        info!(
            storage = %config.storage_dir.display(),
            auto_confirm = config.auto_confirm,
            "Local backend ready"
        );
        Ok(Self::with_database(db, config))
    }

    pub fn with_database(db: Database, config: &LocalConfig) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Arc::new(LocalInner {
                db: Arc::new(db),
                objects: ObjectStore::new(config.storage_dir.clone(), config.public_base()),
                dispatcher: Dispatcher::new(),
                session,
                jwt_secret: config.jwt_secret.clone(),
                auto_confirm: config.auto_confirm,
            }),
        }
    }

    /// Follows the confirmation link of `email`.
    pub async fn confirm_email(&self, email: &str) -> BackendResult<()> {
        let email = email.to_string();
        let found = self
            .blocking(move |db| db.confirm_email(&email, Utc::now()))
            .await?;
        if !found {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }

    /// Run blocking DB work off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                BackendError::Store(anyhow::anyhow!("blocking task failed: {}", e))
            })?
            .map_err(store_error)
    }

    fn current_user(&self) -> BackendResult<Uuid> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| session.user.id)
            .ok_or(BackendError::NotSignedIn)
    }

    /// Writes are allowed only on rows the signed-in user owns.
    fn require_owner(&self, owner: Uuid) -> BackendResult<Uuid> {
        let me = self.current_user()?;
        if me != owner {
            warn!(%me, %owner, "Rejected write on a row owned by someone else");
            return Err(BackendError::row_level_security());
        }
        Ok(me)
    }

    fn set_session(&self, session: Option<Session>) {
        self.inner.session.send_replace(session);
    }
}

fn store_error(err: anyhow::Error) -> BackendError {
    match constraint_violation(&err) {
        Some(ConstraintKind::Unique) => BackendError::Api {
            status: 409,
            code: Some("23505".into()),
            message: "duplicate key value violates unique constraint".into(),
        },
        Some(ConstraintKind::ForeignKey) => BackendError::Api {
            status: 409,
            code: Some("23503".into()),
            message: "insert or update violates foreign key constraint".into(),
        },
        Some(ConstraintKind::Other) => BackendError::Api {
            status: 400,
            code: Some("23514".into()),
            message: "new row violates check constraint".into(),
        },
        None => BackendError::Store(err),
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn sign_up(&self, req: SignUpRequest) -> BackendResult<SignUpOutcome> {
        let email = req.email.trim().to_string();
        let password = req.password;
        let metadata = SignUpMetadata {
            username: req.username,
            role: req.role,
        };
        let confirmed = self.inner.auto_confirm;

        let (user, profile) = self
            .blocking(move |db| {
                if db.get_user_by_email(&email)?.is_some() {
                    return Ok(None);
                }
                let now = Utc::now();
                let id = Uuid::new_v4();
                let user = UserRow {
                    id,
                    email: email.clone(),
                    password: auth::hash_password(&password)?,
                    email_confirmed_at: confirmed.then_some(now),
                    created_at: now,
                };
                let profile = Profile {
                    id,
                    email: Some(email),
                    username: metadata.username,
                    role: metadata.role,
                    verification_status: VerificationStatus::Unverified,
                    avatar_url: None,
                    created_at: now,
                };
                db.create_account(&user, &profile)?;
                Ok(Some((user, profile)))
            })
            .await?
            .ok_or_else(|| BackendError::Auth(USER_ALREADY_REGISTERED.into()))?;

        let auth_user = auth::auth_user(&user, Some(&profile));
        info!(user_id = %user.id, email = %user.email, confirmed, "User signed up");

        if !confirmed {
            info!(
                email = %user.email,
                redirect_to = req.redirect_to.as_deref().unwrap_or(""),
                "Confirmation pending; call confirm_email to complete sign-up"
            );
            return Ok(SignUpOutcome {
                user: Some(auth_user),
                session: None,
            });
        }

        let session = auth::issue_session(&self.inner.jwt_secret, auth_user.clone(), Utc::now())?;
        self.set_session(Some(session.clone()));
        Ok(SignUpOutcome {
            user: Some(auth_user),
            session: Some(session),
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let email = email.trim().to_string();
        let password = password.to_string();

        let (user, profile) = self
            .blocking(move |db| {
                let Some(user) = db.get_user_by_email(&email)? else {
                    return Ok(None);
                };
                if !auth::verify_password(&password, &user.password) {
                    return Ok(None);
                }
                let profile = db.get_profile(user.id)?;
                Ok(Some((user, profile)))
            })
            .await?
            .ok_or_else(|| BackendError::Auth(INVALID_CREDENTIALS.into()))?;

        if user.email_confirmed_at.is_none() {
            return Err(BackendError::Auth(EMAIL_NOT_CONFIRMED.into()));
        }

        let session = auth::issue_session(
            &self.inner.jwt_secret,
            auth::auth_user(&user, profile.as_ref()),
            Utc::now(),
        )?;
        self.set_session(Some(session.clone()));
        info!(user_id = %user.id, "User signed in");
        Ok(session)
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, _redirect_to: &str) -> BackendResult<String> {
        Err(BackendError::Auth(format!(
            "Unsupported provider: provider {} is not enabled",
            provider.as_str()
        )))
    }

    async fn sign_out(&self) -> BackendResult<()> {
        if let Ok(user_id) = self.current_user() {
            info!(%user_id, "User signed out");
        }
        self.set_session(None);
        Ok(())
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        let current = self.inner.session.borrow().clone();
        match current {
            Some(session) if auth::verify_token(&self.inner.jwt_secret, &session.access_token).is_some() => {
                Ok(Some(session))
            }
            Some(_) => {
                debug!("Stored session expired");
                self.set_session(None);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn resend_verification(&self, email: &str, redirect_to: Option<&str>) -> BackendResult<()> {
        let lookup = email.trim().to_string();
        let user = self.blocking(move |db| db.get_user_by_email(&lookup)).await?;
        match user {
            Some(user) if user.email_confirmed_at.is_none() => {
                info!(
                    email = %user.email,
                    redirect_to = redirect_to.unwrap_or(""),
                    "Resent confirmation"
                );
            }
            _ => debug!(email, "Nothing to resend"),
        }
        Ok(())
    }

    fn session_changes(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    async fn fetch_profile(&self, user_id: Uuid) -> BackendResult<Option<Profile>> {
        self.blocking(move |db| db.get_profile(user_id)).await
    }

    async fn set_verification_status(&self, user_id: Uuid, status: VerificationStatus) -> BackendResult<()> {
        self.require_owner(user_id)?;
        self.blocking(move |db| db.set_verification_status(user_id, status))
            .await?;
        info!(%user_id, status = status.as_str(), "Verification status changed");
        Ok(())
    }

    async fn list_posts(&self) -> BackendResult<Vec<FeedPost>> {
        self.blocking(|db| db.list_feed_posts()).await
    }

    async fn insert_post(&self, post: NewPost) -> BackendResult<FeedPost> {
        self.require_owner(post.user_id)?;
        let id = Uuid::new_v4();
        let created = self
            .blocking(move |db| {
                db.insert_post(id, &post, Utc::now())?;
                db.get_feed_post(id)
            })
            .await?;
        created.ok_or(BackendError::NotFound)
    }

    async fn update_post(&self, id: Uuid, owner: Uuid, update: PostUpdate) -> BackendResult<()> {
        self.require_owner(owner)?;
        let changed = self
            .blocking(move |db| db.update_post(id, owner, &update))
            .await?;
        debug!(post_id = %id, changed, "Updated post");
        Ok(())
    }

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.require_owner(owner)?;
        let changed = self.blocking(move |db| db.delete_post(id, owner)).await?;
        debug!(post_id = %id, changed, "Deleted post");
        Ok(())
    }

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.require_owner(user_id)?;
        self.blocking(move |db| db.insert_like(post_id, user_id, Utc::now()))
            .await
    }

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        self.require_owner(user_id)?;
        self.blocking(move |db| db.delete_like(post_id, user_id))
            .await?;
        Ok(())
    }

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<ThreadComment> {
        self.require_owner(comment.user_id)?;
        let id = Uuid::new_v4();
        let created = self
            .blocking(move |db| {
                db.insert_comment(id, &comment, Utc::now())?;
                db.get_thread_comment(id)
            })
            .await?;
        created.ok_or(BackendError::NotFound)
    }

    async fn update_comment(&self, id: Uuid, owner: Uuid, content: &str) -> BackendResult<()> {
        self.require_owner(owner)?;
        let content = content.to_string();
        self.blocking(move |db| db.update_comment(id, owner, &content))
            .await?;
        Ok(())
    }

    async fn delete_comment(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.require_owner(owner)?;
        self.blocking(move |db| db.delete_comment(id, owner)).await?;
        Ok(())
    }

    async fn get_conversations(&self, current_user_id: Uuid) -> BackendResult<Vec<Profile>> {
        if self.current_user()? != current_user_id {
            return Ok(Vec::new());
        }
        self.blocking(move |db| db.get_conversations(current_user_id))
            .await
    }

    async fn get_messages(&self, user1_id: Uuid, user2_id: Uuid) -> BackendResult<Vec<Message>> {
        let me = self.current_user()?;
        // Only conversations the caller takes part in are visible.
        if me != user1_id && me != user2_id {
            return Ok(Vec::new());
        }
        self.blocking(move |db| db.get_messages(user1_id, user2_id))
            .await
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<()> {
        self.require_owner(message.sender_id)?;
        let id = Uuid::new_v4();
        let stored = self
            .blocking(move |db| db.insert_message(id, &message, Utc::now()))
            .await?;
        self.inner
            .dispatcher
            .broadcast(RealtimeEvent::MessageInsert(stored));
        Ok(())
    }

    async fn subscribe_messages(&self, recipient_id: Uuid) -> BackendResult<MessageSubscription> {
        // Only the recipient may listen to their own inbox.
        self.require_owner(recipient_id)?;
        let mut events = self.inner.dispatcher.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.recipient_id() == recipient_id => {
                        let RealtimeEvent::MessageInsert(message) = event;
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%recipient_id, "Realtime subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!(%recipient_id, "Subscribed to message inserts");
        Ok(MessageSubscription::new(rx, task))
    }

    async fn create_notification(&self, notification: NewNotification) -> BackendResult<()> {
        self.require_owner(notification.actor_id)?;
        let id = Uuid::new_v4();
        self.blocking(move |db| db.insert_notification(id, &notification, Utc::now()))
            .await
    }

    async fn list_notifications(&self, user_id: Uuid) -> BackendResult<Vec<NotificationWithActor>> {
        if self.current_user()? != user_id {
            return Ok(Vec::new());
        }
        self.blocking(move |db| db.list_notifications(user_id)).await
    }

    async fn mark_notification_read(&self, id: Uuid) -> BackendResult<()> {
        let me = self.current_user()?;
        let owner = self.blocking(move |db| db.notification_owner(id)).await?;
        match owner {
            Some(owner) if owner != me => Err(BackendError::row_level_security()),
            Some(_) => {
                self.blocking(move |db| db.mark_notification_read(id)).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn list_wishlist(&self, user_id: Uuid) -> BackendResult<Vec<WishlistItem>> {
        if self.current_user()? != user_id {
            return Ok(Vec::new());
        }
        self.blocking(move |db| db.list_wishlist(user_id)).await
    }

    async fn insert_wishlist_item(&self, item: NewWishlistItem) -> BackendResult<WishlistItem> {
        self.require_owner(item.user_id)?;
        let id = Uuid::new_v4();
        self.blocking(move |db| db.insert_wishlist_item(id, &item, Utc::now()))
            .await
    }

    async fn delete_wishlist_item(&self, id: Uuid, owner: Uuid) -> BackendResult<()> {
        self.require_owner(owner)?;
        self.blocking(move |db| db.delete_wishlist_item(id, owner))
            .await?;
        Ok(())
    }

    async fn upload(&self, bucket: Bucket, path: &str, bytes: Vec<u8>, _content_type: &str) -> BackendResult<()> {
        let me = self.current_user()?;
        // Objects live under a folder named after their owner.
        let folder = path.split('/').next().unwrap_or_default();
        if folder != me.to_string() {
            return Err(BackendError::row_level_security());
        }
        self.inner.objects.put(bucket, path, &bytes).await
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.inner.objects.public_url(bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edubridge_types::{NotificationType, PostType, Role};

    fn backend(auto_confirm: bool) -> LocalBackend {
        let dir = std::env::temp_dir().join(format!("edubridge-local-{}", Uuid::new_v4()));
        let mut config = LocalConfig::in_memory(dir);
        config.auto_confirm = auto_confirm;
        LocalBackend::open(&config).unwrap()
    }

    fn sign_up_request(email: &str, role: Role) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: "secret1".into(),
            username: email.split('@').next().unwrap().into(),
            role,
            redirect_to: None,
        }
    }

    #[tokio::test]
    async fn sign_up_twice_reports_existing_user() {
        let backend = backend(true);
        let outcome = backend.sign_up(sign_up_request("ana@example.com", Role::Student)).await.unwrap();
        assert!(outcome.session.is_some());
        assert_eq!(outcome.user.unwrap().metadata_role(), Role::Student);

        let err = backend.sign_up(sign_up_request("ana@example.com", Role::Donor)).await.unwrap_err();
        assert!(err.is(USER_ALREADY_REGISTERED));
    }

    #[tokio::test]
    async fn unconfirmed_email_blocks_sign_in_until_confirmed() {
        let backend = backend(false);
        let outcome = backend.sign_up(sign_up_request("bo@example.com", Role::Donor)).await.unwrap();
        assert!(outcome.needs_email_confirmation());
        assert!(backend.get_session().await.unwrap().is_none());

        let err = backend.sign_in_with_password("bo@example.com", "secret1").await.unwrap_err();
        assert!(err.is(EMAIL_NOT_CONFIRMED));

        backend.confirm_email("bo@example.com").await.unwrap();
        let session = backend.sign_in_with_password("bo@example.com", "secret1").await.unwrap();
        assert!(session.user.is_confirmed());

        let err = backend.sign_in_with_password("bo@example.com", "wrong").await.unwrap_err();
        assert!(err.is(INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn writes_on_foreign_rows_are_rejected() {
        let backend = backend(true);
        let alice = backend.sign_up(sign_up_request("alice@example.com", Role::Donor)).await.unwrap();
        let alice_id = alice.user.unwrap().id;
        let post = backend.insert_post(NewPost::new(alice_id, PostType::Wisdom)).await.unwrap();

        let bob = backend.sign_up(sign_up_request("bob@example.com", Role::Student)).await.unwrap();
        let bob_id = bob.user.unwrap().id;

        let err = backend.delete_post(post.id(), alice_id).await.unwrap_err();
        assert_eq!(err.to_string(), crate::error::ROW_LEVEL_SECURITY);

        backend.insert_like(post.id(), bob_id).await.unwrap();
        let err = backend.insert_like(post.id(), bob_id).await.unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 409, .. }));

        backend
            .create_notification(NewNotification {
                user_id: alice_id,
                kind: NotificationType::Like,
                actor_id: bob_id,
                post_id: Some(post.id()),
            })
            .await
            .unwrap();
        assert!(backend.list_notifications(alice_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn message_subscription_sees_only_its_recipient() {
        let backend = backend(true);
        let ana = backend.sign_up(sign_up_request("ana@example.com", Role::Student)).await.unwrap();
        let ana_id = ana.user.unwrap().id;
        let mut for_ana = backend.subscribe_messages(ana_id).await.unwrap();

        let bo = backend.sign_up(sign_up_request("bo@example.com", Role::Donor)).await.unwrap();
        let bo_id = bo.user.unwrap().id;
        let mut for_bo = backend.subscribe_messages(bo_id).await.unwrap();

        backend
            .insert_message(NewMessage {
                sender_id: bo_id,
                recipient_id: ana_id,
                content: "hello".into(),
            })
            .await
            .unwrap();

        let received = for_ana.recv().await.unwrap();
        assert_eq!(received.content, "hello");
        tokio::task::yield_now().await;
        assert!(for_bo.try_recv().is_none());
    }

    #[tokio::test]
    async fn conversations_and_inbox_stay_private() {
        let backend = backend(true);
        let ana = backend.sign_up(sign_up_request("ana@example.com", Role::Student)).await.unwrap();
        let ana_id = ana.user.unwrap().id;
        let bo = backend.sign_up(sign_up_request("bo@example.com", Role::Donor)).await.unwrap();
        let bo_id = bo.user.unwrap().id;

        backend
            .insert_message(NewMessage {
                sender_id: bo_id,
                recipient_id: ana_id,
                content: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(backend.get_conversations(bo_id).await.unwrap().len(), 1);

        let _cy = backend.sign_up(sign_up_request("cy@example.com", Role::Student)).await.unwrap();
        assert!(backend.get_conversations(ana_id).await.unwrap().is_empty());
        assert!(backend.get_conversations(bo_id).await.unwrap().is_empty());
        assert!(backend.get_messages(ana_id, bo_id).await.unwrap().is_empty());

        let Err(err) = backend.subscribe_messages(ana_id).await else {
            panic!("subscribed to someone else's inbox");
        };
        assert_eq!(err.to_string(), crate::error::ROW_LEVEL_SECURITY);
    }

    #[tokio::test]
    async fn uploads_go_under_the_owner_folder() {
        let backend = backend(true);
        let ana = backend.sign_up(sign_up_request("ana@example.com", Role::Student)).await.unwrap();
        let ana_id = ana.user.unwrap().id;

        let own = format!("{ana_id}/1_card.png");
        backend.upload(Bucket::VerificationUploads, &own, b"png".to_vec(), "image/png").await.unwrap();

        let other = format!("{}/1_card.png", Uuid::new_v4());
        let err = backend
            .upload(Bucket::VerificationUploads, &other, b"png".to_vec(), "image/png")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), crate::error::ROW_LEVEL_SECURITY);
    }
}
