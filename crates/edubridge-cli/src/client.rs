use std::path::Path;

use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use edubridge_app::auth::{AuthForm, AuthMode};
use edubridge_app::feed::{ClaimOutcome, FeedView};
use edubridge_app::messages::MessagesView;
use edubridge_app::notifications::NotificationsView;
use edubridge_app::upload::Attachment;
use edubridge_app::verification::VerificationView;
use edubridge_app::wishlist::WishlistView;
use edubridge_app::{AppContext, AppError, AppResult, Page, Shell};
use edubridge_backend::{LocalBackend, MessageSubscription};
use edubridge_types::{Message, Session};

use crate::command::{Command, Draft, HELP};
use crate::render;

/// Every page's view state plus what the terminal needs on top: the numbering
/// of the last listing and the realtime subscription of the signed-in user.
pub struct Client {
    ctx: AppContext,
    local: Option<LocalBackend>,
    shell: Shell,
    auth: AuthForm,
    feed: FeedView,
    messages: MessagesView,
    notifications: NotificationsView,
    wishlist: WishlistView,
    verification: VerificationView,
    /// Post ids in the order last printed.
    listing: Vec<Uuid>,
    pub subscription: Option<MessageSubscription>,
    subscribed_as: Option<Uuid>,
}

/// Views toast their own failures; the shell only notes the silent ones.
fn settle<T>(result: AppResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(AppError::Backend { context, source }) => {
            debug!("{} failed: {}", context, source);
            None
        }
        Err(err) => {
            println!("   ({})", err);
            None
        }
    }
}

impl Client {
    pub fn new(ctx: AppContext, local: Option<LocalBackend>) -> Self {
        Self {
            shell: Shell::new(ctx.clone()),
            auth: AuthForm::new(ctx.clone(), AuthMode::SignIn),
            feed: FeedView::new(ctx.clone()),
            messages: MessagesView::new(ctx.clone()),
            notifications: NotificationsView::new(ctx.clone()),
            wishlist: WishlistView::new(ctx.clone()),
            verification: VerificationView::new(ctx.clone()),
            listing: Vec::new(),
            subscription: None,
            subscribed_as: None,
            local,
            ctx,
        }
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.shell.restore_session().await?;
        self.resubscribe().await;
        self.show(Page::default()).await;
        Ok(())
    }

    /// Session changed underneath us (sign-in, sign-out, refresh).
    pub async fn on_session(&mut self, session: Option<Session>) {
        self.shell.apply_session(session).await;
        self.resubscribe().await;
    }

    async fn resubscribe(&mut self) {
        let user = self.shell.viewer.as_ref().map(|v| v.id());
        if user == self.subscribed_as {
            return;
        }
        self.subscription = None;
        self.subscribed_as = None;

        let Some(user) = user else {
            return;
        };
        match self.ctx.backend.subscribe_messages(user).await {
            Ok(subscription) => {
                info!(user_id = %user, "Listening for messages");
                self.subscription = Some(subscription);
                self.subscribed_as = Some(user);
            }
            Err(err) => warn!("Realtime subscription failed: {}", err),
        }
    }

    pub async fn on_message(&mut self, message: Message) {
        let Some(viewer) = self.shell.member() else {
            return;
        };
        if settle(self.messages.on_incoming(viewer, message.clone()).await).is_some()
            && matches!(self.shell.page, Page::Messages { .. })
            && self.messages.selected.as_ref().map(|p| p.id) == Some(message.sender_id)
        {
            let other = self.messages.selected.as_ref().map(|p| p.username.as_str()).unwrap_or("");
            println!("{}", render::message(&message, viewer.id(), other, Utc::now()));
        }
    }

    /// Runs one input line. Returns false on `quit`.
    pub async fn handle(&mut self, line: &str) -> anyhow::Result<bool> {
        let command = match crate::command::parse(line) {
            Ok(command) => command,
            Err(err) => {
                println!("   {}", err);
                return Ok(true);
            }
        };
        debug!(?command, "Command");

        match command {
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),

            Command::SignUp { email, password, role } => {
                self.shell.open_auth(AuthMode::SignUp);
                self.auth.mode = AuthMode::SignUp;
                self.auth.email = email;
                self.auth.password = password;
                self.auth.role = role;
                self.submit_auth().await;
            }
            Command::SignIn { email, password } => {
                self.shell.open_auth(AuthMode::SignIn);
                self.auth.mode = AuthMode::SignIn;
                self.auth.email = email;
                self.auth.password = password;
                self.submit_auth().await;
            }
            Command::Google => {
                if let Some(url) = settle(self.auth.google_url()) {
                    println!("Open in a browser: {}", url);
                }
            }
            Command::Resend => {
                settle(self.auth.resend_verification().await);
            }
            Command::SignOut => {
                if settle(self.shell.sign_out().await).is_some() {
                    self.resubscribe().await;
                    self.show(Page::default()).await;
                }
            }
            Command::Confirm { email } => {
                let local = self
                    .local
                    .as_ref()
                    .ok_or_else(|| anyhow!("confirm only works with the local backend"))?;
                local.confirm_email(&email).await?;
                println!("Confirmed {}.", email);
                self.shell.land("verified=true");
                self.show(self.shell.page).await;
            }
            Command::Land(query) => {
                self.shell.land(&query);
                self.show(self.shell.page).await;
            }
            Command::Go(page) => self.show(page).await,

            Command::Feed => self.show(Page::default()).await,
            Command::Filter(filter) => {
                self.feed.filter = filter;
                self.print_feed();
            }
            Command::Sort(sort) => {
                self.feed.sort = sort;
                self.print_feed();
            }
            Command::Search(text) => {
                self.shell.search = text;
                self.print_feed();
            }
            Command::Post(draft) => self.post(draft).await,
            Command::Attach(path) => {
                self.feed.composer.image = Some(read_attachment(&path).await?);
                println!("Attached {} to the next post.", path.display());
            }
            Command::Like(n) => {
                let id = self.post_at(n)?;
                if settle(self.feed.toggle_like(self.shell.viewer.as_ref(), id).await).is_some() {
                    self.print_feed();
                }
            }
            Command::Comments(n) => {
                let id = self.post_at(n)?;
                if settle(self.feed.toggle_comments(id)) == Some(true) {
                    self.print_comments(id);
                }
            }
            Command::Comment { index, text } => {
                let id = self.post_at(index)?;
                if !self.feed.threads.contains_key(&id) {
                    settle(self.feed.toggle_comments(id));
                }
                if let Some(thread) = self.feed.threads.get_mut(&id) {
                    thread.draft = text;
                    settle(thread.add(self.shell.member()).await);
                }
                self.feed.sync_thread(id);
                self.print_comments(id);
            }
            Command::Edit { index, text } => {
                let id = self.post_at(index)?;
                let viewer = self.shell.viewer.as_ref();
                if settle(self.feed.start_edit(viewer, id)).is_some() {
                    if let Some(edit) = self.feed.editing.as_mut() {
                        edit.content = text;
                    }
                    settle(self.feed.save_edit(viewer).await);
                }
            }
            Command::Delete(n) => {
                let id = self.post_at(n)?;
                if settle(self.feed.delete(self.shell.viewer.as_ref(), id).await).is_some() {
                    self.print_feed();
                }
            }
            Command::Claim(n) => {
                let id = self.post_at(n)?;
                match settle(self.feed.claim(self.shell.viewer.as_ref(), id)) {
                    Some(ClaimOutcome::Contact { donor, title, contact }) => {
                        println!("Contact {} about {}:", donor, title.as_deref().unwrap_or("this resource"));
                        println!("    {}", contact.as_deref().unwrap_or("no contact given"));
                    }
                    Some(ClaimOutcome::NeedsVerification) => self.show(Page::Verification).await,
                    Some(ClaimOutcome::Demo) | None => {}
                }
            }
            Command::Share(n) => {
                let id = self.post_at(n)?;
                if let Some(links) = settle(self.feed.share_links(id)) {
                    println!("twitter:  {}", links.twitter);
                    println!("whatsapp: {}", links.whatsapp);
                }
                if let Some(url) = settle(self.feed.copy_link(id)) {
                    println!("link:     {}", url);
                }
            }
            Command::Report(n) => {
                let id = self.post_at(n)?;
                if let Some(mailto) = settle(self.feed.report_link(id)) {
                    println!("{}", mailto);
                }
            }
            Command::MessageAuthor(n) => {
                let id = self.post_at(n)?;
                if let Some(page) = settle(self.feed.message_author(id)) {
                    self.show(page).await;
                }
            }

            Command::Open(n) => {
                let profile = self
                    .messages
                    .conversations
                    .get(n - 1)
                    .cloned()
                    .ok_or_else(|| anyhow!("no conversation {}", n))?;
                let recipient = profile.id;
                if let Some(viewer) = self.shell.member() {
                    settle(self.messages.select(viewer, profile).await);
                }
                self.shell.navigate(Page::Messages { recipient: Some(recipient) });
                self.print_messages();
            }
            Command::Send(text) => {
                let viewer = self.shell.member().ok_or_else(|| anyhow!("sign in first"))?;
                self.messages.draft = text;
                settle(self.messages.send(viewer).await);
                self.print_messages();
            }
            Command::Read(n) => {
                let id = self
                    .notifications
                    .items
                    .get(n - 1)
                    .map(|item| item.notification.id)
                    .ok_or_else(|| anyhow!("no notification {}", n))?;
                if let Some(page) = settle(self.notifications.open(id).await).flatten() {
                    self.show(page).await;
                }
            }
            Command::Wish { category, description } => {
                self.wishlist.category = Some(category);
                self.wishlist.description = description;
                if settle(self.wishlist.add(self.shell.viewer.as_ref()).await).is_some() {
                    self.print_wishlist();
                }
            }
            Command::Unwish(n) => {
                let id = self
                    .wishlist
                    .items
                    .get(n - 1)
                    .map(|item| item.id)
                    .ok_or_else(|| anyhow!("no wishlist item {}", n))?;
                if settle(self.wishlist.remove(self.shell.viewer.as_ref(), id).await).is_some() {
                    self.print_wishlist();
                }
            }
            Command::Verify(path) => {
                self.verification.file = Some(read_attachment(&path).await?);
                if settle(self.verification.submit(self.shell.viewer.as_ref()).await).is_some() {
                    self.shell.refresh_profile().await;
                    self.show(Page::Verification).await;
                }
            }
        }
        Ok(true)
    }

    async fn submit_auth(&mut self) {
        if settle(self.auth.submit().await).is_none() {
            return;
        }
        self.auth.close();
        self.shell.close_auth();
        let session = self.ctx.backend.get_session().await.ok().flatten();
        self.on_session(session).await;
        self.show(Page::default()).await;
    }

    async fn post(&mut self, draft: Draft) {
        let composer = &mut self.feed.composer;
        composer.post_type = draft.post_type;
        composer.resource_category = draft.category;
        composer.resource_title = draft.title;
        composer.resource_contact = draft.contact;
        composer.content = draft.content;

        if settle(self.feed.submit(self.shell.member()).await).is_some() {
            self.print_feed();
        }
    }

    fn post_at(&self, n: usize) -> anyhow::Result<Uuid> {
        match self.listing.get(n.saturating_sub(1)) {
            Some(id) => Ok(*id),
            None if self.listing.is_empty() => bail!("list the feed first"),
            None => bail!("no post {} in the last listing", n),
        }
    }

    /// Navigate and load what the page shows.
    async fn show(&mut self, page: Page) {
        self.shell.navigate(page);
        let now = Utc::now();

        match page {
            Page::Feed { post } => {
                settle(self.feed.load(self.shell.viewer.as_ref()).await);
                self.print_feed();
                if let Some(id) = post {
                    if let Some(n) = self.listing.iter().position(|p| *p == id) {
                        println!("(post {} is [{}])", id, n + 1);
                    }
                }
            }
            Page::Messages { recipient } => {
                let Some(viewer) = self.shell.member() else {
                    println!("Sign in to see your messages.");
                    return;
                };
                settle(self.messages.load_conversations(viewer).await);
                if let Some(recipient) = recipient {
                    if settle(self.messages.open(viewer, recipient).await).is_none() {
                        self.shell.navigate(Page::Messages { recipient: None });
                    }
                }
                self.print_messages();
            }
            Page::Notifications => {
                let Some(viewer) = self.shell.member() else {
                    println!("Sign in to see your notifications.");
                    return;
                };
                settle(self.notifications.load(viewer).await);
                println!("Notifications ({} unread)", self.notifications.unread_count());
                for (i, item) in self.notifications.items.iter().enumerate() {
                    println!("{}", render::notification(i + 1, item, now));
                }
            }
            Page::Wishlist => {
                if settle(self.wishlist.load(self.shell.viewer.as_ref()).await).is_some() {
                    self.print_wishlist();
                }
            }
            Page::Verification => match self.shell.viewer.as_ref() {
                None => self.ctx.toaster.error("You must be logged in to view this page."),
                Some(viewer) => {
                    let status = viewer
                        .verification_status()
                        .map(|s| s.as_str())
                        .unwrap_or("unknown");
                    println!("Verification status: {}", status);
                    if VerificationView::can_upload(viewer) {
                        println!("Upload your student ID with: verify <file>");
                    }
                }
            },
            Page::Profile => match self.shell.viewer.as_ref() {
                None => println!("Not signed in."),
                Some(viewer) => {
                    let email = viewer.user.email.as_deref().unwrap_or("");
                    match &viewer.profile {
                        Some(profile) => println!(
                            "{} <{}> {} {}",
                            profile.username,
                            email,
                            profile.role,
                            if viewer.shows_verified_badge() { "[verified]" } else { "" }
                        ),
                        None => println!("{} (no profile yet)", email),
                    }
                }
            },
            Page::Privacy => println!("Privacy policy: {}", self.ctx.link(&page.to_query())),
            Page::Terms => println!("Terms of service: {}", self.ctx.link(&page.to_query())),
        }
    }

    fn print_feed(&mut self) {
        let now = Utc::now();
        let viewer = self.shell.viewer.as_ref();
        let visible = self.feed.visible(&self.shell.search);
        if self.feed.showing_demo {
            println!("Sample posts. Sign up to join the conversation.");
        }
        if visible.is_empty() {
            println!("No posts to show.");
        }
        for (i, post) in visible.iter().enumerate() {
            println!("{}", render::post(i + 1, post, viewer, now));
        }
        self.listing = visible.iter().map(|p| p.id()).collect();
    }

    fn print_comments(&self, post_id: Uuid) {
        if let Some(post) = self.feed.post(post_id) {
            for line in render::comment_lines(post, Utc::now()) {
                println!("{}", line);
            }
        }
    }

    fn print_messages(&self) {
        let now = Utc::now();
        let selected = self.messages.selected.as_ref();
        for (i, profile) in self.messages.conversations.iter().enumerate() {
            let open = selected.is_some_and(|s| s.id == profile.id);
            println!("{}", render::conversation(i + 1, profile, open));
        }
        if let (Some(other), Some(viewer)) = (selected, self.shell.viewer.as_ref()) {
            println!("-- {} --", other.username);
            for message in &self.messages.messages {
                println!("{}", render::message(message, viewer.id(), &other.username, now));
            }
        }
    }

    fn print_wishlist(&self) {
        if self.wishlist.items.is_empty() {
            println!("Your wishlist is empty.");
        }
        for (i, item) in self.wishlist.items.iter().enumerate() {
            println!("{}", render::wishlist_item(i + 1, item));
        }
    }
}

async fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
    Ok(Attachment::new(name, bytes))
}
