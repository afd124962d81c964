use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::form_urlencoded;
use uuid::Uuid;

use edubridge_types::{
    Bucket, FeedPost, NewNotification, NewPost, NotificationType, ParseEnumError, PostType,
    PostUpdate, ResourceCategory, Role, VerificationStatus,
};

use crate::comments::CommentThread;
use crate::context::{AppContext, Viewer};
use crate::demo::{demo_posts, is_demo_post};
use crate::error::{AppError, AppResult};
use crate::shell::Page;
use crate::upload::{Attachment, object_path};

const REPORT_ADDRESS: &str = "info@edubridgepeople.com";
const SHARE_FALLBACK_TEXT: &str = "Check out this post on Edubridgepeople!";

// -- Filtering and sorting --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    Only(PostType),
}

impl Default for FeedFilter {
    fn default() -> Self {
        FeedFilter::Only(PostType::Donation)
    }
}

impl FeedFilter {
    pub fn accepts(self, post_type: PostType) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Only(wanted) => wanted == post_type,
        }
    }
}

impl FromStr for FeedFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(FeedFilter::All);
        }
        s.parse().map(FeedFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Recent,
    Likes,
    Comments,
}

impl FromStr for SortBy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" | "created_at" => Ok(SortBy::Recent),
            "likes" => Ok(SortBy::Likes),
            "comments" => Ok(SortBy::Comments),
            _ => Err(ParseEnumError {
                kind: "sort order",
                value: s.to_string(),
            }),
        }
    }
}

/// Case-insensitive substring match on content, resource title and author name.
fn matches_search(post: &FeedPost, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(needle));
    hit(post.post.content.as_deref())
        || hit(post.post.resource_title.as_deref())
        || hit(post.author.as_ref().map(|a| a.username.as_str()))
}

/// Search, then filter, then a stable descending sort.
pub fn arrange<'a>(posts: &'a [FeedPost], search: &str, filter: FeedFilter, sort: SortBy) -> Vec<&'a FeedPost> {
    let needle = search.to_lowercase();
    let mut result: Vec<&FeedPost> = posts
        .iter()
        .filter(|post| matches_search(post, &needle))
        .filter(|post| filter.accepts(post.post.post_type))
        .collect();

    match sort {
        SortBy::Recent => result.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at)),
        SortBy::Likes => result.sort_by(|a, b| b.likes.len().cmp(&a.likes.len())),
        SortBy::Comments => result.sort_by(|a, b| b.comments.len().cmp(&a.comments.len())),
    }
    result
}

// -- Links --

/// First `http://` or `https://` URL in `text`: the scheme, one character
/// that is not whitespace or one of `/$.?#`, one more character, then
/// everything up to the next whitespace.
pub fn find_first_url(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets.
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("http") {
        let start = from + pos;
        from = start + 4;

        let scheme_len = match &lower[start + 4..] {
            rest if rest.starts_with("s://") => 8,
            rest if rest.starts_with("://") => 7,
            _ => continue,
        };
        let body = &text[start + scheme_len..];
        let mut chars = body.chars();
        let (Some(first), Some(second)) = (chars.next(), chars.next()) else {
            continue;
        };
        if first.is_whitespace() || "/$.?#".contains(first) || matches!(second, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
            continue;
        }

        let head = first.len_utf8() + second.len_utf8();
        let tail = &body[head..];
        let end = head + tail.find(char::is_whitespace).unwrap_or(tail.len());
        return Some(&text[start..start + scheme_len + end]);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Preview used when no richer metadata is available: the URL is its own title.
pub fn fallback_preview(url: &str) -> LinkPreview {
    LinkPreview {
        url: url.to_string(),
        title: Some(url.to_string()),
        description: None,
        image: None,
    }
}

/// `encodeURIComponent`-style escaping: spaces become `%20`.
fn encode_component(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub post_url: String,
    pub twitter: String,
    pub whatsapp: String,
}

// -- Claiming --

/// Whether the claim button is enabled, and its tooltip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimState {
    pub enabled: bool,
    pub tooltip: &'static str,
}

pub fn claim_state(viewer: Option<&Viewer>, post: &FeedPost) -> ClaimState {
    let disabled = |tooltip| ClaimState { enabled: false, tooltip };
    if is_demo_post(post.id()) {
        return ClaimState {
            enabled: true,
            tooltip: "Sign up or log in to interact with posts",
        };
    }
    let Some(viewer) = viewer else {
        return disabled("Sign in to claim resources");
    };
    if viewer.role() != Some(Role::Student) {
        return disabled("Only students can claim resources");
    }
    if viewer.verification_status() != Some(VerificationStatus::Verified) {
        return disabled("Verify your student profile to claim resources");
    }
    if post.post.user_id == viewer.id() {
        return disabled("You cannot claim your own resource");
    }
    ClaimState {
        enabled: true,
        tooltip: "Claim this resource",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Demo content; the visitor was told to sign up.
    Demo,
    /// Donor details to contact.
    Contact {
        donor: String,
        title: Option<String>,
        contact: Option<String>,
    },
    /// The student must verify first; go to the verification page.
    NeedsVerification,
}

// -- Composer --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composer {
    pub post_type: PostType,
    pub content: String,
    pub resource_title: String,
    pub resource_category: Option<ResourceCategory>,
    pub resource_contact: String,
    pub image: Option<Attachment>,
}

impl Default for Composer {
    fn default() -> Self {
        Self {
            post_type: PostType::Wisdom,
            content: String::new(),
            resource_title: String::new(),
            resource_category: None,
            resource_contact: String::new(),
            image: None,
        }
    }
}

impl Composer {
    /// Builds the row to insert, or the reason it cannot be posted.
    pub fn build(&self, viewer: Option<&Viewer>) -> Result<NewPost, &'static str> {
        let Some(viewer) = viewer.filter(|v| v.is_member()) else {
            return Err("Please sign in to post.");
        };
        if self.post_type == PostType::Seeking && !viewer.is_student() {
            return Err("Only students can request resources.");
        }

        let content = self.content.trim();
        let mut post = NewPost::new(viewer.id(), self.post_type);
        post.link_url = find_first_url(&self.content).map(str::to_string);
        if !content.is_empty() {
            post.content = Some(content.to_string());
        }

        match self.post_type {
            PostType::Wisdom => {
                if content.is_empty() {
                    return Err("Please write something to share.");
                }
                if let Some(preview) = post.link_url.as_deref().map(fallback_preview) {
                    post.link_title = preview.title;
                    post.link_description = preview.description;
                    post.link_image = preview.image;
                }
            }
            PostType::Donation | PostType::Seeking => {
                let title = self.resource_title.trim();
                let Some(category) = self.resource_category.filter(|_| !title.is_empty()) else {
                    return Err("Please fill out resource title and category.");
                };
                post.resource_title = Some(title.to_string());
                post.resource_category = Some(category.as_str().to_string());

                if self.post_type == PostType::Donation {
                    let contact = self.resource_contact.trim();
                    if contact.is_empty() {
                        return Err("Please provide contact info for donation.");
                    }
                    post.resource_contact = Some(contact.to_string());
                }
            }
        }
        Ok(post)
    }

    /// Empties every field, keeping the selected post type.
    pub fn clear(&mut self) {
        *self = Composer {
            post_type: self.post_type,
            ..Composer::default()
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEdit {
    pub post_id: Uuid,
    pub content: String,
}

// -- View --

pub struct FeedView {
    ctx: AppContext,
    pub posts: Vec<FeedPost>,
    /// True while the signed-out sample posts are shown.
    pub showing_demo: bool,
    pub filter: FeedFilter,
    pub sort: SortBy,
    pub composer: Composer,
    pub editing: Option<PostEdit>,
    /// Expanded comment sections.
    pub threads: HashMap<Uuid, CommentThread>,
}

impl FeedView {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            posts: Vec::new(),
            showing_demo: false,
            filter: FeedFilter::default(),
            sort: SortBy::default(),
            composer: Composer::default(),
            editing: None,
            threads: HashMap::new(),
        }
    }

    /// Signed-out visitors get the sample posts; everyone else the live feed.
    pub async fn load(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        if viewer.is_none() {
            self.posts = demo_posts(Utc::now());
            self.showing_demo = true;
            return Ok(());
        }

        let posts = self
            .ctx
            .backend
            .list_posts()
            .await
            .map_err(|err| self.ctx.fail("Could not fetch posts.", "fetch posts", err))?;
        debug!(count = posts.len(), "Loaded feed");
        self.posts = posts;
        self.showing_demo = false;
        Ok(())
    }

    pub fn visible(&self, search: &str) -> Vec<&FeedPost> {
        arrange(&self.posts, search, self.filter, self.sort)
    }

    pub fn post(&self, id: Uuid) -> Option<&FeedPost> {
        self.posts.iter().find(|p| p.id() == id)
    }

    fn require_post(&self, id: Uuid) -> AppResult<&FeedPost> {
        self.post(id)
            .ok_or_else(|| AppError::NotFound("Post not found.".into()))
    }

    pub async fn submit(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let post = match self.composer.build(viewer) {
            Ok(post) => post,
            Err(text) => {
                self.ctx.toaster.error(text);
                return Err(AppError::Invalid(text.into()));
            }
        };
        let image = self.composer.image.take();
        self.composer.clear();

        match self.publish(post, image).await {
            Ok(created) => {
                info!(post_id = %created.id(), post_type = %created.post.post_type, "Post created");
                self.posts.insert(0, created);
                self.ctx.toaster.success("Post created successfully!");
                Ok(())
            }
            Err(err) => Err(self
                .ctx
                .fail_with_message("Failed to create post.", "create post", err)),
        }
    }

    async fn publish(
        &self,
        mut post: NewPost,
        image: Option<Attachment>,
    ) -> Result<FeedPost, edubridge_backend::BackendError> {
        if let Some(image) = image {
            let path = object_path(post.user_id, &image.name, Utc::now());
            self.ctx
                .backend
                .upload(Bucket::PostImages, &path, image.bytes, &image.content_type)
                .await?;
            post.image_url = Some(self.ctx.backend.public_url(Bucket::PostImages, &path));
        }
        self.ctx.backend.insert_post(post).await
    }

    /// Unlike when the viewer already likes the post, like otherwise, then refetch.
    /// Returns whether the viewer now likes it.
    pub async fn toggle_like(&mut self, viewer: Option<&Viewer>, post_id: Uuid) -> AppResult<bool> {
        if is_demo_post(post_id) {
            self.ctx
                .toaster
                .info("Liking is disabled for demo posts. Sign up to interact!");
            return Err(AppError::Denied("demo post".into()));
        }
        let Some(viewer) = viewer.filter(|v| v.is_member()) else {
            self.ctx.toaster.info("Please sign in to like posts.");
            return Err(AppError::Denied("not signed in".into()));
        };

        let post = self.require_post(post_id)?;
        let liked = post.liked_by(viewer.id());
        let owner = post.post.user_id;
        let backend = &self.ctx.backend;

        let result = if liked {
            backend.delete_like(post_id, viewer.id()).await
        } else {
            backend.insert_like(post_id, viewer.id()).await
        };
        if result.is_ok() && !liked && owner != viewer.id() {
            let notification = NewNotification {
                user_id: owner,
                kind: NotificationType::Like,
                actor_id: viewer.id(),
                post_id: Some(post_id),
            };
            if let Err(err) = backend.create_notification(notification).await {
                warn!(%post_id, "Like notification failed: {}", err);
            }
        }

        // Refetch on every path, failures included.
        let reloaded = self.load(Some(viewer)).await;
        if let Err(err) = result {
            return Err(self
                .ctx
                .fail_with_message("Failed to update like.", "toggle like", err));
        }
        reloaded?;
        Ok(!liked)
    }

    pub fn start_edit(&mut self, viewer: Option<&Viewer>, post_id: Uuid) -> AppResult<()> {
        if is_demo_post(post_id) {
            self.ctx.toaster.info("Demo posts cannot be edited.");
            return Err(AppError::Denied("demo post".into()));
        }
        let post = self.require_post(post_id)?;
        if viewer.map(Viewer::id) != Some(post.post.user_id) {
            return Err(AppError::Denied("You can only edit your own posts.".into()));
        }
        self.editing = Some(PostEdit {
            post_id,
            content: post.post.content.clone().unwrap_or_default(),
        });
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Saves the edit, re-detecting the link in the new text. The edit closes
    /// either way.
    pub async fn save_edit(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let Some(edit) = self.editing.take() else {
            return Ok(());
        };
        let viewer = viewer.ok_or_else(|| AppError::Denied("not signed in".into()))?;

        let preview = find_first_url(&edit.content).map(fallback_preview);
        let update = PostUpdate {
            content: edit.content.clone(),
            link_url: preview.as_ref().map(|p| p.url.clone()),
            link_title: preview.as_ref().and_then(|p| p.title.clone()),
            link_description: preview.as_ref().and_then(|p| p.description.clone()),
            link_image: preview.as_ref().and_then(|p| p.image.clone()),
        };

        self.ctx
            .backend
            .update_post(edit.post_id, viewer.id(), update.clone())
            .await
            .map_err(|err| self.ctx.fail("Failed to update post.", "update post", err))?;

        if let Some(post) = self.posts.iter_mut().find(|p| p.id() == edit.post_id) {
            post.post.content = Some(update.content);
            if update.link_url.is_some() {
                post.post.link_url = update.link_url;
                post.post.link_title = update.link_title;
                post.post.link_description = update.link_description;
                post.post.link_image = update.link_image;
            }
        }
        self.ctx.toaster.success("Post updated.");
        Ok(())
    }

    pub async fn delete(&mut self, viewer: Option<&Viewer>, post_id: Uuid) -> AppResult<()> {
        let viewer = viewer.ok_or_else(|| AppError::Denied("not signed in".into()))?;
        if self.require_post(post_id)?.post.user_id != viewer.id() {
            return Err(AppError::Denied("You can only delete your own posts.".into()));
        }

        self.ctx
            .backend
            .delete_post(post_id, viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Failed to delete post.", "delete post", err))?;

        self.posts.retain(|p| p.id() != post_id);
        self.threads.remove(&post_id);
        self.ctx.toaster.success("Post deleted.");
        Ok(())
    }

    /// Expand or collapse a post's comments. Returns whether they are now shown.
    pub fn toggle_comments(&mut self, post_id: Uuid) -> AppResult<bool> {
        if self.threads.remove(&post_id).is_some() {
            return Ok(false);
        }
        let post = self.require_post(post_id)?;
        let thread = CommentThread::new(
            self.ctx.clone(),
            post_id,
            post.post.user_id,
            post.comments.clone(),
        );
        self.threads.insert(post_id, thread);
        Ok(true)
    }

    /// Copy a thread's comments back onto its post so counts stay current.
    pub fn sync_thread(&mut self, post_id: Uuid) {
        let Some(thread) = self.threads.get(&post_id) else {
            return;
        };
        if let Some(post) = self.posts.iter_mut().find(|p| p.id() == post_id) {
            post.comments = thread.comments.clone();
        }
    }

    pub fn claim(&self, viewer: Option<&Viewer>, post_id: Uuid) -> AppResult<ClaimOutcome> {
        if is_demo_post(post_id) {
            self.ctx
                .toaster
                .info("This is a demo post. Please sign up to interact!");
            return Ok(ClaimOutcome::Demo);
        }
        let post = self.require_post(post_id)?;
        if post.post.post_type != PostType::Donation {
            return Err(AppError::Invalid("Only donations can be claimed.".into()));
        }

        let Some(viewer) = viewer else {
            self.ctx
                .toaster
                .error("You must be signed in to claim resources.");
            return Err(AppError::Denied("not signed in".into()));
        };
        if viewer.role() != Some(Role::Student) {
            self.ctx.toaster.error("Only students can claim resources.");
            return Err(AppError::Denied("Only students can claim resources.".into()));
        }
        if viewer.verification_status() != Some(VerificationStatus::Verified) {
            self.ctx.toaster.error(
                "You must be a verified student to claim resources. Please verify your profile.",
            );
            return Ok(ClaimOutcome::NeedsVerification);
        }
        if post.post.user_id == viewer.id() {
            return Err(AppError::Denied("You cannot claim your own resource".into()));
        }

        Ok(ClaimOutcome::Contact {
            donor: post.author_name().to_string(),
            title: post.post.resource_title.clone(),
            contact: post.post.resource_contact.clone(),
        })
    }

    pub fn share_links(&self, post_id: Uuid) -> AppResult<ShareLinks> {
        let post = self.require_post(post_id)?;
        let post_url = self.ctx.link(&Page::Feed { post: Some(post_id) }.to_query());
        let text = post
            .post
            .content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(post.post.resource_title.as_deref())
            .unwrap_or(SHARE_FALLBACK_TEXT);
        let encoded_text = encode_component(&format!("\"{}\" - via @Edubridgepeople", text));
        let encoded_url = encode_component(&post_url);

        Ok(ShareLinks {
            twitter: format!(
                "https://twitter.com/intent/tweet?text={}&url={}",
                encoded_text, encoded_url
            ),
            whatsapp: format!("https://wa.me/?text={}%20{}", encoded_text, encoded_url),
            post_url,
        })
    }

    /// The post's own URL, for the clipboard.
    pub fn copy_link(&self, post_id: Uuid) -> AppResult<String> {
        let links = self.share_links(post_id)?;
        self.ctx.toaster.success("Post link copied!");
        Ok(links.post_url)
    }

    /// `mailto:` link reporting the post.
    pub fn report_link(&self, post_id: Uuid) -> AppResult<String> {
        if is_demo_post(post_id) {
            self.ctx.toaster.info("This is a demo post.");
            return Err(AppError::Denied("demo post".into()));
        }
        let subject = encode_component(&format!("Report on Post ID: {}", post_id));
        let body = encode_component(&format!(
            "I would like to report Post ID: {} for the following reason:\n\n[Please describe the issue here]\n\n",
            post_id
        ));
        self.ctx.toaster.info("Opening your email client...");
        Ok(format!("mailto:{}?subject={}&body={}", REPORT_ADDRESS, subject, body))
    }

    /// Conversation page with the post's author.
    pub fn message_author(&self, post_id: Uuid) -> AppResult<Page> {
        if is_demo_post(post_id) {
            return Err(AppError::Denied("demo post".into()));
        }
        let post = self.require_post(post_id)?;
        Ok(Page::Messages {
            recipient: Some(post.post.user_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_url_like_the_composer() {
        assert_eq!(
            find_first_url("Docs at https://react.dev/learn today"),
            Some("https://react.dev/learn")
        );
        assert_eq!(find_first_url("see:HTTP://Example.com!"), Some("HTTP://Example.com!"));
        assert_eq!(find_first_url("http:///nope and http://ok.io"), Some("http://ok.io"));
        assert_eq!(find_first_url("no links here"), None);
        assert_eq!(find_first_url("https://"), None);
    }

    #[test]
    fn filter_parses_all_and_post_types() {
        assert_eq!("all".parse::<FeedFilter>().unwrap(), FeedFilter::All);
        assert_eq!(
            "Seeking".parse::<FeedFilter>().unwrap(),
            FeedFilter::Only(PostType::Seeking)
        );
        assert!("popular".parse::<SortBy>().is_err());
    }

    #[test]
    fn component_encoding_uses_percent_twenty() {
        assert_eq!(encode_component("a b&c"), "a%20b%26c");
        assert_eq!(encode_component("1+1"), "1%2B1");
    }
}
