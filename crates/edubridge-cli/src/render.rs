use chrono::{DateTime, Utc};

use edubridge_app::feed::{ClaimState, claim_state};
use edubridge_app::notifications::notification_text;
use edubridge_app::{Toast, ToastLevel, Viewer};
use edubridge_types::{FeedPost, Message, NotificationWithActor, PostType, Profile, WishlistItem};

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => "just now".into(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

pub fn toast(toast: &Toast) -> String {
    let mark = match toast.level {
        ToastLevel::Success => "ok",
        ToastLevel::Info => "--",
        ToastLevel::Error => "!!",
    };
    format!("{} {}", mark, toast.text)
}

fn badge(profile: Option<&Profile>) -> &'static str {
    match profile {
        Some(p) if p.shows_verified_badge() => " [verified]",
        _ => "",
    }
}

pub fn post(index: usize, post: &FeedPost, viewer: Option<&Viewer>, now: DateTime<Utc>) -> String {
    let p = &post.post;
    let mut out = format!(
        "[{}] {} by {}{} {}\n",
        index,
        p.post_type,
        post.author_name(),
        badge(post.author.as_ref()),
        time_ago(p.created_at, now)
    );

    if let Some(title) = &p.resource_title {
        let category = p.resource_category.as_deref().unwrap_or("other");
        out.push_str(&format!("    {} ({})\n", title, category));
    }
    if let Some(content) = p.content.as_deref().filter(|c| !c.is_empty()) {
        out.push_str(&format!("    {}\n", content));
    }
    if let Some(url) = &p.link_url {
        let title = p.link_title.as_deref().unwrap_or(url);
        out.push_str(&format!("    link: {} <{}>\n", title, url));
    }
    if let Some(image) = &p.image_url {
        out.push_str(&format!("    image: {}\n", image));
    }

    let liked = viewer.is_some_and(|v| post.liked_by(v.id()));
    out.push_str(&format!(
        "    {} like{}{} | {} comment{}",
        post.likes.len(),
        if post.likes.len() == 1 { "" } else { "s" },
        if liked { " (you)" } else { "" },
        post.comments.len(),
        if post.comments.len() == 1 { "" } else { "s" },
    ));
    if p.post_type == PostType::Donation {
        let ClaimState { enabled, tooltip } = claim_state(viewer, post);
        out.push_str(&format!(" | claim: {}{}", tooltip, if enabled { "" } else { " (disabled)" }));
    }
    out
}

pub fn comment_lines(post: &FeedPost, now: DateTime<Utc>) -> Vec<String> {
    post.comments
        .iter()
        .map(|c| {
            let author = c.author.as_ref().map(|a| a.username.as_str()).unwrap_or("unknown");
            format!(
                "      {}: {} ({})",
                author,
                c.comment.content,
                time_ago(c.comment.created_at, now)
            )
        })
        .collect()
}

pub fn conversation(index: usize, profile: &Profile, selected: bool) -> String {
    format!(
        "{} [{}] {}{}",
        if selected { ">" } else { " " },
        index,
        profile.username,
        badge(Some(profile))
    )
}

pub fn message(message: &Message, me: uuid::Uuid, other: &str, now: DateTime<Utc>) -> String {
    let who = if message.sender_id == me { "you" } else { other };
    format!("  {} ({}): {}", who, time_ago(message.created_at, now), message.content)
}

pub fn notification(index: usize, item: &NotificationWithActor, now: DateTime<Utc>) -> String {
    format!(
        "{} [{}] {} {}",
        if item.notification.is_read { " " } else { "*" },
        index,
        notification_text(item),
        time_ago(item.notification.created_at, now)
    )
}

pub fn wishlist_item(index: usize, item: &WishlistItem) -> String {
    format!("[{}] {} ({})", index, item.item_description, item.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(5), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(15), now), "15m ago");
        assert_eq!(time_ago(now - Duration::hours(2), now), "2h ago");
        assert_eq!(time_ago(now - Duration::days(3), now), "3d ago");
        assert_eq!(time_ago(now + Duration::minutes(1), now), "just now");
    }

    #[test]
    fn demo_donation_renders_claim_hint() {
        let now = Utc::now();
        let posts = edubridge_app::demo::demo_posts(now);
        let text = post(1, &posts[0], None, now);
        assert!(text.starts_with("[1] donation by GenerousDonor [verified] 15m ago"));
        assert!(text.contains("Complete Set of Physics Textbooks for College (books)"));
        assert!(text.ends_with("claim: Sign up or log in to interact with posts"));
    }
}
