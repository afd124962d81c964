mod support;

use chrono::{Duration, Utc};
use uuid::Uuid;

use edubridge_app::feed::{ClaimOutcome, FeedFilter, FeedView, SortBy, arrange, claim_state};
use edubridge_app::upload::Attachment;
use edubridge_app::{AppError, Viewer};
use edubridge_types::{FeedPost, Like, Post, PostType, ResourceCategory, Role};

use support::{Harness, SITE, verify};

fn donation(view: &mut FeedView, title: &str, contact: &str) {
    view.composer.post_type = PostType::Donation;
    view.composer.resource_title = title.into();
    view.composer.resource_category = Some(ResourceCategory::Electronics);
    view.composer.resource_contact = contact.into();
}

async fn post_donation(h: &Harness, author: &Viewer, title: &str) -> Uuid {
    h.act_as(author).await;
    let mut view = FeedView::new(h.ctx.clone());
    donation(&mut view, title, "donor@example.com");
    view.submit(Some(author)).await.unwrap();
    view.posts[0].id()
}

async fn post_wisdom(h: &Harness, author: &Viewer, content: &str) -> Uuid {
    h.act_as(author).await;
    let mut view = FeedView::new(h.ctx.clone());
    view.composer.content = content.into();
    view.submit(Some(author)).await.unwrap();
    view.posts[0].id()
}

#[tokio::test]
async fn donation_without_title_is_rejected_before_any_call() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    h.backend.clear_calls();

    let mut view = FeedView::new(h.ctx.clone());
    donation(&mut view, "   ", "call me");
    let err = view.submit(Some(&donor)).await.unwrap_err();

    assert!(matches!(err, AppError::Invalid(_)));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.drain_toasts(), vec!["Please fill out resource title and category."]);

    view.composer.resource_title = "Laptop".into();
    view.composer.resource_contact.clear();
    view.submit(Some(&donor)).await.unwrap_err();
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.drain_toasts(), vec!["Please provide contact info for donation."]);
}

#[tokio::test]
async fn seeking_posts_are_for_students_only() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;

    let mut view = FeedView::new(h.ctx.clone());
    view.composer.post_type = PostType::Seeking;
    view.composer.resource_title = "Calculator".into();
    view.composer.resource_category = Some(ResourceCategory::Electronics);

    let err = view.submit(Some(&donor)).await.unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));
    assert_eq!(h.drain_toasts(), vec!["Only students can request resources."]);
}

#[tokio::test]
async fn wisdom_post_detects_its_link() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;

    let mut view = FeedView::new(h.ctx.clone());
    view.composer.content = "Free course at https://cs50.harvard.edu/x enjoy".into();
    view.submit(Some(&donor)).await.unwrap();

    let post = &view.posts[0].post;
    assert_eq!(post.link_url.as_deref(), Some("https://cs50.harvard.edu/x"));
    assert_eq!(post.link_title.as_deref(), Some("https://cs50.harvard.edu/x"));
    assert_eq!(view.composer.content, "");
    assert_eq!(h.drain_toasts(), vec!["Post created successfully!"]);
}

#[tokio::test]
async fn image_is_uploaded_before_the_post_is_inserted() {
    let h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    h.backend.clear_calls();

    let mut view = FeedView::new(h.ctx.clone());
    donation(&mut view, "Desk lamp", "donor@example.com");
    view.composer.image = Some(Attachment::new("lamp.png", b"png".to_vec()));
    view.submit(Some(&donor)).await.unwrap();

    assert_eq!(h.backend.calls(), vec!["upload", "insert_post"]);
    let image_url = view.posts[0].post.image_url.clone().unwrap();
    assert!(image_url.contains(&format!("post-images/{}/", donor.id())));
    assert!(image_url.ends_with("_lamp.png"));
}

#[tokio::test]
async fn toggling_like_inserts_then_deletes() {
    let h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let student = h.member("ana@example.com", Role::Student).await;
    let post_id = post_wisdom(&h, &donor, "Keep learning").await;

    h.act_as(&student).await;
    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&student)).await.unwrap();
    h.backend.clear_calls();

    assert!(view.toggle_like(Some(&student), post_id).await.unwrap());
    assert_eq!(h.backend.count("insert_like"), 1);
    assert_eq!(h.backend.count("delete_like"), 0);
    assert_eq!(h.backend.count("create_notification"), 1);
    assert!(view.post(post_id).unwrap().liked_by(student.id()));

    assert!(!view.toggle_like(Some(&student), post_id).await.unwrap());
    assert_eq!(h.backend.count("insert_like"), 1);
    assert_eq!(h.backend.count("delete_like"), 1);
    assert!(view.post(post_id).unwrap().likes.is_empty());
}

#[tokio::test]
async fn failed_like_notification_keeps_the_toggle_in_sync() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let student = h.member("ana@example.com", Role::Student).await;
    let post_id = post_wisdom(&h, &donor, "Keep learning").await;

    h.act_as(&student).await;
    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&student)).await.unwrap();
    h.drain_toasts();
    h.backend.fail("create_notification");

    assert!(view.toggle_like(Some(&student), post_id).await.unwrap());
    assert!(view.post(post_id).unwrap().liked_by(student.id()));
    assert!(h.drain_toasts().is_empty());

    h.backend.clear_calls();
    assert!(!view.toggle_like(Some(&student), post_id).await.unwrap());
    assert_eq!(h.backend.calls(), vec!["delete_like", "list_posts"]);
    assert!(view.post(post_id).unwrap().likes.is_empty());
}

#[tokio::test]
async fn failed_unlike_still_refetches_the_feed() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let student = h.member("ana@example.com", Role::Student).await;
    let post_id = post_wisdom(&h, &donor, "Keep learning").await;

    h.act_as(&student).await;
    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&student)).await.unwrap();
    view.toggle_like(Some(&student), post_id).await.unwrap();
    h.drain_toasts();

    h.backend.fail("delete_like");
    h.backend.clear_calls();
    let err = view.toggle_like(Some(&student), post_id).await.unwrap_err();

    assert!(matches!(err, AppError::Backend { .. }));
    assert_eq!(h.backend.calls(), vec!["delete_like", "list_posts"]);
    assert!(view.post(post_id).unwrap().liked_by(student.id()));
    assert_eq!(h.drain_toasts(), vec!["delete_like unavailable"]);
}

#[tokio::test]
async fn liking_own_post_sends_no_notification() {
    let h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let post_id = post_wisdom(&h, &donor, "Proud of this one").await;

    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&donor)).await.unwrap();
    view.toggle_like(Some(&donor), post_id).await.unwrap();

    assert_eq!(h.backend.count("create_notification"), 0);
}

#[tokio::test]
async fn signed_out_feed_shows_demo_posts_that_refuse_interaction() {
    let mut h = Harness::new();
    let mut view = FeedView::new(h.ctx.clone());
    view.load(None).await.unwrap();

    assert!(view.showing_demo);
    assert_eq!(view.posts.len(), 2);
    assert!(h.backend.calls().is_empty());

    let demo_id = view.posts[0].id();
    assert!(view.toggle_like(None, demo_id).await.is_err());
    assert_eq!(
        h.drain_toasts(),
        vec!["Liking is disabled for demo posts. Sign up to interact!"]
    );
    assert_eq!(view.claim(None, demo_id).unwrap(), ClaimOutcome::Demo);
    assert!(view.report_link(demo_id).is_err());
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn donation_filter_and_search_match_content_title_and_author() {
    let h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let laptop_fan = h.member("laptopguy@example.com", Role::Donor).await;

    let gaming = post_donation(&h, &donor, "Gaming LAPTOP").await;
    post_donation(&h, &donor, "Chemistry books").await;
    post_wisdom(&h, &donor, "My laptop finally died").await;
    let chair = post_donation(&h, &laptop_fan, "Office chair").await;

    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&donor)).await.unwrap();
    view.filter = FeedFilter::Only(PostType::Donation);

    let mut found: Vec<Uuid> = view.visible("Laptop").iter().map(|p| p.id()).collect();
    found.sort();
    let mut expected = vec![gaming, chair];
    expected.sort();
    assert_eq!(found, expected);

    view.filter = FeedFilter::All;
    assert_eq!(view.visible("laptop").len(), 3);
}

fn sample_post(title: &str, likes: usize, minutes_ago: i64) -> FeedPost {
    let post_id = Uuid::new_v4();
    FeedPost {
        post: Post {
            id: post_id,
            user_id: Uuid::new_v4(),
            post_type: PostType::Donation,
            content: None,
            resource_title: Some(title.into()),
            resource_category: Some("books".into()),
            resource_contact: None,
            link_url: None,
            link_title: None,
            link_description: None,
            link_image: None,
            image_url: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        },
        author: None,
        likes: (0..likes)
            .map(|_| Like {
                post_id,
                user_id: Uuid::new_v4(),
                created_at: None,
            })
            .collect(),
        comments: Vec::new(),
    }
}

#[test]
fn sorting_by_likes_is_descending_and_stable() {
    let posts = vec![
        sample_post("a", 1, 1),
        sample_post("b", 3, 2),
        sample_post("c", 1, 3),
        sample_post("d", 0, 4),
        sample_post("e", 3, 5),
    ];

    let titles: Vec<&str> = arrange(&posts, "", FeedFilter::All, SortBy::Likes)
        .iter()
        .map(|p| p.post.resource_title.as_deref().unwrap())
        .collect();
    assert_eq!(titles, vec!["b", "e", "a", "c", "d"]);

    let recent: Vec<&str> = arrange(&posts, "", FeedFilter::All, SortBy::Recent)
        .iter()
        .map(|p| p.post.resource_title.as_deref().unwrap())
        .collect();
    assert_eq!(recent, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn claiming_requires_a_verified_student() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let mut student = h.member("ana@example.com", Role::Student).await;
    let post_id = post_donation(&h, &donor, "Laptop").await;

    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&student)).await.unwrap();
    h.drain_toasts();

    let state = claim_state(Some(&student), view.post(post_id).unwrap());
    assert!(!state.enabled);
    assert_eq!(state.tooltip, "Verify your student profile to claim resources");
    assert_eq!(
        view.claim(Some(&student), post_id).unwrap(),
        ClaimOutcome::NeedsVerification
    );
    assert_eq!(
        h.drain_toasts(),
        vec!["You must be a verified student to claim resources. Please verify your profile."]
    );

    assert!(matches!(view.claim(Some(&donor), post_id), Err(AppError::Denied(_))));
    assert_eq!(h.drain_toasts(), vec!["Only students can claim resources."]);

    verify(&h, &mut student).await;
    assert!(claim_state(Some(&student), view.post(post_id).unwrap()).enabled);
    match view.claim(Some(&student), post_id).unwrap() {
        ClaimOutcome::Contact { donor: name, contact, .. } => {
            assert_eq!(name, "donor");
            assert_eq!(contact.as_deref(), Some("donor@example.com"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn only_the_owner_edits_and_deletes() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let student = h.member("ana@example.com", Role::Student).await;
    let post_id = post_wisdom(&h, &donor, "First draft").await;

    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&donor)).await.unwrap();
    assert!(view.start_edit(Some(&student), post_id).is_err());

    view.start_edit(Some(&donor), post_id).unwrap();
    view.editing.as_mut().unwrap().content = "Second draft, see https://example.org".into();
    view.save_edit(Some(&donor)).await.unwrap();
    let post = &view.post(post_id).unwrap().post;
    assert_eq!(post.content.as_deref(), Some("Second draft, see https://example.org"));
    assert_eq!(post.link_url.as_deref(), Some("https://example.org"));
    h.drain_toasts();

    h.backend.clear_calls();
    assert!(matches!(view.delete(Some(&student), post_id).await, Err(AppError::Denied(_))));
    assert!(h.backend.calls().is_empty());

    view.delete(Some(&donor), post_id).await.unwrap();
    assert!(view.post(post_id).is_none());
    assert_eq!(h.drain_toasts(), vec!["Post deleted."]);
}

#[tokio::test]
async fn share_and_report_links() {
    let mut h = Harness::new();
    let donor = h.member("donor@example.com", Role::Donor).await;
    let post_id = post_wisdom(&h, &donor, "Read more books").await;

    let mut view = FeedView::new(h.ctx.clone());
    view.load(Some(&donor)).await.unwrap();
    h.drain_toasts();

    let links = view.share_links(post_id).unwrap();
    let post_url = format!("{SITE}/?page=feed&post={post_id}");
    assert_eq!(links.post_url, post_url);
    assert!(links.twitter.starts_with(
        "https://twitter.com/intent/tweet?text=%22Read%20more%20books%22%20-%20via%20%40Edubridgepeople&url="
    ));
    assert!(links.whatsapp.starts_with("https://wa.me/?text=%22Read%20more%20books%22"));

    assert_eq!(view.copy_link(post_id).unwrap(), post_url);
    assert_eq!(h.drain_toasts(), vec!["Post link copied!"]);

    let mailto = view.report_link(post_id).unwrap();
    assert!(mailto.starts_with("mailto:info@edubridgepeople.com?subject=Report%20on%20Post%20ID%3A%20"));
    assert_eq!(h.drain_toasts(), vec!["Opening your email client..."]);
}
