//! Sample posts shown to signed-out visitors.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use edubridge_types::{FeedPost, Post, PostType, Profile, Role, VerificationStatus};

pub const DEMO_DONOR: Uuid = Uuid::from_u128(0xde30_0000_0000_4000_8000_0000_0000_0001);
pub const DEMO_STUDENT: Uuid = Uuid::from_u128(0xde30_0000_0000_4000_8000_0000_0000_0002);
pub const DEMO_MENTOR: Uuid = Uuid::from_u128(0xde30_0000_0000_4000_8000_0000_0000_0003);

pub const DEMO_DONATION_POST: Uuid = Uuid::from_u128(0xde30_0000_0000_4000_8000_0000_0001_0001);
pub const DEMO_WISDOM_POST: Uuid = Uuid::from_u128(0xde30_0000_0000_4000_8000_0000_0001_0002);

pub fn is_demo_post(id: Uuid) -> bool {
    id == DEMO_DONATION_POST || id == DEMO_WISDOM_POST
}

fn avatar(seed: &str, background: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/initials/svg?seed={}&backgroundColor={}&radius=50",
        seed, background
    )
}

fn demo_profile(id: Uuid, username: &str, role: Role, background: &str, created_at: DateTime<Utc>) -> Profile {
    Profile {
        id,
        email: Some(format!("{}@example.com", role.as_str())),
        username: username.into(),
        role,
        verification_status: VerificationStatus::Verified,
        avatar_url: Some(avatar(username, background)),
        created_at,
    }
}

pub fn demo_profiles(now: DateTime<Utc>) -> Vec<Profile> {
    vec![
        demo_profile(DEMO_DONOR, "GenerousDonor", Role::Donor, "22c55e", now - Duration::days(5)),
        demo_profile(DEMO_STUDENT, "EagerStudent", Role::Student, "3b82f6", now - Duration::days(3)),
        demo_profile(DEMO_MENTOR, "WiseMentor", Role::Donor, "8b5cf6", now - Duration::days(10)),
    ]
}

pub fn demo_posts(now: DateTime<Utc>) -> Vec<FeedPost> {
    let profiles = demo_profiles(now);
    let donor = profiles.first().cloned();
    let student = profiles.get(1).cloned();

    let donation = Post {
        id: DEMO_DONATION_POST,
        user_id: DEMO_DONOR,
        post_type: PostType::Donation,
        content: Some(
            "I have a full set of Halliday, Resnick, and Walker textbooks that I'd love to pass on to a student in need."
                .into(),
        ),
        resource_title: Some("Complete Set of Physics Textbooks for College".into()),
        resource_category: Some("books".into()),
        resource_contact: Some("Contact via platform message".into()),
        link_url: None,
        link_title: None,
        link_description: None,
        link_image: None,
        image_url: None,
        created_at: now - Duration::minutes(15),
    };

    let wisdom = Post {
        id: DEMO_WISDOM_POST,
        user_id: DEMO_STUDENT,
        post_type: PostType::Wisdom,
        content: Some(
            "Just discovered a great free resource for learning React! The new docs are amazing for beginners. \
             Highly recommend checking them out if you are into web development. #react #webdev"
                .into(),
        ),
        resource_title: None,
        resource_category: None,
        resource_contact: None,
        link_url: Some("https://react.dev".into()),
        link_title: Some("React - A JavaScript library for building user interfaces".into()),
        link_description: Some("The library for web and native user interfaces...".into()),
        link_image: Some("https://react.dev/images/og-home.png".into()),
        image_url: None,
        created_at: now - Duration::hours(2),
    };

    vec![
        FeedPost {
            post: donation,
            author: donor,
            likes: Vec::new(),
            comments: Vec::new(),
        },
        FeedPost {
            post: wisdom,
            author: student,
            likes: Vec::new(),
            comments: Vec::new(),
        },
    ]
}
