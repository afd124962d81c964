use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use edubridge_types::{
    Comment, FeedPost, Like, Message, NewComment, NewMessage, NewNotification, NewPost,
    NewWishlistItem, Notification, NotificationWithActor, ParseEnumError, Post, PostUpdate,
    Profile, ThreadComment, VerificationStatus, WishlistItem,
};

use crate::Database;
use crate::models::UserRow;

const PROFILE_COLUMNS: &str =
    "a.id, a.email, a.username, a.role, a.verification_status, a.avatar_url, a.created_at";

const POST_COLUMNS: &str = "p.id, p.user_id, p.post_type, p.content, p.resource_title, \
     p.resource_category, p.resource_contact, p.link_url, p.link_title, p.link_description, \
     p.link_image, p.image_url, p.created_at";

impl Database {
    // -- Users --

    /// Creates the credential row and its profile in one transaction.
    pub fn create_account(&self, user: &UserRow, profile: &Profile) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password, email_confirmed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.password,
                    user.email_confirmed_at,
                    user.created_at
                ],
            )?;
            tx.execute(
                "INSERT INTO profiles (id, email, username, role, verification_status, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    profile.id,
                    profile.email,
                    profile.username,
                    profile.role.as_str(),
                    profile.verification_status.as_str(),
                    profile.avatar_url,
                    profile.created_at
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, email_confirmed_at, created_at
                 FROM users WHERE email = ?1 COLLATE NOCASE",
                [email],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, email_confirmed_at, created_at
                 FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Marks the address confirmed. Returns false when no such user exists.
    pub fn confirm_email(&self, email: &str, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email_confirmed_at = COALESCE(email_confirmed_at, ?2)
                 WHERE email = ?1 COLLATE NOCASE",
                rusqlite::params![email, at],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles a WHERE a.id = ?1");
            conn.query_row(&sql, [id], |row| profile_from_row(row, 0)).optional()
        })
    }

    pub fn set_verification_status(&self, id: Uuid, status: VerificationStatus) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET verification_status = ?2 WHERE id = ?1",
                rusqlite::params![id, status.as_str()],
            )?;
            Ok(changed)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, id: Uuid, post: &NewPost, created_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, post_type, content, resource_title, resource_category,
                    resource_contact, link_url, link_title, link_description, link_image, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    id,
                    post.user_id,
                    post.post_type.as_str(),
                    post.content,
                    post.resource_title,
                    post.resource_category,
                    post.resource_contact,
                    post.link_url,
                    post.link_title,
                    post.link_description,
                    post.link_image,
                    post.image_url,
                    created_at
                ],
            )?;
            Ok(())
        })
    }

    /// Every post, newest first, with author, likes and comments attached.
    pub fn list_feed_posts(&self) -> Result<Vec<FeedPost>> {
        self.with_conn(|conn| query_feed_posts(conn, None))
    }

    pub fn get_feed_post(&self, id: Uuid) -> Result<Option<FeedPost>> {
        self.with_conn(|conn| Ok(query_feed_posts(conn, Some(id))?.into_iter().next()))
    }

    /// Updates only when `owner` wrote the post. Returns the number of rows changed.
    pub fn update_post(&self, id: Uuid, owner: Uuid, update: &PostUpdate) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET
                    content = ?3,
                    link_url = COALESCE(?4, link_url),
                    link_title = COALESCE(?5, link_title),
                    link_description = COALESCE(?6, link_description),
                    link_image = COALESCE(?7, link_image)
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    id,
                    owner,
                    update.content,
                    update.link_url,
                    update.link_title,
                    update.link_description,
                    update.link_image
                ],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_post(&self, id: Uuid, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner],
            )?;
            Ok(changed)
        })
    }

    // -- Likes --

    /// Fails with a constraint violation when the like already exists.
    pub fn insert_like(&self, post_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, user_id, at],
            )?;
            Ok(())
        })
    }

    pub fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                rusqlite::params![post_id, user_id],
            )?;
            Ok(changed)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, id: Uuid, comment: &NewComment, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, comment.post_id, comment.user_id, comment.content, at],
            )?;
            Ok(())
        })
    }

    pub fn get_thread_comment(&self, id: Uuid) -> Result<Option<ThreadComment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, {PROFILE_COLUMNS}
                 FROM comments c
                 LEFT JOIN profiles a ON a.id = c.user_id
                 WHERE c.id = ?1"
            );
            conn.query_row(&sql, [id], thread_comment_from_row).optional()
        })
    }

    pub fn update_comment(&self, id: Uuid, owner: Uuid, content: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET content = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner, content],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_comment(&self, id: Uuid, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner],
            )?;
            Ok(changed)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: Uuid, message: &NewMessage, at: DateTime<Utc>) -> Result<Message> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, message.sender_id, message.recipient_id, message.content, at],
            )?;
            Ok(Message {
                id,
                sender_id: message.sender_id,
                recipient_id: message.recipient_id,
                content: message.content.clone(),
                created_at: at,
            })
        })
    }

    /// Profiles `user_id` has exchanged messages with, most recent exchange first.
    pub fn get_conversations(&self, user_id: Uuid) -> Result<Vec<Profile>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROFILE_COLUMNS}
                 FROM profiles a
                 JOIN (
                     SELECT CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS other_id,
                            MAX(created_at) AS last_at
                     FROM messages
                     WHERE sender_id = ?1 OR recipient_id = ?1
                     GROUP BY other_id
                 ) c ON c.other_id = a.id
                 ORDER BY c.last_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| profile_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Both directions of a conversation, oldest first.
    pub fn get_messages(&self, user1: Uuid, user2: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND recipient_id = ?2)
                    OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([user1, user2], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        recipient_id: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, id: Uuid, n: &NewNotification, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, actor_id, type, post_id, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![id, n.user_id, n.actor_id, n.kind.as_str(), n.post_id, at],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<NotificationWithActor>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT n.id, n.user_id, n.actor_id, n.type, n.post_id, n.is_read, n.created_at, {PROFILE_COLUMNS}
                 FROM notifications n
                 LEFT JOIN profiles a ON a.id = n.actor_id
                 WHERE n.user_id = ?1
                 ORDER BY n.created_at DESC, n.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(NotificationWithActor {
                        notification: Notification {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            actor_id: row.get(2)?,
                            kind: enum_col(row, 3)?,
                            post_id: row.get(4)?,
                            is_read: row.get(5)?,
                            created_at: row.get(6)?,
                        },
                        actor: optional_profile_from_row(row, 7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])?;
            Ok(changed)
        })
    }

    /// Owner of a notification row, for row-level checks.
    pub fn notification_owner(&self, id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT user_id FROM notifications WHERE id = ?1", [id], |row| row.get(0))
                .optional()
        })
    }

    // -- Wishlist --

    pub fn insert_wishlist_item(
        &self,
        id: Uuid,
        item: &NewWishlistItem,
        at: DateTime<Utc>,
    ) -> Result<WishlistItem> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wishlist_items (id, user_id, item_description, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, item.user_id, item.item_description, item.category, at],
            )?;
            Ok(WishlistItem {
                id,
                user_id: item.user_id,
                item_description: item.item_description.clone(),
                category: item.category.clone(),
                created_at: at,
            })
        })
    }

    pub fn list_wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, item_description, category, created_at
                 FROM wishlist_items
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(WishlistItem {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        item_description: row.get(2)?,
                        category: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes only the owner's row. Returns the number of rows removed.
    pub fn delete_wishlist_item(&self, id: Uuid, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM wishlist_items WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, owner],
            )?;
            Ok(changed)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Other,
}

/// Classifies a failed write that broke a table constraint.
pub fn constraint_violation(err: &anyhow::Error) -> Option<ConstraintKind> {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(match e.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintKind::Unique
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}

fn query_feed_posts(conn: &Connection, only: Option<Uuid>) -> Result<Vec<FeedPost>> {
    let filter = if only.is_some() { "WHERE p.id = ?1" } else { "" };
    // JOIN profiles to fetch the author in the same query
    let sql = format!(
        "SELECT {POST_COLUMNS}, {PROFILE_COLUMNS}
         FROM posts p
         LEFT JOIN profiles a ON a.id = p.user_id
         {filter}
         ORDER BY p.created_at DESC, p.rowid DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = only.iter().map(|id| id as &dyn ToSql).collect();
    let mut posts = stmt
        .query_map(params.as_slice(), |row| {
            Ok(FeedPost {
                post: post_from_row(row)?,
                author: optional_profile_from_row(row, 13)?,
                likes: Vec::new(),
                comments: Vec::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_relations(conn, &mut posts)?;
    Ok(posts)
}

/// Posts per relation query, well under SQLite's bound-variable limit.
const RELATION_BATCH: usize = 500;

/// Batch-fetch likes and comments for the posts (eliminates N+1).
fn attach_relations(conn: &Connection, posts: &mut [FeedPost]) -> Result<()> {
    for batch in posts.chunks_mut(RELATION_BATCH) {
        attach_relation_batch(conn, batch)?;
    }
    Ok(())
}

fn attach_relation_batch(conn: &Connection, posts: &mut [FeedPost]) -> Result<()> {
    let ids: Vec<Uuid> = posts.iter().map(|p| p.post.id).collect();
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let in_list = placeholders.join(", ");
    let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();

    let mut likes: HashMap<Uuid, Vec<Like>> = HashMap::new();
    {
        let sql = format!(
            "SELECT post_id, user_id, created_at FROM likes
             WHERE post_id IN ({in_list})
             ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(Like {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        for like in rows {
            let like = like?;
            likes.entry(like.post_id).or_default().push(like);
        }
    }

    let mut comments: HashMap<Uuid, Vec<ThreadComment>> = HashMap::new();
    {
        let sql = format!(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, {PROFILE_COLUMNS}
             FROM comments c
             LEFT JOIN profiles a ON a.id = c.user_id
             WHERE c.post_id IN ({in_list})
             ORDER BY c.created_at ASC, c.rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), thread_comment_from_row)?;
        for comment in rows {
            let comment = comment?;
            comments.entry(comment.comment.post_id).or_default().push(comment);
        }
    }

    for post in posts.iter_mut() {
        post.likes = likes.remove(&post.post.id).unwrap_or_default();
        post.comments = comments.remove(&post.post.id).unwrap_or_default();
    }
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        email_confirmed_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_type: enum_col(row, 2)?,
        content: row.get(3)?,
        resource_title: row.get(4)?,
        resource_category: row.get(5)?,
        resource_contact: row.get(6)?,
        link_url: row.get(7)?,
        link_title: row.get(8)?,
        link_description: row.get(9)?,
        link_image: row.get(10)?,
        image_url: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn thread_comment_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadComment> {
    Ok(ThreadComment {
        comment: Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        },
        author: optional_profile_from_row(row, 5)?,
    })
}

/// Reads the seven `PROFILE_COLUMNS` starting at `base`.
fn profile_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(base)?,
        email: row.get(base + 1)?,
        username: row.get(base + 2)?,
        role: enum_col(row, base + 3)?,
        verification_status: enum_col(row, base + 4)?,
        avatar_url: row.get(base + 5)?,
        created_at: row.get(base + 6)?,
    })
}

/// LEFT JOIN variant: a NULL id means no matching profile.
fn optional_profile_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<Profile>> {
    match row.get::<_, Option<Uuid>>(base)? {
        Some(_) => profile_from_row(row, base).map(Some),
        None => Ok(None),
    }
}

fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edubridge_types::{NotificationType, PostType, Role};

    fn account(db: &Database, name: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let user = UserRow {
            id,
            email: format!("{name}@example.com"),
            password: "hash".into(),
            email_confirmed_at: Some(now),
            created_at: now,
        };
        let profile = Profile {
            id,
            email: Some(user.email.clone()),
            username: name.into(),
            role,
            verification_status: VerificationStatus::Unverified,
            avatar_url: None,
            created_at: now,
        };
        db.create_account(&user, &profile).unwrap();
        id
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn feed_posts_carry_author_likes_and_comments() {
        let db = Database::open_in_memory().unwrap();
        let donor = account(&db, "donor", Role::Donor);
        let student = account(&db, "student", Role::Student);

        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        let mut post = NewPost::new(donor, PostType::Donation);
        post.resource_title = Some("Laptop".into());
        db.insert_post(older, &post, at(0)).unwrap();
        db.insert_post(newer, &NewPost::new(student, PostType::Wisdom), at(10)).unwrap();

        db.insert_like(older, student, at(20)).unwrap();
        let comment = NewComment { post_id: older, user_id: student, content: "Thanks!".into() };
        db.insert_comment(Uuid::new_v4(), &comment, at(30)).unwrap();

        let feed = db.list_feed_posts().unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].post.id, newer);
        assert_eq!(feed[1].author_name(), "donor");
        assert!(feed[1].liked_by(student));
        assert_eq!(feed[1].comments[0].author.as_ref().unwrap().username, "student");
        assert!(feed[0].likes.is_empty());
    }

    #[test]
    fn large_feeds_load_relations_in_batches() {
        let db = Database::open_in_memory().unwrap();
        let donor = account(&db, "donor", Role::Donor);
        let student = account(&db, "student", Role::Student);

        let count = RELATION_BATCH * 2 + 1;
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            db.insert_post(*id, &NewPost::new(donor, PostType::Wisdom), at(i as i64)).unwrap();
        }
        // Oldest and newest land in different batches.
        db.insert_like(ids[0], student, at(10_000)).unwrap();
        db.insert_like(ids[count - 1], student, at(10_001)).unwrap();

        let feed = db.list_feed_posts().unwrap();
        assert_eq!(feed.len(), count);
        assert!(feed[0].liked_by(student));
        assert!(feed[count - 1].liked_by(student));
        assert_eq!(feed.iter().filter(|p| !p.likes.is_empty()).count(), 2);
    }

    #[test]
    fn duplicate_like_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let donor = account(&db, "donor", Role::Donor);
        let post = Uuid::new_v4();
        db.insert_post(post, &NewPost::new(donor, PostType::Wisdom), at(0)).unwrap();

        db.insert_like(post, donor, at(1)).unwrap();
        let err = db.insert_like(post, donor, at(2)).unwrap_err();
        assert_eq!(constraint_violation(&err), Some(ConstraintKind::Unique));
        assert_eq!(db.delete_like(post, donor).unwrap(), 1);
    }

    #[test]
    fn owner_match_guards_updates_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        let donor = account(&db, "donor", Role::Donor);
        let other = account(&db, "other", Role::Student);
        let post = Uuid::new_v4();
        db.insert_post(post, &NewPost::new(donor, PostType::Wisdom), at(0)).unwrap();

        let update = PostUpdate { content: "edited".into(), ..Default::default() };
        assert_eq!(db.update_post(post, other, &update).unwrap(), 0);
        assert_eq!(db.delete_post(post, other).unwrap(), 0);
        assert_eq!(db.update_post(post, donor, &update).unwrap(), 1);

        let stored = db.get_feed_post(post).unwrap().unwrap();
        assert_eq!(stored.post.content.as_deref(), Some("edited"));
        assert_eq!(db.delete_post(post, donor).unwrap(), 1);
        assert!(db.get_feed_post(post).unwrap().is_none());
    }

    #[test]
    fn conversations_order_by_latest_exchange() {
        let db = Database::open_in_memory().unwrap();
        let me = account(&db, "me", Role::Student);
        let alice = account(&db, "alice", Role::Donor);
        let bob = account(&db, "bob", Role::Donor);

        let send = |from, to, content: &str, secs| {
            let msg = NewMessage { sender_id: from, recipient_id: to, content: content.into() };
            db.insert_message(Uuid::new_v4(), &msg, at(secs)).unwrap();
        };
        send(me, alice, "hi alice", 0);
        send(bob, me, "hi from bob", 5);
        send(alice, me, "hello again", 10);

        let convos = db.get_conversations(me).unwrap();
        let names: Vec<_> = convos.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let history = db.get_messages(alice, me).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi alice");
    }

    #[test]
    fn notifications_list_with_actor_and_mark_read() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "owner", Role::Donor);
        let fan = account(&db, "fan", Role::Student);
        let id = Uuid::new_v4();
        let n = NewNotification {
            user_id: owner,
            kind: NotificationType::Like,
            actor_id: fan,
            post_id: None,
        };
        db.insert_notification(id, &n, at(0)).unwrap();

        let list = db.list_notifications(owner).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].actor_name(), "fan");
        assert!(!list[0].notification.is_read);

        assert_eq!(db.mark_notification_read(id).unwrap(), 1);
        assert!(db.list_notifications(owner).unwrap()[0].notification.is_read);
        assert_eq!(db.notification_owner(id).unwrap(), Some(owner));
    }

    #[test]
    fn confirm_email_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let user = UserRow {
            id,
            email: "New@Example.com".into(),
            password: "hash".into(),
            email_confirmed_at: None,
            created_at: now,
        };
        let profile = Profile {
            id,
            email: Some(user.email.clone()),
            username: "new".into(),
            role: Role::Student,
            verification_status: VerificationStatus::Unverified,
            avatar_url: None,
            created_at: now,
        };
        db.create_account(&user, &profile).unwrap();

        assert!(db.confirm_email("new@example.com", now).unwrap());
        let stored = db.get_user_by_id(id).unwrap().unwrap();
        assert!(stored.email_confirmed_at.is_some());
        assert!(!db.confirm_email("missing@example.com", now).unwrap());
    }
}
