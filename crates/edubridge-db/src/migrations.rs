use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  BLOB PRIMARY KEY,
            email               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            email_confirmed_at  TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id                   BLOB PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            email                TEXT,
            username             TEXT NOT NULL,
            role                 TEXT NOT NULL DEFAULT 'student',
            verification_status  TEXT NOT NULL DEFAULT 'unverified',
            avatar_url           TEXT,
            created_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id                 BLOB PRIMARY KEY,
            user_id            BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            post_type          TEXT NOT NULL,
            content            TEXT,
            resource_title     TEXT,
            resource_category  TEXT,
            resource_contact   TEXT,
            link_url           TEXT,
            link_title         TEXT,
            link_description   TEXT,
            link_image         TEXT,
            image_url          TEXT,
            created_at         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE TABLE IF NOT EXISTS likes (
            post_id     BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            UNIQUE(post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          BLOB PRIMARY KEY,
            post_id     BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id            BLOB PRIMARY KEY,
            sender_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            recipient_id  BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            content       TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, recipient_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id          BLOB PRIMARY KEY,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            actor_id    BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            type        TEXT NOT NULL,
            post_id     BLOB REFERENCES posts(id) ON DELETE CASCADE,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);

        CREATE TABLE IF NOT EXISTS wishlist_items (
            id                BLOB PRIMARY KEY,
            user_id           BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            item_description  TEXT NOT NULL,
            category          TEXT NOT NULL,
            created_at        TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
