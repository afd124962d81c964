//! Rows that exist only in the store. Everything else maps straight onto
//! `edubridge-types` models.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Credentials behind a profile. The password column holds an Argon2 PHC string.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
