use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use edubridge_db::models::UserRow;
use edubridge_types::{AuthUser, Profile, Session};

/// Access token lifetime.
const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// False for a wrong password and for an unreadable stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str, expires_at: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Checks signature and expiry.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// The auth-service view of a stored user, with the profile fields as metadata.
pub fn auth_user(user: &UserRow, profile: Option<&Profile>) -> AuthUser {
    let user_metadata = match profile {
        Some(profile) => serde_json::json!({
            "username": profile.username,
            "role": profile.role,
        }),
        None => serde_json::json!({}),
    };
    AuthUser {
        id: user.id,
        email: Some(user.email.clone()),
        email_confirmed_at: user.email_confirmed_at,
        user_metadata,
    }
}

pub fn issue_session(secret: &str, user: AuthUser, now: DateTime<Utc>) -> anyhow::Result<Session> {
    let expires_at = now + Duration::days(TOKEN_TTL_DAYS);
    let email = user.email.clone().unwrap_or_default();
    let access_token = create_token(secret, user.id, &email, expires_at)?;
    Ok(Session {
        access_token,
        refresh_token: None,
        expires_at: Some(expires_at.timestamp()),
        user,
    })
}
