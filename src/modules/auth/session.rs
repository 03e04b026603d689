//! Server-side sessions.
//!
//! The client holds an opaque token (32 random bytes, hex-encoded) in an
//! HttpOnly cookie; the database only ever sees its SHA-256 digest, so a
//! leaked `sessions` table cannot be replayed.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use rand::RngCore;
use schoolyard_config::SessionConfig;
use schoolyard_core::AppError;
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

pub const TOKEN_BYTES: usize = 32;

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cookie carrying a fresh session token.
pub fn session_cookie(config: &SessionConfig, token: &str) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .max_age(time::Duration::seconds(config.ttl_seconds))
        .build()
}

/// The session cookie as the jar should remove it; `CookieJar::remove`
/// turns it into an expired, empty cookie on the same path.
pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .build()
}

pub struct SessionService;

impl SessionService {
    /// Opens a session for `user_id` and returns the plaintext token.
    #[instrument(skip(conn, user_agent), fields(db.operation = "INSERT", db.table = "sessions"))]
    pub async fn create(
        conn: &mut PgConnection,
        user_id: Uuid,
        ttl_seconds: i64,
        user_agent: Option<&str>,
    ) -> Result<String, AppError> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds);

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at, user_agent)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(expires_at)
        .bind(user_agent)
        .execute(&mut *conn)
        .await?;

        debug!(user.id = %user_id, "Session created");
        Ok(token)
    }

    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "sessions"))]
    pub async fn revoke(db: &PgPool, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Ends every session of `user_id` except `keep`.
    #[instrument(skip(conn), fields(db.operation = "DELETE", db.table = "sessions"))]
    pub async fn revoke_all_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE user_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(user_id)
        .bind(keep)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "sessions"))]
    pub async fn purge_expired(db: &PgPool) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_sha256() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig::default();
        let cookie = session_cookie(&config, "deadbeef");
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "deadbeef");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86400)));

        let header = cookie.to_string();
        assert!(header.starts_with("sid=deadbeef"));
        assert!(header.contains("Max-Age=86400"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_secure_cookie() {
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };
        assert!(session_cookie(&config, "x").to_string().contains("Secure"));
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let mut cookie = removal_cookie(&SessionConfig::default());
        cookie.make_removal();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
