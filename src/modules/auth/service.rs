use schoolyard_config::SessionConfig;
use schoolyard_core::{AppError, EntityKind, hash_password, verify_password};
use schoolyard_db::db_error;
use schoolyard_observability::{track_login_failure, track_login_success};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::modules::audit_logs::model::ActorSnapshot;
use crate::modules::audit_logs::service::{AuditEntry, AuditService};
use crate::modules::users::model::{RETURNING_USER, SELECT_USER, User};

use super::model::{ChangePasswordRequest, LoginRequest};
use super::session::SessionService;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(FromRow)]
struct LoginCandidate {
    id: Uuid,
    password_hash: String,
    is_active: bool,
    role_name: String,
}

pub struct AuthService;

impl AuthService {
    /// Checks the credentials and opens a session, returning its plaintext token.
    #[instrument(skip(db, config, dto, user_agent), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn login(
        db: &PgPool,
        config: &SessionConfig,
        dto: LoginRequest,
        user_agent: Option<&str>,
    ) -> Result<String, AppError> {
        let identifier = dto.username.trim();

        let candidate = sqlx::query_as::<_, LoginCandidate>(
            "SELECT u.id, u.password_hash, u.is_active, r.name AS role_name
             FROM users u
             JOIN roles r ON r.id = u.role_id
             WHERE LOWER(u.username) = LOWER($1) OR LOWER(u.email) = LOWER($1)
             ORDER BY (LOWER(u.username) = LOWER($1)) DESC
             LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(db)
        .await?;

        let Some(candidate) = candidate else {
            track_login_failure("unknown_user");
            warn!("Login attempt for unknown user");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(&dto.password, &candidate.password_hash)? {
            track_login_failure("invalid_credentials");
            warn!(user.id = %candidate.id, "Login attempt with wrong password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !candidate.is_active {
            track_login_failure("inactive");
            return Err(AppError::unauthorized("Account is disabled"));
        }

        let mut tx = db.begin().await?;

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(candidate.id)
            .execute(&mut *tx)
            .await?;

        let token =
            SessionService::create(&mut tx, candidate.id, config.ttl_seconds, user_agent).await?;
        tx.commit().await?;

        track_login_success(&candidate.role_name);
        info!(user.id = %candidate.id, "User logged in");

        Ok(token)
    }

    /// Changes the caller's own password and ends their other sessions.
    #[instrument(skip(db, actor, dto), fields(db.operation = "UPDATE", db.table = "users"))]
    pub async fn change_password(
        db: &PgPool,
        actor: &ActorSnapshot,
        user_id: Uuid,
        current_session: Uuid,
        dto: ChangePasswordRequest,
    ) -> Result<u64, AppError> {
        let mut tx = db.begin().await?;

        let before = sqlx::query_as::<_, User>(&format!(
            "{} WHERE id = $1 FOR UPDATE",
            SELECT_USER
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::unauthorized("Session is invalid or has expired"))?;

        if !verify_password(&dto.current_password, &before.password_hash)? {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "Current password is incorrect"
            )));
        }

        let after = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2 WHERE id = $1{}",
            RETURNING_USER
        ))
        .bind(user_id)
        .bind(hash_password(&dto.new_password)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error(EntityKind::User))?;

        let revoked =
            SessionService::revoke_all_for_user(&mut tx, user_id, Some(current_session)).await?;

        let entry = AuditEntry::updated(&before, &after)?
            .with_label(format!("Changed password for user {}", after.username));
        AuditService::record(&mut tx, actor, entry).await?;
        tx.commit().await?;

        info!(user.id = %user_id, revoked, "Password changed");
        Ok(revoked)
    }
}
