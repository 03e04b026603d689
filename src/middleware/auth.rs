use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use schoolyard_core::AppError;
use schoolyard_core::permissions;
use sqlx::FromRow;
use uuid::Uuid;

use crate::modules::audit_logs::model::{ActorSnapshot, RoleSnapshot};
use crate::modules::auth::session::hash_token;
use crate::state::AppState;

/// The user behind the request's session cookie, with their role and the
/// permission names granted through it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub username: String,
    pub email: String,
    pub role: RoleSnapshot,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Snapshot stored with every audit entry this user causes.
    pub fn actor(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: Some(self.user_id),
            code: self.code.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: Some(self.role.clone()),
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    code: String,
    username: String,
    email: String,
    is_active: bool,
    role_id: Uuid,
    role_code: String,
    role_name: String,
    permissions: Vec<String>,
}

impl From<SessionRow> for AuthUser {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: row.session_id,
            user_id: row.user_id,
            code: row.code,
            username: row.username,
            email: row.email,
            role: RoleSnapshot {
                id: row.role_id,
                code: row.role_code,
                name: row.role_name,
            },
            permissions: row.permissions,
        }
    }
}

/// Resolves a plaintext session token to its user, ignoring expired sessions.
pub async fn load_session(state: &AppState, token: &str) -> Result<Option<AuthUser>, AppError> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT s.id AS session_id, u.id AS user_id, u.code, u.username, u.email, u.is_active,
                r.id AS role_id, r.code AS role_code, r.name AS role_name,
                ARRAY(
                    SELECT p.name::text FROM role_permissions rp
                    JOIN permissions p ON p.id = rp.permission_id
                    WHERE rp.role_id = r.id
                    ORDER BY p.name
                ) AS permissions
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         JOIN roles r ON r.id = u.role_id
         WHERE s.token_hash = $1 AND s.expires_at > NOW()",
    )
    .bind(hash_token(token))
    .fetch_optional(&state.db)
    .await?;

    match row {
        Some(row) if !row.is_active => Err(AppError::unauthorized("Account is disabled")),
        Some(row) => Ok(Some(row.into())),
        None => Ok(None),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Permission extractors and handlers may both ask for the user.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.session_config.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        let user = load_session(state, &token)
            .await?
            .ok_or_else(|| AppError::unauthorized("Session is invalid or has expired"))?;

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Declares an extractor that authenticates the request and then requires
/// one permission.
#[macro_export]
macro_rules! require_permission {
    ($name:ident, $permission:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub $crate::middleware::auth::AuthUser);

        impl axum::extract::FromRequestParts<$crate::state::AppState> for $name {
            type Rejection = schoolyard_core::AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &$crate::state::AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth_user =
                    $crate::middleware::auth::AuthUser::from_request_parts(parts, state).await?;

                if !auth_user.has_permission($permission) {
                    return Err(schoolyard_core::AppError::forbidden(format!(
                        "Access denied. Missing required permission: {}",
                        $permission
                    )));
                }

                Ok($name(auth_user))
            }
        }
    };
}

require_permission!(RequireRolesCreate, permissions::ROLES_CREATE);
require_permission!(RequireRolesRead, permissions::ROLES_READ);
require_permission!(RequireRolesUpdate, permissions::ROLES_UPDATE);
require_permission!(RequireRolesDelete, permissions::ROLES_DELETE);

require_permission!(RequirePermissionsCreate, permissions::PERMISSIONS_CREATE);
require_permission!(RequirePermissionsRead, permissions::PERMISSIONS_READ);
require_permission!(RequirePermissionsUpdate, permissions::PERMISSIONS_UPDATE);
require_permission!(RequirePermissionsDelete, permissions::PERMISSIONS_DELETE);

require_permission!(RequireUsersCreate, permissions::USERS_CREATE);
require_permission!(RequireUsersRead, permissions::USERS_READ);
require_permission!(RequireUsersUpdate, permissions::USERS_UPDATE);
require_permission!(RequireUsersDelete, permissions::USERS_DELETE);

require_permission!(RequireProfilesCreate, permissions::PROFILES_CREATE);
require_permission!(RequireProfilesRead, permissions::PROFILES_READ);
require_permission!(RequireProfilesUpdate, permissions::PROFILES_UPDATE);
require_permission!(RequireProfilesDelete, permissions::PROFILES_DELETE);

require_permission!(RequireCountriesCreate, permissions::COUNTRIES_CREATE);
require_permission!(RequireCountriesRead, permissions::COUNTRIES_READ);
require_permission!(RequireCountriesUpdate, permissions::COUNTRIES_UPDATE);
require_permission!(RequireCountriesDelete, permissions::COUNTRIES_DELETE);

require_permission!(RequireStatesCreate, permissions::STATES_CREATE);
require_permission!(RequireStatesRead, permissions::STATES_READ);
require_permission!(RequireStatesUpdate, permissions::STATES_UPDATE);
require_permission!(RequireStatesDelete, permissions::STATES_DELETE);

require_permission!(RequireCitiesCreate, permissions::CITIES_CREATE);
require_permission!(RequireCitiesRead, permissions::CITIES_READ);
require_permission!(RequireCitiesUpdate, permissions::CITIES_UPDATE);
require_permission!(RequireCitiesDelete, permissions::CITIES_DELETE);

require_permission!(RequireClassesCreate, permissions::CLASSES_CREATE);
require_permission!(RequireClassesRead, permissions::CLASSES_READ);
require_permission!(RequireClassesUpdate, permissions::CLASSES_UPDATE);
require_permission!(RequireClassesDelete, permissions::CLASSES_DELETE);

require_permission!(RequireSectionsCreate, permissions::SECTIONS_CREATE);
require_permission!(RequireSectionsRead, permissions::SECTIONS_READ);
require_permission!(RequireSectionsUpdate, permissions::SECTIONS_UPDATE);
require_permission!(RequireSectionsDelete, permissions::SECTIONS_DELETE);

require_permission!(RequireSubjectsCreate, permissions::SUBJECTS_CREATE);
require_permission!(RequireSubjectsRead, permissions::SUBJECTS_READ);
require_permission!(RequireSubjectsUpdate, permissions::SUBJECTS_UPDATE);
require_permission!(RequireSubjectsDelete, permissions::SUBJECTS_DELETE);

require_permission!(RequireStudentsCreate, permissions::STUDENTS_CREATE);
require_permission!(RequireStudentsRead, permissions::STUDENTS_READ);
require_permission!(RequireStudentsUpdate, permissions::STUDENTS_UPDATE);
require_permission!(RequireStudentsDelete, permissions::STUDENTS_DELETE);

require_permission!(RequireExamsCreate, permissions::EXAMS_CREATE);
require_permission!(RequireExamsRead, permissions::EXAMS_READ);
require_permission!(RequireExamsUpdate, permissions::EXAMS_UPDATE);
require_permission!(RequireExamsDelete, permissions::EXAMS_DELETE);

require_permission!(RequireAuditLogsRead, permissions::AUDIT_LOGS_READ);
require_permission!(RequireUploadsCreate, permissions::UPLOADS_CREATE);

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_user(permissions: &[&str]) -> AuthUser {
        AuthUser {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            code: "USER-1".to_string(),
            username: "registrar".to_string(),
            email: "registrar@example.com".to_string(),
            role: RoleSnapshot {
                id: Uuid::new_v4(),
                code: "ROLE-1".to_string(),
                name: "Registrar".to_string(),
            },
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_has_permission() {
        let user = auth_user(&["students:read", "students:create"]);
        assert!(user.has_permission("students:read"));
        assert!(user.has_permission("students:create"));
        assert!(!user.has_permission("students:delete"));
    }

    #[test]
    fn test_actor_snapshot() {
        let user = auth_user(&["roles:read"]);
        let actor = user.actor();
        assert_eq!(actor.id, Some(user.user_id));
        assert_eq!(actor.username, "registrar");
        assert_eq!(actor.role.as_ref().map(|r| r.name.as_str()), Some("Registrar"));
        assert_eq!(actor.permissions, vec!["roles:read"]);
    }
}
