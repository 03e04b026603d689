use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::AuthUser;
use crate::modules::audit_logs::model::RoleSnapshot;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username or email address
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "new_password must be between 8 and 128 characters"))]
    pub new_password: String,
}

/// The signed-in user as returned by login and `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: Uuid,
    pub code: String,
    pub username: String,
    pub email: String,
    pub role: RoleSnapshot,
    pub permissions: Vec<String>,
}

impl From<AuthUser> for CurrentUser {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.user_id,
            code: user.code,
            username: user.username,
            email: user.email,
            role: user.role,
            permissions: user.permissions,
        }
    }
}
