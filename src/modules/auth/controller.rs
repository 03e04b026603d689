use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use schoolyard_core::{ApiResponse, AppError};
use tracing::instrument;

use crate::middleware::auth::{AuthUser, load_session};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{ChangePasswordRequest, CurrentUser, LoginRequest};
use super::service::AuthService;
use super::session::{SessionService, removal_cookie, session_cookie};

/// Sign in with username (or email) and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; the session cookie is set", body = ApiResponse<CurrentUser>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Invalid credentials or disabled account"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, headers, jar, dto))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    let token = AuthService::login(&state.db, &state.session_config, dto, user_agent).await?;
    let user = load_session(&state, &token)
        .await?
        .ok_or_else(|| AppError::unauthorized("Session is invalid or has expired"))?;

    Ok((
        jar.add(session_cookie(&state.session_config, &token)),
        ApiResponse::ok("Logged in successfully", CurrentUser::from(user)),
    ))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Signed out; the session cookie is cleared"),
        (status = 401, description = "Not signed in")
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, jar), fields(user.id = %auth_user.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    SessionService::revoke(&state.db, auth_user.session_id).await?;

    Ok((
        jar.remove(removal_cookie(&state.session_config)),
        ApiResponse::<()>::message("Logged out successfully"),
    ))
}

/// The signed-in user with role and permissions
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<CurrentUser>),
        (status = 401, description = "Not signed in")
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
#[instrument(skip(auth_user), fields(user.id = %auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> ApiResponse<CurrentUser> {
    ApiResponse::ok("Current user fetched successfully", CurrentUser::from(auth_user))
}

/// Change your own password; other sessions are signed out
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Invalid input or wrong current password"),
        (status = 401, description = "Not signed in")
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    AuthService::change_password(
        &state.db,
        &auth_user.actor(),
        auth_user.user_id,
        auth_user.session_id,
        dto,
    )
    .await?;

    Ok(ApiResponse::<()>::message("Password changed successfully"))
}
