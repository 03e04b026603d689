//! Request extractors for authentication and authorization.
//!
//! # Authentication Flow
//!
//! 1. `POST /api/auth/login` stores the SHA-256 of a random token in
//!    `sessions` and hands the token back in the session cookie
//! 2. `AuthUser` reads the cookie, hashes it and loads the session, user,
//!    role and the role's permission names in one query
//! 3. Permission extractors check the loaded permissions
//! 4. Handler executes if all checks pass
//!
//! # Example
//!
//! ```ignore
//! use crate::middleware::auth::{AuthUser, RequireClassesCreate};
//!
//! // Any signed-in user
//! async fn me(auth_user: AuthUser) -> impl IntoResponse {
//!     // ...
//! }
//!
//! // Requires "classes:create"
//! async fn create_class(
//!     RequireClassesCreate(auth_user): RequireClassesCreate,
//! ) -> impl IntoResponse {
//!     // ...
//! }
//! ```

pub mod auth;
