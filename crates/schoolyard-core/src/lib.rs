//! # Schoolyard Core
//!
//! Core types, errors, and utilities for the Schoolyard API.
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`response`]: The `{ status, statusCode, message, data }` envelope
//! - [`pagination`]: Listing parameters and pagination metadata
//! - [`codes`]: Entity kinds and `<PREFIX>-<uuid>` business codes
//! - [`permissions`]: Permission names checked by the API
//! - [`password`]: Password hashing and verification
//! - [`media`]: Image uploads to the media host
//! - [`serde`]: Query-string friendly deserializers
//!
//! # Example
//!
//! ```ignore
//! use schoolyard_core::{ApiResponse, AppError, EntityKind};
//!
//! let code = EntityKind::Student.new_code();
//! let error = AppError::not_found(anyhow::anyhow!("Student not found"));
//! let body = ApiResponse::ok("Student fetched successfully", student);
//! ```

pub mod codes;
pub mod errors;
pub mod media;
pub mod pagination;
pub mod password;
pub mod permissions;
pub mod response;
pub mod serde;

pub use codes::{EntityKey, EntityKind};
pub use errors::AppError;
pub use media::{MediaStore, MediaUpload, StorageError, StoredMedia};
pub use pagination::{ListParams, Page, PaginationMeta, SortOrder, ViewParams, Window};
pub use password::{hash_password, verify_password};
pub use response::ApiResponse;
