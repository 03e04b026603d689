//! Administrative commands behind the `schoolyard-cli` binary.

pub mod admin;
pub mod permissions;
pub mod seeder;

pub use admin::{NewAdmin, create_admin};
pub use permissions::sync_permissions;
