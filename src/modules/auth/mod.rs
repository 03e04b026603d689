//! Sign-in, sign-out and password changes over cookie-backed sessions.

pub mod controller;
pub mod model;
pub mod router;
pub mod service;
pub mod session;

pub use router::init_auth_router;
