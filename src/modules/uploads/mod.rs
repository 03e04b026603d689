//! Generic image uploads, plus the multipart helpers shared by the avatar
//! and photo routes.

pub mod controller;
pub mod model;
pub mod router;
pub mod service;

pub use router::init_uploads_router;
