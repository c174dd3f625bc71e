//! HTTP surface of the relay.
//!
//! The upload routes accept one document per request, store it through the
//! configured [`crate::storage::Backend`] and answer with a signed link.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use handlers::AppState;
pub use router::create_router;
pub use server::UploadServer;
