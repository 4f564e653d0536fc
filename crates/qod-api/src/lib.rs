//! QOD API Library
//!
//! This crate provides the HTTP handlers, middleware, and application setup for
//! the comments service.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
