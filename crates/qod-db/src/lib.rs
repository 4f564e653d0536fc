//! QOD Database Layer
//!
//! This crate provides the PostgreSQL repositories used by the API.

pub mod db;

pub use db::CommentRepository;
