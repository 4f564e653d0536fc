//! Application state shared by handlers

use qod_core::Config;
use qod_db::CommentRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub comments: CommentRepository,
}

impl AppState {
    pub fn new(config: Config, comments: CommentRepository) -> Self {
        Self { config, comments }
    }
}
