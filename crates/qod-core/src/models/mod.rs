pub mod comment;
pub mod filters;

pub use comment::{Comment, CreateCommentRequest, NewComment, UpdateCommentRequest};
pub use filters::{Filters, PaginationMetadata, SortDirection, COMMENT_SORT_SAFELIST};
