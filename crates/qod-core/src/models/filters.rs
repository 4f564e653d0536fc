//! Pagination and sorting parameters for list queries

use serde::Serialize;
use std::borrow::Cow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Sort keys accepted by the comment listing; a leading `-` sorts descending
pub const COMMENT_SORT_SAFELIST: &[&str] = &["id", "content", "author", "-id", "-content", "-author"];

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct Filters {
    #[validate(range(min = 1, max = 10_000_000, message = "must be between 1 and 10 million"))]
    pub page: u32,
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub page_size: u32,
    #[validate(custom(function = "validate_sort"))]
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: "id".to_string(),
        }
    }
}

impl Filters {
    /// Column to order by. Only ever returns a safelisted column name.
    pub fn sort_column(&self) -> &str {
        if COMMENT_SORT_SAFELIST.contains(&self.sort.as_str()) {
            self.sort.trim_start_matches('-')
        } else {
            "id"
        }
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

fn validate_sort(sort: &str) -> Result<(), ValidationError> {
    if COMMENT_SORT_SAFELIST.contains(&sort) {
        Ok(())
    } else {
        Err(ValidationError::new("sort").with_message(Cow::Borrowed("invalid sort value")))
    }
}

/// Paging information returned alongside list results. Empty when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMetadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

impl PaginationMetadata {
    pub fn calculate(total_records: i64, filters: &Filters) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        let page_size = i64::from(filters.page_size);
        Self {
            current_page: i64::from(filters.page),
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
