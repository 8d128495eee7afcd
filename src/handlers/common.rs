use crate::{errors::ServiceError, PaginatedResponse};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::IntoParams;

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// Query string shared by list endpoints.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct ListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// Optional status filter (case-insensitive)
    pub status: Option<String>,
}

impl ListQuery {
    pub fn page_and_limit(&self) -> (u64, u64) {
        page_and_limit(self.page, self.limit)
    }
}

/// Pages start at 1; the limit is clamped to `1..=MAX_LIMIT`.
pub fn page_and_limit(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    (
        page.unwrap_or(1).max(1),
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    )
}

pub fn paginated<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    }
}

/// Parses an enum from a path or query value, e.g. `occupied` or `MOVED_OUT`.
pub fn parse_enum<T: FromStr>(raw: &str, field: &str) -> Result<T, ServiceError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ServiceError::BadRequest(format!("invalid {}: {}", field, raw)))
}

pub fn parse_optional_enum<T: FromStr>(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<T>, ServiceError> {
    raw.filter(|v| !v.trim().is_empty())
        .map(|v| parse_enum(v, field))
        .transpose()
}
