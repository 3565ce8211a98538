pub mod client;
pub mod contract;
pub mod employee;
pub mod product;
pub mod status;
pub mod upload;

use serde::Deserialize;

use crate::{error::ApiError, store::Page};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;

/// `?page=&limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// Missing or non-numeric values fall back to 1/10. Zero, negative, or
    /// an offset past `i64::MAX` is a 400.
    pub fn page(&self) -> Result<Page, ApiError> {
        let page = parse_or(self.page.as_deref(), DEFAULT_PAGE);
        let limit = parse_or(self.limit.as_deref(), DEFAULT_LIMIT);

        if page <= 0 || limit <= 0 || (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::bad_request("Invalid pagination parameters."));
        }

        Ok(Page {
            page: page as u64,
            limit: limit as u64,
        })
    }
}

fn parse_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Treats `""` query params as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
