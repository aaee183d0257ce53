//! This modules defines the common functionality for paging data.

use serde::Serialize;

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
        }
    }
}

/// A validated request for one page of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: u64,
    page_size: u64,
}

impl PageRequest {
    /// Create a request for page `page_number` (starting at 1) of `page_size` items.
    ///
    /// # Errors
    /// Returns [Error::InvalidPagination] if either argument is zero.
    pub fn new(page_number: u64, page_size: u64) -> Result<Self, Error> {
        if page_number == 0 || page_size == 0 {
            return Err(Error::InvalidPagination);
        }

        Ok(Self {
            page_number,
            page_size,
        })
    }

    /// The requested page number, starting at 1.
    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    /// The maximum number of items on the page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The number of items before the first item on the page.
    pub fn offset(&self) -> u64 {
        (self.page_number - 1).saturating_mul(self.page_size)
    }
}

/// Describes where a page sits within the full set of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The maximum number of items on a page.
    pub page_size: u64,
    /// The page number, starting at 1.
    pub page_number: u64,
    /// The number of items across all pages.
    pub total_count: u64,
    /// The number of pages needed to show all items.
    pub total_pages: u64,
    /// The number of items before the first item on this page.
    pub skip: u64,
}

impl Pagination {
    /// Describe the page `request` within `total_count` items.
    pub fn new(request: PageRequest, total_count: u64) -> Self {
        Self {
            page_size: request.page_size(),
            page_number: request.page_number(),
            total_count,
            total_pages: total_count.div_ceil(request.page_size()),
            skip: request.offset(),
        }
    }
}
