//! Paging request/response types shared by every list view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Page request. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            sort: None,
            order: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
}

impl PageMeta {
    /// Initial paging state before the first load
    pub fn initial(items_per_page: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_items: 0,
            items_per_page,
        }
    }

    /// Derive paging metadata from a total item count
    pub fn from_total(request: &PageRequest, total_items: u64) -> Self {
        let limit = u64::from(request.limit.max(1));
        Self {
            current_page: request.page,
            total_pages: total_items.div_ceil(limit) as u32,
            total_items,
            items_per_page: request.limit,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}
