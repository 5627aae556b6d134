use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Validated page request translated to store offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub offset: u64,
    pub limit: u64,
}

pub fn paginate(page: i64, page_size: i64, max_page_size: u32) -> Result<PageWindow, AppError> {
    let page_u32 = u32::try_from(page)
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| AppError::invalid_parameter("page", &page.to_string(), "page must be >= 1"))?;

    let page_size_u32 = u32::try_from(page_size)
        .ok()
        .filter(|s| (1..=max_page_size).contains(s))
        .ok_or_else(|| {
            AppError::invalid_parameter(
                "page_size",
                &page_size.to_string(),
                format!("page_size must be between 1 and {max_page_size}"),
            )
        })?;

    let offset = u64::from(page_u32 - 1)
        .checked_mul(u64::from(page_size_u32))
        .ok_or_else(|| {
            AppError::invalid_parameter("page", &page.to_string(), "page offset overflows")
        })?;

    Ok(PageWindow {
        page: page_u32,
        page_size: page_size_u32,
        offset,
        limit: u64::from(page_size_u32),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(window: &PageWindow, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(u64::from(window.page_size));
        Self {
            page: window.page,
            page_size: window.page_size,
            total_count,
            total_pages,
            has_next: u64::from(window.page) < total_pages,
            has_prev: window.page > 1,
        }
    }
}
