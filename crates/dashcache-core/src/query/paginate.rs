use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Slice page `page` (1-based) of `limit` items out of `items`.
///
/// Page 0 is read as page 1 and a zero limit as 1. Pages past the end come
/// back empty with accurate metadata.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> PaginationResult<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(limit);

    let offset = (page - 1).saturating_mul(limit);
    let data = if offset >= total {
        Vec::new()
    } else {
        let end = offset.saturating_add(limit).min(total);
        items[offset..end].to_vec()
    };

    PaginationResult {
        data,
        pagination: PageInfo {
            page,
            limit,
            total,
            total_pages,
            has_next: page.saturating_mul(limit) < total,
            has_prev: page > 1,
        },
    }
}
