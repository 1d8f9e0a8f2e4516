use serde::Serialize;

/// Success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// List envelope with the page served and overall totals.
#[derive(Debug, Serialize)]
pub struct ListEnvelope<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
    pub total: i64,
    pub pagination: Pagination,
}

impl<T: Serialize> ListEnvelope<T> {
    pub fn ok(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let count = data.len();
        Self { success: true, data, count, total, pagination: Pagination::new(page, limit, total) }
    }
}

/// Unpaginated list envelope (low-stock listing).
#[derive(Debug, Serialize)]
pub struct CountedEnvelope<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> CountedEnvelope<T> {
    pub fn ok(data: Vec<T>) -> Self {
        let count = data.len();
        Self { success: true, data, count }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { page, limit, total_pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 1).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
        assert_eq!(Pagination::new(2, 50, 101).total_pages, 3);
    }

    #[test]
    fn list_envelope_counts_served_page() {
        let env = ListEnvelope::ok(vec![1, 2, 3], 42, 1, 3);
        assert!(env.success);
        assert_eq!(env.count, 3);
        assert_eq!(env.total, 42);
        assert_eq!(env.pagination.total_pages, 14);
    }
}
