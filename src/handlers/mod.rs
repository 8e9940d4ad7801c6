pub mod auth;
pub mod books;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod reviews;

use serde::Deserialize;
use utoipa::ToSchema;

/// Common page/limit query parameters for paginated listings.
#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Returns `(page, limit, offset)` with page floored at 1 and limit
    /// clamped to 1..=100.
    pub fn clamp(self) -> (i64, i64, i64) {
        let page = self.page.max(1);
        let limit = self.limit.clamp(1, 100);
        (page, limit, (page - 1) * limit)
    }
}

#[cfg(test)]
mod tests {
    use super::Pagination;

    #[test]
    fn clamp_floors_page_and_limit() {
        let (page, limit, offset) = Pagination { page: -3, limit: 0 }.clamp();
        assert_eq!((page, limit, offset), (1, 1, 0));
    }

    #[test]
    fn clamp_caps_limit_at_100() {
        let (_, limit, _) = Pagination { page: 1, limit: 5000 }.clamp();
        assert_eq!(limit, 100);
    }

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        let (_, _, offset) = Pagination { page: 3, limit: 20 }.clamp();
        assert_eq!(offset, 40);
    }
}
