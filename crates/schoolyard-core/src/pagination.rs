//! Listing parameters shared by every collection endpoint.
//!
//! # Query parameters
//!
//! | Name         | Meaning                                              | Default      |
//! |--------------|------------------------------------------------------|--------------|
//! | `page`       | 1-indexed page number                                | `1`          |
//! | `limit`      | Items per page, clamped to 1..=100, or `all`         | `10`         |
//! | `keyword`    | Case-insensitive substring over the searchable fields| none         |
//! | `sort_by`    | Sortable field name                                  | `created_at` |
//! | `sort_order` | `asc` or `desc`                                      | `desc`       |
//! | `populate`   | Embed related entities                               | `false`      |
//! | `fields`     | Comma-separated projection                           | all fields   |
//!
//! # Example
//!
//! ```ignore
//! // GET /api/sections?page=3&limit=20&keyword=blue
//! let window = params.window()?;
//! assert_eq!(window.offset(), Some(40));
//! ```

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::serde::{deserialize_optional_bool, deserialize_optional_i64};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(Self::Asc),
            "desc" | "descending" | "-1" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Which slice of the result set to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Paged { page: i64, limit: i64 },
    All,
}

impl Window {
    pub fn limit(&self) -> Option<i64> {
        match self {
            Self::Paged { limit, .. } => Some(*limit),
            Self::All => None,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        match self {
            Self::Paged { page, limit } => Some((page - 1).saturating_mul(*limit)),
            Self::All => None,
        }
    }
}

/// Raw listing parameters, as sent on the query string.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page number (1-indexed, default: 1)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
    /// Items per page (1-100, default: 10) or `all`
    pub limit: Option<String>,
    /// Case-insensitive substring search
    pub keyword: Option<String>,
    /// Field to sort by (default: created_at)
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default: desc)
    pub sort_order: Option<String>,
    /// Embed related entities
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub populate: Option<bool>,
    /// Comma-separated list of fields to return
    pub fields: Option<String>,
}

impl ListParams {
    /// Resolves `page` and `limit` into a window. `limit=all` disables paging.
    pub fn window(&self) -> Result<Window, String> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIMIT,
            Some(raw) if raw.eq_ignore_ascii_case("all") => return Ok(Window::All),
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| format!("limit must be a number or 'all', got '{}'", raw))?
                .clamp(1, MAX_LIMIT),
        };
        let page = self.page.unwrap_or(1).max(1);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(format!("page {} is out of range", page));
        }

        Ok(Window::Paged { page, limit })
    }

    pub fn sort_order(&self) -> Result<SortOrder, String> {
        match self.sort_order.as_deref() {
            None | Some("") => Ok(SortOrder::default()),
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| format!("sort_order must be 'asc' or 'desc', got '{}'", raw)),
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn populate(&self) -> bool {
        self.populate.unwrap_or(false)
    }

    pub fn fields(&self) -> Option<Vec<String>> {
        let raw = self.fields.as_deref()?;
        let fields: Vec<String> = raw
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        (!fields.is_empty()).then_some(fields)
    }
}

/// Parameters accepted when fetching a single record.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewParams {
    /// Embed related entities
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub populate: Option<bool>,
}

impl ViewParams {
    pub fn populate(&self) -> bool {
        self.populate.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };

        Self {
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// A fetched slice plus the total matching the same filters.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub meta: Option<PaginationMeta>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, window: Window) -> Self {
        let meta = match window {
            Window::Paged { page, limit } => Some(PaginationMeta::new(total, page, limit)),
            Window::All => None,
        };
        Self { items, total, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<i64>, limit: Option<&str>) -> ListParams {
        ListParams {
            page,
            limit: limit.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_window_defaults() {
        let window = ListParams::default().window().unwrap();
        assert_eq!(window, Window::Paged { page: 1, limit: 10 });
        assert_eq!(window.offset(), Some(0));
    }

    #[test]
    fn test_window_offset_from_page() {
        let window = params(Some(3), Some("20")).window().unwrap();
        assert_eq!(window.limit(), Some(20));
        assert_eq!(window.offset(), Some(40));
    }

    #[test]
    fn test_window_limit_boundary_cases() {
        let cases = [("1", 1), ("50", 50), ("100", 100), ("101", 100), ("0", 1), ("-5", 1)];
        for (input, expected) in cases {
            let window = params(None, Some(input)).window().unwrap();
            assert_eq!(window.limit(), Some(expected), "limit={}", input);
        }
    }

    #[test]
    fn test_window_page_clamped_to_one() {
        let window = params(Some(-3), None).window().unwrap();
        assert_eq!(window, Window::Paged { page: 1, limit: 10 });
    }

    #[test]
    fn test_window_rejects_page_past_offset_range() {
        let err = params(Some(i64::MAX), Some("100")).window().unwrap_err();
        assert!(err.contains("out of range"));

        let window = params(Some(i64::MAX), Some("1")).window().unwrap();
        assert_eq!(window.offset(), Some(i64::MAX - 1));
    }

    #[test]
    fn test_window_all() {
        assert_eq!(params(Some(4), Some("all")).window().unwrap(), Window::All);
        assert_eq!(params(None, Some("ALL")).window().unwrap(), Window::All);
        assert_eq!(Window::All.offset(), None);
    }

    #[test]
    fn test_window_rejects_garbage_limit() {
        let err = params(None, Some("lots")).window().unwrap_err();
        assert!(err.contains("limit"));
    }

    #[test]
    fn test_sort_order_parsing() {
        let mut p = ListParams::default();
        assert_eq!(p.sort_order().unwrap(), SortOrder::Desc);
        p.sort_order = Some("ASC".into());
        assert_eq!(p.sort_order().unwrap(), SortOrder::Asc);
        p.sort_order = Some("-1".into());
        assert_eq!(p.sort_order().unwrap(), SortOrder::Desc);
        p.sort_order = Some("sideways".into());
        assert!(p.sort_order().is_err());
    }

    #[test]
    fn test_keyword_blank_is_none() {
        let mut p = ListParams::default();
        p.keyword = Some("   ".into());
        assert_eq!(p.keyword(), None);
        p.keyword = Some(" grade ".into());
        assert_eq!(p.keyword(), Some("grade"));
    }

    #[test]
    fn test_fields_split_and_trimmed() {
        let mut p = ListParams::default();
        p.fields = Some("name, code,,".into());
        assert_eq!(p.fields(), Some(vec!["name".to_string(), "code".to_string()]));
        p.fields = Some(" , ".into());
        assert_eq!(p.fields(), None);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(25, 2, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let last = PaginationMeta::new(25, 3, 10);
        assert!(!last.has_next_page);

        let empty = PaginationMeta::new(0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn test_pagination_meta_serializes_camel_case() {
        let json = serde_json::to_string(&PaginationMeta::new(5, 1, 10)).unwrap();
        assert!(json.contains(r#""totalPages":1"#));
        assert!(json.contains(r#""hasNextPage":false"#));
    }

    #[test]
    fn test_list_params_deserialize_empty_strings() {
        let json = r#"{"page":"","populate":""}"#;
        let p: ListParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.page, None);
        assert!(!p.populate());
    }

    #[test]
    fn test_list_params_deserialize_strings() {
        let json = r#"{"page":"2","limit":"all","populate":"true"}"#;
        let p: ListParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.page, Some(2));
        assert_eq!(p.window().unwrap(), Window::All);
        assert!(p.populate());
    }
}
