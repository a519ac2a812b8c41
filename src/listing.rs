use serde::Serialize;
use std::fmt;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort order written as `<field>.<direction>`, e.g. `createdAt.desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    /// Unknown fields or directions fall back to the default order.
    pub fn parse(value: &str) -> Self {
        let (field, direction) = value.trim().split_once('.').unwrap_or((value.trim(), ""));
        let field = match field {
            "createdAt" | "created_at" => SortField::CreatedAt,
            "updatedAt" | "updated_at" => SortField::UpdatedAt,
            "title" => SortField::Title,
            _ => return Sort::default(),
        };
        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" | "" => SortDirection::Desc,
            _ => return Sort::default(),
        };
        Sort { field, direction }
    }

    /// ORDER BY clause; only ever built from the enums above.
    pub(crate) fn order_by_sql(&self) -> String {
        let column = match self.field {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title COLLATE NOCASE",
        };
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        format!("{column} {direction}, id {direction}")
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Title => "title",
        };
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{field}.{direction}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub filter: String,
    pub sort: Sort,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            filter: String::new(),
            sort: Sort::default(),
        }
    }
}

impl ListQuery {
    pub fn new(page: Option<u32>, limit: Option<u32>, filter: Option<&str>, sort: Option<&str>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            filter: filter.map(str::trim).unwrap_or_default().to_string(),
            sort: sort.map(Sort::parse).unwrap_or_default(),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// LIKE pattern for the filter, or `None` when there is nothing to filter on.
    pub fn like_pattern(&self) -> Option<String> {
        if self.filter.is_empty() {
            None
        } else {
            Some(format!("%{}%", escape_like(&self.filter)))
        }
    }
}

/// Escape LIKE wildcards; pair with `ESCAPE '\'`.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl Pagination {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        let pages = self.total.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn links(&self, siblings: u32) -> Vec<PageLink> {
        pagination_range(self.page, self.total_pages(), siblings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageLink {
    Page(u32),
    Ellipsis,
}

/// Page links around `current`: always the first and last page, `siblings`
/// pages either side of the current one, and an ellipsis for each gap.
pub fn pagination_range(current: u32, total_pages: u32, siblings: u32) -> Vec<PageLink> {
    let pages = |from: u32, to: u32| (from..=to).map(PageLink::Page);
    if total_pages == 0 {
        return Vec::new();
    }
    if siblings.saturating_add(5) >= total_pages {
        return pages(1, total_pages).collect();
    }

    let current = current.clamp(1, total_pages);
    let left = current.saturating_sub(siblings).max(1);
    let right = current.saturating_add(siblings).min(total_pages);
    let left_gap = left > 2;
    let right_gap = right < total_pages - 1;
    let edge_count = siblings.saturating_mul(2).saturating_add(3).min(total_pages);

    match (left_gap, right_gap) {
        (false, true) => pages(1, edge_count)
            .chain([PageLink::Ellipsis, PageLink::Page(total_pages)])
            .collect(),
        (true, false) => [PageLink::Page(1), PageLink::Ellipsis]
            .into_iter()
            .chain(pages(total_pages - edge_count + 1, total_pages))
            .collect(),
        (true, true) => [PageLink::Page(1), PageLink::Ellipsis]
            .into_iter()
            .chain(pages(left, right))
            .chain([PageLink::Ellipsis, PageLink::Page(total_pages)])
            .collect(),
        (false, false) => pages(1, total_pages).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageLink::{Ellipsis, Page};

    #[test]
    fn unit_sort_parses_known_fields_and_falls_back() {
        assert_eq!(Sort::parse("createdAt.desc"), Sort::default());
        assert_eq!(
            Sort::parse("title.asc"),
            Sort { field: SortField::Title, direction: SortDirection::Asc }
        );
        assert_eq!(Sort::parse("updatedAt").direction, SortDirection::Desc);
        assert_eq!(Sort::parse("password.asc"), Sort::default());
        assert_eq!(Sort::parse("title; DROP TABLE reports"), Sort::default());
        assert_eq!(Sort::parse("title.asc").to_string(), "title.asc");
    }

    #[test]
    fn unit_list_query_clamps_page_and_limit() {
        let query = ListQuery::new(Some(0), Some(1000), Some("  budget "), None);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.filter, "budget");
        assert_eq!(ListQuery::new(Some(3), Some(10), None, None).offset(), 20);
    }

    #[test]
    fn unit_like_pattern_escapes_wildcards() {
        let query = ListQuery::new(None, None, Some("50%_off"), None);
        assert_eq!(query.like_pattern().as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(ListQuery::default().like_pattern(), None);
    }

    #[test]
    fn unit_total_pages_rounds_up() {
        let pagination = Pagination { page: 1, limit: 10, total: 21 };
        assert_eq!(pagination.total_pages(), 3);
        assert_eq!(Pagination { page: 1, limit: 10, total: 0 }.total_pages(), 0);
    }

    #[test]
    fn unit_pagination_range_shows_all_pages_when_few() {
        assert_eq!(pagination_range(2, 5, 1), vec![Page(1), Page(2), Page(3), Page(4), Page(5)]);
        assert!(pagination_range(1, 0, 1).is_empty());
    }

    #[test]
    fn unit_paging_arithmetic_saturates() {
        let query = ListQuery { page: 0, ..ListQuery::default() };
        assert_eq!(query.offset(), 0);
        assert_eq!(pagination_range(3, 10, u32::MAX), (1..=10).map(Page).collect::<Vec<_>>());
        assert_eq!(
            pagination_range(u32::MAX, u32::MAX, 1),
            vec![
                Page(1),
                Ellipsis,
                Page(u32::MAX - 4),
                Page(u32::MAX - 3),
                Page(u32::MAX - 2),
                Page(u32::MAX - 1),
                Page(u32::MAX),
            ]
        );
    }

    #[test]
    fn unit_pagination_range_places_ellipses() {
        assert_eq!(
            pagination_range(1, 10, 1),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(10)]
        );
        assert_eq!(
            pagination_range(10, 10, 1),
            vec![Page(1), Ellipsis, Page(6), Page(7), Page(8), Page(9), Page(10)]
        );
        assert_eq!(
            pagination_range(5, 10, 1),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }
}
