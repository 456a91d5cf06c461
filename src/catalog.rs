//! Sweet-shop catalog: a paginated, filterable product grid.
//!
//! Pages are 1-based. Typing in the search box is debounced; applying or
//! resetting the filter and changing page fetch immediately. Every fetch
//! carries a generation so an older response cannot overwrite a newer one.

use std::time::Duration;
use thiserror::Error;

use crate::api::{ApiError, NewSweet, Sweet, SweetPage};
use crate::util::Debounce;

/// Number of page buttons shown around the current page.
pub const PAGE_WINDOW: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Please enter a name.")]
    MissingName,

    #[error("Please enter a valid non-negative price.")]
    InvalidPrice,

    #[error("Invalid {field} price: '{value}'")]
    InvalidFilterPrice { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweetFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl SweetFilter {
    /// Parse the filter form. Blank fields are unset.
    pub fn parse(category: &str, min_price: &str, max_price: &str) -> Result<Self, CatalogError> {
        let category = category.trim();
        Ok(Self {
            category: (!category.is_empty()).then(|| category.to_string()),
            min_price: parse_optional_price("min", min_price)?,
            max_price: parse_optional_price("max", max_price)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.min_price.is_none() && self.max_price.is_none()
    }
}

fn parse_optional_price(field: &'static str, raw: &str) -> Result<Option<f64>, CatalogError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(CatalogError::InvalidFilterPrice {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Query parameters of `GET /sweets/get`.
#[derive(Debug, Clone, PartialEq)]
pub struct SweetQuery {
    pub page: u32,
    pub limit: u32,
    pub search: String,
    pub filter: SweetFilter,
}

impl SweetQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if !self.search.is_empty() {
            params.push(("search", self.search.clone()));
        }
        if let Some(category) = &self.filter.category {
            params.push(("category", category.clone()));
        }
        if let Some(min) = self.filter.min_price {
            params.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.filter.max_price {
            params.push(("maxPrice", max.to_string()));
        }
        params
    }
}

/// `max(1, ceil(total / limit))`
pub fn total_pages(total: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    let pages = total.div_ceil(limit).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Up to [`PAGE_WINDOW`] consecutive page numbers around `page`, clamped to
/// `1..=total`.
pub fn page_window(page: u32, total: u32) -> Vec<u32> {
    let total = total.max(1);
    let start = page.saturating_sub(PAGE_WINDOW / 2).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total);
    let start = (end + 1).saturating_sub(PAGE_WINDOW).max(1);
    (start..=end).collect()
}

/// Validate the add-sweet form into a request body.
pub fn validate_new_sweet(name: &str, category: &str, price: &str) -> Result<NewSweet, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::MissingName);
    }
    let price = match price.trim().parse::<f64>() {
        Ok(p) if p.is_finite() && p >= 0.0 => p,
        _ => return Err(CatalogError::InvalidPrice),
    };
    let category = category.trim();
    Ok(NewSweet {
        name: name.to_string(),
        category: (!category.is_empty()).then(|| category.to_string()),
        price,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRequest {
    pub query: SweetQuery,
    pub generation: u64,
}

#[derive(Debug)]
pub struct Catalog {
    sweets: Vec<Sweet>,
    page: u32,
    limit: u32,
    total_pages: u32,
    search: String,
    filter: SweetFilter,
    search_debounce: Debounce,
    generation: u64,
    loading: bool,
    selected: usize,
}

impl Catalog {
    pub fn new(limit: u32, search_delay: Duration) -> Self {
        Self {
            sweets: Vec::new(),
            page: 1,
            limit: limit.max(1),
            total_pages: 1,
            search: String::new(),
            filter: SweetFilter::default(),
            search_debounce: Debounce::new(search_delay),
            generation: 0,
            loading: false,
            selected: 0,
        }
    }

    pub fn sweets(&self) -> &[Sweet] {
        &self.sweets
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filter(&self) -> &SweetFilter {
        &self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.sweets.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn load(&mut self, page: u32) -> CatalogRequest {
        self.page = page;
        self.generation += 1;
        self.loading = true;
        CatalogRequest {
            query: SweetQuery {
                page,
                limit: self.limit,
                search: self.search.trim().to_string(),
                filter: self.filter.clone(),
            },
            generation: self.generation,
        }
    }

    /// Reload the current page.
    pub fn refresh(&mut self) -> CatalogRequest {
        self.load(self.page)
    }

    /// Jump to `page` (clamped). `None` if already there.
    pub fn go_to_page(&mut self, page: u32) -> Option<CatalogRequest> {
        let page = page.clamp(1, self.total_pages);
        if page == self.page {
            return None;
        }
        Some(self.load(page))
    }

    pub fn next_page(&mut self) -> Option<CatalogRequest> {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> Option<CatalogRequest> {
        self.go_to_page(self.page.saturating_sub(1))
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search.push(c);
        self.search_debounce.trigger();
    }

    pub fn pop_search_char(&mut self) {
        self.search.pop();
        self.search_debounce.trigger();
    }

    /// Tick hook: fires the debounced search, restarting at page 1.
    pub fn poll_search(&mut self) -> Option<CatalogRequest> {
        self.search_debounce.poll().then(|| self.load(1))
    }

    pub fn apply_filter(&mut self, filter: SweetFilter) -> CatalogRequest {
        self.filter = filter;
        self.load(1)
    }

    pub fn reset_filter(&mut self) -> CatalogRequest {
        self.filter = SweetFilter::default();
        self.load(1)
    }

    /// After a sweet was added, show the first page again.
    pub fn after_add(&mut self) -> CatalogRequest {
        self.load(1)
    }

    /// Apply a fetch result. A failure keeps the previous grid.
    pub fn complete(&mut self, generation: u64, result: Result<SweetPage, ApiError>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.total_pages = total_pages(page.total, self.limit);
                self.sweets = page.items;
                self.selected = 0;
            }
            Err(e) => {
                tracing::error!(error = %e, page = self.page, "Failed to load sweets");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(total_pages(100, 0), 100);
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 1), vec![1]);
        assert_eq!(page_window(1, 10), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(6, 10), vec![4, 5, 6, 7, 8]);
        assert_eq!(page_window(10, 10), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_window(2, 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_new_sweet() {
        let sweet = validate_new_sweet("  Ladoo ", "", "2.5").unwrap();
        assert_eq!(sweet.name, "Ladoo");
        assert_eq!(sweet.category, None);
        assert_eq!(sweet.price, 2.5);

        assert_eq!(validate_new_sweet(" ", "x", "1"), Err(CatalogError::MissingName));
        assert_eq!(validate_new_sweet("a", "x", "-1"), Err(CatalogError::InvalidPrice));
        assert_eq!(validate_new_sweet("a", "x", "abc"), Err(CatalogError::InvalidPrice));
        assert_eq!(validate_new_sweet("a", "x", "NaN"), Err(CatalogError::InvalidPrice));
    }

    #[test]
    fn test_filter_parse() {
        let f = SweetFilter::parse("Chocolates", "", "10").unwrap();
        assert_eq!(f.category.as_deref(), Some("Chocolates"));
        assert_eq!(f.min_price, None);
        assert_eq!(f.max_price, Some(10.0));
        assert!(SweetFilter::parse("", "", "").unwrap().is_empty());
        assert!(SweetFilter::parse("", "cheap", "").is_err());
    }

    #[test]
    fn test_query_params_skip_unset() {
        let query = SweetQuery {
            page: 2,
            limit: 12,
            search: String::new(),
            filter: SweetFilter {
                category: Some("Barfi".into()),
                min_price: None,
                max_price: Some(5.0),
            },
        };
        let params = query.to_params();
        assert_eq!(
            params,
            vec![
                ("page", "2".to_string()),
                ("limit", "12".to_string()),
                ("category", "Barfi".to_string()),
                ("maxPrice", "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_page_navigation_clamped() {
        let mut catalog = Catalog::new(12, Duration::from_millis(400));
        let req = catalog.refresh();
        catalog.complete(
            req.generation,
            Ok(SweetPage {
                items: vec![],
                total: 30,
            }),
        );
        assert_eq!(catalog.total_pages(), 3);
        assert!(catalog.prev_page().is_none());
        assert_eq!(catalog.go_to_page(9).unwrap().query.page, 3);
        assert!(catalog.next_page().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_debounced_to_page_one() {
        let mut catalog = Catalog::new(12, Duration::from_millis(400));
        let req = catalog.refresh();
        catalog.complete(req.generation, Ok(SweetPage { items: vec![], total: 50 }));
        catalog.go_to_page(3);

        for c in "jal".chars() {
            catalog.push_search_char(c);
            tokio::time::advance(Duration::from_millis(100)).await;
            assert!(catalog.poll_search().is_none());
        }
        tokio::time::advance(Duration::from_millis(300)).await;
        let req = catalog.poll_search().unwrap();
        assert_eq!(req.query.page, 1);
        assert_eq!(req.query.search, "jal");
    }

    #[test]
    fn test_stale_result_dropped() {
        let mut catalog = Catalog::new(12, Duration::from_millis(400));
        let old = catalog.refresh();
        let new = catalog.reset_filter();
        let sweet = Sweet {
            name: "Peda".into(),
            ..Default::default()
        };
        assert!(!catalog.complete(old.generation, Ok(SweetPage { items: vec![sweet], total: 1 })));
        assert!(catalog.sweets().is_empty());
        assert!(catalog.complete(new.generation, Ok(SweetPage::default())));
    }
}
