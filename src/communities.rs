//! Community directory (sidebar) and the community typeahead of the
//! create-post form.
//!
//! Both talk to the same entity but follow different access patterns: the
//! directory appends fixed-size pages as the user scrolls, the typeahead
//! replaces its suggestions after input goes quiet.

use std::collections::HashSet;
use std::time::Duration;

use crate::api::{ApiClient, ApiError, Community, CommunityId, CommunityPage, UserId};
use crate::util::Debounce;

// ============================================================================
// Infinite-scroll directory
// ============================================================================

/// A page fetch the caller should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

#[derive(Debug)]
pub struct CommunityDirectory {
    communities: Vec<Community>,
    ids: HashSet<CommunityId>,
    page_size: u32,
    next_page: u32,
    has_more: bool,
    loading: bool,
    scroll_threshold: usize,
    joined: HashSet<CommunityId>,
    selected: usize,
}

impl CommunityDirectory {
    pub fn new(page_size: u32, scroll_threshold: usize) -> Self {
        Self {
            communities: Vec::new(),
            ids: HashSet::new(),
            page_size: page_size.max(1),
            next_page: 0,
            has_more: true,
            loading: false,
            scroll_threshold,
            joined: HashSet::new(),
            selected: 0,
        }
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_community(&self) -> Option<&Community> {
        self.communities.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.communities.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Start fetching the next page, unless one is in flight or the server
    /// reported no more pages.
    pub fn begin_next_page(&mut self) -> Option<PageRequest> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(PageRequest {
            page: self.next_page,
            size: self.page_size,
        })
    }

    /// Apply a page result. Ids already present are skipped.
    ///
    /// A failed page leaves the list as is and allows a retry on the next
    /// scroll.
    pub fn complete_page(&mut self, request: PageRequest, result: Result<CommunityPage, ApiError>) {
        self.loading = false;
        if request.page != self.next_page {
            tracing::debug!(page = request.page, expected = self.next_page, "Ignoring out-of-order community page");
            return;
        }
        match result {
            Ok(page) => {
                let before = self.communities.len();
                for community in page.content {
                    if self.ids.insert(community.id) {
                        self.communities.push(community);
                    }
                }
                self.has_more = page.has_next;
                self.next_page += 1;
                tracing::debug!(
                    page = request.page,
                    added = self.communities.len() - before,
                    has_more = self.has_more,
                    "Community page loaded"
                );
            }
            Err(e) => {
                tracing::warn!(page = request.page, error = %e, "Failed to load community page");
            }
        }
    }

    /// Whether the viewport is within the scroll threshold of the bottom.
    ///
    /// `offset` is the first visible row, `viewport` the number of visible
    /// rows, `content_len` the total number of rows.
    pub fn should_load_more(&self, offset: usize, viewport: usize, content_len: usize) -> bool {
        if self.loading || !self.has_more {
            return false;
        }
        let bottom = offset.saturating_add(viewport);
        content_len.saturating_sub(bottom) <= self.scroll_threshold
    }

    pub fn is_joined(&self, id: CommunityId) -> bool {
        self.joined.contains(&id)
    }

    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    /// Replace the joined-communities cache with a fresh server list.
    pub fn set_joined(&mut self, joined: &[Community]) {
        self.joined = joined.iter().map(|c| c.id).collect();
    }
}

/// Toggle membership, then re-fetch the joined set.
pub async fn toggle_membership(
    client: &ApiClient,
    community_id: CommunityId,
    user_id: Option<UserId>,
) -> Result<Vec<Community>, ApiError> {
    let user_id = user_id.ok_or(ApiError::MissingUserId)?;
    client.toggle_membership(community_id, user_id).await?;
    client.joined_communities(user_id).await
}

// ============================================================================
// Typeahead
// ============================================================================

/// A suggestion search the caller should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub query: String,
    pub generation: u64,
}

/// Debounced community name search.
#[derive(Debug)]
pub struct Typeahead {
    input: String,
    suggestions: Vec<Community>,
    open: bool,
    selected: usize,
    debounce: Debounce,
    generation: u64,
}

impl Typeahead {
    pub fn new(delay: Duration) -> Self {
        Self {
            input: String::new(),
            suggestions: Vec::new(),
            open: false,
            selected: 0,
            debounce: Debounce::new(delay),
            generation: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn suggestions(&self) -> &[Community] {
        &self.suggestions
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Replace the input text. Blank input closes the panel immediately.
    pub fn on_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
        if self.input.trim().is_empty() {
            self.close();
        } else {
            self.debounce.trigger();
        }
    }

    pub fn push_char(&mut self, c: char) {
        let mut input = std::mem::take(&mut self.input);
        input.push(c);
        self.on_input(input);
    }

    pub fn pop_char(&mut self) {
        let mut input = std::mem::take(&mut self.input);
        input.pop();
        self.on_input(input);
    }

    /// Called on every tick. Yields a request once input has been quiet
    /// for the debounce delay.
    pub fn poll(&mut self) -> Option<SuggestionRequest> {
        if !self.debounce.poll() {
            return None;
        }
        let query = self.input.trim().to_string();
        if query.is_empty() {
            return None;
        }
        self.generation += 1;
        Some(SuggestionRequest {
            query,
            generation: self.generation,
        })
    }

    /// Apply search results. Returns `false` for a superseded request.
    pub fn complete(&mut self, generation: u64, result: Result<Vec<Community>, ApiError>) -> bool {
        if generation != self.generation {
            return false;
        }
        match result {
            Ok(found) => {
                self.open = !found.is_empty();
                self.suggestions = found;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Community search failed");
                self.suggestions.clear();
                self.open = false;
            }
        }
        self.selected = 0;
        true
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.suggestions.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Commit suggestion `index` into the input and close the panel.
    pub fn select(&mut self, index: usize) -> Option<&str> {
        let name = self.suggestions.get(index)?.name.clone();
        self.input = name;
        self.close();
        Some(&self.input)
    }

    /// Close the panel, cancel the pending timer and invalidate in-flight results.
    pub fn cancel(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.debounce.cancel();
        self.generation += 1;
        self.suggestions.clear();
        self.open = false;
        self.selected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn community(id: CommunityId) -> Community {
        Community {
            id,
            name: format!("c{}", id),
        }
    }

    fn page(ids: std::ops::Range<CommunityId>, has_next: bool) -> CommunityPage {
        CommunityPage {
            content: ids.map(community).collect(),
            has_next,
        }
    }

    #[test]
    fn test_pages_append_without_duplicates() {
        let mut dir = CommunityDirectory::new(15, 50);

        let first = dir.begin_next_page().unwrap();
        assert_eq!(first, PageRequest { page: 0, size: 15 });
        assert!(dir.begin_next_page().is_none(), "loading guard");
        dir.complete_page(first, Ok(page(0..15, true)));

        let second = dir.begin_next_page().unwrap();
        assert_eq!(second.page, 1);
        // Server shifted by one row: id 14 appears again.
        dir.complete_page(second, Ok(page(14..29, false)));

        assert_eq!(dir.communities().len(), 29);
        assert!(!dir.has_more());
        assert!(dir.begin_next_page().is_none());
    }

    #[test]
    fn test_failed_page_allows_retry() {
        let mut dir = CommunityDirectory::new(15, 50);
        let req = dir.begin_next_page().unwrap();
        dir.complete_page(req, Err(ApiError::EmptyResponse));
        assert!(dir.communities().is_empty());
        assert_eq!(dir.begin_next_page(), Some(PageRequest { page: 0, size: 15 }));
    }

    #[test]
    fn test_scroll_threshold() {
        let mut dir = CommunityDirectory::new(15, 5);
        let req = dir.begin_next_page().unwrap();
        dir.complete_page(req, Ok(page(0..15, true)));

        assert!(!dir.should_load_more(0, 5, 15));
        assert!(dir.should_load_more(5, 5, 15));
        assert!(dir.should_load_more(10, 5, 15));
    }

    #[test]
    fn test_joined_cache() {
        let mut dir = CommunityDirectory::new(15, 50);
        dir.set_joined(&[community(3), community(4)]);
        assert!(dir.is_joined(3));
        assert!(!dir.is_joined(5));
        dir.set_joined(&[community(5)]);
        assert!(!dir.is_joined(3));
        assert_eq!(dir.joined_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_suppresses_request() {
        let mut ta = Typeahead::new(Duration::from_millis(300));
        ta.on_input("   ");
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(ta.poll().is_none());
        assert!(!ta.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_commits_name() {
        let mut ta = Typeahead::new(Duration::from_millis(300));
        ta.on_input("ru");
        tokio::time::advance(Duration::from_millis(300)).await;
        let req = ta.poll().unwrap();
        assert!(ta.complete(req.generation, Ok(vec![community(1), community(2)])));
        assert!(ta.is_open());

        assert_eq!(ta.select(1), Some("c2"));
        assert!(!ta.is_open());
        assert!(ta.suggestions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_late_results() {
        let mut ta = Typeahead::new(Duration::from_millis(300));
        ta.on_input("go");
        tokio::time::advance(Duration::from_millis(300)).await;
        let req = ta.poll().unwrap();

        ta.cancel();
        assert!(!ta.complete(req.generation, Ok(vec![community(1)])));
        assert!(!ta.is_open());
    }
}
