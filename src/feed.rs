//! Post feed: the flat list of posts shown on the main view.
//!
//! The server returns the complete filtered set per request, so the feed
//! only tracks which query is current. Each issued request carries a
//! generation number and a response is applied only if no newer request was
//! issued in the meantime.

use crate::api::{ApiClient, ApiError, CommunityId, NewPost, Post, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    All,
    Community(CommunityId),
    Search(String),
}

impl FeedQuery {
    fn for_filter(filter: Option<CommunityId>) -> Self {
        filter.map_or(FeedQuery::All, FeedQuery::Community)
    }

    pub fn label(&self) -> String {
        match self {
            FeedQuery::All => "All posts".to_string(),
            FeedQuery::Community(id) => format!("Community #{}", id),
            FeedQuery::Search(q) => format!("Search: {}", q),
        }
    }
}

/// A feed fetch the caller should perform, then hand back to [`PostFeed::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub query: FeedQuery,
    pub generation: u64,
}

#[derive(Debug)]
pub struct PostFeed {
    posts: Vec<Post>,
    community_filter: Option<CommunityId>,
    search_input: String,
    active: FeedQuery,
    generation: u64,
    loading: bool,
    selected: usize,
}

impl Default for PostFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PostFeed {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            community_filter: None,
            search_input: String::new(),
            active: FeedQuery::All,
            generation: 0,
            loading: false,
            selected: 0,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn community_filter(&self) -> Option<CommunityId> {
        self.community_filter
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn active_query(&self) -> &FeedQuery {
        &self.active
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.posts.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.posts.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn issue(&mut self, query: FeedQuery) -> FeedRequest {
        self.generation += 1;
        self.active = query.clone();
        self.loading = true;
        FeedRequest {
            query,
            generation: self.generation,
        }
    }

    /// Change the community filter. Returns a request only if the value changed.
    pub fn set_community_filter(&mut self, filter: Option<CommunityId>) -> Option<FeedRequest> {
        if self.community_filter == filter {
            return None;
        }
        self.community_filter = filter;
        Some(self.issue(FeedQuery::for_filter(filter)))
    }

    /// Edit the search box. Never triggers a fetch on its own.
    pub fn set_search_input(&mut self, input: impl Into<String>) {
        self.search_input = input.into();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search_input.push(c);
    }

    pub fn pop_search_char(&mut self) {
        self.search_input.pop();
    }

    /// Explicit search submit (Enter).
    pub fn submit_search(&mut self) -> FeedRequest {
        let q = self.search_input.trim().to_string();
        self.issue(FeedQuery::Search(q))
    }

    /// Reload with the current community filter (initial load, after creating a post).
    pub fn refresh(&mut self) -> FeedRequest {
        self.issue(FeedQuery::for_filter(self.community_filter))
    }

    /// Apply a fetch result. Returns `false` if a newer request superseded it.
    ///
    /// A failed fetch empties the list.
    pub fn apply(&mut self, generation: u64, result: Result<Vec<Post>, ApiError>) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Discarding stale feed result");
            return false;
        }
        self.loading = false;
        self.posts = match result {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!(error = %e, query = ?self.active, "Failed to load posts");
                Vec::new()
            }
        };
        if self.selected >= self.posts.len() {
            self.selected = self.posts.len().saturating_sub(1);
        }
        true
    }
}

/// Perform the fetch for a feed query.
pub async fn fetch(client: &ApiClient, query: &FeedQuery) -> Result<Vec<Post>, ApiError> {
    match query {
        FeedQuery::All => client.list_posts(None).await,
        FeedQuery::Community(id) => client.list_posts(Some(*id)).await,
        FeedQuery::Search(q) => client.search_posts(q).await,
    }
}

/// Build the create-post payload from the compose form.
///
/// Blank community and flag names are omitted.
pub fn new_post(
    title: &str,
    body: &str,
    community: &str,
    flag: &str,
    author_id: Option<UserId>,
) -> NewPost {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    NewPost {
        title: title.to_string(),
        body: body.to_string(),
        author_id,
        community: non_blank(community),
        flag: non_blank(flag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64) -> Post {
        Post {
            id,
            title: format!("post {}", id),
            body: String::new(),
            author: None,
            community: None,
            flag: None,
            created_at: None,
            comment_count: None,
        }
    }

    #[test]
    fn test_filter_change_issues_request_once() {
        let mut feed = PostFeed::new();
        let req = feed.set_community_filter(Some(5)).unwrap();
        assert_eq!(req.query, FeedQuery::Community(5));
        assert!(feed.set_community_filter(Some(5)).is_none());

        let req = feed.set_community_filter(None).unwrap();
        assert_eq!(req.query, FeedQuery::All);
    }

    #[test]
    fn test_search_input_is_explicit_submit() {
        let mut feed = PostFeed::new();
        feed.set_search_input("  borrow ");
        feed.push_search_char('s');
        assert!(!feed.is_loading());

        let req = feed.submit_search();
        assert_eq!(req.query, FeedQuery::Search("borrow s".into()));
        assert!(feed.is_loading());
    }

    #[test]
    fn test_stale_result_ignored() {
        let mut feed = PostFeed::new();
        let old = feed.refresh();
        let new = feed.set_community_filter(Some(2)).unwrap();

        assert!(feed.apply(new.generation, Ok(vec![post(1)])));
        assert!(!feed.apply(old.generation, Ok(vec![post(1), post(2), post(3)])));
        assert_eq!(feed.posts().len(), 1);
    }

    #[test]
    fn test_failed_load_clears_list() {
        let mut feed = PostFeed::new();
        let req = feed.refresh();
        feed.apply(req.generation, Ok(vec![post(1), post(2)]));
        feed.select_next();

        let req = feed.refresh();
        feed.apply(req.generation, Err(ApiError::EmptyResponse));
        assert!(feed.posts().is_empty());
        assert_eq!(feed.selected(), 0);
        assert!(!feed.is_loading());
    }

    #[test]
    fn test_refresh_uses_current_filter() {
        let mut feed = PostFeed::new();
        feed.set_community_filter(Some(9));
        feed.set_search_input("x");
        feed.submit_search();
        assert_eq!(feed.refresh().query, FeedQuery::Community(9));
    }

    #[test]
    fn test_new_post_omits_blank_fields() {
        let p = new_post("Title", "Body", "  ", "Doubt", Some(42));
        assert_eq!(p.author_id, Some(42));
        assert_eq!(p.community, None);
        assert_eq!(p.flag.as_deref(), Some("Doubt"));
    }
}
