use crate::api::{
    ApiClient, ApiError, Comment, CommentId, Community, CommunityPage, Flag, NewPost, Post,
    PostId, SweetPage, UserId,
};
use crate::catalog::Catalog;
use crate::comments::{CommentTree, FetchTicket, VisibleComment};
use crate::communities::{CommunityDirectory, PageRequest, Typeahead};
use crate::config::Config;
use crate::feed::{self, PostFeed};
use std::borrow::Cow;
use tokio::time::Instant;

/// How long a status message stays visible.
const STATUS_TTL_SECS: u64 = 3;

// ============================================================================
// View State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Post list with the communities sidebar.
    Feed,
    /// A single post with its comment tree.
    Detail,
    /// Sweet-shop product grid.
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Posts,
    Communities,
}

/// A small multi-field text form (catalog filter, add sweet).
#[derive(Debug, Clone)]
pub struct Form {
    labels: &'static [&'static str],
    values: Vec<String>,
    focused: usize,
}

impl Form {
    pub fn new(labels: &'static [&'static str]) -> Self {
        Self {
            labels,
            values: vec![String::new(); labels.len()],
            focused: 0,
        }
    }

    pub fn with_values(labels: &'static [&'static str], values: Vec<String>) -> Self {
        let mut form = Self::new(labels);
        for (slot, value) in form.values.iter_mut().zip(values) {
            *slot = value;
        }
        form
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    pub fn value(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(v) = self.values.get_mut(self.focused) {
            v.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(v) = self.values.get_mut(self.focused) {
            v.pop();
        }
    }

    pub fn next_field(&mut self) {
        self.focused = (self.focused + 1) % self.labels.len().max(1);
    }

    pub fn prev_field(&mut self) {
        let n = self.labels.len().max(1);
        self.focused = (self.focused + n - 1) % n;
    }
}

pub const FILTER_FIELDS: &[&str] = &["Category", "Min price", "Max price"];
pub const ADD_SWEET_FIELDS: &[&str] = &["Name", "Category", "Price"];

#[derive(Debug, Clone)]
pub enum CatalogOverlay {
    Filter(Form),
    AddSweet(Form),
}

/// Comment being drafted in the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    /// `None` for a top-level comment.
    pub parent_id: Option<CommentId>,
    pub body: String,
    pub submitting: bool,
}

/// State of the post detail view.
#[derive(Debug)]
pub struct PostDetail {
    pub post_id: PostId,
    pub post: Option<Post>,
    pub post_loading: bool,
    pub tree: CommentTree,
    pub selected: usize,
    pub body_scroll: u16,
    pub draft: Option<ReplyDraft>,
}

impl PostDetail {
    fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            post: None,
            post_loading: true,
            tree: CommentTree::new(post_id),
            selected: 0,
            body_scroll: 0,
            draft: None,
        }
    }

    pub fn rows(&self) -> Vec<VisibleComment<'_>> {
        self.tree.visible_rows()
    }

    pub fn selected_comment(&self) -> Option<&Comment> {
        self.tree
            .visible_rows()
            .get(self.selected)
            .map(|row| row.comment)
    }

    pub fn clamp_selection(&mut self) {
        let count = self.tree.visible_rows().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    Title,
    Body,
    Community,
    Flag,
}

impl ComposeField {
    pub fn next(self) -> Self {
        match self {
            ComposeField::Title => ComposeField::Body,
            ComposeField::Body => ComposeField::Community,
            ComposeField::Community => ComposeField::Flag,
            ComposeField::Flag => ComposeField::Title,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ComposeField::Title => ComposeField::Flag,
            ComposeField::Body => ComposeField::Title,
            ComposeField::Community => ComposeField::Body,
            ComposeField::Flag => ComposeField::Community,
        }
    }
}

/// The create-post modal.
#[derive(Debug)]
pub struct ComposeState {
    pub title: String,
    pub body: String,
    pub community: Typeahead,
    /// Index into `App::flags`, `None` = no flag.
    pub flag: Option<usize>,
    pub field: ComposeField,
    pub submitting: bool,
}

// ============================================================================
// Background Events
// ============================================================================

/// Results delivered by background tasks to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    PostsLoaded {
        generation: u64,
        result: Result<Vec<Post>, ApiError>,
    },
    PostLoaded {
        post_id: PostId,
        result: Result<Post, ApiError>,
    },
    /// Top-level comments or one node's children.
    CommentsLoaded {
        post_id: PostId,
        ticket: FetchTicket,
        result: Result<Vec<Comment>, ApiError>,
    },
    CommentCreated {
        post_id: PostId,
        parent_id: Option<CommentId>,
        result: Result<(), ApiError>,
    },
    CommunityPageLoaded {
        request: PageRequest,
        result: Result<CommunityPage, ApiError>,
    },
    SuggestionsLoaded {
        generation: u64,
        result: Result<Vec<Community>, ApiError>,
    },
    /// Data for the create-post modal.
    ComposeDataLoaded {
        communities: Result<Vec<Community>, ApiError>,
        flags: Result<Vec<Flag>, ApiError>,
    },
    JoinedLoaded(Result<Vec<Community>, ApiError>),
    /// Membership toggled; carries the refreshed joined set.
    MembershipToggled {
        community_id: i64,
        result: Result<Vec<Community>, ApiError>,
    },
    PostCreated(Result<(), ApiError>),
    SweetsLoaded {
        generation: u64,
        result: Result<SweetPage, ApiError>,
    },
    SweetAdded(Result<(), ApiError>),
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub client: ApiClient,
    pub config: Config,

    pub view: View,
    pub focus: Focus,

    pub feed: PostFeed,
    /// Search box in the feed view is capturing keys.
    pub search_mode: bool,

    pub directory: CommunityDirectory,
    /// Rows visible in the sidebar at the last render.
    pub sidebar_visible_rows: usize,

    pub detail: Option<PostDetail>,

    pub compose: Option<ComposeState>,
    /// Communities and flags for the compose modal, fetched on first open.
    pub compose_communities: Vec<Community>,
    pub flags: Vec<Flag>,
    pub compose_data_loading: bool,
    /// In-flight typeahead search, aborted when the modal closes.
    pub suggestion_handle: Option<tokio::task::JoinHandle<()>>,

    pub catalog: Catalog,
    pub catalog_search_mode: bool,
    pub catalog_overlay: Option<CatalogOverlay>,
    /// An add-sweet request is in flight; further submits are ignored.
    pub sweet_submitting: bool,

    /// Blocking alert for failed user actions; any key dismisses it.
    pub alert: Option<String>,
    pub show_help: bool,

    /// Status bar message and when it was set; expires after three seconds.
    pub status_message: Option<(Cow<'static, str>, Instant)>,

    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,
}

impl App {
    pub fn new(client: ApiClient, config: Config) -> Self {
        let directory = CommunityDirectory::new(config.community_page_size, config.scroll_threshold);
        let catalog = Catalog::new(config.catalog_page_size, config.catalog_search_debounce());
        Self {
            client,
            config,
            view: View::Feed,
            focus: Focus::Posts,
            feed: PostFeed::new(),
            search_mode: false,
            directory,
            sidebar_visible_rows: 0,
            detail: None,
            compose: None,
            compose_communities: Vec::new(),
            flags: Vec::new(),
            compose_data_loading: false,
            suggestion_handle: None,
            catalog,
            catalog_search_mode: false,
            catalog_overlay: None,
            sweet_submitting: false,
            alert: None,
            show_help: false,
            status_message: None,
            needs_redraw: true,
        }
    }

    /// Numeric id of the logged-in user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.client.session().and_then(|s| s.author_id())
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear the status message once it is older than three seconds.
    /// Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Show a blocking alert for a failed user action.
    pub fn show_alert(&mut self, context: &str, error: &ApiError) {
        tracing::error!(error = %error, "{}", context);
        let message = error.to_string();
        self.alert = Some(if message.is_empty() {
            context.to_string()
        } else {
            message
        });
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    // ------------------------------------------------------------------
    // Detail view
    // ------------------------------------------------------------------

    /// Switch to the detail view for `post_id`. Returns the top-level
    /// comment ticket; the post itself is fetched alongside.
    pub fn open_post(&mut self, post_id: PostId) -> FetchTicket {
        let mut detail = PostDetail::new(post_id);
        let ticket = detail.tree.begin_load_top_level();
        self.detail = Some(detail);
        self.view = View::Detail;
        tracing::debug!(post_id, "Opening post");
        ticket
    }

    /// Back to the list. Pending responses for the closed post are dropped
    /// when they arrive.
    pub fn close_post(&mut self) {
        self.detail = None;
        self.view = View::Feed;
    }

    /// The detail state if it still shows `post_id`.
    pub fn detail_for(&mut self, post_id: PostId) -> Option<&mut PostDetail> {
        self.detail.as_mut().filter(|d| d.post_id == post_id)
    }

    // ------------------------------------------------------------------
    // Compose modal
    // ------------------------------------------------------------------

    /// Open the create-post modal. Returns true if the communities and
    /// flags still need to be fetched.
    pub fn open_compose(&mut self) -> bool {
        self.compose = Some(ComposeState {
            title: String::new(),
            body: String::new(),
            community: Typeahead::new(self.config.typeahead_debounce()),
            flag: None,
            field: ComposeField::Title,
            submitting: false,
        });
        let needs_data = (self.compose_communities.is_empty() || self.flags.is_empty())
            && !self.compose_data_loading;
        if needs_data {
            self.compose_data_loading = true;
        }
        needs_data
    }

    /// Close the modal, discarding the form and any pending suggestion search.
    pub fn close_compose(&mut self) {
        if let Some(compose) = self.compose.as_mut() {
            compose.community.cancel();
        }
        if let Some(handle) = self.suggestion_handle.take() {
            handle.abort();
        }
        self.compose = None;
    }

    /// Build the create-post payload from the modal.
    pub fn compose_payload(&self) -> Option<NewPost> {
        let compose = self.compose.as_ref()?;
        let flag = compose
            .flag
            .and_then(|i| self.flags.get(i))
            .map(|f| f.name.as_str())
            .unwrap_or("");
        Some(feed::new_post(
            &compose.title,
            &compose.body,
            compose.community.input(),
            flag,
            self.user_id(),
        ))
    }

    /// Cycle the flag choice: none, then each flag in order.
    pub fn cycle_compose_flag(&mut self, forward: bool) {
        let count = self.flags.len();
        let Some(compose) = self.compose.as_mut() else {
            return;
        };
        if count == 0 {
            compose.flag = None;
            return;
        }
        compose.flag = match (compose.flag, forward) {
            (None, true) => Some(0),
            (None, false) => Some(count - 1),
            (Some(i), true) if i + 1 < count => Some(i + 1),
            (Some(i), false) if i > 0 => Some(i - 1),
            _ => None,
        };
    }

    /// Whether the typed community name matches a known community.
    pub fn compose_community_known(&self) -> bool {
        let Some(compose) = self.compose.as_ref() else {
            return false;
        };
        let name = compose.community.input().trim();
        !name.is_empty()
            && self
                .compose_communities
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(name))
    }

    // ------------------------------------------------------------------
    // Sidebar
    // ------------------------------------------------------------------

    /// Whether the sidebar selection is close enough to the end to fetch
    /// the next page.
    pub fn sidebar_needs_more(&self) -> bool {
        let viewport = self.sidebar_visible_rows.max(1);
        let offset = (self.directory.selected() + 1).saturating_sub(viewport);
        self.directory
            .should_load_more(offset, viewport, self.directory.communities().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::time::Duration;
    use tokio::time;

    fn test_app() -> App {
        let client = ApiClient::new("http://localhost:8080/api", Duration::from_secs(5)).unwrap();
        App::new(client, Config::default())
    }

    #[tokio::test]
    async fn test_status_expires_after_3_seconds() {
        let mut app = test_app();
        time::pause();
        app.set_status("Saved");

        time::advance(Duration::from_secs(2)).await;
        assert!(!app.clear_expired_status());
        assert!(app.status_message.is_some());

        time::advance(Duration::from_secs(1)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_open_and_close_post() {
        let mut app = test_app();
        let ticket = app.open_post(7);
        assert_eq!(app.view, View::Detail);
        assert!(app.detail_for(7).is_some());
        assert!(app.detail_for(8).is_none());
        assert_eq!(ticket.target(), crate::comments::FetchTarget::TopLevel);

        app.close_post();
        assert_eq!(app.view, View::Feed);
        assert!(app.detail.is_none());
    }

    #[tokio::test]
    async fn test_compose_data_fetched_once() {
        let mut app = test_app();
        assert!(app.open_compose());
        app.close_compose();
        // Still loading: a second open must not issue another fetch.
        assert!(!app.open_compose());

        app.compose_data_loading = false;
        app.compose_communities = vec![Community { id: 1, name: "Rust".into() }];
        app.flags = vec![Flag { id: Some(1), name: "Doubt".into() }];
        app.close_compose();
        assert!(!app.open_compose());
    }

    #[tokio::test]
    async fn test_close_compose_resets_form() {
        let mut app = test_app();
        app.open_compose();
        if let Some(c) = app.compose.as_mut() {
            c.title.push_str("draft");
            c.community.on_input("ru");
        }
        app.close_compose();
        assert!(app.compose.is_none());

        app.open_compose();
        let compose = app.compose.as_ref().unwrap();
        assert!(compose.title.is_empty());
        assert!(!compose.community.is_pending());
    }

    #[tokio::test]
    async fn test_compose_payload_uses_session_user() {
        let payload = "eyJzdWIiOiI0MiJ9"; // {"sub":"42"}
        let token = format!("a.{}.c", payload);
        let client = ApiClient::new("http://localhost:8080/api", Duration::from_secs(5))
            .unwrap()
            .with_session(Some(Session::from_token(token, Some("USER".into()))));
        let mut app = App::new(client, Config::default());
        app.flags = vec![Flag { id: None, name: "Meme".into() }];

        app.open_compose();
        if let Some(c) = app.compose.as_mut() {
            c.title.push_str("Hello");
            c.body.push_str("World");
        }
        app.cycle_compose_flag(true);

        let post = app.compose_payload().unwrap();
        assert_eq!(post.author_id, Some(42));
        assert_eq!(post.flag.as_deref(), Some("Meme"));
        assert_eq!(post.community, None);
    }

    #[tokio::test]
    async fn test_flag_cycle_wraps_through_none() {
        let mut app = test_app();
        app.flags = vec![
            Flag { id: None, name: "Error".into() },
            Flag { id: None, name: "Doubt".into() },
        ];
        app.open_compose();
        let flag = |app: &App| app.compose.as_ref().and_then(|c| c.flag);

        app.cycle_compose_flag(true);
        assert_eq!(flag(&app), Some(0));
        app.cycle_compose_flag(true);
        assert_eq!(flag(&app), Some(1));
        app.cycle_compose_flag(true);
        assert_eq!(flag(&app), None);
        app.cycle_compose_flag(false);
        assert_eq!(flag(&app), Some(1));
    }

    #[test]
    fn test_form_fields_wrap() {
        let mut form = Form::new(FILTER_FIELDS);
        form.push_char('a');
        form.prev_field();
        assert_eq!(form.focused(), 2);
        form.next_field();
        assert_eq!(form.focused(), 0);
        form.pop_char();
        assert_eq!(form.value(0), "");
        assert_eq!(form.value(9), "");
    }
}
