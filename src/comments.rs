//! Lazily expanded comment tree for a single post.
//!
//! Comments live in a flat arena keyed by id. Each node holds the ordered ids
//! of its direct children once they have been fetched; `None` means the
//! children were never requested. Whether a node is *expanded* is tracked
//! separately, so collapsing keeps the fetched children and re-expanding is a
//! pure in-memory operation.
//!
//! Fetches go through an in-flight registry keyed by [`FetchTarget`]. Starting
//! a fetch hands out a [`FetchTicket`]; a result is applied only if its ticket
//! is still the registered one, so a superseded or duplicate response is
//! dropped instead of overwriting newer state.
//!
//! The event loop uses the split-phase API (`begin_*` then [`complete`]); the
//! async drivers ([`load_top_level`], [`toggle_expand`], [`add_comment`]) run
//! both phases against a [`CommentSource`].
//!
//! [`complete`]: CommentTree::complete
//! [`load_top_level`]: CommentTree::load_top_level
//! [`toggle_expand`]: CommentTree::toggle_expand
//! [`add_comment`]: CommentTree::add_comment

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::api::{ApiClient, ApiError, Comment, CommentId, NewComment, PostId, UserId};

/// What a fetch loads: the post's top-level comments or one node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchTarget {
    TopLevel,
    Children(CommentId),
}

/// Proof that a fetch was started. Only the latest ticket per target applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    target: FetchTarget,
    id: u64,
}

impl FetchTicket {
    pub fn target(&self) -> FetchTarget {
        self.target
    }
}

/// Display state of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No replies reported and none fetched: no expand control.
    Leaf,
    CollapsedUnfetched,
    CollapsedFetched,
    Expanded,
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Node was expanded and is now collapsed. Children stay cached.
    Collapsed,
    /// Children were already cached; expanded without a fetch.
    ExpandedFromCache,
    /// Children must be fetched; pass the result to [`CommentTree::complete`].
    FetchRequired(FetchTicket),
    /// A fetch for this node is already in flight.
    AlreadyLoading,
    NoReplies,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket was superseded or its node is gone; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
struct CommentNode {
    comment: Comment,
    children: Option<Vec<CommentId>>,
}

/// One rendered row of the tree.
#[derive(Debug, Clone, Copy)]
pub struct VisibleComment<'a> {
    pub comment: &'a Comment,
    pub depth: usize,
    pub state: NodeState,
}

#[derive(Debug)]
pub struct CommentTree {
    post_id: PostId,
    nodes: HashMap<CommentId, CommentNode>,
    roots: Vec<CommentId>,
    expanded: HashSet<CommentId>,
    in_flight: HashMap<FetchTarget, u64>,
    next_ticket: u64,
}

impl CommentTree {
    pub fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            nodes: HashMap::new(),
            roots: Vec::new(),
            expanded: HashSet::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[CommentId] {
        &self.roots
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.nodes.get(&id).map(|n| &n.comment)
    }

    /// Cached children of a node, `None` if never fetched (or unknown id).
    pub fn children(&self, id: CommentId) -> Option<&[CommentId]> {
        self.nodes.get(&id).and_then(|n| n.children.as_deref())
    }

    pub fn is_expanded(&self, id: CommentId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn is_loading(&self, target: FetchTarget) -> bool {
        self.in_flight.contains_key(&target)
    }

    pub fn state(&self, id: CommentId) -> Option<NodeState> {
        let node = self.nodes.get(&id)?;
        let state = if self.in_flight.contains_key(&FetchTarget::Children(id)) {
            NodeState::Loading
        } else if self.expanded.contains(&id) {
            NodeState::Expanded
        } else {
            match &node.children {
                Some(_) => NodeState::CollapsedFetched,
                None if node.comment.reply_count > 0 => NodeState::CollapsedUnfetched,
                None => NodeState::Leaf,
            }
        };
        Some(state)
    }

    fn register(&mut self, target: FetchTarget) -> FetchTicket {
        self.next_ticket += 1;
        self.in_flight.insert(target, self.next_ticket);
        FetchTicket {
            target,
            id: self.next_ticket,
        }
    }

    // ------------------------------------------------------------------
    // Split-phase operations
    // ------------------------------------------------------------------

    /// Start (or restart) loading the top-level comments.
    pub fn begin_load_top_level(&mut self) -> FetchTicket {
        self.register(FetchTarget::TopLevel)
    }

    /// Toggle a node. Collapsing and cached re-expansion complete immediately.
    pub fn begin_expand(&mut self, id: CommentId) -> ToggleOutcome {
        let Some(node) = self.nodes.get(&id) else {
            return ToggleOutcome::NotFound;
        };
        let fetched = node.children.is_some();
        let reply_count = node.comment.reply_count;

        if self.in_flight.contains_key(&FetchTarget::Children(id)) {
            return ToggleOutcome::AlreadyLoading;
        }
        if self.expanded.remove(&id) {
            return ToggleOutcome::Collapsed;
        }
        if fetched {
            self.expanded.insert(id);
            ToggleOutcome::ExpandedFromCache
        } else if reply_count == 0 {
            ToggleOutcome::NoReplies
        } else {
            ToggleOutcome::FetchRequired(self.register(FetchTarget::Children(id)))
        }
    }

    /// Start re-fetching after a new comment was created under `parent`
    /// (`None` = top level). Supersedes any fetch already in flight for it.
    pub fn begin_reply_refresh(&mut self, parent: Option<CommentId>) -> FetchTicket {
        match parent {
            None => self.register(FetchTarget::TopLevel),
            Some(id) => self.register(FetchTarget::Children(id)),
        }
    }

    /// Apply the result of a fetch started with a `begin_*` call.
    ///
    /// A failure releases the in-flight slot and leaves the tree untouched;
    /// the error is returned so the caller can surface it. Results for a
    /// superseded ticket are dropped, errors included.
    pub fn complete<E>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Comment>, E>,
    ) -> Result<Completion, E> {
        if self.in_flight.get(&ticket.target) != Some(&ticket.id) {
            tracing::debug!(fetch = ?ticket.target, "Dropping superseded comment fetch");
            return Ok(Completion::Stale);
        }
        self.in_flight.remove(&ticket.target);
        let comments = result?;

        match ticket.target {
            FetchTarget::TopLevel => {
                self.replace_top_level(comments);
                Ok(Completion::Applied)
            }
            FetchTarget::Children(id) => {
                if self.replace_children(id, comments) {
                    self.expanded.insert(id);
                    Ok(Completion::Applied)
                } else {
                    Ok(Completion::Stale)
                }
            }
        }
    }

    fn replace_top_level(&mut self, comments: Vec<Comment>) {
        self.nodes.clear();
        self.roots.clear();
        self.expanded.clear();
        // Every pending child fetch refers to the old tree.
        self.in_flight.retain(|target, _| *target == FetchTarget::TopLevel);

        for comment in comments {
            if self.nodes.contains_key(&comment.id) {
                continue;
            }
            self.roots.push(comment.id);
            self.nodes.insert(
                comment.id,
                CommentNode {
                    comment,
                    children: None,
                },
            );
        }
        tracing::debug!(post_id = self.post_id, count = self.roots.len(), "Top-level comments loaded");
    }

    /// Replace the children of `id` with exactly `comments`, in order.
    ///
    /// Children that persist keep their cached subtree and expansion state;
    /// children missing from `comments` are dropped along with their
    /// descendants. Nothing outside the node's subtree changes. Returns
    /// `false` if `id` is not in the tree.
    pub fn replace_children(&mut self, id: CommentId, comments: Vec<Comment>) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }

        let mut new_ids = Vec::with_capacity(comments.len());
        let mut seen = HashSet::new();
        for comment in comments {
            let child_id = comment.id;
            // A node cannot be its own child, and an id already placed
            // elsewhere in the tree (e.g. a root) is not re-parented.
            if child_id == id || !seen.insert(child_id) {
                continue;
            }
            let owned_here = self
                .nodes
                .get(&id)
                .and_then(|n| n.children.as_ref())
                .is_some_and(|c| c.contains(&child_id));
            if self.nodes.contains_key(&child_id) && !owned_here {
                tracing::warn!(parent = id, child = child_id, "Ignoring child already placed elsewhere");
                continue;
            }
            match self.nodes.get_mut(&child_id) {
                Some(existing) => existing.comment = comment,
                None => {
                    self.nodes.insert(
                        child_id,
                        CommentNode {
                            comment,
                            children: None,
                        },
                    );
                }
            }
            new_ids.push(child_id);
        }

        let old = match self.nodes.get_mut(&id) {
            Some(node) => node.children.replace(new_ids.clone()),
            None => None,
        };
        for removed in old.unwrap_or_default() {
            if !seen.contains(&removed) {
                self.prune(removed);
            }
        }
        true
    }

    fn prune(&mut self, id: CommentId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.expanded.remove(&current);
            self.in_flight.remove(&FetchTarget::Children(current));
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.unwrap_or_default());
            }
        }
    }

    /// Rows to render: roots in server order, descending into expanded nodes.
    pub fn visible_rows(&self) -> Vec<VisibleComment<'_>> {
        let mut rows = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(CommentId, usize)> =
            self.roots.iter().rev().map(|&id| (id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let (Some(node), Some(state)) = (self.nodes.get(&id), self.state(id)) else {
                continue;
            };
            rows.push(VisibleComment {
                comment: &node.comment,
                depth,
                state,
            });
            if self.expanded.contains(&id) {
                if let Some(children) = &node.children {
                    stack.extend(children.iter().rev().map(|&c| (c, depth + 1)));
                }
            }
        }
        rows
    }

    // ------------------------------------------------------------------
    // Async drivers
    // ------------------------------------------------------------------

    pub async fn load_top_level<S>(&mut self, source: &S) -> Result<Completion, ApiError>
    where
        S: CommentSource + ?Sized,
    {
        let ticket = self.begin_load_top_level();
        let result = source.top_level_comments(self.post_id).await;
        self.complete(ticket, result)
    }

    pub async fn toggle_expand<S>(
        &mut self,
        source: &S,
        id: CommentId,
    ) -> Result<ToggleOutcome, ApiError>
    where
        S: CommentSource + ?Sized,
    {
        let outcome = self.begin_expand(id);
        if let ToggleOutcome::FetchRequired(ticket) = outcome {
            let result = source.comment_children(id).await;
            self.complete(ticket, result)?;
        }
        Ok(outcome)
    }

    /// Create a comment, then re-fetch the level it was added to.
    pub async fn add_comment<S>(
        &mut self,
        source: &S,
        author_id: Option<UserId>,
        body: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Completion, ApiError>
    where
        S: CommentSource + ?Sized,
    {
        let comment = NewComment {
            post_id: self.post_id,
            author_id,
            body: body.to_string(),
            parent_id,
        };
        source.create_comment(&comment).await?;

        let ticket = self.begin_reply_refresh(parent_id);
        let result = match parent_id {
            None => source.top_level_comments(self.post_id).await,
            Some(id) => source.comment_children(id).await,
        };
        self.complete(ticket, result)
    }
}

/// Where comment data comes from.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn top_level_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError>;
    async fn comment_children(&self, comment_id: CommentId) -> Result<Vec<Comment>, ApiError>;
    async fn create_comment(&self, comment: &NewComment) -> Result<(), ApiError>;
}

#[async_trait]
impl CommentSource for ApiClient {
    async fn top_level_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.post_comments(post_id).await
    }

    async fn comment_children(&self, comment_id: CommentId) -> Result<Vec<Comment>, ApiError> {
        ApiClient::comment_children(self, comment_id).await
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<(), ApiError> {
        ApiClient::create_comment(self, comment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn comment(id: CommentId, parent: Option<CommentId>, replies: u32) -> Comment {
        Comment {
            id,
            body: format!("comment {}", id),
            author: None,
            created_at: None,
            parent_id: parent,
            reply_count: replies,
        }
    }

    fn rows(tree: &CommentTree) -> Vec<(CommentId, usize)> {
        tree.visible_rows()
            .iter()
            .map(|r| (r.comment.id, r.depth))
            .collect()
    }

    fn loaded_tree() -> CommentTree {
        let mut tree = CommentTree::new(1);
        let ticket = tree.begin_load_top_level();
        let roots = vec![comment(10, None, 2), comment(20, None, 0), comment(30, None, 1)];
        tree.complete::<()>(ticket, Ok(roots)).unwrap();
        tree
    }

    #[test]
    fn test_initial_states() {
        let tree = loaded_tree();
        assert_eq!(tree.state(10), Some(NodeState::CollapsedUnfetched));
        assert_eq!(tree.state(20), Some(NodeState::Leaf));
        assert_eq!(tree.state(99), None);
        assert_eq!(rows(&tree), vec![(10, 0), (20, 0), (30, 0)]);
    }

    #[test]
    fn test_expand_fetch_collapse_cycle() {
        let mut tree = loaded_tree();

        let ToggleOutcome::FetchRequired(ticket) = tree.begin_expand(10) else {
            panic!("expected fetch");
        };
        assert_eq!(tree.state(10), Some(NodeState::Loading));
        assert_eq!(tree.begin_expand(10), ToggleOutcome::AlreadyLoading);

        let children = vec![comment(11, Some(10), 0), comment(12, Some(10), 0)];
        assert_eq!(tree.complete::<()>(ticket, Ok(children)), Ok(Completion::Applied));
        assert_eq!(tree.state(10), Some(NodeState::Expanded));
        assert_eq!(rows(&tree), vec![(10, 0), (11, 1), (12, 1), (20, 0), (30, 0)]);

        assert_eq!(tree.begin_expand(10), ToggleOutcome::Collapsed);
        assert_eq!(tree.state(10), Some(NodeState::CollapsedFetched));
        assert_eq!(tree.children(10), Some(&[11, 12][..]));

        assert_eq!(tree.begin_expand(10), ToggleOutcome::ExpandedFromCache);
        assert_eq!(rows(&tree).len(), 5);
    }

    #[test]
    fn test_leaf_toggle_is_noop() {
        let mut tree = loaded_tree();
        assert_eq!(tree.begin_expand(20), ToggleOutcome::NoReplies);
        assert_eq!(tree.begin_expand(404), ToggleOutcome::NotFound);
        assert!(!tree.is_loading(FetchTarget::Children(20)));
    }

    #[test]
    fn test_failed_expand_keeps_state() {
        let mut tree = loaded_tree();
        let ToggleOutcome::FetchRequired(ticket) = tree.begin_expand(30) else {
            panic!("expected fetch");
        };
        let result = tree.complete(ticket, Err("boom"));
        assert_eq!(result, Err("boom"));
        assert_eq!(tree.state(30), Some(NodeState::CollapsedUnfetched));
        assert!(!tree.is_loading(FetchTarget::Children(30)));
    }

    #[test]
    fn test_superseded_ticket_is_stale() {
        let mut tree = loaded_tree();
        let ToggleOutcome::FetchRequired(first) = tree.begin_expand(10) else {
            panic!("expected fetch");
        };
        let second = tree.begin_reply_refresh(Some(10));

        let late = vec![comment(11, Some(10), 0)];
        assert_eq!(tree.complete::<()>(first, Ok(late)), Ok(Completion::Stale));
        assert_eq!(tree.children(10), None);

        let fresh = vec![comment(11, Some(10), 0), comment(13, Some(10), 0)];
        assert_eq!(tree.complete::<()>(second, Ok(fresh)), Ok(Completion::Applied));
        assert_eq!(tree.children(10), Some(&[11, 13][..]));
    }

    #[test]
    fn test_top_level_reload_clears_expansion_and_pending_children() {
        let mut tree = loaded_tree();
        let ToggleOutcome::FetchRequired(pending) = tree.begin_expand(10) else {
            panic!("expected fetch");
        };

        let reload = tree.begin_load_top_level();
        tree.complete::<()>(reload, Ok(vec![comment(10, None, 2), comment(40, None, 0)]))
            .unwrap();
        assert_eq!(tree.roots(), &[10, 40]);

        assert_eq!(
            tree.complete::<()>(pending, Ok(vec![comment(11, Some(10), 0)])),
            Ok(Completion::Stale)
        );
        assert_eq!(tree.state(10), Some(NodeState::CollapsedUnfetched));
    }

    #[test]
    fn test_replace_children_keeps_persisting_subtrees() {
        let mut tree = loaded_tree();
        tree.replace_children(10, vec![comment(11, Some(10), 1), comment(12, Some(10), 1)]);
        tree.replace_children(11, vec![comment(111, Some(11), 0)]);
        tree.replace_children(12, vec![comment(121, Some(12), 0)]);
        tree.begin_expand(11);

        // 12 disappears, 13 is new, 11 keeps its subtree and expansion.
        assert!(tree.replace_children(10, vec![comment(11, Some(10), 1), comment(13, Some(10), 0)]));
        assert_eq!(tree.children(11), Some(&[111][..]));
        assert!(tree.is_expanded(11));
        assert!(tree.get(12).is_none());
        assert!(tree.get(121).is_none());
        assert!(tree.get(13).is_some());
    }

    #[test]
    fn test_replace_children_unknown_id_is_noop() {
        let mut tree = loaded_tree();
        let before = rows(&tree);
        assert!(!tree.replace_children(999, vec![comment(1000, Some(999), 0)]));
        assert_eq!(rows(&tree), before);
        assert!(tree.get(1000).is_none());
    }

    #[test]
    fn test_replace_children_rejects_cycles() {
        let mut tree = loaded_tree();
        tree.replace_children(10, vec![comment(10, Some(10), 0), comment(20, Some(10), 0)]);
        assert_eq!(tree.children(10), Some(&[][..]));
        assert_eq!(tree.roots(), &[10, 20, 30]);
    }

    #[test]
    fn test_reply_refresh_marks_parent_expanded() {
        let mut tree = loaded_tree();
        let ticket = tree.begin_reply_refresh(Some(20));
        tree.complete::<()>(ticket, Ok(vec![comment(21, Some(20), 0)]))
            .unwrap();
        assert_eq!(tree.state(20), Some(NodeState::Expanded));
        assert_eq!(rows(&tree), vec![(10, 0), (20, 0), (21, 1), (30, 0)]);
    }
}
