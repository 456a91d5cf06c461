//! Background task spawning.
//!
//! Every network call runs in its own tokio task and reports back through
//! the `AppEvent` channel. Tasks are wrapped in a panic catcher so a bug in
//! one request shows up in the status bar instead of vanishing.

use crate::api::{ApiClient, CommentId, NewComment, NewPost, NewSweet, PostId, UserId};
use crate::app::AppEvent;
use crate::catalog::CatalogRequest;
use crate::comments::{FetchTarget, FetchTicket};
use crate::communities::{self, PageRequest, SuggestionRequest};
use crate::feed::{self, FeedRequest};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Wraps a future to catch panics and convert them to errors.
///
/// - `Ok(result)` if the future completes normally
/// - `Err(panic_message)` if the future panics
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Run `future` in the background and forward its event to the loop.
pub(super) fn spawn_task<F>(
    task: &'static str,
    tx: &mpsc::Sender<AppEvent>,
    future: F,
) -> JoinHandle<()>
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match catch_task_panic(future).await {
            Ok(event) => event,
            Err(error) => {
                tracing::error!(task, error = %error, "Background task panicked");
                AppEvent::TaskPanicked { task, error }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(task, error = %e, "Failed to send task result (receiver dropped)");
        }
    })
}

pub(super) fn spawn_feed_load(client: &ApiClient, request: FeedRequest, tx: &mpsc::Sender<AppEvent>) {
    let client = client.clone();
    tracing::debug!(query = ?request.query, generation = request.generation, "Loading posts");
    spawn_task("feed", tx, async move {
        let result = feed::fetch(&client, &request.query).await;
        AppEvent::PostsLoaded {
            generation: request.generation,
            result,
        }
    });
}

/// Fetch a post and its top-level comments concurrently.
pub(super) fn spawn_post_open(
    client: &ApiClient,
    post_id: PostId,
    ticket: FetchTicket,
    tx: &mpsc::Sender<AppEvent>,
) {
    let post_client = client.clone();
    spawn_task("post", tx, async move {
        let result = post_client.get_post(post_id).await;
        AppEvent::PostLoaded { post_id, result }
    });
    spawn_comments_fetch(client, post_id, ticket, tx);
}

/// Fetch whatever `ticket` targets: top-level comments or one node's children.
pub(super) fn spawn_comments_fetch(
    client: &ApiClient,
    post_id: PostId,
    ticket: FetchTicket,
    tx: &mpsc::Sender<AppEvent>,
) {
    let client = client.clone();
    spawn_task("comments", tx, async move {
        let result = match ticket.target() {
            FetchTarget::TopLevel => client.post_comments(post_id).await,
            FetchTarget::Children(id) => client.comment_children(id).await,
        };
        AppEvent::CommentsLoaded {
            post_id,
            ticket,
            result,
        }
    });
}

pub(super) fn spawn_comment_create(
    client: &ApiClient,
    post_id: PostId,
    parent_id: Option<CommentId>,
    author_id: Option<UserId>,
    body: String,
    tx: &mpsc::Sender<AppEvent>,
) {
    let client = client.clone();
    let comment = NewComment {
        post_id,
        author_id,
        body,
        parent_id,
    };
    spawn_task("create_comment", tx, async move {
        let result = client.create_comment(&comment).await;
        AppEvent::CommentCreated {
            post_id,
            parent_id,
            result,
        }
    });
}

pub(super) fn spawn_community_page(
    client: &ApiClient,
    request: PageRequest,
    tx: &mpsc::Sender<AppEvent>,
) {
    let client = client.clone();
    spawn_task("community_page", tx, async move {
        let result = client.communities_page(request.page, request.size).await;
        AppEvent::CommunityPageLoaded { request, result }
    });
}

pub(super) fn spawn_suggestions(
    client: &ApiClient,
    request: SuggestionRequest,
    tx: &mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    let client = client.clone();
    spawn_task("community_search", tx, async move {
        let result = client.search_communities(&request.query).await;
        AppEvent::SuggestionsLoaded {
            generation: request.generation,
            result,
        }
    })
}

pub(super) fn spawn_compose_data(client: &ApiClient, tx: &mpsc::Sender<AppEvent>) {
    let client = client.clone();
    spawn_task("compose_data", tx, async move {
        let (communities, flags) = tokio::join!(client.communities(), client.flags());
        AppEvent::ComposeDataLoaded { communities, flags }
    });
}

pub(super) fn spawn_joined_load(client: &ApiClient, user_id: UserId, tx: &mpsc::Sender<AppEvent>) {
    let client = client.clone();
    spawn_task("joined", tx, async move {
        AppEvent::JoinedLoaded(client.joined_communities(user_id).await)
    });
}

pub(super) fn spawn_membership_toggle(
    client: &ApiClient,
    community_id: i64,
    user_id: Option<UserId>,
    tx: &mpsc::Sender<AppEvent>,
) {
    let client = client.clone();
    spawn_task("membership", tx, async move {
        let result = communities::toggle_membership(&client, community_id, user_id).await;
        AppEvent::MembershipToggled {
            community_id,
            result,
        }
    });
}

pub(super) fn spawn_post_create(client: &ApiClient, post: NewPost, tx: &mpsc::Sender<AppEvent>) {
    let client = client.clone();
    spawn_task("create_post", tx, async move {
        AppEvent::PostCreated(client.create_post(&post).await.map(|_| ()))
    });
}

pub(super) fn spawn_sweets_load(
    client: &ApiClient,
    request: CatalogRequest,
    tx: &mpsc::Sender<AppEvent>,
) {
    let client = client.clone();
    spawn_task("sweets", tx, async move {
        let result = client.sweets(&request.query).await;
        AppEvent::SweetsLoaded {
            generation: request.generation,
            result,
        }
    });
}

pub(super) fn spawn_sweet_add(client: &ApiClient, sweet: NewSweet, tx: &mpsc::Sender<AppEvent>) {
    let client = client.clone();
    spawn_task("add_sweet", tx, async move {
        AppEvent::SweetAdded(client.add_sweet(&sweet).await.map(|_| ()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        let result = catch_task_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_catch_task_panic_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err("boom".to_string()));

        let result: Result<(), String> =
            catch_task_panic(async { panic!("code {}", 7) }).await;
        assert_eq!(result, Err("code 7".to_string()));
    }

    fn should_explode() -> bool {
        true
    }

    #[tokio::test]
    async fn test_spawn_task_reports_panic_as_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_task("explode", &tx, async {
            if should_explode() {
                panic!("kaboom");
            }
            AppEvent::JoinedLoaded(Ok(Vec::new()))
        });
        handle.await.unwrap();

        match rx.recv().await {
            Some(AppEvent::TaskPanicked { task, error }) => {
                assert_eq!(task, "explode");
                assert_eq!(error, "kaboom");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
