//! Application event handling.
//!
//! Applies background task results to the application state. Failures of
//! user-initiated writes raise a blocking alert; failures of background reads
//! are logged and leave the view empty or unchanged.

use crate::app::{App, AppEvent};
use crate::comments::{Completion, FetchTarget};
use tokio::sync::mpsc;

use super::helpers::{spawn_comments_fetch, spawn_feed_load, spawn_sweets_load};

pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::PostsLoaded { generation, result } => {
            app.feed.apply(generation, result);
        }
        AppEvent::PostLoaded { post_id, result } => {
            let Some(detail) = app.detail_for(post_id) else {
                return;
            };
            detail.post_loading = false;
            match result {
                Ok(post) => detail.post = Some(post),
                Err(e) => {
                    tracing::error!(post_id, error = %e, "Failed to load post");
                    app.set_status(format!("Could not load post: {}", e));
                }
            }
        }
        AppEvent::CommentsLoaded {
            post_id,
            ticket,
            result,
        } => {
            let Some(detail) = app.detail_for(post_id) else {
                tracing::debug!(post_id, "Comments arrived for a closed post");
                return;
            };
            match detail.tree.complete(ticket, result) {
                Ok(Completion::Applied) => detail.clamp_selection(),
                Ok(Completion::Stale) => {}
                Err(e) => match ticket.target() {
                    FetchTarget::TopLevel => {
                        tracing::error!(post_id, error = %e, "Failed to load comments");
                    }
                    FetchTarget::Children(id) => {
                        tracing::warn!(comment_id = id, error = %e, "Failed to load replies");
                        app.set_status(format!("Could not load replies: {}", e));
                    }
                },
            }
        }
        AppEvent::CommentCreated {
            post_id,
            parent_id,
            result,
        } => match result {
            Ok(()) => {
                let Some(detail) = app.detail_for(post_id) else {
                    return;
                };
                detail.draft = None;
                let ticket = detail.tree.begin_reply_refresh(parent_id);
                spawn_comments_fetch(&app.client, post_id, ticket, event_tx);
                app.set_status("Comment posted");
            }
            Err(e) => {
                if let Some(draft) = app.detail_for(post_id).and_then(|d| d.draft.as_mut()) {
                    draft.submitting = false;
                }
                app.show_alert("Failed to post comment", &e);
            }
        },
        AppEvent::CommunityPageLoaded { request, result } => {
            app.directory.complete_page(request, result);
        }
        AppEvent::SuggestionsLoaded { generation, result } => {
            app.suggestion_handle = None;
            if let Some(compose) = app.compose.as_mut() {
                compose.community.complete(generation, result);
            }
        }
        AppEvent::ComposeDataLoaded { communities, flags } => {
            app.compose_data_loading = false;
            app.compose_communities = communities.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to load communities for compose");
                Vec::new()
            });
            app.flags = flags.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to load flags");
                Vec::new()
            });
        }
        AppEvent::JoinedLoaded(result) => match result {
            Ok(joined) => app.directory.set_joined(&joined),
            Err(e) => tracing::warn!(error = %e, "Failed to load joined communities"),
        },
        AppEvent::MembershipToggled {
            community_id,
            result,
        } => match result {
            Ok(joined) => {
                app.directory.set_joined(&joined);
                let msg = if app.directory.is_joined(community_id) {
                    "Joined community"
                } else {
                    "Left community"
                };
                app.set_status(msg);
            }
            Err(e) => app.show_alert("Failed to update membership", &e),
        },
        AppEvent::PostCreated(result) => {
            if let Some(compose) = app.compose.as_mut() {
                compose.submitting = false;
            }
            match result {
                Ok(()) => {
                    let request = app.feed.refresh();
                    spawn_feed_load(&app.client, request, event_tx);
                    app.close_compose();
                    app.set_status("Post created");
                }
                Err(e) => app.show_alert("Failed to create post", &e),
            }
        }
        AppEvent::SweetsLoaded { generation, result } => {
            app.catalog.complete(generation, result);
        }
        AppEvent::SweetAdded(result) => {
            app.sweet_submitting = false;
            match result {
                Ok(()) => {
                    app.catalog_overlay = None;
                    let request = app.catalog.after_add();
                    spawn_sweets_load(&app.client, request, event_tx);
                    app.set_status("Sweet added");
                }
                Err(e) => app.show_alert("Failed to add sweet", &e),
            }
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, ApiError, Comment};
    use crate::comments::{NodeState, ToggleOutcome};
    use crate::config::Config;
    use std::time::Duration;

    fn test_app() -> App {
        let client = ApiClient::new("http://localhost:8080/api", Duration::from_secs(5)).unwrap();
        App::new(client, Config::default())
    }

    fn comment(id: i64, replies: u32) -> Comment {
        Comment {
            id,
            body: String::new(),
            author: None,
            created_at: None,
            parent_id: None,
            reply_count: replies,
        }
    }

    #[tokio::test]
    async fn test_expand_failure_sets_status_and_keeps_tree() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        let ticket = app.open_post(1);
        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Ok(vec![comment(10, 3)]),
            },
            &tx,
        );

        let detail = app.detail.as_mut().unwrap();
        let ToggleOutcome::FetchRequired(ticket) = detail.tree.begin_expand(10) else {
            panic!("expected fetch");
        };
        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Err(ApiError::Timeout(5)),
            },
            &tx,
        );

        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.tree.state(10), Some(NodeState::CollapsedUnfetched));
        assert!(app.status_message.is_some());
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn test_comments_for_closed_post_ignored() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        let ticket = app.open_post(1);
        app.close_post();
        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Ok(vec![comment(10, 0)]),
            },
            &tx,
        );
        assert!(app.detail.is_none());
    }

    /// Open post 1 with root 10 expanded to children 11 and 12.
    fn app_with_expanded_root(tx: &mpsc::Sender<AppEvent>) -> App {
        let mut app = test_app();
        let ticket = app.open_post(1);
        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Ok(vec![comment(10, 2), comment(20, 0)]),
            },
            tx,
        );
        let detail = app.detail.as_mut().unwrap();
        let ToggleOutcome::FetchRequired(ticket) = detail.tree.begin_expand(10) else {
            panic!("expected fetch");
        };
        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Ok(vec![comment(11, 0), comment(12, 0)]),
            },
            tx,
        );
        app
    }

    #[tokio::test]
    async fn test_failed_reply_refresh_keeps_children_and_selection() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = app_with_expanded_root(&tx);
        let detail = app.detail.as_mut().unwrap();
        detail.selected = 2;
        let ticket = detail.tree.begin_reply_refresh(Some(10));

        handle_app_event(
            &mut app,
            AppEvent::CommentsLoaded {
                post_id: 1,
                ticket,
                result: Err(ApiError::Timeout(5)),
            },
            &tx,
        );

        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.tree.children(10), Some(&[11, 12][..]));
        assert_eq!(detail.tree.state(10), Some(NodeState::Expanded));
        assert_eq!(detail.selected, 2);
        assert_eq!(detail.selected_comment().map(|c| c.id), Some(12));
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn test_failed_comment_create_keeps_draft() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut app = app_with_expanded_root(&tx);
        app.detail.as_mut().unwrap().draft = Some(crate::app::ReplyDraft {
            parent_id: Some(10),
            body: "me too".into(),
            submitting: true,
        });

        handle_app_event(
            &mut app,
            AppEvent::CommentCreated {
                post_id: 1,
                parent_id: Some(10),
                result: Err(ApiError::from_status(500, None)),
            },
            &tx,
        );

        assert!(rx.try_recv().is_err(), "no refresh fetch queued");
        let detail = app.detail.as_ref().unwrap();
        let draft = detail.draft.as_ref().unwrap();
        assert!(!draft.submitting);
        assert_eq!(draft.body, "me too");
        assert!(!detail.tree.is_loading(FetchTarget::Children(10)));
        assert_eq!(app.alert.as_deref(), Some("Request failed with status 500"));
    }

    #[tokio::test]
    async fn test_failed_mutation_raises_alert() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        handle_app_event(
            &mut app,
            AppEvent::PostCreated(Err(ApiError::from_status(400, Some("Title required".into())))),
            &tx,
        );
        assert_eq!(app.alert.as_deref(), Some("Title required"));

        handle_app_event(
            &mut app,
            AppEvent::MembershipToggled {
                community_id: 3,
                result: Err(ApiError::MissingUserId),
            },
            &tx,
        );
        assert_eq!(app.alert.as_deref(), Some("Not logged in: no user id in session"));
    }

    #[tokio::test]
    async fn test_sweet_added_clears_submitting_flag() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.sweet_submitting = true;
        handle_app_event(&mut app, AppEvent::SweetAdded(Err(ApiError::from_status(500, None))), &tx);
        assert!(!app.sweet_submitting);
        assert_eq!(app.alert.as_deref(), Some("Request failed with status 500"));

        app.alert = None;
        app.sweet_submitting = true;
        handle_app_event(&mut app, AppEvent::SweetAdded(Ok(())), &tx);
        assert!(!app.sweet_submitting);
        assert!(app.catalog_overlay.is_none());
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn test_failed_read_stays_silent() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        let request = app.feed.refresh();
        handle_app_event(
            &mut app,
            AppEvent::PostsLoaded {
                generation: request.generation,
                result: Err(ApiError::Timeout(30)),
            },
            &tx,
        );
        assert!(app.alert.is_none());
        assert!(app.feed.posts().is_empty());
    }

    #[tokio::test]
    async fn test_panic_event_sets_status() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: "feed",
                error: "oops".into(),
            },
            &tx,
        );
        let (msg, _) = app.status_message.as_ref().unwrap();
        assert!(msg.contains("feed"));
    }
}
