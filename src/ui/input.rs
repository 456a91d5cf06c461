//! Input handling for the TUI.
//!
//! Routes key presses to the handler for the topmost layer: alert, help,
//! modal forms, search boxes, then the active view.

use crate::app::{
    App, AppEvent, CatalogOverlay, ComposeField, Focus, Form, View, ADD_SWEET_FIELDS,
    FILTER_FIELDS,
};
use crate::catalog::{validate_new_sweet, SweetFilter};
use crate::comments::ToggleOutcome;
use crate::feed::FeedQuery;
use crate::util::MAX_SEARCH_QUERY_LENGTH;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{
    spawn_comment_create, spawn_comments_fetch, spawn_community_page, spawn_compose_data,
    spawn_feed_load, spawn_membership_toggle, spawn_post_create, spawn_post_open,
    spawn_sweet_add, spawn_sweets_load,
};
use super::Action;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    // The alert swallows the key that dismisses it.
    if app.alert.is_some() {
        app.dismiss_alert();
        return Action::Continue;
    }

    if app.show_help {
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            app.show_help = false;
        }
        return Action::Continue;
    }

    if app.compose.is_some() {
        handle_compose_input(app, code, modifiers, event_tx);
        return Action::Continue;
    }

    match app.view {
        View::Feed => handle_feed_input(app, code, event_tx),
        View::Detail => handle_detail_input(app, code, event_tx),
        View::Catalog => handle_catalog_input(app, code, event_tx),
    }
}

// ============================================================================
// Feed view
// ============================================================================

fn handle_feed_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    if app.search_mode {
        handle_search_input(app, code, event_tx);
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                Focus::Posts => Focus::Communities,
                Focus::Communities => Focus::Posts,
            };
        }
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            Focus::Posts => app.feed.select_next(),
            Focus::Communities => {
                app.directory.select_next();
                load_more_communities(app, event_tx);
            }
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            Focus::Posts => app.feed.select_prev(),
            Focus::Communities => app.directory.select_prev(),
        },
        KeyCode::Enter => match app.focus {
            Focus::Posts => {
                if let Some(post_id) = app.feed.selected_post().map(|p| p.id) {
                    let ticket = app.open_post(post_id);
                    spawn_post_open(&app.client, post_id, ticket, event_tx);
                }
            }
            Focus::Communities => {
                let Some(id) = app.directory.selected_community().map(|c| c.id) else {
                    return Action::Continue;
                };
                if let Some(request) = app.feed.set_community_filter(Some(id)) {
                    spawn_feed_load(&app.client, request, event_tx);
                }
                app.focus = Focus::Posts;
            }
        },
        KeyCode::Char('x') | KeyCode::Esc => clear_feed_filters(app, event_tx),
        KeyCode::Char('J') => {
            if let Some(id) = app.directory.selected_community().map(|c| c.id) {
                spawn_membership_toggle(&app.client, id, app.user_id(), event_tx);
            }
        }
        KeyCode::Char('/') => app.search_mode = true,
        KeyCode::Char('n') => {
            if app.open_compose() {
                spawn_compose_data(&app.client, event_tx);
            }
        }
        KeyCode::Char('r') => {
            let request = app.feed.refresh();
            spawn_feed_load(&app.client, request, event_tx);
            app.set_status("Refreshing...");
        }
        KeyCode::Char('S') => {
            app.view = View::Catalog;
            if app.catalog.sweets().is_empty() && !app.catalog.is_loading() {
                let request = app.catalog.refresh();
                spawn_sweets_load(&app.client, request, event_tx);
            }
        }
        _ => {}
    }
    Action::Continue
}

fn load_more_communities(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if !app.sidebar_needs_more() {
        return;
    }
    if let Some(request) = app.directory.begin_next_page() {
        tracing::debug!(page = request.page, "Sidebar near bottom, loading next page");
        spawn_community_page(&app.client, request, event_tx);
    }
}

/// Drop the community filter and any active search, back to all posts.
fn clear_feed_filters(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let searching = matches!(app.feed.active_query(), FeedQuery::Search(_));
    app.feed.set_search_input("");
    let request = match app.feed.set_community_filter(None) {
        Some(request) => Some(request),
        None if searching => Some(app.feed.refresh()),
        None => None,
    };
    if let Some(request) = request {
        spawn_feed_load(&app.client, request, event_tx);
    }
}

fn handle_search_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Esc => app.search_mode = false,
        KeyCode::Enter => {
            app.search_mode = false;
            let request = app.feed.submit_search();
            spawn_feed_load(&app.client, request, event_tx);
        }
        KeyCode::Backspace => app.feed.pop_search_char(),
        KeyCode::Char(c) => {
            if app.feed.search_input().len() < MAX_SEARCH_QUERY_LENGTH {
                app.feed.push_search_char(c);
            } else {
                app.set_status(format!(
                    "Search query too long (max {} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
            }
        }
        _ => {}
    }
}

// ============================================================================
// Detail view
// ============================================================================

fn handle_detail_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    let Some(detail) = app.detail.as_mut() else {
        app.view = View::Feed;
        return Action::Continue;
    };

    if let Some(draft) = detail.draft.as_mut() {
        if draft.submitting {
            return Action::Continue;
        }
        match code {
            KeyCode::Esc => detail.draft = None,
            KeyCode::Backspace => {
                draft.body.pop();
            }
            KeyCode::Enter => {
                if draft.body.trim().is_empty() {
                    app.set_status("Comment is empty");
                    return Action::Continue;
                }
                draft.submitting = true;
                let (post_id, parent_id, body) = (detail.post_id, draft.parent_id, draft.body.clone());
                let author_id = app.user_id();
                spawn_comment_create(&app.client, post_id, parent_id, author_id, body, event_tx);
            }
            KeyCode::Char(c) => draft.body.push(c),
            _ => {}
        }
        return Action::Continue;
    }

    let row_count = detail.rows().len();
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h') => app.close_post(),
        KeyCode::Char('j') | KeyCode::Down => {
            if detail.selected + 1 < row_count {
                detail.selected += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            detail.selected = detail.selected.saturating_sub(1);
        }
        KeyCode::PageDown => detail.body_scroll = detail.body_scroll.saturating_add(5),
        KeyCode::PageUp => detail.body_scroll = detail.body_scroll.saturating_sub(5),
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('l') => {
            let Some(id) = detail.selected_comment().map(|c| c.id) else {
                return Action::Continue;
            };
            let post_id = detail.post_id;
            match detail.tree.begin_expand(id) {
                ToggleOutcome::Collapsed | ToggleOutcome::ExpandedFromCache => {
                    detail.clamp_selection();
                }
                ToggleOutcome::FetchRequired(ticket) => {
                    spawn_comments_fetch(&app.client, post_id, ticket, event_tx);
                }
                ToggleOutcome::AlreadyLoading | ToggleOutcome::NotFound => {}
                ToggleOutcome::NoReplies => app.set_status("No replies"),
            }
        }
        KeyCode::Char('r') => {
            if let Some(parent_id) = detail.selected_comment().map(|c| c.id) {
                detail.draft = Some(crate::app::ReplyDraft {
                    parent_id: Some(parent_id),
                    body: String::new(),
                    submitting: false,
                });
            }
        }
        KeyCode::Char('c') => {
            detail.draft = Some(crate::app::ReplyDraft {
                parent_id: None,
                body: String::new(),
                submitting: false,
            });
        }
        KeyCode::Char('R') => {
            let post_id = detail.post_id;
            detail.post_loading = true;
            detail.selected = 0;
            let ticket = detail.tree.begin_load_top_level();
            spawn_post_open(&app.client, post_id, ticket, event_tx);
        }
        _ => {}
    }
    Action::Continue
}

// ============================================================================
// Compose modal
// ============================================================================

fn handle_compose_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let Some(compose) = app.compose.as_mut() else {
        return;
    };
    if compose.submitting {
        if code == KeyCode::Esc {
            app.close_compose();
        }
        return;
    }

    if code == KeyCode::Char('s') && modifiers.contains(KeyModifiers::CONTROL) {
        submit_compose(app, event_tx);
        return;
    }

    let suggestions_open = compose.field == ComposeField::Community && compose.community.is_open();
    match code {
        KeyCode::Esc if suggestions_open => compose.community.cancel(),
        KeyCode::Esc => app.close_compose(),
        KeyCode::Tab | KeyCode::BackTab => {
            if compose.field == ComposeField::Community {
                compose.community.cancel();
            }
            compose.field = if code == KeyCode::Tab {
                compose.field.next()
            } else {
                compose.field.prev()
            };
        }
        KeyCode::Up if suggestions_open => compose.community.select_prev(),
        KeyCode::Down if suggestions_open => compose.community.select_next(),
        KeyCode::Enter if suggestions_open => {
            let index = compose.community.selected();
            compose.community.select(index);
        }
        KeyCode::Enter => match compose.field {
            ComposeField::Body => compose.body.push('\n'),
            _ => compose.field = compose.field.next(),
        },
        KeyCode::Left if compose.field == ComposeField::Flag => app.cycle_compose_flag(false),
        KeyCode::Right if compose.field == ComposeField::Flag => app.cycle_compose_flag(true),
        KeyCode::Backspace => match compose.field {
            ComposeField::Title => {
                compose.title.pop();
            }
            ComposeField::Body => {
                compose.body.pop();
            }
            ComposeField::Community => compose.community.pop_char(),
            ComposeField::Flag => {}
        },
        KeyCode::Char(c) => match compose.field {
            ComposeField::Title => compose.title.push(c),
            ComposeField::Body => compose.body.push(c),
            ComposeField::Community => compose.community.push_char(c),
            ComposeField::Flag => {}
        },
        _ => {}
    }
}

fn submit_compose(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(post) = app.compose_payload() else {
        return;
    };
    if post.title.trim().is_empty() {
        app.set_status("Title is required");
        return;
    }
    if post.community.is_some() && !app.compose_community_known() {
        tracing::debug!(community = ?post.community, "Posting to a community not in the local list");
    }
    if let Some(compose) = app.compose.as_mut() {
        compose.submitting = true;
        compose.community.cancel();
    }
    spawn_post_create(&app.client, post, event_tx);
}

// ============================================================================
// Catalog view
// ============================================================================

fn handle_catalog_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    if app.catalog_overlay.is_some() {
        handle_overlay_input(app, code, event_tx);
        return Action::Continue;
    }

    if app.catalog_search_mode {
        match code {
            KeyCode::Esc | KeyCode::Enter => app.catalog_search_mode = false,
            KeyCode::Backspace => app.catalog.pop_search_char(),
            KeyCode::Char(c) if app.catalog.search().len() < MAX_SEARCH_QUERY_LENGTH => {
                app.catalog.push_search_char(c);
            }
            _ => {}
        }
        return Action::Continue;
    }

    let request = match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => {
            app.show_help = true;
            None
        }
        KeyCode::Esc | KeyCode::Char('b') => {
            app.view = View::Feed;
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.catalog.select_next();
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.catalog.select_prev();
            None
        }
        KeyCode::Char('n') | KeyCode::Right => app.catalog.next_page(),
        KeyCode::Char('p') | KeyCode::Left => app.catalog.prev_page(),
        KeyCode::Char(c @ '1'..='9') => c
            .to_digit(10)
            .and_then(|page| app.catalog.go_to_page(page)),
        KeyCode::Char('/') => {
            app.catalog_search_mode = true;
            None
        }
        KeyCode::Char('f') => {
            let filter = app.catalog.filter();
            let fmt_price = |p: Option<f64>| p.map(|v| v.to_string()).unwrap_or_default();
            let values = vec![
                filter.category.clone().unwrap_or_default(),
                fmt_price(filter.min_price),
                fmt_price(filter.max_price),
            ];
            app.catalog_overlay = Some(CatalogOverlay::Filter(Form::with_values(FILTER_FIELDS, values)));
            None
        }
        KeyCode::Char('a') => {
            app.catalog_overlay = Some(CatalogOverlay::AddSweet(Form::new(ADD_SWEET_FIELDS)));
            None
        }
        KeyCode::Char('x') => Some(app.catalog.reset_filter()),
        KeyCode::Char('r') => Some(app.catalog.refresh()),
        _ => None,
    };

    if let Some(request) = request {
        spawn_sweets_load(&app.client, request, event_tx);
    }
    Action::Continue
}

fn handle_overlay_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(overlay) = app.catalog_overlay.as_mut() else {
        return;
    };
    let form = match overlay {
        CatalogOverlay::Filter(form) | CatalogOverlay::AddSweet(form) => form,
    };
    match code {
        KeyCode::Esc => app.catalog_overlay = None,
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.prev_field(),
        KeyCode::Backspace => form.pop_char(),
        KeyCode::Char(c) => form.push_char(c),
        KeyCode::Enter => submit_overlay(app, event_tx),
        _ => {}
    }
}

fn submit_overlay(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.catalog_overlay.as_ref() {
        Some(CatalogOverlay::Filter(form)) => {
            match SweetFilter::parse(form.value(0), form.value(1), form.value(2)) {
                Ok(filter) => {
                    app.catalog_overlay = None;
                    let request = app.catalog.apply_filter(filter);
                    spawn_sweets_load(&app.client, request, event_tx);
                }
                Err(e) => app.alert = Some(e.to_string()),
            }
        }
        Some(CatalogOverlay::AddSweet(_)) if app.sweet_submitting => {
            tracing::debug!("Add-sweet already in flight, ignoring submit");
        }
        Some(CatalogOverlay::AddSweet(form)) => {
            match validate_new_sweet(form.value(0), form.value(1), form.value(2)) {
                Ok(sweet) => {
                    tracing::debug!(name = %sweet.name, "Adding sweet");
                    app.sweet_submitting = true;
                    spawn_sweet_add(&app.client, sweet, event_tx);
                }
                Err(e) => app.alert = Some(e.to_string()),
            }
        }
        None => {}
    }
}
