use crate::app::{App, Focus};
use crate::feed::FeedQuery;
use crate::util::{format_relative_time, preview};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the post list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let is_focused = app.focus == Focus::Posts;
    let posts = app.feed.posts();

    let items: Vec<ListItem> = if posts.is_empty() {
        let msg = if app.feed.is_loading() {
            "Loading posts..."
        } else {
            "No posts"
        };
        vec![ListItem::new(msg)]
    } else {
        // Room for marker, author and age
        let max_title = area.width.saturating_sub(30) as usize;
        posts
            .iter()
            .enumerate()
            .map(|(i, post)| {
                let mut spans = Vec::with_capacity(5);
                if let Some(flag) = &post.flag {
                    spans.push(Span::styled(
                        format!("{} ", flag.marker()),
                        Style::default().fg(Color::Yellow),
                    ));
                }

                let title_style = if i == app.feed.selected() {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                spans.push(Span::styled(preview(&post.title, max_title), title_style));

                spans.push(Span::styled(
                    format!("  {}", preview(post.author_name(), 16)),
                    Style::default().fg(Color::Gray),
                ));

                if let Some(count) = post.comment_count.filter(|c| *c > 0) {
                    spans.push(Span::styled(
                        format!("  [{}]", count),
                        Style::default().fg(Color::Cyan),
                    ));
                }

                let age = format_relative_time(post.created_at);
                if !age.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", age),
                        Style::default().fg(Color::DarkGray),
                    ));
                }

                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = if app.search_mode {
        format!("Search: {}_", app.feed.search_input())
    } else {
        match app.feed.active_query() {
            FeedQuery::All => "Posts".to_string(),
            FeedQuery::Community(id) => {
                let name = app
                    .directory
                    .communities()
                    .iter()
                    .find(|c| c.id == *id)
                    .map(|c| preview(&c.name, 30))
                    .unwrap_or_else(|| format!("#{}", id));
                format!("Posts - {}", name)
            }
            FeedQuery::Search(q) => format!("Search results - \"{}\"", preview(q, 40)),
        }
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(app.feed.selected()));
    f.render_stateful_widget(list, area, &mut state);
}
