use crate::app::{App, Focus};
use crate::util::preview;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the communities sidebar.
///
/// Records the visible row count on `app` so scrolling can tell when the
/// selection nears the end of the loaded pages.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    app.sidebar_visible_rows = area.height.saturating_sub(2) as usize;

    let is_focused = app.focus == Focus::Communities;
    let directory = &app.directory;
    let active = app.feed.community_filter();
    let max_name = area.width.saturating_sub(6) as usize;

    let mut items: Vec<ListItem> = directory
        .communities()
        .iter()
        .enumerate()
        .map(|(i, community)| {
            let joined = if directory.is_joined(community.id) { "* " } else { "  " };
            let style = if i == directory.selected() && is_focused {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if active == Some(community.id) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(joined, Style::default().fg(Color::Green)),
                Span::styled(preview(&community.name, max_name), style),
            ]))
        })
        .collect();

    if directory.is_loading() {
        items.push(ListItem::new(Span::styled(
            "  Loading...",
            Style::default().fg(Color::DarkGray),
        )));
    } else if items.is_empty() {
        items.push(ListItem::new("No communities"));
    }

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = format!("Communities ({} joined)", directory.joined_count());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(directory.selected()));
    f.render_stateful_widget(list, area, &mut state);
}
