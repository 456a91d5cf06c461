//! Create-post modal with the community typeahead.

use crate::app::{App, ComposeField, ComposeState};
use crate::util::preview;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::render::centered_rect;

pub fn render(f: &mut Frame, app: &App) {
    let Some(compose) = app.compose.as_ref() else {
        return;
    };

    let overlay = centered_rect(70, 80, f.area());
    if overlay.width < 30 || overlay.height < 16 {
        return;
    }
    f.render_widget(Clear, overlay);

    let title = if compose.submitting {
        " New Post (posting...) "
    } else {
        " New Post (Ctrl+S post, Esc cancel) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(overlay);
    f.render_widget(block, overlay);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(inner);

    let cursor = |field: ComposeField| if compose.field == field { "_" } else { "" };

    f.render_widget(
        Paragraph::new(format!("{}{}", compose.title, cursor(ComposeField::Title)))
            .block(field_block("Title", compose.field == ComposeField::Title)),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(format!("{}{}", compose.body, cursor(ComposeField::Body)))
            .wrap(Wrap { trim: false })
            .block(field_block("Body", compose.field == ComposeField::Body)),
        chunks[1],
    );

    let community_label = if app.compose_community_known() || compose.community.input().is_empty() {
        "Community"
    } else {
        "Community (new)"
    };
    f.render_widget(
        Paragraph::new(format!(
            "{}{}",
            compose.community.input(),
            cursor(ComposeField::Community)
        ))
        .block(field_block(community_label, compose.field == ComposeField::Community)),
        chunks[2],
    );

    let flag_text = match compose.flag.and_then(|i| app.flags.get(i)) {
        Some(flag) => format!("< {} {} >", flag.marker(), preview(&flag.name, 20)),
        None if app.compose_data_loading => "Loading flags...".to_string(),
        None => "< none >".to_string(),
    };
    f.render_widget(
        Paragraph::new(flag_text).block(field_block("Flag (Left/Right)", compose.field == ComposeField::Flag)),
        chunks[3],
    );

    if compose.field == ComposeField::Community && compose.community.is_open() {
        render_suggestions(f, compose, chunks[2]);
    }
}

fn field_block(label: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(label)
}

/// Suggestion dropdown just below the community field.
fn render_suggestions(f: &mut Frame, compose: &ComposeState, anchor: Rect) {
    let suggestions = compose.community.suggestions();
    let screen = f.area();
    let y = anchor.y + anchor.height;
    let height = (suggestions.len().min(6) as u16 + 2).min(screen.height.saturating_sub(y));
    if height < 3 {
        return;
    }
    let area = Rect::new(anchor.x + 2, y, anchor.width.saturating_sub(4), height);

    let items: Vec<ListItem> = suggestions
        .iter()
        .enumerate()
        .map(|(i, community)| {
            let style = if i == compose.community.selected() {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                preview(&community.name, area.width.saturating_sub(2) as usize),
                style,
            )))
        })
        .collect();

    f.render_widget(Clear, area);
    f.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        ),
        area,
    );
}
