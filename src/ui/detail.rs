use crate::app::{App, PostDetail};
use crate::comments::NodeState;
use crate::util::{format_relative_time, preview, strip_control_chars};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Render the post detail view: post body, comment tree, reply box.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let Some(detail) = app.detail.as_ref() else {
        let paragraph = Paragraph::new("No post selected")
            .block(Block::default().borders(Borders::ALL).title("Post"));
        f.render_widget(paragraph, area);
        return;
    };

    let draft_height = if detail.draft.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Min(3),
            Constraint::Length(draft_height),
        ])
        .split(area);

    render_post(f, detail, chunks[0]);
    render_comments(f, detail, chunks[1]);
    if draft_height > 0 {
        render_draft(f, detail, chunks[2]);
    }
}

fn render_post(f: &mut Frame, detail: &PostDetail, area: Rect) {
    let Some(post) = detail.post.as_ref() else {
        let msg = if detail.post_loading {
            "Loading post..."
        } else {
            "Post unavailable"
        };
        let paragraph =
            Paragraph::new(msg).block(Block::default().borders(Borders::ALL).title("Post"));
        f.render_widget(paragraph, area);
        return;
    };

    let mut meta = format!("{} • {}", preview(post.author_name(), 24), format_relative_time(post.created_at));
    if let Some(community) = &post.community {
        meta.push_str(&format!(" • {}", preview(&community.name, 24)));
    }
    if let Some(flag) = &post.flag {
        meta.push_str(&format!(" • {} {}", flag.marker(), preview(&flag.name, 16)));
    }

    let mut lines = vec![
        Line::from(Span::styled(
            preview(&post.title, area.width.saturating_sub(4) as usize),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(meta, Style::default().fg(Color::DarkGray))),
        Line::from(""),
    ];
    let body = strip_control_chars(&post.body);
    lines.extend(body.lines().map(|l| Line::from(l.to_string())));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Post"))
        .wrap(Wrap { trim: false })
        .scroll((detail.body_scroll, 0));
    f.render_widget(paragraph, area);
}

/// Marker for a comment's expansion state.
fn state_marker(state: NodeState, reply_count: u32) -> String {
    match state {
        NodeState::Leaf => "  ".to_string(),
        NodeState::CollapsedUnfetched => format!("▸ ({}) ", reply_count),
        NodeState::CollapsedFetched => "▹ ".to_string(),
        NodeState::Expanded => "▾ ".to_string(),
        NodeState::Loading => "… ".to_string(),
    }
}

fn render_comments(f: &mut Frame, detail: &PostDetail, area: Rect) {
    let rows = detail.rows();
    let loading_top = detail.tree.is_loading(crate::comments::FetchTarget::TopLevel);

    let items: Vec<ListItem> = if rows.is_empty() {
        let msg = if loading_top {
            "Loading comments..."
        } else {
            "No comments yet. Press c to write one."
        };
        vec![ListItem::new(msg)]
    } else {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let indent = "  ".repeat(row.depth.min(12));
                let marker = state_marker(row.state, row.comment.reply_count);
                let used = indent.len() + marker.chars().count() + 20;
                let body_width = (area.width as usize).saturating_sub(used + 2);

                let body_style = if i == detail.selected {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                } else {
                    Style::default()
                };

                ListItem::new(Line::from(vec![
                    Span::raw(indent),
                    Span::styled(marker, Style::default().fg(Color::Yellow)),
                    Span::styled(
                        format!("{}: ", preview(row.comment.author_name(), 14)),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(preview(&row.comment.body, body_width), body_style),
                    Span::styled(
                        format!(" {}", format_relative_time(row.comment.created_at)),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect()
    };

    let title = if loading_top && !rows.is_empty() {
        "Comments (refreshing...)".to_string()
    } else {
        format!("Comments ({})", detail.tree.len())
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(detail.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_draft(f: &mut Frame, detail: &PostDetail, area: Rect) {
    let Some(draft) = detail.draft.as_ref() else {
        return;
    };
    let title = match draft.parent_id {
        Some(_) if draft.submitting => "Reply (sending...)",
        Some(_) => "Reply (Enter send, Esc cancel)",
        None if draft.submitting => "Comment (sending...)",
        None => "Comment (Enter send, Esc cancel)",
    };
    let paragraph = Paragraph::new(format!("> {}_", draft.body)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );
    f.render_widget(paragraph, area);
}
