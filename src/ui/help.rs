//! Help overlay: key table grouped by view.

use ratatui::{
    layout::Constraint,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

use super::render::centered_rect;

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "General",
        &[
            ("?", "Toggle this help"),
            ("q / Ctrl+C", "Quit"),
            ("j/k Up/Down", "Move selection"),
        ],
    ),
    (
        "Feed",
        &[
            ("Tab", "Switch posts / communities"),
            ("Enter", "Open post / filter by community"),
            ("x / Esc", "Clear filter and search"),
            ("/", "Search posts"),
            ("J", "Join or leave community"),
            ("n", "New post"),
            ("r", "Refresh"),
            ("S", "Sweet shop"),
        ],
    ),
    (
        "Post",
        &[
            ("Enter / l", "Expand or collapse replies"),
            ("r", "Reply to comment"),
            ("c", "New top-level comment"),
            ("R", "Reload post and comments"),
            ("PgUp/PgDn", "Scroll post body"),
            ("b / Esc", "Back"),
        ],
    ),
    (
        "Sweet shop",
        &[
            ("/", "Search"),
            ("n/p 1-9", "Change page"),
            ("f / x", "Filter / reset filter"),
            ("a", "Add sweet"),
            ("b / Esc", "Back"),
        ],
    ),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame) {
    let overlay = centered_rect(70, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let mut rows: Vec<Row> = Vec::new();
    for (i, (label, bindings)) in SECTIONS.iter().enumerate() {
        if i > 0 {
            rows.push(Row::new(vec![String::new(), String::new()]));
        }
        rows.push(Row::new(vec![
            Line::from(Span::styled(
                format!("-- {} --", label),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ]));
        for (key, action) in bindings.iter() {
            rows.push(Row::new(vec![format!("  {}", key), action.to_string()]));
        }
    }

    let widths = [Constraint::Length(16), Constraint::Min(20)];
    let table = Table::new(rows, widths).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help (? to close) "),
    );
    f.render_widget(table, overlay);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_help_renders_without_panic() {
        let mut terminal = Terminal::new(TestBackend::new(80, 40)).unwrap();
        terminal.draw(render).unwrap();
    }
}
