use crate::app::{App, CatalogOverlay, Form};
use crate::catalog::page_window;
use crate::util::preview;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::render::centered_rect;

/// Render the sweet-shop grid with its search box and pagination footer.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 7 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_grid(f, app, chunks[1]);
    render_pages(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let catalog = &app.catalog;
    let search = if app.catalog_search_mode {
        format!("Search: {}_", catalog.search())
    } else if catalog.search().is_empty() {
        "Search: (press /)".to_string()
    } else {
        format!("Search: {}", catalog.search())
    };

    let filter = catalog.filter();
    let mut parts = Vec::new();
    if let Some(category) = &filter.category {
        parts.push(format!("category={}", category));
    }
    if let Some(min) = filter.min_price {
        parts.push(format!("min={:.2}", min));
    }
    if let Some(max) = filter.max_price {
        parts.push(format!("max={:.2}", max));
    }
    let filter_text = if parts.is_empty() {
        "no filter".to_string()
    } else {
        parts.join(" ")
    };

    let border_style = if app.catalog_search_mode {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(Line::from(vec![
        Span::raw(search),
        Span::styled(format!("   [{}]", filter_text), Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title("Sweet Shop"),
    );
    f.render_widget(paragraph, area);
}

fn render_grid(f: &mut Frame, app: &App, area: Rect) {
    let catalog = &app.catalog;
    let name_width = area.width.saturating_sub(30) as usize;

    let items: Vec<ListItem> = if catalog.sweets().is_empty() {
        let msg = if catalog.is_loading() {
            "Loading sweets..."
        } else {
            "No sweets found"
        };
        vec![ListItem::new(msg)]
    } else {
        catalog
            .sweets()
            .iter()
            .enumerate()
            .map(|(i, sweet)| {
                let name_style = if i == catalog.selected() {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                let price = sweet
                    .price
                    .map(|p| format!("{:>9.2}", p))
                    .unwrap_or_else(|| format!("{:>9}", "-"));
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", price), Style::default().fg(Color::Green)),
                    Span::styled(preview(&sweet.name, name_width), name_style),
                    Span::styled(
                        format!("  {}", preview(sweet.category.as_deref().unwrap_or(""), 16)),
                        Style::default().fg(Color::Gray),
                    ),
                ]))
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("Products"),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(catalog.selected()));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_pages(f: &mut Frame, app: &App, area: Rect) {
    let catalog = &app.catalog;
    let mut spans = vec![Span::raw("< ")];
    for page in page_window(catalog.page(), catalog.total_pages()) {
        let style = if page == catalog.page() {
            Style::default().bg(Color::Cyan).fg(Color::Black)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!(" {} ", page), style));
    }
    spans.push(Span::raw(format!(" >   page {}/{}", catalog.page(), catalog.total_pages())));
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

/// Filter or add-sweet form, drawn over the grid.
pub fn render_overlay(f: &mut Frame, app: &App) {
    let Some(overlay) = app.catalog_overlay.as_ref() else {
        return;
    };
    let (title, form) = match overlay {
        CatalogOverlay::Filter(form) => (" Filter (Enter apply, Esc cancel) ", form),
        CatalogOverlay::AddSweet(form) if app.sweet_submitting => (" Add Sweet (saving...) ", form),
        CatalogOverlay::AddSweet(form) => (" Add Sweet (Enter save, Esc cancel) ", form),
    };

    let area = centered_rect(50, 60, f.area());
    let height = (form.labels().len() as u16) * 3 + 2;
    let area = Rect::new(area.x, area.y, area.width, height.min(area.height));
    if area.width < 20 || area.height < 5 {
        return;
    }
    f.render_widget(Clear, area);
    render_form(f, title, form, area);
}

fn render_form(f: &mut Frame, title: &str, form: &Form, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(form.labels().iter().map(|_| Constraint::Length(3)))
        .split(inner);

    for (i, (label, row)) in form.labels().iter().zip(rows.iter()).enumerate() {
        let focused = i == form.focused();
        let style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let cursor = if focused { "_" } else { "" };
        f.render_widget(
            Paragraph::new(format!("{}{}", form.value(i), cursor)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style)
                    .title(*label),
            ),
            *row,
        );
    }
}
