use crate::app::{App, View};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Key hints for the current mode.
fn hints(app: &App) -> &'static str {
    if app.compose.is_some() {
        return "[Tab]next field [Up/Down]suggestions [Ctrl+S]post [Esc]cancel";
    }
    match app.view {
        View::Feed if app.search_mode => "Type to search | ENTER search | ESC cancel",
        View::Feed => "[/]search [n]ew post [J]oin [x]clear [S]hop [Tab]switch [?]help [q]uit",
        View::Detail => match app.detail.as_ref().and_then(|d| d.draft.as_ref()) {
            Some(_) => "Type your comment | ENTER send | ESC cancel",
            None => "[Enter]expand [r]eply [c]omment [R]eload [b]ack [?]help [q]uit",
        },
        View::Catalog if app.catalog_search_mode => "Type to search | ENTER/ESC done",
        View::Catalog if app.catalog_overlay.is_some() => "[Tab]next field [Enter]submit [Esc]cancel",
        View::Catalog => "[/]search [f]ilter [x]reset [a]dd [n/p]page [b]ack [q]uit",
    }
}

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else {
        let user = app
            .client
            .session()
            .and_then(|s| s.user_id())
            .map(|id| format!("user {}", id))
            .unwrap_or_else(|| "not logged in".to_string());
        Cow::Owned(format!("{} | {}", hints(app), user))
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::Config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_hints_follow_mode() {
        let client = ApiClient::new("http://localhost:8080/api", Duration::from_secs(5)).unwrap();
        let mut app = App::new(client, Config::default());
        assert!(hints(&app).contains("[n]ew post"));

        app.search_mode = true;
        assert!(hints(&app).starts_with("Type to search"));

        app.view = View::Catalog;
        assert!(hints(&app).contains("[f]ilter"));
    }
}
