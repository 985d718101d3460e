//! Login Widget
//!
//! Email and password form shown while no session is established.

use crate::tui::app::{App, LoginField};
use crate::tui::theme::{Icons, Theme};
use crate::tui::ui::centered_rect;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

/// Render the login form centered in `area`
pub fn render_login(frame: &mut Frame, area: Rect, app: &App) {
    let area = centered_rect(50, 70, area);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Sign in ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // Instructions
            Constraint::Length(3), // Email
            Constraint::Length(3), // Password
            Constraint::Min(1),    // Message
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "Sign in to manage your datasets.",
            Theme::text(),
        ))),
        chunks[0],
    );

    render_field(frame, chunks[1], " Email ", &app.email, app.login_field == LoginField::Email);
    render_field(
        frame,
        chunks[2],
        " Password ",
        &app.password,
        app.login_field == LoginField::Password,
    );
    render_message(frame, chunks[3], app);
}

fn render_field(frame: &mut Frame, area: Rect, title: &str, input: &TextArea<'static>, focused: bool) {
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(if focused {
            Theme::border_focused()
        } else {
            Theme::border()
        });

    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(input, inner);
}

fn render_message(frame: &mut Frame, area: Rect, app: &App) {
    let line = if app.login_pending {
        Line::from(vec![
            Span::styled(Icons::spinner(app.tick), Theme::active()),
            Span::styled(" Signing in...", Theme::text_secondary()),
        ])
    } else if let Some(error) = &app.login_error {
        Line::from(Span::styled(format!("{} {}", Icons::ERROR, error), Theme::error()))
    } else {
        Line::from(vec![
            Span::styled("[Tab]", Theme::shortcut_key()),
            Span::styled(" Switch field ", Theme::shortcut_desc()),
            Span::styled("[Enter]", Theme::shortcut_key()),
            Span::styled(" Continue", Theme::shortcut_desc()),
        ])
    };

    frame.render_widget(Paragraph::new(line), area);
}
