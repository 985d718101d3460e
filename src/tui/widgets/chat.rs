//! Chat hand-off screen
//!
//! Shown while a dataset is delegated to the chat session. The dataset list
//! stays frozen underneath; leaving returns to it.

use crate::manager::ViewState;
use crate::table::{headers_of, TableView, PREVIEW_ROW_LIMIT};
use crate::tui::app::App;
use crate::tui::theme::Theme;
use crate::tui::widgets::table_widget;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render_chat_handoff(frame: &mut Frame, area: Rect, app: &App) {
    let ViewState::ChatActive { record, dataset } = app.manager.view() else {
        return;
    };

    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(inner);

    let columns = headers_of(&dataset.rows).len();
    let summary = vec![
        Line::from(vec![
            Span::styled(dataset.display_name.clone(), Theme::heading()),
            Span::raw("  "),
            Span::styled(format!(" Status: {} ", record.status), Theme::badge_status()),
        ]),
        Line::from(Span::styled(
            format!(
                "{} rows, {} columns handed to the assistant",
                dataset.rows.len(),
                columns
            ),
            Theme::text_secondary(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Esc]", Theme::shortcut_key()),
            Span::styled(" Back to the dataset list", Theme::shortcut_desc()),
        ]),
    ];
    frame.render_widget(Paragraph::new(summary), chunks[0]);

    let sample = TableView::window(&dataset.rows, 0, PREVIEW_ROW_LIMIT);
    let sample_block = Block::default()
        .title(" Sample ")
        .borders(Borders::TOP)
        .border_style(Theme::border());
    frame.render_widget(table_widget(&sample).block(sample_block), chunks[1]);
}
