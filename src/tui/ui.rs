//! UI Rendering
//!
//! Main layout: header, body (login form, dataset list or chat hand-off),
//! status bar, plus modal overlays.

use crate::manager::{Notice, Phase, RowsPurpose};
use crate::session::AuthState;
use crate::tui::app::{App, Overlay};
use crate::tui::theme::{Icons, Theme};
use crate::tui::widgets;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};

/// Render the main UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(8),    // Body
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);

    if !app.is_logged_in() {
        widgets::render_login(frame, chunks[1], app);
    } else {
        match app.manager.phase() {
            Phase::ChatHandoff => widgets::render_chat_handoff(frame, chunks[1], app),
            Phase::Previewing | Phase::FullViewing => {
                render_dataset_list(frame, chunks[1], app);
                widgets::render_rows_modal(frame, app);
            }
            _ => render_dataset_list(frame, chunks[1], app),
        }
    }

    render_status_bar(frame, chunks[2], app);

    match app.overlay {
        Overlay::Help => render_help(frame),
        Overlay::Upload => render_upload_prompt(frame, app),
        Overlay::None => {}
    }
}

/// Render the header with the signed-in identity and busy indicator
fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled("datadesk", Theme::title()),
        Span::styled("  CSV datasets", Theme::text_secondary()),
    ];

    match (app.auth_state(), app.identity()) {
        (AuthState::Authenticated, Some(identity)) => {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(format!("{} {}", Icons::OK, identity), Theme::success()));
        }
        (AuthState::Pending, _) => {
            spans.push(Span::styled("  signing in...", Theme::active()));
        }
        _ => {
            spans.push(Span::styled("  not signed in", Theme::text_dim()));
        }
    }

    if app.manager.is_busy() || app.login_pending {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(Icons::spinner(app.tick), Theme::active()));
    }

    let title = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

    frame.render_widget(title, area);
}

/// Render the dataset list with selection checkboxes
fn render_dataset_list(frame: &mut Frame, area: Rect, app: &App) {
    let manager = &app.manager;
    let selected = manager.selection().len();
    let title = if selected > 0 {
        format!(" Datasets ({}, {} selected) ", manager.datasets().len(), selected)
    } else {
        format!(" Datasets ({}) ", manager.datasets().len())
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if manager.view().is_listing() {
            Theme::border_focused()
        } else {
            Theme::border()
        });

    if manager.phase() == Phase::Loading {
        let loading = Paragraph::new(Line::from(vec![
            Span::styled(Icons::spinner(app.tick), Theme::active()),
            Span::styled(" Loading datasets...", Theme::text_secondary()),
        ]))
        .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if manager.datasets().is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled("No datasets uploaded yet.", Theme::text_secondary())),
            Line::from(vec![
                Span::styled("Press ", Theme::text_dim()),
                Span::styled("u", Theme::shortcut_key()),
                Span::styled(" to upload a .csv file.", Theme::text_dim()),
            ]),
        ])
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let pending = manager.pending_rows().map(|(name, _)| name);
    let rows: Vec<Row> = manager
        .datasets()
        .iter()
        .map(|record| {
            let (mark, mark_style) = if manager.selection().contains(&record.id) {
                (Icons::CHECKED, Theme::checked())
            } else {
                (Icons::UNCHECKED, Theme::text_dim())
            };
            let name = if pending == Some(record.storage_name.as_str()) {
                format!("{} {}", record.label(), Icons::spinner(app.tick))
            } else {
                record.label().to_string()
            };
            Row::new(vec![
                Cell::from(Span::styled(mark, mark_style)),
                Cell::from(Span::styled(name, Theme::text())),
                Cell::from(Span::styled(record.uploader.clone(), Theme::text_secondary())),
                Cell::from(Span::styled(record.status.clone(), Theme::text_secondary())),
            ])
        })
        .collect();

    let header = Row::new(vec!["", "File", "Uploaded by", "Status"]).style(Theme::table_header());
    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Percentage(45),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ],
    )
    .header(header)
    .block(block)
    .highlight_style(Theme::cursor_row())
    .highlight_symbol(Icons::SELECTED);

    let mut state = TableState::default().with_selected(Some(app.cursor));
    frame.render_stateful_widget(table, area, &mut state);
}

/// Render the status bar: latest notice, or what the keys do here
fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let status = match &app.status {
        Some(Notice::Error(e)) => Span::styled(format!("{} {}", Icons::ERROR, e), Theme::error()),
        Some(Notice::Info(message)) => Span::styled(message.clone(), Theme::success()),
        None => match app.manager.pending_rows() {
            Some((name, RowsPurpose::Chat)) => {
                Span::styled(format!("Loading {} for chat...", name), Theme::active())
            }
            Some((name, _)) => Span::styled(format!("Loading {}...", name), Theme::active()),
            None => Span::styled("Ready", Theme::text_secondary()),
        },
    };

    let keys: &[(&str, &str)] = if !app.is_logged_in() {
        &[("[Tab]", " Field "), ("[Enter]", " Sign in "), ("[Ctrl+Q]", " Quit")]
    } else {
        match app.manager.phase() {
            Phase::ChatHandoff => &[("[Esc]", " Back to list "), ("[Ctrl+Q]", " Quit")],
            Phase::Previewing | Phase::FullViewing => &[
                ("[v]", " Full view "),
                ("[c]", " Use in chat "),
                ("[Esc]", " Close"),
            ],
            _ => &[
                ("[Space]", " Select "),
                ("[Enter]", " Preview "),
                ("[u]", " Upload "),
                ("[d]", " Delete selected "),
                ("[F1]", " Help"),
            ],
        }
    };

    let mut spans = vec![status, Span::raw(" │ ")];
    for (key, desc) in keys {
        spans.push(Span::styled(*key, Theme::shortcut_key()));
        spans.push(Span::styled(*desc, Theme::shortcut_desc()));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the upload path prompt
fn render_upload_prompt(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Upload dataset ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            "Enter the path of a .csv file, then press Enter",
            Theme::text_secondary(),
        )),
        chunks[0],
    );
    frame.render_widget(&app.upload_path, chunks[2]);
}

/// Render the help modal
fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);

    let entries = [
        ("↑/↓          ", "Move cursor / scroll rows"),
        ("Space        ", "Select or unselect dataset"),
        ("Enter / p    ", "Preview first rows"),
        ("v            ", "Open full view"),
        ("c            ", "Use dataset in chat"),
        ("u            ", "Upload a .csv file"),
        ("d            ", "Delete selected datasets"),
        ("x            ", "Delete dataset under cursor"),
        ("r            ", "Refresh list"),
        ("L            ", "Log out"),
        ("Esc          ", "Close view / leave chat"),
        ("Ctrl+Q       ", "Quit"),
        ("Ctrl+C       ", "Force quit"),
    ];

    let mut help_lines = vec![
        Line::from(Span::styled("Keyboard Shortcuts", Theme::heading())),
        Line::from(""),
    ];
    help_lines.extend(entries.iter().map(|(key, desc)| {
        Line::from(vec![
            Span::styled(*key, Theme::shortcut_key()),
            Span::styled(*desc, Theme::text()),
        ])
    }));
    help_lines.push(Line::from(""));
    help_lines.push(Line::from(Span::styled(
        "Press any key to close",
        Theme::text_dim(),
    )));

    let paragraph = Paragraph::new(help_lines).block(
        Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Theme::border_focused()),
    );

    frame.render_widget(paragraph, area);
}

/// Helper to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
