//! Rows Widget
//!
//! Preview and full-view modal over the dataset list.

use crate::manager::ViewState;
use crate::table::TableView;
use crate::tui::app::App;
use crate::tui::theme::Theme;
use crate::tui::ui::centered_rect;
use ratatui::{
    layout::Constraint,
    text::Span,
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

/// Columns wider than this are clipped
const MAX_COLUMN_WIDTH: usize = 32;

/// Render the open preview or full view
pub fn render_rows_modal(frame: &mut Frame, app: &App) {
    let view = app.manager.view();
    let (record, full) = match view {
        ViewState::PreviewOpen { record, .. } => (record, false),
        ViewState::FullViewOpen { record, .. } => (record, true),
        _ => return,
    };

    let area = centered_rect(90, 80, frame.area());
    frame.render_widget(Clear, area);

    let total = view.rows().len();
    let title = if full {
        format!(" {} ({} rows) ", record.label(), total)
    } else {
        format!(" Preview: {} (first {} rows) ", record.label(), total)
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());

    if total == 0 {
        let empty = Paragraph::new(Span::styled("This dataset has no rows.", Theme::text_secondary()))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    // Borders and the header line take three rows.
    let visible = area.height.saturating_sub(3) as usize;
    let table = view.table_window(app.row_scroll, visible);
    frame.render_widget(table_widget(&table).block(block), area);
}

/// Table widget over already-shaped rows
pub fn table_widget(view: &TableView) -> Table<'static> {
    let widths: Vec<Constraint> = view
        .column_widths()
        .into_iter()
        .map(|w| Constraint::Length(w.min(MAX_COLUMN_WIDTH) as u16))
        .collect();

    let header = Row::new(view.headers.clone()).style(Theme::table_header());
    let rows: Vec<Row> = view
        .rows
        .iter()
        .map(|cells| Row::new(cells.clone()).style(Theme::text()))
        .collect();

    Table::new(rows, widths).header(header).column_spacing(2)
}
