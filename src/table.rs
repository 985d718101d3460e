//! Tabular shaping of dataset rows for the preview and full views.
//!
//! Headers come from the first row's keys in the order the server sent them.
//! Every row is rendered against those headers, so a row missing a key gets
//! an empty cell and extra keys are not shown.

use crate::models::Row;
use serde_json::Value;

/// Rows preview shows at most. Display limit only; the fetch always returns
/// the full dataset.
pub const PREVIEW_ROW_LIMIT: usize = 10;

/// Rows laid out as a header line plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_rows(rows: &[Row]) -> Self {
        Self::window(rows, 0, rows.len())
    }

    /// Shape only `rows[offset..offset + len]`. Headers still come from the
    /// first row of the whole payload, so they do not shift while scrolling.
    pub fn window(rows: &[Row], offset: usize, len: usize) -> Self {
        let headers = headers_of(rows);
        let start = offset.min(rows.len());
        let end = start.saturating_add(len).min(rows.len());

        let rows = rows[start..end]
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| row.get(h).map(render_cell).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest cell per column (header included), in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        widths
    }
}

/// Column names of a payload: the first row's keys, in server order.
pub fn headers_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

/// First `PREVIEW_ROW_LIMIT` rows of a payload.
pub fn preview_rows(mut rows: Vec<Row>) -> Vec<Row> {
    rows.truncate(PREVIEW_ROW_LIMIT);
    rows
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
