// View modes of the dataset manager

use crate::models::{DatasetRecord, ResolvedDataset, Row};
use crate::table::TableView;

/// What the user is looking at. Exactly one mode at a time; each carries
/// only the data that mode needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Listing,
    /// At most `PREVIEW_ROW_LIMIT` rows.
    PreviewOpen {
        record: DatasetRecord,
        rows: Vec<Row>,
    },
    FullViewOpen {
        record: DatasetRecord,
        rows: Vec<Row>,
    },
    /// Control is delegated to the chat session.
    ChatActive {
        record: DatasetRecord,
        dataset: ResolvedDataset,
    },
}

impl ViewState {
    pub fn record(&self) -> Option<&DatasetRecord> {
        match self {
            ViewState::Listing => None,
            ViewState::PreviewOpen { record, .. }
            | ViewState::FullViewOpen { record, .. }
            | ViewState::ChatActive { record, .. } => Some(record),
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            ViewState::Listing => &[],
            ViewState::PreviewOpen { rows, .. } | ViewState::FullViewOpen { rows, .. } => rows,
            ViewState::ChatActive { dataset, .. } => &dataset.rows,
        }
    }

    pub fn table(&self) -> TableView {
        TableView::from_rows(self.rows())
    }

    /// At most `len` rows starting at `offset`, for drawing one screenful.
    pub fn table_window(&self, offset: usize, len: usize) -> TableView {
        TableView::window(self.rows(), offset, len)
    }

    pub fn is_listing(&self) -> bool {
        matches!(self, ViewState::Listing)
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, ViewState::ChatActive { .. })
    }
}

/// Which view a row fetch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsPurpose {
    Preview,
    FullView,
    Chat,
}

impl std::fmt::Display for RowsPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowsPurpose::Preview => write!(f, "preview"),
            RowsPurpose::FullView => write!(f, "full view"),
            RowsPurpose::Chat => write!(f, "chat"),
        }
    }
}

/// Coarse manager state, derived from session, list and view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No valid credential.
    Idle,
    /// First list fetch in flight.
    Loading,
    Ready,
    Previewing,
    FullViewing,
    ChatHandoff,
}

impl Phase {
    pub(crate) fn of_view(view: &ViewState) -> Self {
        match view {
            ViewState::Listing => Phase::Ready,
            ViewState::PreviewOpen { .. } => Phase::Previewing,
            ViewState::FullViewOpen { .. } => Phase::FullViewing,
            ViewState::ChatActive { .. } => Phase::ChatHandoff,
        }
    }
}
