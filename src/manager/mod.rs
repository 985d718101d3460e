//! Dataset Manager
//!
//! Owns the dataset collection, the selection and the view state, and
//! sequences every remote call against them. Operations are synchronous:
//! they validate locally, take a session ticket and spawn the remote call.
//! Completions come back as [`ManagerEvent`]s on a channel and are applied
//! by [`DatasetManager::poll_events`] (or awaited with
//! [`DatasetManager::next_event`]) in arrival order.
//!
//! Completion rules:
//! - a result whose ticket no longer matches the session is discarded
//! - list results replace the collection wholesale; the latest completion wins
//! - every successful mutation is followed by a list refresh
//! - row results apply only if they belong to the latest view request
//! - while the chat hand-off is active the collection is left untouched and
//!   refreshes are deferred until the chat ends

pub mod selection;
pub mod view;

#[cfg(test)]
mod tests;

pub use selection::SelectionSet;
pub use view::{Phase, RowsPurpose, ViewState};

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::DatasetApi;
use crate::models::{DatasetId, DatasetRecord, ResolvedDataset, Row, UploadFile};
use crate::session::{SessionContext, SessionTicket};
use crate::table::preview_rows;
use crate::types::{AppError, AppResult};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Completion of a spawned remote call.
#[derive(Debug)]
pub enum ManagerEvent {
    ListLoaded {
        ticket: SessionTicket,
        result: AppResult<Vec<DatasetRecord>>,
    },
    Uploaded {
        ticket: SessionTicket,
        file_name: String,
        result: AppResult<()>,
    },
    Deleted {
        ticket: SessionTicket,
        ids: Vec<DatasetId>,
        scope: DeleteScope,
        result: AppResult<()>,
    },
    RowsLoaded {
        ticket: SessionTicket,
        request: u64,
        record: DatasetRecord,
        purpose: RowsPurpose,
        result: AppResult<Vec<Row>>,
    },
}

/// How a batch delete was requested; decides what happens to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    One,
    Selected,
}

/// Transient outcome message for the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(AppError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(message) => write!(f, "{}", message),
            Notice::Error(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingView {
    request: u64,
    storage_name: String,
    purpose: RowsPurpose,
}

pub struct DatasetManager {
    api: Arc<dyn DatasetApi>,
    session: SessionContext,

    // Collection state
    datasets: Vec<DatasetRecord>,
    loaded: bool,
    selection: SelectionSet,
    view: ViewState,

    /// Session epoch this state belongs to; `None` while idle.
    epoch: Option<u64>,
    pending_view: Option<PendingView>,
    next_request: u64,
    in_flight: usize,
    refreshes_in_flight: usize,
    refresh_after_chat: bool,
    notice: Option<Notice>,

    event_tx: mpsc::Sender<ManagerEvent>,
    event_rx: mpsc::Receiver<ManagerEvent>,
}

impl DatasetManager {
    pub fn new(api: Arc<dyn DatasetApi>, session: SessionContext) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            session,
            datasets: Vec::new(),
            loaded: false,
            selection: SelectionSet::default(),
            view: ViewState::Listing,
            epoch: None,
            pending_view: None,
            next_request: 0,
            in_flight: 0,
            refreshes_in_flight: 0,
            refresh_after_chat: false,
            notice: None,
            event_tx,
            event_rx,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn datasets(&self) -> &[DatasetRecord] {
        &self.datasets
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn phase(&self) -> Phase {
        if self.epoch.is_none() || !self.session.is_authenticated() {
            Phase::Idle
        } else if !self.loaded && self.refreshes_in_flight > 0 {
            Phase::Loading
        } else {
            Phase::of_view(&self.view)
        }
    }

    /// True while any remote call issued by the manager is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// The view a row fetch is currently pending for, if any.
    pub fn pending_rows(&self) -> Option<(&str, RowsPurpose)> {
        self.pending_view
            .as_ref()
            .map(|p| (p.storage_name.as_str(), p.purpose))
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Payload of the active chat hand-off.
    pub fn resolved_dataset(&self) -> Option<&ResolvedDataset> {
        match &self.view {
            ViewState::ChatActive { dataset, .. } => Some(dataset),
            _ => None,
        }
    }

    pub fn find(&self, storage_name: &str) -> Option<&DatasetRecord> {
        self.datasets
            .iter()
            .find(|r| r.storage_name == storage_name)
    }

    // ---------------------------------------------------------------------
    // Session tracking
    // ---------------------------------------------------------------------

    /// Bring the manager in line with the session: reset on logout, expiry
    /// or a different login, and load the list on a fresh activation.
    pub fn activate(&mut self) {
        if self.sync_session() {
            self.issue_refresh();
        }
    }

    /// Returns true when a new session was picked up.
    fn sync_session(&mut self) -> bool {
        let current = self
            .session
            .is_authenticated()
            .then(|| self.session.epoch());
        if current == self.epoch {
            return false;
        }

        if self.epoch.is_some() {
            info!("Session changed, clearing dataset state");
        }
        self.reset();
        self.epoch = current;
        current.is_some()
    }

    fn reset(&mut self) {
        self.datasets.clear();
        self.loaded = false;
        self.selection.clear();
        self.view = ViewState::Listing;
        self.pending_view = None;
        self.refresh_after_chat = false;
    }

    fn ticket(&mut self) -> AppResult<SessionTicket> {
        let ticket = self.session.ticket();
        if ticket.is_err() {
            // The ticket check may just have expired the credential.
            self.sync_session();
        }
        ticket
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Fetch the collection. Rejected while the chat hand-off is active.
    pub fn refresh_list(&mut self) -> AppResult<()> {
        if self.sync_session() {
            return self.issue_refresh_checked();
        }
        if self.view.is_chat() {
            return Err(AppError::InvalidRequest(
                "The dataset list cannot be refreshed during a chat".to_string(),
            ));
        }
        self.issue_refresh_checked()
    }

    fn issue_refresh(&mut self) {
        if let Err(e) = self.issue_refresh_checked() {
            self.fail(e);
        }
    }

    fn issue_refresh_checked(&mut self) -> AppResult<()> {
        let ticket = self.ticket()?;
        self.refreshes_in_flight += 1;
        debug!("Requesting dataset list");

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let result = api.list(&ticket.token).await;
            ManagerEvent::ListLoaded { ticket, result }
        });
        Ok(())
    }

    /// Refresh after a mutation, or remember to once the chat ends.
    fn request_refresh(&mut self) {
        if self.view.is_chat() {
            self.refresh_after_chat = true;
        } else {
            self.issue_refresh();
        }
    }

    pub fn upload_dataset(&mut self, file: UploadFile) -> AppResult<()> {
        self.activate();
        self.ensure_not_in_chat()?;
        if !file.has_csv_extension() {
            return Err(AppError::InvalidRequest(format!(
                "{} is not a .csv file",
                file.file_name
            )));
        }

        let ticket = self.ticket()?;
        info!(file = %file.file_name, bytes = file.content.len(), "Uploading dataset");

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let file_name = file.file_name.clone();
            let result = api.upload(&ticket.token, file).await;
            ManagerEvent::Uploaded {
                ticket,
                file_name,
                result,
            }
        });
        Ok(())
    }

    /// Delete the dataset listed under `storage_name`. Resolution happens
    /// against the current collection; an unknown name never reaches the
    /// server.
    pub fn delete_one(&mut self, storage_name: &str) -> AppResult<()> {
        self.activate();
        self.ensure_not_in_chat()?;
        let ticket = self.ticket()?;
        let id = self
            .find(storage_name)
            .map(|r| r.id.clone())
            .ok_or_else(|| AppError::NotFound(storage_name.to_string()))?;

        self.issue_delete(ticket, vec![id], DeleteScope::One);
        Ok(())
    }

    /// Delete every selected dataset in one batch call.
    pub fn delete_selected(&mut self) -> AppResult<()> {
        self.activate();
        self.ensure_not_in_chat()?;
        if self.selection.is_empty() {
            return Err(AppError::InvalidRequest(
                "No datasets selected".to_string(),
            ));
        }
        let ticket = self.ticket()?;
        let ids = self.selection.to_vec();

        self.issue_delete(ticket, ids, DeleteScope::Selected);
        Ok(())
    }

    fn issue_delete(&mut self, ticket: SessionTicket, ids: Vec<DatasetId>, scope: DeleteScope) {
        info!(count = ids.len(), ?scope, "Deleting datasets");

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let result = api.delete_many(&ticket.token, &ids).await;
            ManagerEvent::Deleted {
                ticket,
                ids,
                scope,
                result,
            }
        });
    }

    /// Include or exclude a listed dataset from the selection. Ids that are
    /// not in the current collection are ignored.
    pub fn toggle_select(&mut self, id: &DatasetId, included: bool) -> bool {
        self.selection.toggle(id, included, &self.datasets)
    }

    /// Open the first rows of a dataset.
    pub fn preview(&mut self, record: &DatasetRecord) -> AppResult<()> {
        self.request_rows(record, RowsPurpose::Preview)
    }

    pub fn open_full_view(&mut self, record: &DatasetRecord) -> AppResult<()> {
        self.request_rows(record, RowsPurpose::FullView)
    }

    /// Hand a dataset to the chat session. Rows already open in the full
    /// view are reused; otherwise they are fetched first.
    pub fn start_chat(&mut self, record: &DatasetRecord) -> AppResult<()> {
        self.activate();
        self.ensure_not_in_chat()?;

        let reusable = matches!(
            &self.view,
            ViewState::FullViewOpen { record: open, .. } if open.storage_name == record.storage_name
        );
        if reusable {
            if let ViewState::FullViewOpen { record, rows } = mem::take(&mut self.view) {
                info!(dataset = %record.label(), rows = rows.len(), "Starting chat from full view");
                let dataset = ResolvedDataset::new(&record, rows);
                self.view = ViewState::ChatActive { record, dataset };
                self.pending_view = None;
            }
            return Ok(());
        }

        self.request_rows(record, RowsPurpose::Chat)
    }

    fn request_rows(&mut self, record: &DatasetRecord, purpose: RowsPurpose) -> AppResult<()> {
        self.activate();
        self.ensure_not_in_chat()?;
        let ticket = self.ticket()?;

        self.next_request += 1;
        let request = self.next_request;
        self.pending_view = Some(PendingView {
            request,
            storage_name: record.storage_name.clone(),
            purpose,
        });
        debug!(dataset = %record.storage_name, %purpose, request, "Requesting rows");

        let api = Arc::clone(&self.api);
        let record = record.clone();
        self.spawn_call(async move {
            let result = api.fetch_rows(&ticket.token, &record.storage_name).await;
            ManagerEvent::RowsLoaded {
                ticket,
                request,
                record,
                purpose,
                result,
            }
        });
        Ok(())
    }

    /// Close the preview or full view, abandoning any pending row fetch.
    pub fn close_view(&mut self) {
        if self.view.is_chat() {
            return;
        }
        self.view = ViewState::Listing;
        self.pending_view = None;
    }

    /// Leave the chat hand-off. The resolved payload is dropped and the
    /// collection is exactly what it was before the chat started, plus any
    /// refresh that was deferred meanwhile.
    pub fn exit_chat(&mut self) {
        if !self.view.is_chat() {
            return;
        }
        self.view = ViewState::Listing;
        info!("Chat ended");

        if mem::take(&mut self.refresh_after_chat) {
            self.issue_refresh();
        }
    }

    fn ensure_not_in_chat(&self) -> AppResult<()> {
        if self.view.is_chat() {
            Err(AppError::InvalidRequest(
                "Leave the chat before changing datasets".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    // ---------------------------------------------------------------------
    // Event handling
    // ---------------------------------------------------------------------

    fn spawn_call<F>(&mut self, call: F)
    where
        F: Future<Output = ManagerEvent> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = call.await;
            tx.send(event).await.ok();
        });
    }

    /// Apply every completion that has already arrived.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it. Returns false when
    /// nothing is in flight.
    pub async fn next_event(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.event_rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply completions until no remote call is outstanding.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    pub fn apply(&mut self, event: ManagerEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let ManagerEvent::ListLoaded { .. } = event {
            self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
        }

        self.activate();
        let ticket = match &event {
            ManagerEvent::ListLoaded { ticket, .. }
            | ManagerEvent::Uploaded { ticket, .. }
            | ManagerEvent::Deleted { ticket, .. }
            | ManagerEvent::RowsLoaded { ticket, .. } => ticket,
        };
        if !self.session.is_current(ticket) {
            debug!(epoch = ticket.epoch, "Discarding result issued under a previous session");
            return;
        }

        match event {
            ManagerEvent::ListLoaded { result, .. } => self.on_list_loaded(result),
            ManagerEvent::Uploaded {
                file_name, result, ..
            } => self.on_uploaded(file_name, result),
            ManagerEvent::Deleted {
                ids, scope, result, ..
            } => self.on_deleted(ids, scope, result),
            ManagerEvent::RowsLoaded {
                request,
                record,
                purpose,
                result,
                ..
            } => self.on_rows_loaded(request, record, purpose, result),
        }
    }

    fn on_list_loaded(&mut self, result: AppResult<Vec<DatasetRecord>>) {
        match result {
            Ok(records) => {
                if self.view.is_chat() {
                    debug!("Holding list result until the chat ends");
                    self.refresh_after_chat = true;
                    return;
                }
                debug!(count = records.len(), "Dataset list loaded");
                self.datasets = records;
                self.loaded = true;
                self.selection.retain_listed(&self.datasets);
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_uploaded(&mut self, file_name: String, result: AppResult<()>) {
        match result {
            Ok(()) => {
                info!(file = %file_name, "Dataset uploaded");
                self.notice = Some(Notice::Info(format!("Uploaded {}", file_name)));
                self.request_refresh();
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_deleted(&mut self, ids: Vec<DatasetId>, scope: DeleteScope, result: AppResult<()>) {
        match result {
            Ok(()) => {
                info!(count = ids.len(), "Datasets deleted");
                match scope {
                    DeleteScope::One => self.selection.remove_all(&ids),
                    DeleteScope::Selected => self.selection.clear(),
                }
                let noun = if ids.len() == 1 { "dataset" } else { "datasets" };
                self.notice = Some(Notice::Info(format!("Deleted {} {}", ids.len(), noun)));
                self.request_refresh();
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_rows_loaded(
        &mut self,
        request: u64,
        record: DatasetRecord,
        purpose: RowsPurpose,
        result: AppResult<Vec<Row>>,
    ) {
        if self.pending_view.as_ref().map(|p| p.request) != Some(request) {
            debug!(request, dataset = %record.storage_name, "Dropping superseded row result");
            return;
        }
        self.pending_view = None;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => return self.fail(e),
        };
        debug!(dataset = %record.storage_name, rows = rows.len(), %purpose, "Rows loaded");

        self.view = match purpose {
            RowsPurpose::Preview => ViewState::PreviewOpen {
                record,
                rows: preview_rows(rows),
            },
            RowsPurpose::FullView => ViewState::FullViewOpen { record, rows },
            RowsPurpose::Chat => {
                info!(dataset = %record.label(), "Starting chat");
                let dataset = ResolvedDataset::new(&record, rows);
                ViewState::ChatActive { record, dataset }
            }
        };
    }

    /// Record a failed remote call. State is left as it was; a rejected
    /// credential ends the session.
    fn fail(&mut self, error: AppError) {
        warn!(error = %error, "Dataset operation failed");
        if error.invalidates_session() {
            self.session.expire();
            self.sync_session();
        }
        self.notice = Some(Notice::Error(error));
    }
}
