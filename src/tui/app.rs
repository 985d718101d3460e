//! Application State
//!
//! Front-end state around the dataset manager: login form, list cursor,
//! overlays and the status line. All dataset semantics live in the manager;
//! this module only maps keys to manager operations.

use crate::api::AuthApi;
use crate::config::Config;
use crate::manager::{DatasetManager, Notice};
use crate::models::{DatasetRecord, UploadFile};
use crate::session::{self, AuthState, Credential, CredentialStore, SessionContext};
use crate::tui::event::AppAction;
use crate::types::{AppError, AppResult};
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tui_textarea::TextArea;

/// Rows moved by PageUp/PageDown
const PAGE: usize = 10;

/// Modal drawn over the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Help,
    /// Path prompt for a new upload
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

/// Completions of work the front end spawns itself
#[derive(Debug)]
pub enum AppEvent {
    LoginFinished(AppResult<Credential>),
    FileRead(AppResult<UploadFile>),
}

/// Main application state
pub struct App {
    pub config: Config,
    pub manager: DatasetManager,
    session: SessionContext,
    auth_api: Arc<dyn AuthApi>,
    store: Option<Arc<CredentialStore>>,

    // UI State
    pub should_quit: bool,
    quit_requested: bool,
    pub overlay: Overlay,
    pub tick: usize,
    pub status: Option<Notice>,

    // Login form
    pub email: TextArea<'static>,
    pub password: TextArea<'static>,
    pub login_field: LoginField,
    pub login_error: Option<String>,
    pub login_pending: bool,

    // Dataset list
    pub cursor: usize,
    pub row_scroll: usize,
    pub upload_path: TextArea<'static>,

    // Async communication
    event_rx: mpsc::Receiver<AppEvent>,
    event_tx: mpsc::Sender<AppEvent>,
}

fn text_input(placeholder: &str) -> TextArea<'static> {
    let mut input = TextArea::default();
    input.set_cursor_line_style(ratatui::style::Style::default());
    input.set_placeholder_text(placeholder.to_string());
    input
}

fn password_input() -> TextArea<'static> {
    let mut input = text_input("Password");
    input.set_mask_char('\u{2022}');
    input
}

fn first_line(input: &TextArea<'_>) -> String {
    input.lines().first().cloned().unwrap_or_default()
}

impl App {
    pub fn new(
        config: Config,
        manager: DatasetManager,
        auth_api: Arc<dyn AuthApi>,
        store: Option<Arc<CredentialStore>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(100);
        let session = manager.session().clone();

        Self {
            config,
            manager,
            session,
            auth_api,
            store,
            should_quit: false,
            quit_requested: false,
            overlay: Overlay::None,
            tick: 0,
            status: None,
            email: text_input("Email"),
            password: password_input(),
            login_field: LoginField::Email,
            login_error: None,
            login_pending: false,
            cursor: 0,
            row_scroll: 0,
            upload_path: text_input("Path to a .csv file"),
            event_rx: rx,
            event_tx: tx,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    pub fn identity(&self) -> Option<String> {
        self.session.identity()
    }

    /// Dataset under the list cursor
    pub fn current_record(&self) -> Option<&DatasetRecord> {
        self.manager.datasets().get(self.cursor)
    }

    /// Poll for async events
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
        }

        self.manager.poll_events();
        if let Some(notice) = self.manager.take_notice() {
            self.status = Some(notice);
        }
        self.clamp_cursor();
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::LoginFinished(result) => {
                self.login_pending = false;
                match result {
                    Ok(credential) => {
                        self.password = password_input();
                        self.login_field = LoginField::Email;
                        self.login_error = None;
                        self.status = Some(Notice::Info(format!(
                            "Logged in as {}",
                            credential.identity
                        )));
                        self.manager.activate();
                    }
                    Err(e) => {
                        self.login_error = Some(e.to_string());
                    }
                }
            }
            AppEvent::FileRead(Ok(file)) => {
                let result = self.manager.upload_dataset(file);
                self.report(result);
            }
            AppEvent::FileRead(Err(e)) => {
                self.status = Some(Notice::Error(e));
            }
        }
    }

    fn report(&mut self, result: AppResult<()>) {
        if let Err(e) = result {
            self.status = Some(Notice::Error(e));
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.manager.datasets().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    /// Handle a user action
    pub fn handle_action(&mut self, action: AppAction) {
        if !matches!(action, AppAction::Quit | AppAction::Tick) {
            self.quit_requested = false;
        }

        match action {
            AppAction::ForceQuit => self.should_quit = true,
            AppAction::Quit => self.request_quit(),
            AppAction::Tick => self.on_tick(),
            AppAction::ToggleHelp => {
                self.overlay = if self.overlay == Overlay::Help {
                    Overlay::None
                } else {
                    Overlay::Help
                };
            }
            _ if self.overlay == Overlay::Help => self.overlay = Overlay::None,
            _ if self.overlay == Overlay::Upload => self.handle_upload_prompt(action),
            _ if !self.is_logged_in() => self.handle_login_form(action),
            _ => self.handle_datasets(action),
        }
    }

    fn request_quit(&mut self) {
        if self.manager.is_busy() && !self.quit_requested {
            self.quit_requested = true;
            self.status = Some(Notice::Info(
                "Requests still in flight, press Ctrl+Q again to quit".to_string(),
            ));
        } else {
            self.should_quit = true;
        }
    }

    fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.manager.activate();
    }

    // ---------------------------------------------------------------------
    // Login form
    // ---------------------------------------------------------------------

    fn handle_login_form(&mut self, action: AppAction) {
        if self.login_pending {
            return;
        }
        match action {
            AppAction::NextField | AppAction::PrevField | AppAction::Up | AppAction::Down => {
                self.login_field = match self.login_field {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            AppAction::Submit => match self.login_field {
                LoginField::Email => self.login_field = LoginField::Password,
                LoginField::Password => self.submit_login(),
            },
            AppAction::Escape => self.login_error = None,
            AppAction::Input(key) => {
                match self.login_field {
                    LoginField::Email => self.email.input(key),
                    LoginField::Password => self.password.input(key),
                };
            }
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        let email = first_line(&self.email);
        let password = first_line(&self.password);

        self.login_pending = true;
        self.login_error = None;

        let api = Arc::clone(&self.auth_api);
        let session = self.session.clone();
        let store = if self.config.session.remember {
            self.store.clone()
        } else {
            None
        };
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = session::login(api.as_ref(), &session, &email, &password).await;
            if let (Ok(credential), Some(store)) = (&result, store) {
                if let Err(e) = store.save(credential).await {
                    warn!("Failed to remember session: {}", e);
                }
            }
            tx.send(AppEvent::LoginFinished(result)).await.ok();
        });
    }

    fn logout(&mut self) {
        self.session.logout();
        if let Some(store) = self.store.clone() {
            tokio::spawn(async move {
                if let Err(e) = store.clear().await {
                    warn!("Failed to clear stored session: {}", e);
                }
            });
        }
        self.manager.activate();
        self.cursor = 0;
        self.row_scroll = 0;
        self.status = Some(Notice::Info("Logged out".to_string()));
        info!("User logged out");
    }

    // ---------------------------------------------------------------------
    // Datasets
    // ---------------------------------------------------------------------

    fn handle_datasets(&mut self, action: AppAction) {
        let view = self.manager.view();
        let (listing, chat) = (view.is_listing(), view.is_chat());
        if listing {
            self.handle_listing(action);
        } else if chat {
            self.handle_chat(action);
        } else {
            self.handle_rows_view(action);
        }
    }

    fn handle_listing(&mut self, action: AppAction) {
        let len = self.manager.datasets().len();
        match action {
            AppAction::Up => self.cursor = self.cursor.saturating_sub(1),
            AppAction::Down => {
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
            }
            AppAction::PageUp => self.cursor = self.cursor.saturating_sub(PAGE),
            AppAction::PageDown => self.cursor = (self.cursor + PAGE).min(len.saturating_sub(1)),
            AppAction::Submit => self.open_rows(RowsKey::Preview),
            AppAction::Escape => {
                if self.manager.pending_rows().is_some() {
                    self.manager.close_view();
                }
            }
            AppAction::Input(key) => self.handle_listing_key(key),
            _ => {}
        }
    }

    fn handle_listing_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('r') => {
                let result = self.manager.refresh_list();
                self.report(result);
            }
            KeyCode::Char('u') => {
                self.upload_path = text_input("Path to a .csv file");
                self.overlay = Overlay::Upload;
            }
            KeyCode::Char('d') => {
                let result = self.manager.delete_selected();
                self.report(result);
            }
            KeyCode::Char('x') => {
                if let Some(name) = self.current_record().map(|r| r.storage_name.clone()) {
                    let result = self.manager.delete_one(&name);
                    self.report(result);
                }
            }
            KeyCode::Char('p') => self.open_rows(RowsKey::Preview),
            KeyCode::Char('v') => self.open_rows(RowsKey::FullView),
            KeyCode::Char('c') => self.open_rows(RowsKey::Chat),
            KeyCode::Char('L') => self.logout(),
            KeyCode::Char('?') => self.overlay = Overlay::Help,
            _ => {}
        }
    }

    fn toggle_current(&mut self) {
        if let Some(id) = self.current_record().map(|r| r.id.clone()) {
            let included = !self.manager.selection().contains(&id);
            self.manager.toggle_select(&id, included);
        }
    }

    fn open_rows(&mut self, key: RowsKey) {
        let Some(record) = self.current_record().cloned() else {
            return;
        };
        self.row_scroll = 0;
        let result = match key {
            RowsKey::Preview => self.manager.preview(&record),
            RowsKey::FullView => self.manager.open_full_view(&record),
            RowsKey::Chat => self.manager.start_chat(&record),
        };
        self.report(result);
    }

    fn handle_rows_view(&mut self, action: AppAction) {
        let rows = self.manager.view().rows().len();
        match action {
            AppAction::Escape => {
                self.manager.close_view();
                self.row_scroll = 0;
            }
            AppAction::Up => self.row_scroll = self.row_scroll.saturating_sub(1),
            AppAction::Down => self.row_scroll = (self.row_scroll + 1).min(rows.saturating_sub(1)),
            AppAction::PageUp => self.row_scroll = self.row_scroll.saturating_sub(PAGE),
            AppAction::PageDown => {
                self.row_scroll = (self.row_scroll + PAGE).min(rows.saturating_sub(1))
            }
            AppAction::Input(key) => {
                let Some(record) = self.manager.view().record().cloned() else {
                    return;
                };
                let result = match key.code {
                    KeyCode::Char('v') => self.manager.open_full_view(&record),
                    KeyCode::Char('c') => self.manager.start_chat(&record),
                    KeyCode::Char('q') => {
                        self.manager.close_view();
                        Ok(())
                    }
                    _ => Ok(()),
                };
                self.row_scroll = 0;
                self.report(result);
            }
            _ => {}
        }
    }

    fn handle_chat(&mut self, action: AppAction) {
        let leave = match action {
            AppAction::Escape => true,
            AppAction::Input(key) => key.code == KeyCode::Char('b'),
            _ => false,
        };
        if leave {
            self.manager.exit_chat();
        }
    }

    // ---------------------------------------------------------------------
    // Upload prompt
    // ---------------------------------------------------------------------

    fn handle_upload_prompt(&mut self, action: AppAction) {
        match action {
            AppAction::Escape => self.overlay = Overlay::None,
            AppAction::Submit => {
                self.overlay = Overlay::None;
                let path = PathBuf::from(first_line(&self.upload_path).trim());
                if path.as_os_str().is_empty() {
                    return;
                }
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = UploadFile::from_path(&path)
                        .await
                        .map_err(|e| {
                            AppError::InvalidRequest(format!("Cannot read {}: {}", path.display(), e))
                        });
                    tx.send(AppEvent::FileRead(result)).await.ok();
                });
            }
            AppAction::Input(key) => {
                self.upload_path.input(key);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RowsKey {
    Preview,
    FullView,
    Chat,
}
