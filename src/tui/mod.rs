//! Terminal User Interface Module
//!
//! Terminal front end for the dataset manager, built with Ratatui.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           datadesk  CSV datasets  ✓ ana@example.com  ⠋          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─ Datasets (3, 1 selected) ──────────────────────────────┐   │
//! │  │     File             Uploaded by          Status         │   │
//! │  │ ▶[x] inv1.csv        ana@example.com      processed      │   │
//! │  │  [ ] inv2.csv        ana@example.com      processed      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │  Ready │ [Space] Select [Enter] Preview [u] Upload [F1] Help   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Preview and full view open as modals over the list; the chat hand-off
//! replaces it until the user goes back.

pub mod app;
pub mod event;
pub mod theme;
pub mod ui;
pub mod widgets;

pub use app::{App, AppEvent, LoginField, Overlay};
pub use event::{AppAction, EventHandler};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use tracing::{error, info};

/// Type alias for our terminal backend
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state
pub fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI application
pub async fn run(mut app: App) -> anyhow::Result<()> {
    info!("Starting TUI mode");

    let mut terminal = init_terminal()?;
    let mut events = EventHandler::new(app.config.ui.tick_rate());

    app.manager.activate();
    let result = run_app(&mut terminal, &mut app, &mut events).await;

    if let Err(e) = restore_terminal(&mut terminal) {
        error!("Failed to restore terminal: {}", e);
    }

    result
}

/// Main application loop
async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> anyhow::Result<()> {
    loop {
        app.poll_events();
        terminal.draw(|frame| ui::render(frame, app))?;

        // Ticks keep this from blocking for longer than the tick rate.
        match events.next().await {
            Some(action) => app.handle_action(action),
            None => break,
        }

        if app.should_quit {
            break;
        }
    }

    info!("TUI exited normally");
    Ok(())
}
