//! Turns terminal input and a timer into `AppAction`s. Keys that mean
//! different things on different screens arrive as `Input` and are
//! interpreted by the app.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum AppAction {
    /// Quit the application (confirmed if calls are in flight)
    Quit,
    /// Force quit without confirmation
    ForceQuit,
    /// Enter key
    Submit,
    ToggleHelp,
    /// Escape - close modals, leave the chat hand-off
    Escape,
    Up,
    Down,
    PageUp,
    PageDown,
    /// Tab
    NextField,
    /// Shift+Tab
    PrevField,
    /// Any other key; meaning depends on the screen
    Input(KeyEvent),
    /// Timer tick: pick up session changes, advance the spinner
    Tick,
}

const ACTION_CHANNEL_CAPACITY: usize = 100;

/// Terminal input and ticks, merged into one action stream.
pub struct EventHandler {
    rx: mpsc::Receiver<AppAction>,
    pump: JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel(ACTION_CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump(tx, tick_rate));
        Self { rx, pump }
    }

    /// Wait for the next action. `None` once the input stream has ended.
    pub async fn next(&mut self) -> Option<AppAction> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(tx: mpsc::Sender<AppAction>, tick_rate: Duration) {
    let mut reader = EventStream::new();
    let mut ticks = tokio::time::interval(tick_rate);

    loop {
        let action = tokio::select! {
            _ = ticks.tick() => Some(AppAction::Tick),
            event = reader.next().fuse() => match event {
                Some(Ok(event)) => map_event(event),
                Some(Err(_)) => None,
                None => break,
            },
        };

        if let Some(action) = action {
            if tx.send(action).await.is_err() {
                break;
            }
        }
    }
}

/// Map a crossterm event to an app action
fn map_event(event: Event) -> Option<AppAction> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => map_key_event(key),
        _ => None,
    }
}

/// Map a key event to an app action
pub fn map_key_event(key: KeyEvent) -> Option<AppAction> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(AppAction::ForceQuit),
        (KeyModifiers::CONTROL, KeyCode::Char('q')) => Some(AppAction::Quit),
        (KeyModifiers::SHIFT, KeyCode::BackTab) => Some(AppAction::PrevField),

        (KeyModifiers::NONE, code) | (KeyModifiers::SHIFT, code) => match code {
            KeyCode::Esc => Some(AppAction::Escape),
            KeyCode::Enter => Some(AppAction::Submit),
            KeyCode::F(1) => Some(AppAction::ToggleHelp),

            KeyCode::Up => Some(AppAction::Up),
            KeyCode::Down => Some(AppAction::Down),
            KeyCode::PageUp => Some(AppAction::PageUp),
            KeyCode::PageDown => Some(AppAction::PageDown),

            KeyCode::Tab => Some(AppAction::NextField),
            KeyCode::BackTab => Some(AppAction::PrevField),

            _ => Some(AppAction::Input(key)),
        },

        // Other combinations go to text inputs as-is
        _ => Some(AppAction::Input(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(modifiers: KeyModifiers, code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn control_shortcuts() {
        assert!(matches!(
            map_key_event(key(KeyModifiers::CONTROL, KeyCode::Char('c'))),
            Some(AppAction::ForceQuit)
        ));
        assert!(matches!(
            map_key_event(key(KeyModifiers::CONTROL, KeyCode::Char('q'))),
            Some(AppAction::Quit)
        ));
    }

    #[test]
    fn letters_are_left_to_the_screen() {
        assert!(matches!(
            map_key_event(key(KeyModifiers::NONE, KeyCode::Char('d'))),
            Some(AppAction::Input(_))
        ));
        assert!(matches!(
            map_key_event(key(KeyModifiers::SHIFT, KeyCode::Char('D'))),
            Some(AppAction::Input(_))
        ));
        assert!(matches!(
            map_key_event(key(KeyModifiers::NONE, KeyCode::Enter)),
            Some(AppAction::Submit)
        ));
    }
}
