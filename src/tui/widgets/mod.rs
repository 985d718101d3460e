//! TUI Widgets
//!
//! Screens and modals drawn by `ui::render`.

mod chat;
mod login;
mod rows;

pub use chat::render_chat_handoff;
pub use login::render_login;
pub use rows::{render_rows_modal, table_widget};
