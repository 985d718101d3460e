// Datadesk - terminal client for uploaded CSV datasets

pub mod api;
pub mod commands;
pub mod config;
pub mod manager;
pub mod models;
pub mod session;
pub mod table;
pub mod tui;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use manager::DatasetManager;
pub use session::SessionContext;
pub use types::{AppError, AppResult};
