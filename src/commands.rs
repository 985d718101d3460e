//! One-shot commands
//!
//! Non-interactive front end over the same dataset manager the TUI drives.
//! Each command issues its operations, waits for every completion and
//! turns the manager's notice into a result.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::api::AuthApi;
use crate::manager::{DatasetManager, Notice};
use crate::models::{DatasetRecord, UploadFile};
use crate::session::{self, CredentialStore, SessionContext};
use crate::table::TableView;
use crate::types::{AppError, AppResult};

/// Environment variable read by `login` before prompting for a password.
pub const PASSWORD_ENV: &str = "DATADESK_PASSWORD";

/// Apply every outstanding completion and surface the outcome.
async fn settle(manager: &mut DatasetManager, out: &mut impl Write) -> AppResult<()> {
    manager.settle().await;
    match manager.take_notice() {
        Some(Notice::Error(e)) => Err(e),
        Some(Notice::Info(message)) => {
            writeln!(out, "{}", message).map_err(io_error)?;
            Ok(())
        }
        None => Ok(()),
    }
}

fn io_error(e: io::Error) -> AppError {
    AppError::Internal(e.to_string())
}

async fn load(manager: &mut DatasetManager, out: &mut impl Write) -> AppResult<()> {
    manager.refresh_list()?;
    settle(manager, out).await
}

/// A dataset by storage name, or by display name when that is unambiguous.
fn resolve(manager: &DatasetManager, name: &str) -> AppResult<DatasetRecord> {
    if let Some(record) = manager.find(name) {
        return Ok(record.clone());
    }
    let mut by_label = manager.datasets().iter().filter(|r| r.label() == name);
    match (by_label.next(), by_label.next()) {
        (Some(record), None) => Ok(record.clone()),
        (Some(_), Some(_)) => Err(AppError::InvalidRequest(format!(
            "{} matches several datasets, use the storage name",
            name
        ))),
        _ => Err(AppError::NotFound(name.to_string())),
    }
}

pub async fn list(manager: &mut DatasetManager, out: &mut impl Write) -> AppResult<()> {
    load(manager, out).await?;

    if manager.datasets().is_empty() {
        writeln!(out, "No datasets uploaded").map_err(io_error)?;
        return Ok(());
    }

    let table = TableView {
        headers: ["id", "file", "storage name", "uploaded by", "status"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        rows: manager
            .datasets()
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.label().to_string(),
                    r.storage_name.clone(),
                    r.uploader.clone(),
                    r.status.clone(),
                ]
            })
            .collect(),
    };
    write!(out, "{}", render_text_table(&table)).map_err(io_error)
}

pub async fn upload(manager: &mut DatasetManager, path: &Path, out: &mut impl Write) -> AppResult<()> {
    let file = UploadFile::from_path(path)
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Cannot read {}: {}", path.display(), e)))?;

    manager.upload_dataset(file)?;
    settle(manager, out).await
}

pub async fn preview(
    manager: &mut DatasetManager,
    name: &str,
    full: bool,
    out: &mut impl Write,
) -> AppResult<()> {
    load(manager, out).await?;
    let record = resolve(manager, name)?;

    if full {
        manager.open_full_view(&record)?;
    } else {
        manager.preview(&record)?;
    }
    settle(manager, out).await?;

    let table = manager.view().table();
    if table.headers.is_empty() {
        writeln!(out, "{} has no rows", record.label()).map_err(io_error)?;
    } else {
        write!(out, "{}", render_text_table(&table)).map_err(io_error)?;
    }
    manager.close_view();
    Ok(())
}

/// One name goes through single delete; several go through the selection
/// and one batch call.
pub async fn delete(
    manager: &mut DatasetManager,
    names: &[String],
    out: &mut impl Write,
) -> AppResult<()> {
    load(manager, out).await?;

    let records = names
        .iter()
        .map(|name| resolve(manager, name))
        .collect::<AppResult<Vec<_>>>()?;

    match records.as_slice() {
        [] => return Err(AppError::InvalidRequest("No datasets named".to_string())),
        [record] => manager.delete_one(&record.storage_name)?,
        many => {
            for record in many {
                manager.toggle_select(&record.id, true);
            }
            manager.delete_selected()?;
        }
    }
    settle(manager, out).await
}

/// Log in and, when a store is given, remember the session.
pub async fn login(
    api: &dyn AuthApi,
    session: &SessionContext,
    store: Option<&CredentialStore>,
    email: Option<String>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => prompt("Password: ")?,
    };

    let credential = session::login(api, session, &email, &password).await?;
    if let Some(store) = store {
        store.save(&credential).await?;
    }
    writeln!(out, "Logged in as {}", credential.identity)?;
    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Plain-text rendering of a table with space-padded columns.
pub fn render_text_table(table: &TableView) -> String {
    let widths = table.column_widths();
    let mut text = String::new();

    let mut push_line = |cells: &[String]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        text.push_str(line.join("  ").trim_end());
        text.push('\n');
    };

    push_line(&table.headers);
    for row in &table.rows {
        push_line(row);
    }
    text
}
