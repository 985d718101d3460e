use clap::{Parser, Subcommand};
use datadesk::{
    api::HttpApi,
    commands,
    config::Config,
    manager::DatasetManager,
    session::{CredentialStore, SessionContext},
    tui::{self, App},
    utils::{init_logger, LogTarget},
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Manage uploaded CSV datasets and hand them to the assistant
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (default: datadesk.toml in the working directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// List uploaded datasets
    List,
    /// Upload a .csv file
    Upload { file: PathBuf },
    /// Print the first rows of a dataset (all rows with --full)
    Preview {
        /// Storage name or file name
        name: String,
        #[arg(long)]
        full: bool,
    },
    /// Delete one or more datasets
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Log in; the password is read from DATADESK_PASSWORD or prompted for
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load(Some(path))?
        }
        None => Config::from_env()?,
    };

    let command = cli.command.unwrap_or(Command::Tui);
    let target = match command {
        Command::Tui => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    let _guard = init_logger(&config.log, target)?;
    info!(base_url = %config.api.base_url, "Configuration loaded");

    let api = Arc::new(HttpApi::from_config(&config.api)?);
    let store = Arc::new(CredentialStore::new(config.session.store_dir()));

    // Restore the remembered session, if any
    let session = SessionContext::new();
    let remembered = if config.session.remember {
        store.load().await.unwrap_or_else(|e| {
            warn!("Ignoring stored session: {}", e);
            None
        })
    } else {
        None
    };
    session.restore(remembered);

    let mut manager = DatasetManager::new(api.clone(), session.clone());
    let mut out = io::stdout();

    match command {
        Command::Tui => {
            let store = config.session.remember.then(|| store.clone());
            let app = App::new(config, manager, api, store);
            tui::run(app).await?;
        }
        Command::Login { email } => {
            let store = config.session.remember.then_some(store.as_ref());
            commands::login(api.as_ref(), &session, store, email, &mut out).await?;
        }
        Command::Logout => {
            session.logout();
            store.clear().await?;
            println!("Logged out");
        }
        Command::List => commands::list(&mut manager, &mut out).await?,
        Command::Upload { file } => commands::upload(&mut manager, &file, &mut out).await?,
        Command::Preview { name, full } => {
            commands::preview(&mut manager, &name, full, &mut out).await?
        }
        Command::Delete { names } => commands::delete(&mut manager, &names, &mut out).await?,
    }

    Ok(())
}
