use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

use agora::api::{ApiClient, LoginRequest, RegisterRequest};
use agora::app::{App, AppEvent};
use agora::config::{Config, API_URL_ENV};
use agora::session::{Session, SessionStore};
use agora::ui;

/// Environment variable holding the password for `login`/`register`.
const PASSWORD_ENV: &str = "AGORA_PASSWORD";

/// Get the config directory path (~/.config/agora/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("agora"))
}

#[derive(Parser, Debug)]
#[command(name = "agora", about = "Terminal client for community discussion forums")]
struct Args {
    /// API base URL (overrides config file and AGORA_API_URL)
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        email: String,
    },
    /// Create an account and store the session
    Register {
        name: String,
        email: String,
    },
}

/// Password from the environment, or one line of stdin.
fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}

fn init_logging(config_dir: &std::path::Path) -> Result<()> {
    let log_path = config_dir.join("agora.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn ensure_config_dir(config_dir: &std::path::Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    // user-only access to the directory holding the session token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;
    init_logging(&config_dir)?;

    let config = Config::load(&config_dir.join("config.toml"))
        .context("Failed to load config.toml")?
        .with_api_url_overrides(std::env::var(API_URL_ENV).ok(), args.api_url.clone());

    let store = SessionStore::new(config_dir.join("session.json"));
    let session = match store.load() {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable session file");
            eprintln!("Warning: {}; continuing without a session", e);
            None
        }
    };

    let client = ApiClient::new(&config.api_base_url, config.request_timeout())
        .with_context(|| format!("Cannot use API base URL '{}'", config.api_base_url))?;

    if let Some(command) = args.command {
        let session = authenticate(&client, command).await?;
        store.save(&session).context("Failed to save session")?;
        match session.user_id() {
            Some(id) => println!("Logged in as user {}.", id),
            None => println!("Logged in (no user id in token; posting will be disabled)."),
        }
        return Ok(());
    }

    if session.is_none() {
        println!("Not logged in. Run `agora login <email>` to post and comment.");
    }
    let client = client.with_session(session);
    let mut app = App::new(client, config);

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(64);
    ui::run(&mut app, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}

async fn authenticate(client: &ApiClient, command: Command) -> Result<Session> {
    let password = read_password()?;
    let session = match command {
        Command::Login { email } => client
            .login(&LoginRequest { email, password })
            .await
            .context("Login failed")?,
        Command::Register { name, email } => client
            .register(&RegisterRequest {
                name,
                email,
                password,
            })
            .await
            .context("Registration failed")?,
    };
    tracing::info!(user = ?session.user_id(), role = ?session.role(), "Authenticated");
    Ok(session)
}
