use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use docportal::config::ConfigError;
use docportal::net::api::{DEFAULT_PAGE_SIZE, UploadFile};
use docportal::net::types::{
    DEFAULT_REMAINING_QR_PAGE, DEFAULT_REMAINING_QR_SIZE, DEFAULT_REMAINING_QR_X, DEFAULT_REMAINING_QR_Y, Document,
    DocumentList, SplitUploadParams, UsageStats,
};
use docportal::{
    ApiClient, ApiError, AuthError, ErrorCode, FileTokenStore, PortalConfig, SessionManager,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `docportal login` first")]
    NotLoggedIn,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotLoggedIn => "E_NOT_LOGGED_IN",
            Self::Config(_) => "E_CONFIG",
            Self::Api(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::InvalidJson(_) => "E_INVALID_JSON",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.retryable(),
            Self::Auth(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "docportal", about = "Document portal console")]
struct Cli {
    /// Backend API root; overrides PORTAL_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print raw JSON instead of formatted lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long, env = "PORTAL_USERNAME")]
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Dashboard {
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    Docs(DocsCommand),
    /// Public metadata for a shared document; no login needed.
    View {
        uuid: Uuid,
    },
}

#[derive(Args, Debug)]
struct DocsCommand {
    #[command(subcommand)]
    command: DocsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DocsSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    Show {
        document_id: i64,
    },
    Upload {
        path: PathBuf,
    },
    UploadSplit(UploadSplitArgs),
    Delete {
        document_id: i64,
    },
}

#[derive(Args, Debug)]
struct UploadSplitArgs {
    path: PathBuf,

    #[arg(long, default_value_t = DEFAULT_REMAINING_QR_PAGE)]
    qr_page: u32,

    #[arg(long, default_value_t = DEFAULT_REMAINING_QR_X)]
    qr_x: u32,

    #[arg(long, default_value_t = DEFAULT_REMAINING_QR_Y)]
    qr_y: u32,

    #[arg(long, default_value_t = DEFAULT_REMAINING_QR_SIZE)]
    qr_size: u32,
}

impl UploadSplitArgs {
    fn params(&self) -> SplitUploadParams {
        SplitUploadParams {
            remaining_qr_page: Some(self.qr_page),
            remaining_qr_x: Some(self.qr_x),
            remaining_qr_y: Some(self.qr_y),
            remaining_qr_size: Some(self.qr_size),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.error_code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.api_url.as_deref())?;
    tracing::debug!(api = %config.api_base_url, home = %config.home_dir.display(), "console config loaded");
    let tokens = Arc::new(FileTokenStore::new(config.token_path()));
    let session = SessionManager::new(ApiClient::new(&config, tokens)?);
    let json = cli.json;

    match cli.command {
        Command::Login { username, password } => {
            session.init().await;
            let user = session.login(&username, &password).await?;
            println!("logged in as {} <{}>", user.username, user.email);
            Ok(())
        }
        Command::Register { username, email, password } => {
            session.init().await;
            let user = session.register(&username, &email, &password).await?;
            println!("registered and logged in as {}", user.username);
            Ok(())
        }
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            require_login(&session).await?;
            let user = session.user().ok_or(CliError::NotLoggedIn)?;
            if json {
                print_json(&serde_json::to_value(&user)?)
            } else {
                println!("{} <{}> (id {})", user.username, user.email, user.id);
                Ok(())
            }
        }
        Command::Dashboard { page_size } => {
            require_login(&session).await?;
            let list = session.api().list(1, page_size).await?;
            let stats = UsageStats::from_list(&list);
            if json {
                return print_json(&serde_json::to_value(&stats)?);
            }
            for line in dashboard_lines(&stats) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Docs(docs) => {
            require_login(&session).await?;
            run_docs(session.api(), docs, json).await
        }
        Command::View { uuid } => {
            let view = session.api().view_metadata(&uuid).await?;
            if json {
                return print_json(&serde_json::to_value(&view)?);
            }
            println!("{}", view.original_filename);
            println!("uploaded: {}", view.upload_timestamp);
            println!("download: {}", view.download_url);
            println!("metadata: {}", session.api().view_url(&uuid));
            Ok(())
        }
    }
}

async fn run_docs(api: &ApiClient, docs: DocsCommand, json: bool) -> Result<(), CliError> {
    match docs.command {
        DocsSubcommand::List { page, page_size } => {
            let list = api.list(page, page_size).await?;
            if json {
                return print_json(&serde_json::to_value(&list)?);
            }
            if let Some(line) = empty_page_line(&list, page) {
                println!("{line}");
                return Ok(());
            }
            for document in &list.documents {
                println!("{}", document_line(document));
            }
            println!("page {page}: {} of {} documents", list.documents.len(), list.total);
            Ok(())
        }
        DocsSubcommand::Show { document_id } => {
            let document = api.get(document_id).await?;
            if json {
                return print_json(&serde_json::to_value(&document)?);
            }
            println!("{}", document_line(&document));
            println!("storage: {}", document.storage_url);
            println!("share:   {}", api.public_document_url(&document.uuid, &document.original_filename));
            Ok(())
        }
        DocsSubcommand::Upload { path } => {
            let file = UploadFile::from_path(&path).await?;
            let uploaded = api.upload(file).await?;
            if json {
                return print_json(&serde_json::to_value(&uploaded)?);
            }
            println!("uploaded document {} ({})", uploaded.id, uploaded.uuid);
            Ok(())
        }
        DocsSubcommand::UploadSplit(args) => {
            let file = UploadFile::from_path(&args.path).await?;
            let split = api.upload_split(file, &args.params()).await?;
            if json {
                return print_json(&serde_json::to_value(&split)?);
            }
            for document in split.documents() {
                println!("{}", document_line(document));
            }
            if let Some(message) = &split.message {
                println!("{message}");
            }
            Ok(())
        }
        DocsSubcommand::Delete { document_id } => {
            api.delete(document_id).await?;
            println!("deleted document {document_id}");
            Ok(())
        }
    }
}

fn load_config(api_url: Option<&str>) -> Result<PortalConfig, ConfigError> {
    PortalConfig::from_vars(|key| match (key, api_url) {
        ("PORTAL_API_URL", Some(url)) => Some(url.to_owned()),
        _ => std::env::var(key).ok(),
    })
}

async fn require_login(session: &SessionManager) -> Result<(), CliError> {
    if session.init().await.is_logged_in() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}

fn document_line(document: &Document) -> String {
    let kind = document
        .document_type
        .as_deref()
        .map(|kind| format!(" [{kind}]"))
        .unwrap_or_default();
    format!(
        "#{:<5} {}{kind}  {}  {} views",
        document.id, document.original_filename, document.upload_timestamp, document.hit_count
    )
}

/// What to print instead of rows when the page has no documents.
fn empty_page_line(list: &DocumentList, page: u32) -> Option<String> {
    if list.has_no_documents() {
        Some("No documents yet. Upload one with `docportal docs upload <file.pdf>`.".to_owned())
    } else if list.is_empty() {
        Some(format!("page {page} is past the end ({} documents in total)", list.total))
    } else {
        None
    }
}

fn dashboard_lines(stats: &UsageStats) -> Vec<String> {
    vec![
        format!("documents: {}", stats.total_documents),
        format!("views:     {} (latest {} documents)", stats.total_hits, stats.page_documents),
        format!("storage:   {:.2} MiB", stats.total_mebibytes()),
        format!("latest:    {}", stats.latest_upload.as_deref().unwrap_or("none")),
    ]
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
