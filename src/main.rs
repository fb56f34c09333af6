use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use sentinel::app::Console;
use sentinel::config::{ConfigError, ConsoleConfig, FirebaseConfig};
use sentinel::error::{AuthError, ConsoleError, RequestError};
use sentinel::net::api::HttpBackend;
use sentinel::net::firebase::FirebaseIdentity;
use sentinel::net::types::{ExportFormat, Finding, FindingStatus, NewSource, RecordId, RiskLevel, SourceKind};
use sentinel::state::Confirm;

const SESSION_WAIT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("missing identity-provider key; set SENTINEL_FIREBASE_API_KEY")]
    MissingApiKey,
    #[error("missing credentials; pass --email/--password or set SENTINEL_EMAIL/SENTINEL_PASSWORD")]
    MissingCredentials,
    #[error("http client setup failed: {0}")]
    Http(#[from] RequestError),
    #[error("identity client setup failed: {0}")]
    Identity(#[from] AuthError),
    #[error("{}", .0.user_message())]
    Console(#[from] ConsoleError),
    #[error("timed out waiting for a session")]
    SessionTimeout,
    #[error("{0}")]
    Action(String),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "SENTINEL analyst console")]
struct Cli {
    #[arg(long, env = "SENTINEL_EMAIL", global = true)]
    email: Option<String>,

    #[arg(long, env = "SENTINEL_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and send the verification email.
    Register,
    /// Send a password-reset email.
    ResetPassword,
    Findings(FindingsCommand),
    Sources(SourcesCommand),
    /// Show audit log and aggregate stats.
    Admin,
    /// Download a rendered report into the download directory.
    Export { format: ExportFormat },
}

#[derive(Args, Debug)]
struct FindingsCommand {
    #[command(subcommand)]
    command: FindingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum FindingsSubcommand {
    List {
        /// One line per finding instead of JSON.
        #[arg(long)]
        plain: bool,
    },
    Triage {
        id: String,
        status: FindingStatus,
    },
    Delete {
        id: String,
    },
    Manual {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "low")]
        risk: RiskLevel,
        #[arg(long)]
        url: Option<String>,
    },
    /// Trigger a simulated social-media scan.
    Scan,
}

#[derive(Args, Debug)]
struct SourcesCommand {
    #[command(subcommand)]
    command: SourcesSubcommand,
}

#[derive(Subcommand, Debug)]
enum SourcesSubcommand {
    List,
    Add {
        name: String,
        url: String,
        #[arg(long, default_value = "news")]
        category: String,
        #[arg(long = "type", default_value = "rss")]
        kind: SourceKind,
    },
    Remove {
        id: String,
    },
}

/// Prompts on stderr and reads the answer from stdin.
struct StdinConfirm {
    assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{prompt} [y/N] ");
        io::stderr().flush().ok();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = ConsoleConfig::from_env()?;
    let firebase = FirebaseConfig::from_env()?.ok_or(CliError::MissingApiKey)?;

    let api = Arc::new(HttpBackend::new(&config.api_url, config.timeouts)?);
    let identity = Arc::new(FirebaseIdentity::new(firebase, config.timeouts)?);
    let console = Console::new(api, identity, config.download_dir);
    let _handle = console.start();
    let confirm = StdinConfirm { assume_yes: cli.yes };

    match cli.command {
        Command::Register => {
            let (email, password) = credentials(cli.email.as_deref(), cli.password.as_deref())?;
            let result = console.session.register(email, password).await;
            auth_outcome(&console, result).await
        }
        Command::ResetPassword => {
            let email = cli.email.as_deref().unwrap_or_default();
            let result = console.session.request_password_reset(email).await;
            auth_outcome(&console, result).await
        }
        command => {
            let (email, password) = credentials(cli.email.as_deref(), cli.password.as_deref())?;
            let login = console.session.login(email, password).await;
            auth_outcome(&console, login.map(|_| ())).await?;
            console
                .context()
                .wait_for_session(SESSION_WAIT)
                .await
                .ok_or(CliError::SessionTimeout)?;

            let result = run(&console, command, &confirm).await;
            console.session.logout().await;
            result
        }
    }
}

async fn run(console: &Console, command: Command, confirm: &StdinConfirm) -> Result<(), CliError> {
    match command {
        Command::Findings(FindingsCommand { command }) => match command {
            FindingsSubcommand::List { plain } => {
                console
                    .findings
                    .refresh()
                    .await
                    .map_err(ConsoleError::from)?;
                let items = console.findings.snapshot().await.items;
                if plain {
                    for finding in &items {
                        println!("{}", plain_line(finding));
                    }
                    Ok(())
                } else {
                    print_json(&items)
                }
            }
            FindingsSubcommand::Triage { id, status } => {
                console
                    .findings
                    .refresh()
                    .await
                    .map_err(ConsoleError::from)?;
                let id = RecordId::from(id);
                let outcome = console.triage(&id, status).await;
                let outcome = finish(console, outcome).await?;
                print_json(&json!({ "id": id, "status": status, "outcome": outcome }))
            }
            FindingsSubcommand::Delete { id } => {
                let id = RecordId::from(id);
                let outcome = console.delete_finding(&id, confirm).await;
                let outcome = finish(console, outcome).await?;
                print_json(&json!({ "id": id, "outcome": outcome }))
            }
            FindingsSubcommand::Manual { title, content, risk, url } => {
                console
                    .manual
                    .edit(|form| {
                        form.title = title;
                        form.content = content;
                        form.risk_level = risk;
                        form.url = url;
                    })
                    .await;
                let outcome = console.submit_manual().await;
                let outcome = finish(console, outcome).await?;
                print_json(&json!({ "outcome": outcome }))
            }
            FindingsSubcommand::Scan => {
                let outcome = console.social_scan().await;
                let outcome = finish(console, outcome).await?;
                print_json(&json!({ "outcome": outcome, "findings": console.findings.snapshot().await.items.len() }))
            }
        },
        Command::Sources(SourcesCommand { command }) => match command {
            SourcesSubcommand::List => {
                console
                    .sources
                    .list()
                    .await
                    .map_err(ConsoleError::from)?;
                print_json(&console.sources.snapshot().await.items)
            }
            SourcesSubcommand::Add { name, url, category, kind } => {
                let outcome = console
                    .add_source(NewSource { name, url, category, kind })
                    .await;
                finish(console, outcome).await?;
                print_json(&console.sources.snapshot().await.items)
            }
            SourcesSubcommand::Remove { id } => {
                let outcome = console
                    .remove_source(&RecordId::from(id), confirm)
                    .await;
                let outcome = finish(console, outcome).await?;
                print_json(&json!({ "outcome": outcome }))
            }
        },
        Command::Admin => {
            let outcome = console.open_admin().await;
            finish(console, outcome).await?;
            let snapshot = console.admin.snapshot().await;
            let distribution = [RiskLevel::Critical, RiskLevel::High, RiskLevel::Medium, RiskLevel::Low]
                .map(|level| json!({ "level": level, "count": snapshot.stats.count(level), "share": snapshot.stats.share(level) }));
            print_json(&json!({ "stats": snapshot.stats, "distribution": distribution, "logs": snapshot.logs }))
        }
        Command::Export { format } => {
            let path = console.export(format).await;
            let path = finish(console, path).await?;
            print_json(&json!({ "path": path }))
        }
        Command::Register | Command::ResetPassword => Ok(()),
    }
}

fn credentials<'a>(email: Option<&'a str>, password: Option<&'a str>) -> Result<(&'a str, &'a str), CliError> {
    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(CliError::MissingCredentials),
    }
}

/// Print the auth banner and turn a failed flow into its banner text.
async fn auth_outcome(console: &Console, result: Result<(), ConsoleError>) -> Result<(), CliError> {
    let banner = console.session.view().await.banner;
    match (result, banner) {
        (Ok(()), Some(banner)) => {
            eprintln!("{banner}");
            Ok(())
        }
        (Ok(()), None) => Ok(()),
        (Err(_), Some(banner)) => Err(CliError::Action(banner.text)),
        (Err(e), None) => Err(e.into()),
    }
}

/// Print a success alert, or turn a missing result into the failure alert.
async fn finish<T>(console: &Console, result: Option<T>) -> Result<T, CliError> {
    let alert = console.take_alert().await;
    match result {
        Some(value) => {
            if let Some(notice) = alert {
                eprintln!("{notice}");
            }
            Ok(value)
        }
        None => Err(CliError::Action(alert.map_or_else(|| "action failed".to_owned(), |n| n.text))),
    }
}

fn plain_line(finding: &Finding) -> String {
    let marker = if finding.is_humint() { " [HUMINT]" } else { "" };
    format!(
        "{:<8} {:<9} {} {}{marker}: {}",
        finding.risk_level.as_str(),
        finding.status.as_str(),
        finding.id,
        finding.title,
        finding.plain_content()
    )
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
