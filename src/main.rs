// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sillybus main entry point - CLI and commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use opentelemetry::Context;
use reqwest::Method;
use tracing::Level;

use sillybus::api::{Access, ApiClient, Role, Route, StudentsQuery};
use sillybus::config::{self, CliOptions, ResolvedConfig};
use sillybus::form::{
    ConsoleNotifier, FormData, FormSpec, FormSubmission, SubmitError, SubmitOutcome, TracedForm,
};
use sillybus::http::{classify_response, HttpRequest, ReqwestTransport, TracedClient};
use sillybus::telemetry::{
    get_or_create_session_id, in_span, init_logging, init_tracer_provider, FileSessionStore,
    LogConfig, MemorySessionStore, SessionStore, SpanOptions, Telemetry, TracingConfig,
};

/// Sillybus version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sillybus - traced client for the Silly Bus dashboard.
#[derive(Parser)]
#[command(name = "sillybus")]
#[command(author, version, about = "Traced client for the Silly Bus dashboard", long_about = None)]
struct Cli {
    /// Base URL of the backend API
    #[arg(long, env = "SILLYBUS_API_URL")]
    api_url: Option<String>,

    /// Log in as this user before running the command
    #[arg(short, long, env = "SILLYBUS_USERNAME")]
    username: Option<String>,

    /// Password for --username
    #[arg(long, env = "SILLYBUS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Session file (defaults to ~/.sillybus/session.json)
    #[arg(long)]
    session_file: Option<String>,

    /// Keep spans in-process instead of exporting them
    #[arg(long)]
    no_export: bool,

    /// Show verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for sillybus.
#[derive(Subcommand)]
enum Commands {
    /// Show the session id used to correlate traces
    Session {
        /// Discard the stored id and create a new one
        #[arg(long)]
        reset: bool,
    },

    /// Send a traced request to an API path
    Fetch {
        /// Path under the API root, e.g. /students
        path: String,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },

    /// Log in and show the landing page
    Login,

    /// Show the signed-in user
    Whoami,

    /// List students
    Students {
        /// Filter by username or display name
        #[arg(short, long)]
        search: Option<String>,
        /// Sort by recent technique updates
        #[arg(long)]
        recent: bool,
        /// Include archived students
        #[arg(long)]
        include_archived: bool,
    },

    /// Show a student's techniques
    Techniques {
        /// Student id
        id: i64,
    },

    /// Show which routes a role can open
    Routes {
        /// Role to check (student, coach, admin); anonymous when omitted
        #[arg(long)]
        role: Option<String>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

/// Everything a networked command needs.
struct App {
    telemetry: Telemetry,
    api: ApiClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_options = CliOptions {
        api_url: cli.api_url.clone(),
        api_key: None,
        no_export: if cli.no_export { Some(true) } else { None },
        log_level: None,
        session_file: cli.session_file.clone(),
    };

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, cli_options)?;

    // Commands that never touch the network or the tracer
    match &cli.command {
        Commands::Config { action } => {
            match action {
                Some(ConfigAction::Show) | None => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
            }
            return Ok(());
        }
        Commands::Version => {
            println!("sillybus {}", VERSION);
            return Ok(());
        }
        Commands::Routes { role } => return print_routes(role.as_deref()),
        _ => {}
    }

    let store = session_store(&config);
    if let Commands::Session { reset: true } = cli.command {
        store.clear()?;
    }
    let session_id = get_or_create_session_id(store.as_ref());

    let telemetry = init_tracer_provider(&TracingConfig::from(&config), &session_id)?;
    let _guard = init_logging(&log_config(&cli, &config), Some(telemetry.tracer()))?;

    if let Commands::Session { .. } = cli.command {
        println!("{}", session_id);
        if !config.can_export() {
            println!("{}", "Trace export is disabled (no API key)".dimmed());
        }
        return Ok(());
    }

    let transport = Arc::new(ReqwestTransport::new(Duration::from_millis(
        config.request_timeout_ms,
    ))?);
    let client = TracedClient::from_telemetry(transport, &telemetry);
    let api = ApiClient::new(client, &config.api_url)?;
    let app = App { telemetry, api };

    let result = run(&app, &cli).await;
    app.telemetry.force_flush();
    result
}

async fn run(app: &App, cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Login = cli.command {
        return login_command(app, cli).await;
    }

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        app.api
            .login(username, password)
            .await
            .context("Login failed")?;
    }

    match &cli.command {
        Commands::Fetch { path, method, data } => {
            fetch_command(app, path, method, data.as_deref()).await
        }
        Commands::Whoami => {
            let user = app.api.me().await?;
            println!(
                "{} ({}) - {}",
                user.display_name.bright_white(),
                user.username,
                user.role.to_string().bright_magenta()
            );
            Ok(())
        }
        Commands::Students {
            search,
            recent,
            include_archived,
        } => {
            let query = StudentsQuery {
                sort_by: recent.then(|| "recent_update".to_string()),
                include_archived: *include_archived,
                search: search.clone(),
            };
            let students = app.api.students(&query).await?;
            if students.is_empty() {
                println!("{}", "No students found".dimmed());
            }
            for student in students {
                let archived = if student.archived { " (archived)" } else { "" };
                println!(
                    "{:>5}  {} [{}]{}",
                    student.id,
                    student.display_name.bright_white(),
                    student.username,
                    archived.dimmed()
                );
            }
            Ok(())
        }
        Commands::Techniques { id } => {
            let result = app.api.student_techniques(*id).await?;
            println!(
                "{}",
                format!("Techniques for {}", result.student.display_name)
                    .bright_blue()
                    .bold()
            );
            for technique in result.techniques {
                println!(
                    "{} [{}]",
                    technique.technique_name.bright_white(),
                    technique.status.cyan()
                );
                if !technique.student_notes.is_empty() {
                    println!("  student: {}", technique.student_notes);
                }
                if !technique.coach_notes.is_empty() {
                    println!("  coach:   {}", technique.coach_notes);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn fetch_command(
    app: &App,
    path: &str,
    method: &str,
    data: Option<&str>,
) -> anyhow::Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let url = app.api.url(path)?;

    let mut request = HttpRequest::new(method, url);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data must be valid JSON")?;
        request = request.json(&body)?;
    }

    let client = app.api.traced_client().clone();
    let tracer = app.telemetry.tracer();
    let response = in_span(
        &tracer,
        "sillybus fetch",
        SpanOptions::new(),
        |cx: Context| async move { client.fetch_in(request, &cx).await },
    )
    .await?;

    let status = format!("{} {}", response.status.as_u16(), response.status_text());
    if response.ok() {
        println!("{}", status.green());
    } else {
        println!("{}", status.red());
    }
    if let Some(classification) = classify_response(&response) {
        println!(
            "error.type: {}  ({})",
            classification.error_type.as_str().yellow(),
            classification.message
        );
    }

    let text = response.text();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }
    Ok(())
}

async fn login_command(app: &App, cli: &Cli) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&cli.username, &cli.password) else {
        anyhow::bail!(
            "login needs --username and --password (or SILLYBUS_USERNAME/SILLYBUS_PASSWORD)"
        );
    };

    let api = app.api.clone();
    let form = TracedForm::new(
        FormSpec::new("login-form", app.api.url("login")?),
        app.api.traced_client().clone(),
    )
    .notifier(Arc::new(ConsoleNotifier))
    .on_submit(move |submission: FormSubmission| {
        let api = api.clone();
        async move {
            let username = submission.data.get("username").unwrap_or_default();
            let password = submission.data.get("password").unwrap_or_default();
            api.login(username, password)
                .await
                .map(|_| ())
                .map_err(SubmitError::from)
        }
    });

    let outcome = form
        .submit(
            FormData::new()
                .with("username", username.as_str())
                .with("password", password.as_str()),
        )
        .await;

    match outcome {
        SubmitOutcome::Completed | SubmitOutcome::Navigate(_) => {
            let user = app.api.me().await?;
            println!(
                "{} Logged in as {} ({})",
                "✓".green(),
                user.display_name.bright_white(),
                user.role
            );
            println!("Home: {}", Route::home_for(&user).path().bright_blue());
            Ok(())
        }
        SubmitOutcome::Ignored | SubmitOutcome::Failed => anyhow::bail!("Login failed"),
    }
}

fn print_routes(role: Option<&str>) -> anyhow::Result<()> {
    let user = match role {
        Some(role) => {
            let role: Role = role.parse()?;
            Some(sillybus::User {
                id: 0,
                username: role.to_string(),
                display_name: role.to_string(),
                role,
                last_update: None,
                archived: false,
            })
        }
        None => None,
    };

    let who = user
        .as_ref()
        .map(|u| u.role.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    println!("{}", format!("Routes for {}", who).bright_blue().bold());

    for route in Route::STATIC.iter().copied().chain([Route::Student(1)]) {
        let access = match route.access(user.as_ref()) {
            Access::Allowed => "allowed".green(),
            Access::RedirectToLogin => "login required".yellow(),
            Access::Forbidden => "forbidden".red(),
        };
        println!("{:<16} {}", route.path(), access);
    }
    Ok(())
}

fn session_store(config: &ResolvedConfig) -> Box<dyn SessionStore> {
    match &config.session_file {
        Some(path) => {
            let store = FileSessionStore::new(path.clone());
            match config.session_ttl_secs {
                Some(ttl) => Box::new(store.with_ttl(Duration::from_secs(ttl))),
                None => Box::new(store),
            }
        }
        None => Box::new(MemorySessionStore::new()),
    }
}

fn log_config(cli: &Cli, config: &ResolvedConfig) -> LogConfig {
    let base = if cli.debug {
        LogConfig::development()
    } else if cli.verbose {
        LogConfig::default().with_level(Level::INFO)
    } else {
        LogConfig::default()
    };

    match &config.log_level {
        Some(filter) if !cli.debug => base.with_filter(filter.clone()),
        _ => base,
    }
}
