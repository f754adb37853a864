use std::env;
use std::fs;
use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use directories::BaseDirs;
use focusboard::board::{self, BoardSettings, Services, Session};
use focusboard::prefs::{stored_credential, FilePrefs, Prefs, CREDENTIAL_KEY};
use focusboard::rewards::RewardsClient;
use focusboard::store::build_store;
use focusboard::{config_store, providers};
use focusboard_core::config::{mask, BackendKind, ConfigFile, CONFIG_KEYS};
use focusboard_core::paths::{compute_paths, FocusboardPaths, PathInputs};
use focusboard_core::task::DEFAULT_CATEGORY;
use focusboard_core::views::display_order;
use time::UtcOffset;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fb", version, about = "Focusboard: a to-do board for the terminal")]
struct Cli {
    #[arg(long, global = true, value_name = "DIR", env = "FOCUSBOARD_DIR")]
    dir: Option<PathBuf>,

    #[arg(long, global = true, env = "FOCUSBOARD_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the configured backend
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Rest,
    Realtime,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Rest => BackendKind::Rest,
            BackendArg::Realtime => BackendKind::Realtime,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive board (default)
    Tui,
    /// Print all tasks
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add a task
    Add {
        title: String,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        focus: bool,
    },
    /// Mark a task completed
    Done { id: String },
    /// Change a task's title; an empty title deletes it
    Edit { id: String, title: String },
    /// Delete a task
    Rm { id: String },
    Credential {
        #[command(subcommand)]
        command: CredentialCommand,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    Version,
    Completion {
        #[command(subcommand)]
        command: CompletionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialCommand {
    /// Store an API key override (reads stdin when VALUE is omitted)
    Set { value: Option<String> },
    /// Show whether a key is in effect and where it comes from
    Show,
    /// Remove the stored override
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Get a single configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum CompletionCommand {
    Bash,
    Fish,
    Powershell,
    Zsh,
}

fn main() -> ExitCode {
    // Must be read before any other thread exists.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(utc_offset)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(utc_offset: UtcOffset) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths(cli.dir.as_ref())?;
    let command = cli.command.unwrap_or(Command::Tui);

    let config = config_store::load(&paths).await;
    let config_level = config.as_ref().ok().and_then(|c| c.log_level.clone());
    let enable_stderr_logging = !matches!(command, Command::Tui);
    init_logging(
        &paths,
        cli.log_level.as_deref(),
        config_level.as_deref(),
        enable_stderr_logging,
    )?;
    let config = config?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "focusboard starting");

    let backend = cli.backend.map(BackendKind::from).unwrap_or(config.backend);
    dispatch(command, &paths, &config, backend, utc_offset).await
}

fn resolve_paths(dir_override: Option<&PathBuf>) -> anyhow::Result<FocusboardPaths> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    let home_dir = base_dirs.home_dir().to_path_buf();

    let xdg_config_home = match env::var_os("XDG_CONFIG_HOME") {
        Some(v) => Some(PathBuf::from(v)),
        None => Some(base_dirs.config_dir().to_path_buf()),
    };

    let dir_override = dir_override
        .cloned()
        .or_else(|| env::var_os("FOCUSBOARD_DIR").map(PathBuf::from));

    Ok(compute_paths(PathInputs {
        home_dir,
        xdg_config_home,
        dir_override,
    }))
}

fn init_logging(
    paths: &FocusboardPaths,
    log_level: Option<&str>,
    config_level: Option<&str>,
    enable_stderr_logging: bool,
) -> anyhow::Result<()> {
    let dir_ok = fs::create_dir_all(&paths.data_dir).is_ok();

    let level = log_level
        .map(str::to_owned)
        .or_else(|| env::var("RUST_LOG").ok())
        .or_else(|| config_level.map(str::to_owned))
        .unwrap_or_else(|| "info".to_owned());

    let filter = EnvFilter::try_new(level).context("parse log level")?;

    let file_layer = if dir_ok {
        tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::NEVER)
            .filename_prefix("focusboard")
            .filename_suffix("log")
            .build(&paths.data_dir)
            .ok()
            .map(|file_appender| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender)
            })
    } else {
        None
    };

    if enable_stderr_logging {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    Ok(())
}

async fn dispatch(
    command: Command,
    paths: &FocusboardPaths,
    config: &ConfigFile,
    backend: BackendKind,
    utc_offset: UtcOffset,
) -> anyhow::Result<()> {
    match command {
        Command::Tui => {
            let (services, settings) = build_services(paths, config, backend, utc_offset).await?;
            board::run(services, settings).await
        }
        Command::List { json } => {
            let session = open_session(paths, config, backend, utc_offset).await?;
            list(&session, json)
        }
        Command::Add {
            title,
            category,
            focus,
        } => {
            let mut session = open_session(paths, config, backend, utc_offset).await?;
            let category = category.unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
            match session.add(&title, &category, focus).await? {
                Some(id) => {
                    println!("{id}");
                    Ok(())
                }
                None => bail!("task title is empty"),
            }
        }
        Command::Done { id } => {
            let mut session = open_session(paths, config, backend, utc_offset).await?;
            require_task(&session, &id)?;
            session.complete(&id).await?;
            println!("ok");
            Ok(())
        }
        Command::Edit { id, title } => {
            let mut session = open_session(paths, config, backend, utc_offset).await?;
            require_task(&session, &id)?;
            session.begin_edit(&id).await?;
            session.commit_edit(&id, &title).await?;
            println!("ok");
            Ok(())
        }
        Command::Rm { id } => {
            let mut session = open_session(paths, config, backend, utc_offset).await?;
            require_task(&session, &id)?;
            session.remove(&id).await?;
            println!("ok");
            Ok(())
        }
        Command::Credential { command } => dispatch_credential(command, paths, config, backend).await,
        Command::Config { command } => dispatch_config(command, paths, config).await,
        Command::Version => version(),
        Command::Completion { command } => completion(command),
    }
}

async fn build_services(
    paths: &FocusboardPaths,
    config: &ConfigFile,
    backend: BackendKind,
    utc_offset: UtcOffset,
) -> anyhow::Result<(Services, BoardSettings)> {
    let prefs: Arc<dyn Prefs> = Arc::new(FilePrefs::new(paths.prefs_file.clone()));
    let stored = stored_credential(prefs.as_ref()).await;
    let credential_set = stored.is_some();

    let fallback_credential = providers::api_key(config, backend, None);
    let store = build_store(config, backend, providers::api_key(config, backend, stored))?;

    let (rewards_url, rewards_key) = providers::rewards(config);
    let rewards = RewardsClient::new(&rewards_url, &rewards_key)?;

    tracing::debug!(
        backend = backend.as_str(),
        rewards = rewards.is_some(),
        "services ready"
    );

    Ok((
        Services {
            store,
            prefs,
            rewards,
            fallback_credential,
        },
        BoardSettings {
            categories: config.categories(),
            utc_offset,
            credential_set,
        },
    ))
}

async fn open_session(
    paths: &FocusboardPaths,
    config: &ConfigFile,
    backend: BackendKind,
    utc_offset: UtcOffset,
) -> anyhow::Result<Session> {
    let (mut services, settings) = build_services(paths, config, backend, utc_offset).await?;
    services.rewards = None;
    Session::start(services, &settings).await
}

fn require_task(session: &Session, id: &str) -> anyhow::Result<()> {
    if session.model().tasks.contains(id) {
        Ok(())
    } else {
        Err(anyhow!("no task with id {id}"))
    }
}

fn list(session: &Session, json: bool) -> anyhow::Result<()> {
    let tasks = display_order(session.tasks());
    let mut out = io::stdout().lock();

    if json {
        let body = serde_json::to_string_pretty(&tasks).context("serialize tasks")?;
        writeln!(out, "{body}").context("write tasks")?;
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(out, "No tasks").context("write tasks")?;
        return Ok(());
    }
    for task in tasks {
        let check = if task.done { "[x]" } else { "[ ]" };
        let focus = if task.is_focus { " *" } else { "" };
        writeln!(
            out,
            "{}\t{check} {}{focus}\t{}",
            task.id, task.title, task.category
        )
        .context("write tasks")?;
    }
    Ok(())
}

async fn dispatch_credential(
    command: CredentialCommand,
    paths: &FocusboardPaths,
    config: &ConfigFile,
    backend: BackendKind,
) -> anyhow::Result<()> {
    let prefs = FilePrefs::new(paths.prefs_file.clone());
    match command {
        CredentialCommand::Set { value } => {
            let value = match value {
                Some(v) => v,
                None => read_stdin_line()?,
            };
            let value = value.trim();
            if value.is_empty() {
                bail!("credential is empty");
            }
            prefs.set(CREDENTIAL_KEY, value).await?;
            println!("ok");
            Ok(())
        }
        CredentialCommand::Show => {
            let stored = stored_credential(&prefs).await;
            let source = providers::api_key_source(config, backend, stored.as_deref());
            let effective = providers::api_key(config, backend, stored);
            match source {
                Some(source) => println!("{}\t{source}", mask(effective.as_deref())),
                None => println!("not set"),
            }
            Ok(())
        }
        CredentialCommand::Clear => {
            prefs.remove(CREDENTIAL_KEY).await?;
            println!("ok");
            Ok(())
        }
    }
}

async fn dispatch_config(
    command: ConfigCommand,
    paths: &FocusboardPaths,
    config: &ConfigFile,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("Config:\t{}", paths.config_file.display());
            println!();
            for key in CONFIG_KEYS {
                let value = config.get_key(key)?;
                println!("  {key}:\t{}", value_to_string(&value));
            }
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let value = config.get_key(&key)?;
            println!("{}", value_to_string(&value));
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let next = config.set_key(&key, &value)?;
            config_store::save(paths, &next).await?;
            println!("ok");
            Ok(())
        }
    }
}

fn value_to_string(v: &toml::Value) -> String {
    match v {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn read_stdin_line() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read stdin")?;
    Ok(line)
}

fn version() -> anyhow::Result<()> {
    println!("{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn completion(command: CompletionCommand) -> anyhow::Result<()> {
    let shell = match command {
        CompletionCommand::Bash => Shell::Bash,
        CompletionCommand::Fish => Shell::Fish,
        CompletionCommand::Powershell => Shell::PowerShell,
        CompletionCommand::Zsh => Shell::Zsh,
    };

    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "fb", &mut buf);
    match io::stdout().write_all(&buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("write completion script to stdout"),
    }
}
