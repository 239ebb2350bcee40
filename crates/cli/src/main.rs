// Pidwarden CLI
//
// Design Decision: Use clap derive with env fallbacks so the binary can be driven
// from a scheduler (cron, systemd timer) with nothing but environment variables.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr; stdout carries only command output.

mod commands;
mod output;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pidwarden_pool::capability::{CommandLauncher, ProcessInventory, SysinfoInventory};
use pidwarden_pool::manager::{ConcurrencyMode, WorkerManagerConfig};
use pidwarden_pool::persistence::{FileSlotStore, PostgresSlotStore, SlotStore};

use crate::commands::Context;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pidwarden")]
#[command(about = "Pidwarden - keep a fixed-size pool of worker processes alive")]
#[command(version)]
pub struct Cli {
    /// Worker manager name, stamped on every slot
    #[arg(long, env = "PIDWARDEN_OWNER")]
    pub owner: String,

    /// Desired number of worker slots
    #[arg(long, env = "PIDWARDEN_SLOTS", default_value = "1", allow_negative_numbers = true)]
    pub slots: i64,

    /// Seconds a worker may run before it is reported stale
    #[arg(long, env = "PIDWARDEN_STALE_AFTER_SECS", default_value = "1800")]
    pub stale_after: u64,

    /// Key of the slot table in the store
    #[arg(long, env = "PIDWARDEN_STORE_KEY", default_value = "slots")]
    pub store_key: String,

    /// Slot table backend
    #[arg(long, env = "PIDWARDEN_STORE", value_enum, default_value = "file")]
    pub store: StoreKind,

    /// Directory for the file store (one subdirectory per owner)
    #[arg(long, env = "PIDWARDEN_STATE_DIR", default_value = ".pidwarden")]
    pub state_dir: PathBuf,

    /// PostgreSQL connection string for the postgres store
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Reject the write if another invocation changed the table meanwhile
    #[arg(long, env = "PIDWARDEN_OPTIMISTIC")]
    pub optimistic: bool,

    /// Only count processes whose name contains this string as live
    #[arg(long, env = "PIDWARDEN_PROCESS_FILTER")]
    pub process_filter: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// JSON files under --state-dir
    File,
    /// PostgreSQL table, migrated on startup
    Postgres,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reconciliation round
    Run {
        #[command(flatten)]
        program: ProgramArgs,
    },

    /// Run reconciliation rounds on an interval until interrupted
    Watch {
        /// Seconds between rounds
        #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        #[command(flatten)]
        program: ProgramArgs,
    },

    /// Show the stored slots and whether their processes are live
    Show,
}

/// The worker program launched into free slots
#[derive(clap::Args, Debug)]
pub struct ProgramArgs {
    /// Environment variable for launched workers (KEY=VALUE, repeatable)
    #[arg(long = "env", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Working directory for launched workers
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Program and arguments, after `--`
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

impl ProgramArgs {
    pub fn launcher(&self) -> Result<CommandLauncher> {
        let (program, args) = self
            .command
            .split_first()
            .context("no worker program given")?;

        let mut launcher = CommandLauncher::new(program.clone(), args.iter().cloned());
        for (key, value) in &self.env {
            launcher = launcher.with_env(key.clone(), value.clone());
        }
        if let Some(dir) = &self.working_dir {
            launcher = launcher.with_working_dir(dir.clone());
        }
        Ok(launcher)
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

impl Cli {
    pub fn manager_config(&self) -> WorkerManagerConfig {
        let concurrency = if self.optimistic {
            ConcurrencyMode::Optimistic
        } else {
            ConcurrencyMode::LastWriterWins
        };

        WorkerManagerConfig::new(self.owner.clone(), self.slots)
            .with_stale_after(Duration::from_secs(self.stale_after))
            .with_store_key(self.store_key.clone())
            .with_concurrency(concurrency)
    }

    pub fn inventory(&self) -> SysinfoInventory {
        match &self.process_filter {
            Some(filter) => SysinfoInventory::new().with_name_filter(filter.clone()),
            None => SysinfoInventory::new(),
        }
    }

    pub async fn open_store(&self) -> Result<Arc<dyn SlotStore>> {
        match self.store {
            StoreKind::File => {
                let dir = self.state_dir.join(&self.owner);
                tracing::debug!(dir = %dir.display(), "using file store");
                Ok(Arc::new(FileSlotStore::new(dir)))
            }
            StoreKind::Postgres => {
                let url = self
                    .database_url
                    .as_deref()
                    .context("--database-url (or DATABASE_URL) is required for the postgres store")?;
                let store = PostgresSlotStore::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                store
                    .migrate()
                    .await
                    .context("failed to run slot store migrations")?;
                tracing::debug!("using postgres store");
                Ok(Arc::new(store))
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let _telemetry_guard = telemetry::init_telemetry(telemetry::TelemetryConfig::from_env());

    let cli = Cli::parse();

    let config = cli.manager_config();
    config.validate().context("invalid worker manager configuration")?;

    let inventory: Arc<dyn ProcessInventory> = Arc::new(cli.inventory());
    let ctx = Context {
        store: cli.open_store().await?,
        inventory,
        config,
        output: OutputFormat::parse(&cli.output),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Run { program } => commands::run::run(&ctx, program.launcher()?).await,
        Commands::Watch { interval, program } => {
            commands::run::watch(&ctx, program.launcher()?, Duration::from_secs(interval)).await
        }
        Commands::Show => commands::show::run(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_program_after_separator() {
        let cli = parse(&[
            "pidwarden", "--owner", "mailer", "--slots", "3", "run", "--", "php", "worker.php",
            "--queue=mail",
        ]);

        let Commands::Run { program } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(program.command, vec!["php", "worker.php", "--queue=mail"]);
        assert_eq!(program.launcher().unwrap().program(), "php");
    }

    #[test]
    fn test_run_requires_program() {
        let result = Cli::try_parse_from(["pidwarden", "--owner", "mailer", "run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_slots_reach_validation() {
        let cli = parse(&["pidwarden", "--owner", "mailer", "--slots", "-1", "show"]);

        let config = cli.manager_config();
        assert_eq!(config.target_slots, -1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_manager_config_from_flags() {
        let cli = parse(&[
            "pidwarden",
            "--owner",
            "mailer",
            "--slots",
            "4",
            "--stale-after",
            "60",
            "--store-key",
            "mailer-slots",
            "--optimistic",
            "show",
        ]);

        let config = cli.manager_config();
        assert_eq!(config.owner_name, "mailer");
        assert_eq!(config.target_slots, 4);
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.store_key, "mailer-slots");
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
    }

    #[test]
    fn test_watch_interval_must_be_positive() {
        let result = Cli::try_parse_from([
            "pidwarden", "--owner", "mailer", "watch", "--interval", "0", "--", "true",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_pairs() {
        assert_eq!(
            parse_key_val("APP_ENV=prod").unwrap(),
            ("APP_ENV".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_key_val("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_file_store_is_scoped_by_owner() {
        let cli = parse(&["pidwarden", "--owner", "mailer", "--state-dir", "/tmp/pw", "show"]);
        assert_eq!(cli.store, StoreKind::File);
        assert_eq!(cli.state_dir.join(&cli.owner), PathBuf::from("/tmp/pw/mailer"));
    }
}
