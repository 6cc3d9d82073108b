//! hud35 CLI - legacy play-count migration and Wi-Fi fallback manager

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use hud35::config::{self, Hud35Config, MigrateConfig, WifiConfig};
use hud35::server::{run_manager, ManagerExit};
use hud35::ui::{self, Icons};
use hud35::wifi::{Orchestrator, RetryPolicy, ShutdownFlag, SystemRunner, WifiSettings};
use hud35::{Migrator, SongStatsStore};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Songs listed after a migration
const TOP_SONGS: usize = 5;

#[derive(Parser)]
#[command(name = "hud35")]
#[command(version)]
#[command(about = "HUD35 device tools - play-count migration and Wi-Fi fallback manager")]
#[command(long_about = r#"
Device maintenance tools:
  • migrate: move song_counts.bin into the song_stats SQLite database
  • wifi:    join a Wi-Fi network, or fall back to an open access point
             serving a credentials form

Example usage:
  hud35 migrate
  hud35 migrate --source ./song_counts.bin --database ./song_stats.db
  sudo hud35 wifi --interface wlan0
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a hud35.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate legacy play counts into SQLite
    Migrate {
        /// Legacy zlib/pickle file
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Leave the source file in place instead of renaming it to .backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Run the Wi-Fi manager with access-point fallback
    Wifi {
        /// Wireless interface to manage
        #[arg(short, long)]
        interface: Option<String>,

        /// Port for the credentials form
        #[arg(short, long)]
        port: Option<u16>,

        /// Run system commands directly instead of through sudo
        #[arg(long)]
        no_sudo: bool,

        /// Access point setup attempts before giving up
        #[arg(long)]
        max_ap_attempts: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let file_config: Hud35Config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Migrate { source, database, no_backup } => {
            let mut migrate = file_config.migrate;
            if let Some(source) = source {
                migrate.source = source;
            }
            if let Some(database) = database {
                migrate.database = database;
            }
            if no_backup {
                migrate.backup = false;
            }
            run_migrate(&migrate)
        }

        Commands::Wifi { interface, port, no_sudo, max_ap_attempts } => {
            let mut wifi = file_config.wifi;
            if let Some(interface) = interface {
                wifi.interface = interface;
            }
            if let Some(port) = port {
                wifi.port = port;
            }
            if no_sudo {
                wifi.use_sudo = false;
            }
            if let Some(attempts) = max_ap_attempts {
                wifi.max_ap_attempts = attempts;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_wifi(wifi))
        }
    }
}

fn run_migrate(config: &MigrateConfig) -> anyhow::Result<()> {
    let migrator = Migrator::from_config(config);

    ui::header(Icons::ROCKET, "Starting migration from binary to SQLite");
    ui::info(Icons::MUSIC, "Source", &migrator.source().display().to_string());
    ui::info(Icons::DATABASE, "Database", &migrator.database().display().to_string());

    if migrator.source().exists() {
        config::ensure_db_dir(migrator.database())?;
    }

    let spinner = ui::Spinner::new("Migrating songs...");
    let report = migrator.run()?;
    let elapsed = spinner.finish();

    if report.is_empty() {
        ui::warn("No song data found to migrate.");
        return Ok(());
    }

    ui::migration_summary(&report);
    let store = SongStatsStore::open(migrator.database())?;
    ui::db_summary(&store.stats()?);
    ui::top_songs(&store.top_songs(TOP_SONGS)?);
    println!();

    ui::success(&format!("Migration completed in {}! Migrated {} songs.", elapsed, report.migrated));
    if let Some(backup) = &report.backup {
        ui::info(Icons::BACKUP, "Backup", &backup.display().to_string());
        ui::hint("You can delete the backup once everything looks good.");
    }
    Ok(())
}

async fn run_wifi(config: WifiConfig) -> anyhow::Result<()> {
    // Before any interface change, so an early Ctrl+C still gets cleanup.
    let signals = ShutdownSignals::install()?;

    let shutdown = ShutdownFlag::new();
    let runner = Arc::new(SystemRunner::new(
        config.use_sudo,
        Duration::from_secs(config.command_timeout_secs),
    ));
    let orchestrator = Arc::new(
        Orchestrator::new(WifiSettings::from(&config), runner, shutdown)
            .with_retry(RetryPolicy::from_config(&config)),
    );

    ui::header(Icons::ROCKET, "Starting WiFi Manager");
    ui::info(Icons::ANTENNA, "Interface", &config.interface);
    ui::network(Icons::ANTENNA, "Access point", &config.ap_ssid);
    ui::network(Icons::GLOBE, "Form", &format!("http://{}:{}", config.ap_ip, config.port));
    ui::hint("Press Ctrl+C to stop the program");

    let exit = run_manager(orchestrator, config.port, async move {
        let name = signals.recv().await;
        tracing::info!("Received {}, shutting down", name);
        ui::header(Icons::BROOM, "Performing cleanup");
    })
    .await?;

    if exit == ManagerExit::ServerStopped {
        ui::warn("Web server stopped unexpectedly");
    }
    ui::success("Cleanup complete");
    Ok(())
}

/// SIGINT and SIGTERM listeners, registered as soon as they are created
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> anyhow::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> anyhow::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first signal and return its name
    #[cfg(unix)]
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl+C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
