/**
 * IMSA BOT - Point d'entrée du bot Telegram
 *
 * RÔLE : Orchestration : config, logging, processus de fond (heartbeat + watchdog),
 * annuaire SQLite, notification de downtime, dispatcher Telegram.
 *
 * ARCHITECTURE : un seul binaire. `run` sert le bot ; `heartbeat` et `watchdog` sont
 * relancés par le processus principal et s'arrêtent quand il disparaît.
 */

mod config;
mod health;
mod logging;
mod router;
mod supervisor;
mod telegram;
mod templates;

use crate::config::{load_config, BotConfig};
use crate::health::HealthTracker;
use crate::router::{BotContext, Command};
use crate::supervisor::Supervisor;
use crate::telegram::TelegramTransport;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imsa_core::directory::BootstrapAdmin;
use imsa_core::dialog::DialogueState;
use imsa_core::liveness::{
    measure_downtime, process_alive, unix_now, HeartbeatFile, HeartbeatWriter, Watchdog, WatchdogExit,
};
use imsa_core::notify::{schedule_downtime_notice, FanoutPolicy};
use imsa_core::Directory;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "imsa-bot", version, about = "Personal admin Telegram bot with downtime tracking")]
struct Cli {
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Mode {
    /// Serve the bot (default)
    Run,
    /// Rewrite the heartbeat file until the parent exits
    #[command(hide = true)]
    Heartbeat {
        #[arg(long)]
        parent_pid: u32,
    },
    /// Kill the parent when the network is gone
    #[command(hide = true)]
    Watchdog {
        #[arg(long)]
        parent_pid: u32,
    },
}

impl Mode {
    fn log_file(&self) -> &'static str {
        match self {
            Mode::Run => "imsa.log",
            Mode::Heartbeat { .. } => "heartbeat.log",
            Mode::Watchdog { .. } => "watchdog.log",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let mode = cli.command.unwrap_or(Mode::Run);

    // configuration obligatoire : on sort avant de lancer quoi que ce soit
    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[imsa] {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&cfg.log_path(mode.log_file())) {
        eprintln!("[imsa] failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }
    for warning in &cfg.warnings {
        warn!("{}", warning);
    }

    let outcome = match mode {
        Mode::Run => serve(cfg),
        Mode::Heartbeat { parent_pid } => {
            run_heartbeat(&cfg, parent_pid);
            Ok(())
        }
        Mode::Watchdog { parent_pid } => run_watchdog(&cfg, parent_pid),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_heartbeat(cfg: &BotConfig, parent_pid: u32) {
    let file = HeartbeatFile::new(cfg.heartbeat_path());
    info!("Heartbeat writer started for pid {} ({})", parent_pid, file.path().display());
    HeartbeatWriter::new(file, cfg.tunables.liveness.heartbeat_interval()).run_while(|| process_alive(parent_pid));
    info!("Heartbeat writer stopped, pid {} is gone", parent_pid);
}

fn run_watchdog(cfg: &BotConfig, parent_pid: u32) -> Result<()> {
    let probe = cfg.tunables.liveness.probe()?;
    let watchdog = Watchdog::new(probe, cfg.tunables.liveness.watchdog_interval(), parent_pid);
    match watchdog.run() {
        WatchdogExit::KillFailed(e) => anyhow::bail!("watchdog could not kill pid {}: {}", parent_pid, e),
        exit => {
            debug!("Watchdog finished: {:?}", exit);
            Ok(())
        }
    }
}

fn serve(cfg: BotConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to build tokio runtime")?;
    runtime.block_on(serve_async(cfg))
}

async fn serve_async(cfg: BotConfig) -> Result<()> {
    let probe = cfg.tunables.liveness.probe()?;
    info!("Waiting for network...");
    probe.wait_until_available().await;

    // mesuré avant que le heartbeat de ce run ne réécrive le fichier
    let downtime = measure_downtime(&HeartbeatFile::new(cfg.heartbeat_path()), unix_now());
    info!("Downtime since last run: {}s", downtime.seconds());

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cfg.data_dir.display()))?;

    let mut supervisor = Supervisor::start()?;

    let bootstrap = BootstrapAdmin { telegram_id: cfg.owner_id, name: "owner".to_string() };
    let directory = Directory::connect(&cfg.database_path(), bootstrap)
        .await
        .context("Failed to open user directory")?;

    let bot = Bot::new(&cfg.token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to publish command list: {}", e);
    }

    let health = HealthTracker::new(downtime);
    let policy = FanoutPolicy {
        min_downtime_secs: cfg.tunables.notify.min_downtime_secs,
        throttle: cfg.tunables.notify.throttle(),
    };
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    if let Some(handle) =
        schedule_downtime_notice(transport, directory.clone(), downtime, policy, templates::downtime_notice)
    {
        health.mark_notice_started();
        let tracker = health.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(report) => tracker.mark_notice_done(report),
                Err(e) => error!("Downtime notice task failed: {}", e),
            }
        });
    }

    let ctx = Arc::new(BotContext {
        directory: directory.clone(),
        health,
        started_at: chrono::Utc::now(),
    });

    info!("Bot started, background processes: {:?}", supervisor.running());
    Dispatcher::builder(bot, router::schema())
        .dependencies(dptree::deps![InMemStorage::<DialogueState>::new(), ctx])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down");
    directory.close().await;
    supervisor.shutdown();
    Ok(())
}
