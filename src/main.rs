//! tgeraser CLI - main entry point
//!
//! Deletes the operator's own messages from Telegram chats, channels and
//! conversations.

use std::io::Write;
use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tgeraser::commands::{self, EraseConfig};
use tgeraser::config::{CredentialSource, DEFAULT_DIRECTORY};
use tgeraser::context::RunContext;
use tgeraser::eraser::{Criteria, EntityType};
use tgeraser::metrics;
use tgeraser::period::TimePeriod;
use tgeraser::platform::PeerRef;
use tgeraser::Error;

#[derive(Parser)]
#[command(name = "tgeraser")]
#[command(
    about = "Deletes all your messages from a chat, channel or conversation on Telegram",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding credentials.yml and session files
    #[arg(short, long, global = true, default_value = DEFAULT_DIRECTORY)]
    directory: String,

    /// Which dialogs to pick from
    #[arg(long, global = true, value_enum, default_value_t = EntityType::Chat)]
    entity_type: EntityType,

    /// Number of dialogs to fetch
    #[arg(short, long, global = true)]
    limit: Option<usize>,

    /// Comma-separated peer ids or usernames
    #[arg(short, long, global = true)]
    peers: Option<String>,

    /// Only delete messages older than this, e.g. "3*days"
    #[arg(short, long, global = true)]
    older_than: Option<TimePeriod>,

    /// Repeat the whole run every period, e.g. "2*hours"
    #[arg(short, long, global = true)]
    time_period: Option<TimePeriod>,

    /// Credentials document as a JSON string
    #[arg(long, global = true, conflicts_with = "env")]
    json: Option<String>,

    /// Take credentials from TG_API_ID, TG_API_HASH and TG_SESSION
    #[arg(long, global = true)]
    env: bool,

    /// Find messages but don't delete them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Terminate other running tgeraser instances and exit
    #[arg(long)]
    kill: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Use a stored session by name
    Session {
        /// Session name from credentials.yml
        name: String,

        /// Erase from every dialog of --entity-type instead of asking
        #[arg(short, long)]
        wipe_everything: bool,
    },
}

impl Cli {
    fn credential_source(&self) -> CredentialSource {
        match (&self.json, self.env) {
            (Some(json), _) => CredentialSource::Json(json.clone()),
            (None, true) => CredentialSource::Env,
            (None, false) => CredentialSource::File,
        }
    }

    fn into_erase_config(self) -> EraseConfig {
        let source = self.credential_source();
        let (session, wipe_everything) = match self.command {
            Some(Commands::Session {
                name,
                wipe_everything,
            }) => (Some(name), wipe_everything),
            None => (None, false),
        };

        EraseConfig {
            directory: self.directory,
            session,
            source,
            criteria: Criteria {
                entity_type: self.entity_type,
                peers: self
                    .peers
                    .as_deref()
                    .map(PeerRef::parse_list)
                    .unwrap_or_default(),
                wipe_everything,
                older_than: self.older_than,
                limit: self.limit,
                dry_run: self.dry_run,
            },
            time_period: self.time_period,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tgeraser=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let mut ctx = RunContext::new();
    ctx.install_signal_handler();

    let result = if cli.kill {
        commands::kill_run().await.map(|_| ())
    } else {
        commands::erase_run(&cli.into_erase_config(), &ctx).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(Error::Interrupted) => {
            println!("\nCtrl+C captured, exiting...");
            let _ = std::io::stdout().flush();
            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(0);
        }
        Err(err) if err.is_operator_error() => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
        Err(err) => Err(err).context("tgeraser failed"),
    }
}
