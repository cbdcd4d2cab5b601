//! Session initialization binary.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tgeraser::commands::init_session;
use tgeraser::config::{CredentialSource, DEFAULT_DIRECTORY};
use tgeraser::context::RunContext;
use tgeraser::Error;

#[derive(Parser)]
#[command(name = "init_session")]
#[command(about = "Create credentials and sign a tgeraser session in")]
struct Args {
    /// Session name from credentials.yml
    session: Option<String>,

    /// Directory holding credentials.yml and session files
    #[arg(short, long, default_value = DEFAULT_DIRECTORY)]
    directory: String,

    /// Take credentials from TG_API_ID, TG_API_HASH and TG_SESSION
    #[arg(long)]
    env: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tgeraser=info".parse()?))
        .init();

    let args = Args::parse();
    let source = if args.env {
        CredentialSource::Env
    } else {
        CredentialSource::File
    };

    let mut ctx = RunContext::new();
    ctx.install_signal_handler();

    match init_session::run(&args.directory, args.session.as_deref(), &source, &ctx).await {
        Err(Error::Interrupted) => {
            println!("\nCtrl+C captured, exiting...");
            std::process::exit(0);
        }
        other => Ok(other?),
    }
}
