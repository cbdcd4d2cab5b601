//! Erase command: credentials, connection, sign in, then erase cycles

use std::time::Instant;

use tracing::info;

use crate::config::{CredentialSource, CredentialStore};
use crate::context::RunContext;
use crate::eraser::{Criteria, Eraser, RunReport};
use crate::error::Result;
use crate::metrics;
use crate::period::TimePeriod;
use crate::platform::Platform;
use crate::prompt::Prompter;
use crate::session::TelegramClient;

/// Everything one invocation of the eraser needs.
#[derive(Debug, Clone)]
pub struct EraseConfig {
    /// Credentials directory (`~` allowed).
    pub directory: String,
    /// Stored session to use; `None` picks one interactively.
    pub session: Option<String>,
    pub source: CredentialSource,
    pub criteria: Criteria,
    /// Repeat the whole cycle after sleeping this long.
    pub time_period: Option<TimePeriod>,
}

/// Load credentials, connect, sign in and run the erase cycles.
pub async fn run(config: &EraseConfig, ctx: &RunContext) -> Result<()> {
    let mut prompter = Prompter::stdin(ctx);

    let store = CredentialStore::open(&config.directory)?;
    let credentials = store
        .load(&config.source, config.session.as_deref(), &mut prompter)
        .await?;

    let mut client = ctx
        .interruptible(TelegramClient::connect(&credentials))
        .await??;
    client.authorize(&credentials, &mut prompter, ctx).await?;

    run_cycles(
        &client,
        &config.criteria,
        config.time_period,
        ctx,
        &mut prompter,
    )
    .await
}

/// Run one erase cycle, then keep repeating every `time_period` if set.
pub async fn run_cycles<P: Platform + ?Sized>(
    platform: &P,
    criteria: &Criteria,
    time_period: Option<TimePeriod>,
    ctx: &RunContext,
    prompter: &mut Prompter,
) -> Result<()> {
    let mut cycle = 0usize;
    loop {
        cycle += 1;
        let report = run_cycle(platform, criteria, ctx, prompter).await?;
        info!(
            cycle,
            targets = report.targets.len(),
            found = report.found(),
            deleted = report.deleted(),
            "Erase cycle finished"
        );

        let Some(period) = time_period else {
            return Ok(());
        };
        println!("Sleeping for {}...", period);
        ctx.sleep(period.as_duration()).await?;
    }
}

/// One full resolve/collect/delete pass, timed for metrics.
pub async fn run_cycle<P: Platform + ?Sized>(
    platform: &P,
    criteria: &Criteria,
    ctx: &RunContext,
    prompter: &mut Prompter,
) -> Result<RunReport> {
    let start = Instant::now();
    let result = Eraser::new(platform, criteria, ctx).run(prompter).await;
    metrics::record_run(start.elapsed(), result.is_ok());
    result
}
