//! Eraser: resolve targets, collect own messages, delete them in batches
//!
//! One conversation at a time: its message ids are fully collected before
//! the first delete request for it is sent.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::metrics;
use crate::period::TimePeriod;
use crate::platform::{Conversation, EntityKind, PeerRef, Platform};
use crate::prompt::{print_header, Prompter};

/// Most ids Telegram accepts in one delete request.
pub const BATCH_SIZE: usize = 100;

/// Pause between two delete requests.
pub const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Which dialogs `--entity-type` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EntityType {
    Any,
    User,
    #[default]
    Chat,
    Channel,
}

impl EntityType {
    pub fn matches(self, kind: &EntityKind) -> bool {
        match self {
            EntityType::Any => true,
            EntityType::User => matches!(kind, EntityKind::User { is_self: false }),
            EntityType::Chat => matches!(
                kind,
                EntityKind::Chat | EntityKind::Megagroup | EntityKind::Gigagroup
            ),
            EntityType::Channel => matches!(kind, EntityKind::Channel),
        }
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(EntityType::Any),
            "user" => Ok(EntityType::User),
            "chat" => Ok(EntityType::Chat),
            "channel" => Ok(EntityType::Channel),
            other => Err(Error::Validation(format!(
                "wrong entity type: '{}'. Use 'any', 'user', 'chat' or 'channel'.",
                other
            ))),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Any => "any",
            EntityType::User => "user",
            EntityType::Chat => "chat",
            EntityType::Channel => "channel",
        };
        f.write_str(name)
    }
}

/// What to erase.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    pub entity_type: EntityType,
    pub peers: Vec<PeerRef>,
    pub wipe_everything: bool,
    pub older_than: Option<TimePeriod>,
    /// Cap on the number of dialogs fetched.
    pub limit: Option<usize>,
    pub dry_run: bool,
}

/// How targets are picked, in order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Peers,
    WipeEverything,
    Interactive,
}

impl Criteria {
    pub fn selection(&self) -> Selection {
        if !self.peers.is_empty() {
            Selection::Peers
        } else if self.wipe_everything {
            Selection::WipeEverything
        } else {
            Selection::Interactive
        }
    }

    /// Unix timestamp messages must be older than, if an age filter is set.
    pub fn cutoff(&self, now: i64) -> Option<i64> {
        self.older_than
            .map(|period| now.saturating_sub(i64::try_from(period.seconds).unwrap_or(i64::MAX)))
    }
}

/// Split ids into delete batches, newest first.
pub fn batches(ids: &BTreeSet<i32>) -> Vec<Vec<i32>> {
    let ordered: Vec<i32> = ids.iter().rev().copied().collect();
    ordered.chunks(BATCH_SIZE).map(<[i32]>::to_vec).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub id: i64,
    pub name: String,
    pub found: usize,
    pub deleted: usize,
}

impl TargetReport {
    /// Messages the server refused to delete (service messages).
    pub fn remaining(&self) -> usize {
        self.found.saturating_sub(self.deleted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn found(&self) -> usize {
        self.targets.iter().map(|t| t.found).sum()
    }

    pub fn deleted(&self) -> usize {
        self.targets.iter().map(|t| t.deleted).sum()
    }
}

pub struct Eraser<'a, P: Platform + ?Sized> {
    platform: &'a P,
    criteria: &'a Criteria,
    ctx: &'a RunContext,
    delay: Duration,
}

impl<'a, P: Platform + ?Sized> Eraser<'a, P> {
    pub fn new(platform: &'a P, criteria: &'a Criteria, ctx: &'a RunContext) -> Self {
        Self {
            platform,
            criteria,
            ctx,
            delay: BATCH_DELAY,
        }
    }

    /// Override the pause between delete requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Resolve, collect and delete for every target.
    pub async fn run(&self, prompter: &mut Prompter) -> Result<RunReport> {
        let targets = self.resolve_targets(prompter).await?;
        info!(targets = targets.len(), "Resolved targets");

        let mut report = RunReport::default();
        for target in &targets {
            report.targets.push(self.erase(target).await?);
        }
        Ok(report)
    }

    async fn erase(&self, target: &Conversation) -> Result<TargetReport> {
        print_header(&format!("Getting messages from '{}'...", target.name));
        let ids = self.collect(target).await?;
        println!("\nFound {} messages to delete.", ids.len());

        let mut report = TargetReport {
            id: target.id,
            name: target.name.clone(),
            found: ids.len(),
            deleted: 0,
        };
        if ids.is_empty() {
            return Ok(report);
        }

        print_header(&format!("Deleting messages from '{}'...", target.name));
        report.deleted = self.delete(target, &ids).await?;

        if self.criteria.dry_run {
            println!(
                "\nDry run: would delete {} messages in '{}' entity.",
                report.deleted, target.name
            );
        } else {
            println!(
                "\nDeleted {} messages of {} in '{}' entity.",
                report.deleted, report.found, target.name
            );
            metrics::record_target(report.found, report.deleted);
        }

        if report.remaining() > 0 {
            println!(
                "Remaining {} messages can't be deleted without admin rights because they are service messages.",
                report.remaining()
            );
            warn!(
                conversation = %target.name,
                remaining = report.remaining(),
                "Some messages were not deleted"
            );
        }
        println!();

        Ok(report)
    }

    /// Pick the conversations to erase according to the criteria.
    pub async fn resolve_targets(&self, prompter: &mut Prompter) -> Result<Vec<Conversation>> {
        let targets = match self.criteria.selection() {
            Selection::Peers => self.resolve_peers().await?,
            Selection::WipeEverything => self.filtered_dialogs().await?,
            Selection::Interactive => vec![self.select_interactively(prompter).await?],
        };

        let mut seen = HashSet::new();
        Ok(targets.into_iter().filter(|t| seen.insert(t.key())).collect())
    }

    async fn resolve_peers(&self) -> Result<Vec<Conversation>> {
        let mut targets = Vec::with_capacity(self.criteria.peers.len());
        for peer in &self.criteria.peers {
            let resolved = self
                .ctx
                .interruptible(self.platform.resolve(peer))
                .await??;
            match resolved {
                Some(target) => {
                    debug!(%peer, id = target.id, "Resolved peer");
                    targets.push(target);
                }
                None => {
                    return Err(Error::Resolution(format!(
                        "Specified entity '{}' can't be found.",
                        peer
                    )))
                }
            }
        }
        Ok(targets)
    }

    /// Dialogs matching `--entity-type`, bounded by `--limit`.
    pub async fn filtered_dialogs(&self) -> Result<Vec<Conversation>> {
        let dialogs = self
            .ctx
            .interruptible(self.platform.dialogs(self.criteria.limit))
            .await??;
        let entity_type = self.criteria.entity_type;
        Ok(dialogs
            .into_iter()
            .filter(|d| entity_type.matches(&d.kind))
            .collect())
    }

    async fn select_interactively(&self, prompter: &mut Prompter) -> Result<Conversation> {
        let mut entities = self.filtered_dialogs().await?;
        if entities.is_empty() {
            return Err(Error::Resolution("You aren't joined to any chat.".to_string()));
        }

        print_header("List of entities");
        for (i, entity) in entities.iter().enumerate() {
            println!("{}. {}\t | {}", i + 1, entity.name, entity.dialog_id);
        }

        let index = prompter.choose("\nChoose peer: ", entities.len()).await?;
        let chosen = entities.swap_remove(index);
        println!("Chosen: {}", chosen.name);
        Ok(chosen)
    }

    /// Page through the operator's messages in `target` until an empty page.
    pub async fn collect(&self, target: &Conversation) -> Result<BTreeSet<i32>> {
        let mut ids = BTreeSet::new();

        let max_date = match self.criteria.cutoff(Utc::now().timestamp()) {
            // Nothing can be older than the epoch.
            Some(cutoff) if cutoff <= 0 => return Ok(ids),
            Some(cutoff) => Some(i32::try_from(cutoff).unwrap_or(i32::MAX)),
            None => None,
        };

        let mut offset_id = 0;
        let mut pages = 0usize;
        loop {
            let page = self
                .ctx
                .interruptible(self.platform.search_own(target, offset_id, max_date))
                .await??;
            let Some(&oldest) = page.iter().min() else {
                break;
            };
            pages += 1;
            debug!(
                conversation = %target.name,
                page = pages,
                size = page.len(),
                offset_id,
                "Fetched page"
            );
            ids.extend(page);
            offset_id = oldest;
        }

        info!(conversation = %target.name, found = ids.len(), pages, "Collected messages");
        Ok(ids)
    }

    /// Delete `ids` in batches of at most [`BATCH_SIZE`], pausing between them.
    pub async fn delete(&self, target: &Conversation, ids: &BTreeSet<i32>) -> Result<usize> {
        if self.criteria.dry_run {
            return Ok(ids.len());
        }

        let mut deleted = 0;
        for (i, batch) in batches(ids).iter().enumerate() {
            if i > 0 {
                self.ctx.sleep(self.delay).await?;
            }
            let affected = self
                .ctx
                .interruptible(self.platform.delete(target, batch))
                .await??;
            debug!(
                conversation = %target.name,
                batch = i + 1,
                requested = batch.len(),
                affected,
                "Deleted batch"
            );
            deleted += affected;
        }
        Ok(deleted)
    }
}
