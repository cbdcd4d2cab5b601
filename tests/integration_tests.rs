//! Integration tests for the tgeraser library
//!
//! These tests drive the public API against an in-memory platform.

mod commands;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use tgeraser::{
    config::{CredentialSource, CredentialStore},
    context::RunContext,
    eraser::{Criteria, EntityType, Eraser},
    error::{Error, Result},
    period::TimePeriod,
    platform::{find_by_id, Conversation, EntityKind, PeerRef, Platform},
    prompt::Prompter,
};

// ============================================================================
// Fake platform
// ============================================================================

/// In-memory platform: own message ids per conversation, newest first.
pub struct FakePlatform {
    dialogs: Vec<Conversation>,
    messages: HashMap<i64, Vec<i32>>,
    service: HashSet<i32>,
    deletes: Mutex<Vec<(i64, Vec<i32>)>>,
    searches: Mutex<usize>,
}

impl FakePlatform {
    pub fn new(dialogs: Vec<Conversation>) -> Self {
        Self {
            dialogs,
            messages: HashMap::new(),
            service: HashSet::new(),
            deletes: Mutex::new(Vec::new()),
            searches: Mutex::new(0),
        }
    }

    /// Give conversation `id` own messages `1..=count`.
    pub fn with_messages(mut self, id: i64, count: i32) -> Self {
        self.messages.insert(id, (1..=count).rev().collect());
        self
    }

    /// Mark ids the server will refuse to delete.
    pub fn with_service_messages(mut self, ids: &[i32]) -> Self {
        self.service.extend(ids.iter().copied());
        self
    }

    pub fn delete_calls(&self) -> Vec<(i64, Vec<i32>)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> usize {
        *self.searches.lock().unwrap()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn dialogs(&self, limit: Option<usize>) -> Result<Vec<Conversation>> {
        let limit = limit.unwrap_or(usize::MAX);
        Ok(self.dialogs.iter().take(limit).cloned().collect())
    }

    async fn resolve(&self, peer: &PeerRef) -> Result<Option<Conversation>> {
        Ok(match peer {
            PeerRef::Id(id) => find_by_id(&self.dialogs, *id).cloned(),
            PeerRef::Username(name) => self.dialogs.iter().find(|d| d.name == *name).cloned(),
        })
    }

    async fn search_own(
        &self,
        target: &Conversation,
        offset_id: i32,
        _max_date: Option<i32>,
    ) -> Result<Vec<i32>> {
        *self.searches.lock().unwrap() += 1;
        let ids = self.messages.get(&target.id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter(|id| offset_id == 0 || *id < offset_id)
            .take(100)
            .collect())
    }

    async fn delete(&self, target: &Conversation, ids: &[i32]) -> Result<usize> {
        self.deletes
            .lock()
            .unwrap()
            .push((target.id, ids.to_vec()));
        Ok(ids.iter().filter(|id| !self.service.contains(id)).count())
    }
}

pub fn group(id: i64, name: &str) -> Conversation {
    Conversation::new(id, name, EntityKind::Chat).with_dialog_id(-id)
}

pub fn channel(id: i64, name: &str) -> Conversation {
    Conversation::new(id, name, EntityKind::Channel).with_dialog_id(-1_000_000_000_000 - id)
}

pub fn user(id: i64, name: &str) -> Conversation {
    Conversation::new(
        id,
        name,
        EntityKind::User { is_self: false },
    )
}

pub fn prompter(input: &str, ctx: &RunContext) -> Prompter {
    Prompter::new(Cursor::new(input.as_bytes().to_vec()), ctx)
}

fn criteria_for_peers(peers: &str) -> Criteria {
    Criteria {
        peers: PeerRef::parse_list(peers),
        ..Criteria::default()
    }
}

// ============================================================================
// Eraser Tests
// ============================================================================

#[tokio::test]
async fn test_peers_are_erased_in_batches() {
    let platform = FakePlatform::new(vec![group(123, "alpha"), user(456, "bob")])
        .with_messages(123, 250)
        .with_messages(456, 30);
    let ctx = RunContext::new();
    let criteria = criteria_for_peers("123,456");
    let mut input = prompter("", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .with_delay(Duration::ZERO)
        .run(&mut input)
        .await
        .expect("erase run");

    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.targets[0].found, 250);
    assert_eq!(report.targets[1].found, 30);

    let calls = platform.delete_calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|(_, ids)| ids.len() <= 100));

    let alpha: BTreeSet<i32> = calls
        .iter()
        .filter(|(id, _)| *id == 123)
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect();
    assert_eq!(alpha, (1..=250).collect());

    for target in &report.targets {
        assert!(target.deleted <= target.found);
    }
}

#[tokio::test]
async fn test_unknown_peer_deletes_nothing() {
    let platform = FakePlatform::new(vec![group(123, "alpha")]).with_messages(123, 10);
    let ctx = RunContext::new();
    let criteria = criteria_for_peers("123,999");
    let mut input = prompter("", &ctx);

    let err = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Resolution(ref m) if m.contains("'999'")));
    assert!(platform.delete_calls().is_empty());
    assert_eq!(platform.search_calls(), 0);
}

#[tokio::test]
async fn test_marked_chat_id_is_not_the_user_with_same_raw_id() {
    let platform = FakePlatform::new(vec![user(7, "alice"), group(7, "old group")])
        .with_messages(7, 3);
    let ctx = RunContext::new();
    let criteria = criteria_for_peers("-7");
    let mut input = prompter("", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .expect("erase run");

    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].name, "old group");
}

#[tokio::test]
async fn test_service_messages_are_reported_not_failed() {
    let platform = FakePlatform::new(vec![group(1, "alpha")])
        .with_messages(1, 5)
        .with_service_messages(&[2, 4]);
    let ctx = RunContext::new();
    let criteria = criteria_for_peers("1");
    let mut input = prompter("", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .expect("erase run");

    assert_eq!(report.found(), 5);
    assert_eq!(report.deleted(), 3);
    assert_eq!(report.targets[0].remaining(), 2);
}

#[tokio::test]
async fn test_wipe_everything_respects_entity_type() {
    let platform = FakePlatform::new(vec![
        group(1, "alpha"),
        channel(2, "news"),
        user(3, "bob"),
        group(4, "beta"),
    ])
    .with_messages(1, 3)
    .with_messages(2, 3)
    .with_messages(3, 3)
    .with_messages(4, 3);
    let ctx = RunContext::new();
    let criteria = Criteria {
        entity_type: EntityType::Chat,
        wipe_everything: true,
        ..Criteria::default()
    };
    let mut input = prompter("", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .expect("erase run");

    let ids: Vec<i64> = report.targets.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 4]);
}

#[tokio::test]
async fn test_interactive_selection_picks_one() {
    let platform = FakePlatform::new(vec![group(1, "alpha"), group(2, "beta")])
        .with_messages(2, 7);
    let ctx = RunContext::new();
    let criteria = Criteria::default();
    let mut input = prompter("2\n", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .expect("erase run");

    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].name, "beta");
    assert_eq!(report.deleted(), 7);
}

#[tokio::test]
async fn test_dry_run_sends_no_deletes() {
    let platform = FakePlatform::new(vec![group(1, "alpha")]).with_messages(1, 120);
    let ctx = RunContext::new();
    let criteria = Criteria {
        dry_run: true,
        ..criteria_for_peers("alpha")
    };
    let mut input = prompter("", &ctx);

    let report = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .expect("erase run");

    assert_eq!(report.found(), 120);
    assert!(platform.delete_calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_context_stops_run() {
    let platform = FakePlatform::new(vec![group(1, "alpha")]).with_messages(1, 10);
    let ctx = RunContext::new();
    ctx.cancel();
    let criteria = criteria_for_peers("1");
    let mut input = prompter("", &ctx);

    let err = Eraser::new(&platform, &criteria, &ctx)
        .run(&mut input)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert!(platform.delete_calls().is_empty());
}

// ============================================================================
// Credential Store Tests
// ============================================================================

const CREDENTIALS_YAML: &str = r#"
api_credentials:
  api_id: 12345
  api_hash: abcdef0123456789
sessions:
  - session_name: main
    user_phone: "+1234567890"
  - session_name: work
"#;

#[tokio::test]
async fn test_store_loads_named_session_from_file() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().to_string_lossy().to_string();
    std::fs::write(temp.path().join("credentials.yml"), CREDENTIALS_YAML).unwrap();

    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);

    let creds = store
        .load(&CredentialSource::File, Some("work"), &mut input)
        .await
        .expect("credentials");

    assert_eq!(creds.api_id, 12345);
    assert_eq!(creds.api_hash, "abcdef0123456789");
    assert_eq!(creds.session_name, temp.path().join("work.session"));
    assert_eq!(creds.user_phone, None);
}

#[tokio::test]
async fn test_store_asks_which_session() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().to_string_lossy().to_string();
    std::fs::write(temp.path().join("credentials.yml"), CREDENTIALS_YAML).unwrap();

    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("1\n", &ctx);

    let creds = store
        .load(&CredentialSource::File, None, &mut input)
        .await
        .expect("credentials");

    assert_eq!(creds.session_name, temp.path().join("main.session"));
    assert_eq!(creds.user_phone.as_deref(), Some("+1234567890"));
}

#[tokio::test]
async fn test_store_rejects_unknown_session() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().to_string_lossy().to_string();
    std::fs::write(temp.path().join("credentials.yml"), CREDENTIALS_YAML).unwrap();

    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);

    let err = store
        .load(&CredentialSource::File, Some("missing"), &mut input)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_store_accepts_json_document() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().to_string_lossy().to_string();
    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);

    let json = r#"{"api_credentials": {"api_id": "777", "api_hash": "hash"},
                   "sessions": [{"session_name": "only"}]}"#;
    let creds = store
        .load(&CredentialSource::Json(json.to_string()), None, &mut input)
        .await
        .expect("credentials");

    assert_eq!(creds.api_id, 777);
    assert_eq!(creds.session_name, temp.path().join("only.session"));
}

#[tokio::test]
async fn test_store_declined_creation_is_config_error() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().join("fresh").to_string_lossy().to_string();
    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("n\n", &ctx);

    let err = store
        .load(&CredentialSource::File, None, &mut input)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(!temp.path().join("fresh").join("credentials.yml").exists());
}

#[tokio::test]
async fn test_store_creates_credentials_file() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().to_string_lossy().to_string();
    let store = CredentialStore::open(&dir).expect("open store");
    let ctx = RunContext::new();
    let mut input = prompter("yes\n4242\nfeedbeef\nmain\nnot a phone\n+1 234 567 8901\n", &ctx);

    let creds = store
        .load(&CredentialSource::File, None, &mut input)
        .await
        .expect("credentials");

    assert_eq!(creds.api_id, 4242);
    assert_eq!(creds.api_hash, "feedbeef");
    assert!(temp.path().join("credentials.yml").exists());
}

// ============================================================================
// Time Period Tests
// ============================================================================

#[test]
fn test_period_parsing() {
    assert_eq!(TimePeriod::parse("3*days").unwrap().seconds, 3 * 86_400);
    assert_eq!(TimePeriod::parse(" 2 * weeks ").unwrap().seconds, 2 * 604_800);
    assert!(matches!(
        TimePeriod::parse("3*fortnights"),
        Err(Error::Validation(_))
    ));
    assert!(matches!(TimePeriod::parse("x*days"), Err(Error::Validation(_))));
}
