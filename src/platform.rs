//! Platform port
//!
//! The eraser talks to Telegram only through [`Platform`]. The production
//! implementation lives on [`crate::session::TelegramClient`]; tests plug in
//! in-memory fakes.

use std::fmt;

use async_trait::async_trait;
use grammers_tl_types as tl;

use crate::error::Result;

/// What kind of conversation a target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User { is_self: bool },
    /// Small (legacy) group chat.
    Chat,
    /// Supergroup.
    Megagroup,
    /// Broadcast group.
    Gigagroup,
    /// Broadcast channel.
    Channel,
}

/// Telegram allocates user, small-chat and channel ids independently, so a
/// raw id is only unique within one of these spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSpace {
    User,
    Chat,
    Channel,
}

impl EntityKind {
    pub fn id_space(&self) -> IdSpace {
        match self {
            EntityKind::User { .. } => IdSpace::User,
            EntityKind::Chat => IdSpace::Chat,
            EntityKind::Megagroup | EntityKind::Gigagroup | EntityKind::Channel => {
                IdSpace::Channel
            }
        }
    }
}

/// A resolved conversation to erase messages from.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Raw id, unique only within its [`IdSpace`].
    pub id: i64,
    /// Marked (Bot API) dialog id: users positive, chats `-id`,
    /// channels `-100...`.
    pub dialog_id: i64,
    pub name: String,
    pub kind: EntityKind,
    /// Input handle used for requests against this conversation.
    pub input: tl::enums::InputPeer,
}

impl Conversation {
    pub fn new(id: i64, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id,
            dialog_id: id,
            name: name.into(),
            kind,
            input: tl::enums::InputPeer::Empty,
        }
    }

    pub fn with_dialog_id(mut self, dialog_id: i64) -> Self {
        self.dialog_id = dialog_id;
        self
    }

    pub fn with_input(mut self, input: tl::enums::InputPeer) -> Self {
        self.input = input;
        self
    }

    /// Identity of the conversation across id spaces.
    pub fn key(&self) -> (IdSpace, i64) {
        (self.kind.id_space(), self.id)
    }
}

/// Pick the dialog an operator-typed numeric id refers to.
///
/// Negative ids are marked dialog ids and must match exactly. A positive id
/// is a user id first; failing that, any dialog with that raw id.
pub fn find_by_id(dialogs: &[Conversation], id: i64) -> Option<&Conversation> {
    if id < 0 {
        return dialogs.iter().find(|d| d.dialog_id == id);
    }
    dialogs
        .iter()
        .find(|d| d.kind.id_space() == IdSpace::User && d.id == id)
        .or_else(|| dialogs.iter().find(|d| d.id == id))
}

/// A peer as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerRef {
    Id(i64),
    Username(String),
}

impl PeerRef {
    /// Digits (optionally negative) are ids; anything else is a username.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i64>() {
                return Some(PeerRef::Id(id));
            }
        }
        Some(PeerRef::Username(raw.trim_start_matches('@').to_string()))
    }

    /// Split a comma-separated `--peers` value, dropping blanks and repeats.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut peers: Vec<Self> = Vec::new();
        for peer in raw.split(',').filter_map(Self::parse) {
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        peers
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRef::Id(id) => write!(f, "{}", id),
            PeerRef::Username(name) => write!(f, "{}", name),
        }
    }
}

/// Operations the eraser needs from the messaging platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Top-level dialogs, newest first, at most `limit` of them.
    async fn dialogs(&self, limit: Option<usize>) -> Result<Vec<Conversation>>;

    /// Look a peer up; `Ok(None)` when it doesn't exist.
    async fn resolve(&self, peer: &PeerRef) -> Result<Option<Conversation>>;

    /// One page of the operator's own messages in `target`, newest first,
    /// strictly older than message `offset_id` (0 = from the newest) and,
    /// when given, sent before the unix timestamp `max_date`.
    async fn search_own(
        &self,
        target: &Conversation,
        offset_id: i32,
        max_date: Option<i32>,
    ) -> Result<Vec<i32>>;

    /// Delete `ids` for everyone; returns how many the server removed.
    async fn delete(&self, target: &Conversation, ids: &[i32]) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_peers_are_ids() {
        assert_eq!(PeerRef::parse("123"), Some(PeerRef::Id(123)));
        assert_eq!(PeerRef::parse(" -100123 "), Some(PeerRef::Id(-100123)));
    }

    #[test]
    fn other_peers_are_usernames() {
        assert_eq!(
            PeerRef::parse("@durov"),
            Some(PeerRef::Username("durov".into()))
        );
        assert_eq!(
            PeerRef::parse("12ab"),
            Some(PeerRef::Username("12ab".into()))
        );
        assert_eq!(PeerRef::parse("  "), None);
    }

    #[test]
    fn peer_list_drops_blanks_and_repeats() {
        let peers = PeerRef::parse_list("123, 456,,123,@someone");
        assert_eq!(
            peers,
            vec![
                PeerRef::Id(123),
                PeerRef::Id(456),
                PeerRef::Username("someone".into())
            ]
        );
    }

    fn user(id: i64) -> Conversation {
        Conversation::new(id, "alice", EntityKind::User { is_self: false })
    }

    #[test]
    fn id_spaces() {
        assert_eq!(
            EntityKind::User { is_self: true }.id_space(),
            IdSpace::User
        );
        assert_eq!(EntityKind::Chat.id_space(), IdSpace::Chat);
        assert_eq!(EntityKind::Megagroup.id_space(), IdSpace::Channel);
        assert_eq!(EntityKind::Channel.id_space(), IdSpace::Channel);
    }

    #[test]
    fn same_raw_id_in_different_spaces_are_distinct() {
        let chat = Conversation::new(123, "old group", EntityKind::Chat).with_dialog_id(-123);
        assert_ne!(user(123).key(), chat.key());
    }

    #[test]
    fn marked_chat_id_does_not_match_user() {
        let dialogs = vec![
            user(123),
            Conversation::new(123, "old group", EntityKind::Chat).with_dialog_id(-123),
        ];

        let found = find_by_id(&dialogs, -123).expect("chat");
        assert_eq!(found.kind, EntityKind::Chat);

        let found = find_by_id(&dialogs, 123).expect("user");
        assert_eq!(found.kind.id_space(), IdSpace::User);
    }

    #[test]
    fn marked_channel_id_matches_channel() {
        let dialogs = vec![
            Conversation::new(555, "news", EntityKind::Channel).with_dialog_id(-1000000000555),
        ];

        assert!(find_by_id(&dialogs, -1000000000555).is_some());
        assert!(find_by_id(&dialogs, -555).is_none());
        // Unmarked raw id falls back to any dialog with that id.
        assert_eq!(find_by_id(&dialogs, 555).map(|d| d.id), Some(555));
    }
}
