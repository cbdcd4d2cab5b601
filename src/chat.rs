//! Telegram-backed [`Platform`]: dialogs, peer resolution, search and delete

use async_trait::async_trait;
use grammers_client::types::peer::Peer;
use grammers_tl_types as tl;

use crate::error::{Error, Result};
use crate::platform::{find_by_id, Conversation, EntityKind, PeerRef, Platform};
use crate::session::TelegramClient;

/// Page size for `messages.search`.
pub const SEARCH_PAGE_SIZE: i32 = 100;

/// Raw id of a peer, unique within its id space.
pub fn peer_id(peer: &Peer) -> i64 {
    peer.id().bare_id()
}

/// Marked (Bot API) dialog id of a peer.
pub fn dialog_id(peer: &Peer) -> i64 {
    peer.id().bot_api_dialog_id()
}

/// Kind of a group-like chat as returned in dialogs.
pub fn classify_chat(chat: &tl::enums::Chat) -> EntityKind {
    match chat {
        tl::enums::Chat::Channel(c) if c.gigagroup => EntityKind::Gigagroup,
        tl::enums::Chat::Channel(c) if c.broadcast => EntityKind::Channel,
        tl::enums::Chat::Channel(_) => EntityKind::Megagroup,
        tl::enums::Chat::ChannelForbidden(c) if c.broadcast => EntityKind::Channel,
        tl::enums::Chat::ChannelForbidden(_) => EntityKind::Megagroup,
        tl::enums::Chat::Empty(_) | tl::enums::Chat::Chat(_) | tl::enums::Chat::Forbidden(_) => {
            EntityKind::Chat
        }
    }
}

/// InputPeer for a group-like chat, forbidden ones included.
pub fn chat_to_input(chat: &tl::enums::Chat) -> tl::enums::InputPeer {
    match chat {
        tl::enums::Chat::Chat(c) => {
            tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: c.id })
        }
        tl::enums::Chat::Forbidden(c) => {
            tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: c.id })
        }
        tl::enums::Chat::Channel(c) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: c.id,
            access_hash: c.access_hash.unwrap_or(0),
        }),
        tl::enums::Chat::ChannelForbidden(c) => {
            tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                channel_id: c.id,
                access_hash: c.access_hash,
            })
        }
        tl::enums::Chat::Empty(_) => tl::enums::InputPeer::Empty,
    }
}

pub fn classify_peer(peer: &Peer) -> EntityKind {
    match peer {
        Peer::User(user) => match &user.raw {
            tl::enums::User::User(u) => EntityKind::User { is_self: u.is_self },
            tl::enums::User::Empty(_) => EntityKind::User { is_self: false },
        },
        Peer::Group(group) => classify_chat(&group.raw),
        Peer::Channel(channel) => {
            if channel.raw.gigagroup {
                EntityKind::Gigagroup
            } else if channel.raw.megagroup {
                EntityKind::Megagroup
            } else {
                EntityKind::Channel
            }
        }
    }
}

/// Convert a Peer into the InputPeer used by raw requests.
pub fn peer_to_input(peer: &Peer) -> tl::enums::InputPeer {
    match peer {
        Peer::User(user) => {
            let (user_id, access_hash) = match &user.raw {
                tl::enums::User::User(u) => (u.id, u.access_hash.unwrap_or(0)),
                tl::enums::User::Empty(u) => (u.id, 0),
            };
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id,
                access_hash,
            })
        }
        Peer::Channel(channel) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: channel.raw.id,
            access_hash: channel.raw.access_hash.unwrap_or(0),
        }),
        Peer::Group(group) => chat_to_input(&group.raw),
    }
}

/// Display name for a peer; "Saved Messages" for the operator's own chat.
pub fn peer_name(peer: &Peer) -> String {
    if let EntityKind::User { is_self: true, .. } = classify_peer(peer) {
        return "Saved Messages".to_string();
    }
    peer.name()
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.to_string())
        .unwrap_or_else(|| peer_id(peer).to_string())
}

pub fn conversation_from_peer(peer: &Peer) -> Conversation {
    Conversation::new(peer_id(peer), peer_name(peer), classify_peer(peer))
        .with_dialog_id(dialog_id(peer))
        .with_input(peer_to_input(peer))
}

fn message_id(message: &tl::enums::Message) -> Option<i32> {
    match message {
        tl::enums::Message::Empty(_) => None,
        tl::enums::Message::Message(m) => Some(m.id),
        tl::enums::Message::Service(m) => Some(m.id),
    }
}

/// Ids from a search response.
pub fn message_ids(response: &tl::enums::messages::Messages) -> Vec<i32> {
    let messages = match response {
        tl::enums::messages::Messages::Messages(m) => &m.messages,
        tl::enums::messages::Messages::Slice(m) => &m.messages,
        tl::enums::messages::Messages::ChannelMessages(m) => &m.messages,
        tl::enums::messages::Messages::NotModified(_) => return Vec::new(),
    };
    messages.iter().filter_map(message_id).collect()
}

fn affected_count(affected: tl::enums::messages::AffectedMessages) -> usize {
    match affected {
        tl::enums::messages::AffectedMessages::Messages(m) => m.pts_count.max(0) as usize,
    }
}

#[async_trait]
impl Platform for TelegramClient {
    async fn dialogs(&self, limit: Option<usize>) -> Result<Vec<Conversation>> {
        let mut dialogs = self.client.iter_dialogs();
        let mut conversations = Vec::new();

        while let Some(dialog) = dialogs.next().await? {
            if limit.is_some_and(|limit| conversations.len() >= limit) {
                break;
            }
            conversations.push(conversation_from_peer(&dialog.peer));
        }

        Ok(conversations)
    }

    async fn resolve(&self, peer: &PeerRef) -> Result<Option<Conversation>> {
        let found = match peer {
            PeerRef::Id(id) => {
                let dialogs = Platform::dialogs(self, None).await?;
                return Ok(find_by_id(&dialogs, *id).cloned());
            }
            PeerRef::Username(username) => self
                .client
                .resolve_username(username)
                .await
                .map_err(|e| Error::Telegram(e.to_string()))?,
        };
        Ok(found.as_ref().map(conversation_from_peer))
    }

    async fn search_own(
        &self,
        target: &Conversation,
        offset_id: i32,
        max_date: Option<i32>,
    ) -> Result<Vec<i32>> {
        let request = tl::functions::messages::Search {
            peer: target.input.clone(),
            q: String::new(),
            from_id: Some(tl::enums::InputPeer::PeerSelf),
            saved_peer_id: None,
            saved_reaction: None,
            top_msg_id: None,
            filter: tl::enums::MessagesFilter::InputMessagesFilterEmpty,
            min_date: 0,
            max_date: max_date.unwrap_or(0),
            offset_id,
            add_offset: 0,
            limit: SEARCH_PAGE_SIZE,
            max_id: 0,
            min_id: 0,
            hash: 0,
        };

        let response = self.client.invoke(&request).await?;
        Ok(message_ids(&response))
    }

    async fn delete(&self, target: &Conversation, ids: &[i32]) -> Result<usize> {
        let affected = match &target.input {
            tl::enums::InputPeer::Channel(channel) => {
                let request = tl::functions::channels::DeleteMessages {
                    channel: tl::enums::InputChannel::Channel(tl::types::InputChannel {
                        channel_id: channel.channel_id,
                        access_hash: channel.access_hash,
                    }),
                    id: ids.to_vec(),
                };
                self.client.invoke(&request).await?
            }
            _ => {
                let request = tl::functions::messages::DeleteMessages {
                    revoke: true,
                    id: ids.to_vec(),
                };
                self.client.invoke(&request).await?
            }
        };
        Ok(affected_count(affected))
    }
}
