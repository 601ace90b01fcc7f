//! grammers-backed Telegram client and its [`Platform`] implementation.

use anyhow::Result;
use grammers_client::Client;
use grammers_mtsender::SenderPool;
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use std::path::Path;
use std::sync::Arc;

use crate::error::PlatformError;
use crate::harvest::model::{
    Attachment, Attribute, Entity, HistoryPage, Media, Message, Peer, ResolvedChannel,
};
use crate::harvest::platform::Platform;

/// A connected Telegram client with its pool runner handle.
pub struct TgClient {
    pub client: Client,
    pool_handle: tokio::task::JoinHandle<()>,
}

impl TgClient {
    /// Connect to Telegram using a SQLite session file. Updates are not
    /// consumed: commands are discovered by polling.
    pub fn connect(session_path: &Path, api_id: i32) -> Result<Self> {
        let session = Arc::new(
            SqliteSession::open(session_path)
                .map_err(|e| anyhow::anyhow!("Failed to open session: {}", e))?,
        );

        let pool = SenderPool::new(session, api_id);
        let client = Client::new(&pool);

        let SenderPool {
            runner, updates: _, ..
        } = pool;

        let pool_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(TgClient {
            client,
            pool_handle,
        })
    }
}

impl Drop for TgClient {
    fn drop(&mut self) {
        self.client.disconnect();
        self.pool_handle.abort();
    }
}

impl Platform for TgClient {
    async fn resolve_channel(&self, handle: &str) -> Result<Option<Entity>, PlatformError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: handle.to_string(),
            referer: None,
        };
        let resolved = match self.client.invoke(&request).await {
            Ok(tl::enums::contacts::ResolvedPeer::Peer(resolved)) => resolved,
            Err(e) if e.is("USERNAME_NOT_OCCUPIED") || e.is("USERNAME_INVALID") => {
                return Ok(None)
            }
            Err(e) => return Err(PlatformError::rpc(e)),
        };

        if let Some(chat) = resolved.chats.into_iter().next() {
            return Ok(Some(entity_from_chat(chat, handle)));
        }
        Ok(resolved.users.into_iter().next().map(|user| match user {
            tl::enums::User::User(u) => Entity::User { id: u.id },
            tl::enums::User::Empty(u) => Entity::User { id: u.id },
        }))
    }

    async fn fetch_history(
        &self,
        peer: &Peer,
        offset_id: i32,
        limit: i32,
    ) -> Result<HistoryPage, PlatformError> {
        let request = tl::functions::messages::GetHistory {
            peer: input_peer(peer),
            offset_id,
            offset_date: 0,
            add_offset: 0,
            limit,
            max_id: 0,
            min_id: 0,
            hash: 0,
        };
        let page = match self.client.invoke(&request).await.map_err(PlatformError::rpc)? {
            tl::enums::messages::Messages::Messages(m) => {
                HistoryPage::Messages(m.messages.into_iter().map(message_from_raw).collect())
            }
            tl::enums::messages::Messages::Slice(m) => {
                HistoryPage::Messages(m.messages.into_iter().map(message_from_raw).collect())
            }
            tl::enums::messages::Messages::ChannelMessages(m) => HistoryPage::ChannelMessages(
                m.messages.into_iter().map(message_from_raw).collect(),
            ),
            tl::enums::messages::Messages::NotModified(_) => HistoryPage::Empty,
        };
        Ok(page)
    }

    async fn fetch_file_chunk(
        &self,
        attachment: &Attachment,
        offset: i64,
        limit: i32,
    ) -> Result<Vec<u8>, PlatformError> {
        let request = tl::functions::upload::GetFile {
            precise: false,
            cdn_supported: false,
            location: tl::enums::InputFileLocation::InputDocumentFileLocation(
                tl::types::InputDocumentFileLocation {
                    id: attachment.id,
                    access_hash: attachment.access_hash,
                    file_reference: attachment.file_reference.clone(),
                    thumb_size: String::new(),
                },
            ),
            offset,
            limit,
        };
        match self.client.invoke(&request).await.map_err(PlatformError::rpc)? {
            tl::enums::upload::File::File(file) => Ok(file.bytes),
            tl::enums::upload::File::CdnRedirect(_) => Err(PlatformError::UnexpectedResponse(
                "file is served from a CDN".to_string(),
            )),
        }
    }

    async fn edit_message(
        &self,
        peer: &Peer,
        message_id: i32,
        text: &str,
    ) -> Result<(), PlatformError> {
        let request = tl::functions::messages::EditMessage {
            no_webpage: true,
            invert_media: false,
            peer: input_peer(peer),
            id: message_id,
            message: Some(text.to_string()),
            media: None,
            reply_markup: None,
            entities: None,
            schedule_date: None,
            quick_reply_shortcut_id: None,
        };
        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(PlatformError::rpc)
    }

    async fn send_reply(
        &self,
        peer: &Peer,
        reply_to: i32,
        text: &str,
    ) -> Result<(), PlatformError> {
        let request = tl::functions::messages::SendMessage {
            no_webpage: true,
            silent: true,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer: input_peer(peer),
            reply_to: Some(tl::enums::InputReplyTo::Message(
                tl::types::InputReplyToMessage {
                    reply_to_msg_id: reply_to,
                    top_msg_id: None,
                    reply_to_peer_id: None,
                    quote_text: None,
                    quote_entities: None,
                    quote_offset: None,
                    monoforum_peer_id: None,
                    todo_item_id: None,
                },
            )),
            message: text.to_string(),
            random_id: rand::random(),
            reply_markup: None,
            entities: None,
            schedule_date: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
        };
        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(PlatformError::rpc)
    }
}

fn input_peer(peer: &Peer) -> tl::enums::InputPeer {
    match peer {
        Peer::SelfChat => tl::enums::InputPeer::PeerSelf,
        Peer::Channel(channel) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: channel.id,
            access_hash: channel.access_hash,
        }),
    }
}

/// Megagroups are channels on the wire but not broadcast channels.
fn entity_from_chat(chat: tl::enums::Chat, handle: &str) -> Entity {
    match chat {
        tl::enums::Chat::Channel(c) if !c.megagroup => Entity::Channel(ResolvedChannel {
            id: c.id,
            access_hash: c.access_hash.unwrap_or(0),
            handle: canonical_username(c.username, c.usernames.as_deref(), handle),
            title: c.title,
        }),
        tl::enums::Chat::Channel(c) => Entity::Chat { id: c.id },
        tl::enums::Chat::ChannelForbidden(c) => Entity::Chat { id: c.id },
        tl::enums::Chat::Chat(c) => Entity::Chat { id: c.id },
        tl::enums::Chat::Forbidden(c) => Entity::Chat { id: c.id },
        tl::enums::Chat::Empty(c) => Entity::Chat { id: c.id },
    }
}

/// The username as Telegram spells it. Channels with collectible usernames
/// list them in `usernames` and leave `username` empty.
fn canonical_username(
    username: Option<String>,
    usernames: Option<&[tl::enums::Username]>,
    typed: &str,
) -> String {
    if let Some(username) = username {
        return username;
    }
    usernames
        .unwrap_or_default()
        .iter()
        .map(|tl::enums::Username::Username(u)| &u.username)
        .find(|name| name.eq_ignore_ascii_case(typed))
        .cloned()
        .unwrap_or_else(|| typed.to_string())
}

fn message_from_raw(message: tl::enums::Message) -> Message {
    match message {
        tl::enums::Message::Message(m) => Message {
            id: m.id,
            text: m.message,
            media: m.media.map(media_from_raw).unwrap_or(Media::None),
        },
        tl::enums::Message::Service(m) => Message {
            id: m.id,
            text: String::new(),
            media: Media::None,
        },
        tl::enums::Message::Empty(m) => Message {
            id: m.id,
            text: String::new(),
            media: Media::None,
        },
    }
}

fn media_from_raw(media: tl::enums::MessageMedia) -> Media {
    let tl::enums::MessageMedia::Document(media) = media else {
        return Media::Other;
    };
    match media.document {
        Some(tl::enums::Document::Document(doc)) => Media::Document(Attachment {
            id: doc.id,
            access_hash: doc.access_hash,
            file_reference: doc.file_reference,
            mime_type: doc.mime_type,
            attributes: doc.attributes.into_iter().map(attribute_from_raw).collect(),
            size: Some(doc.size),
        }),
        Some(tl::enums::Document::Empty(_)) | None => Media::Other,
    }
}

fn attribute_from_raw(attribute: tl::enums::DocumentAttribute) -> Attribute {
    match attribute {
        tl::enums::DocumentAttribute::Filename(a) => Attribute::Filename(a.file_name),
        tl::enums::DocumentAttribute::Video(_) => Attribute::Video,
        _ => Attribute::Other,
    }
}
