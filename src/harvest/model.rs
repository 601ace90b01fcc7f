//! Platform-neutral view of the entities the harvester works with.

/// A broadcast channel resolved from a handle. The access hash is only
/// valid for requests made by the task that resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub id: i64,
    pub access_hash: i64,
    pub handle: String,
    pub title: String,
}

/// Result of a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Channel(ResolvedChannel),
    /// Basic group or megagroup.
    Chat { id: i64 },
    User { id: i64 },
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Channel(_) => "channel",
            Entity::Chat { .. } => "group",
            Entity::User { .. } => "user",
        }
    }
}

/// Conversations the harvester reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    /// The operator's conversation with themself (Saved Messages).
    SelfChat,
    Channel(ResolvedChannel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i32,
    pub text: String,
    pub media: Media,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Document(Attachment),
    /// Photos, polls, web pages and anything else that is not a document.
    Other,
    None,
}

/// Everything needed to fetch a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub access_hash: i64,
    /// Short-lived capability; expires independently of `id`.
    pub file_reference: Vec<u8>,
    pub mime_type: String,
    pub attributes: Vec<Attribute>,
    pub size: Option<i64>,
}

impl Attachment {
    pub fn file_name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::Filename(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Filename(String),
    Video,
    Other,
}

/// One response to a history request. Messages are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryPage {
    Messages(Vec<Message>),
    ChannelMessages(Vec<Message>),
    Empty,
}

impl HistoryPage {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            HistoryPage::Messages(messages) | HistoryPage::ChannelMessages(messages) => messages,
            HistoryPage::Empty => Vec::new(),
        }
    }
}
