use std::future::Future;

use crate::error::PlatformError;
use crate::harvest::model::{Attachment, Entity, HistoryPage, Peer};

/// The platform calls the harvester needs.
///
/// Implemented by the grammers-backed client and by the test mock. One
/// instance is shared by the poller and every crawl task, so all methods
/// take `&self`.
pub trait Platform: Send + Sync + 'static {
    /// Look up a public handle. `None` when nothing answers to it.
    fn resolve_channel(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<Option<Entity>, PlatformError>> + Send;

    /// Up to `limit` messages older than `offset_id` (0 = newest), newest first.
    fn fetch_history(
        &self,
        peer: &Peer,
        offset_id: i32,
        limit: i32,
    ) -> impl Future<Output = Result<HistoryPage, PlatformError>> + Send;

    /// Up to `limit` bytes of the attachment starting at `offset`.
    fn fetch_file_chunk(
        &self,
        attachment: &Attachment,
        offset: i64,
        limit: i32,
    ) -> impl Future<Output = Result<Vec<u8>, PlatformError>> + Send;

    fn edit_message(
        &self,
        peer: &Peer,
        message_id: i32,
        text: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Post `text` in `peer` as a reply to `reply_to`.
    fn send_reply(
        &self,
        peer: &Peer,
        reply_to: i32,
        text: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}
