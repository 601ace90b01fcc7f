use crate::harvest::model::{Attachment, Attribute};

/// True if the declared MIME type is `video/*` or the platform tagged the
/// document with a video attribute (round videos and some streamed formats
/// arrive as `application/octet-stream`).
pub fn is_video(attachment: &Attachment) -> bool {
    attachment.mime_type.starts_with("video/")
        || attachment
            .attributes
            .iter()
            .any(|attr| matches!(attr, Attribute::Video))
}
