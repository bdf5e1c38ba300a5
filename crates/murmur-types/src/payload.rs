use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageType;

/// Upper bound on text content and captions, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("text messages need non-empty content")]
    EmptyContent,
    #[error("content exceeds {max} characters")]
    ContentTooLong { max: usize },
    #[error("media messages need a media reference")]
    MissingMedia,
    #[error("voice messages need a positive duration")]
    ZeroDuration,
}

/// Opaque reference to media uploaded elsewhere. The core never opens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub media_ref: String,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl MediaAttachment {
    pub fn new(media_ref: impl Into<String>) -> Self {
        Self {
            media_ref: media_ref.into(),
            thumbnail_ref: None,
            file_name: None,
            file_size: None,
        }
    }
}

/// The body of an outgoing message, one variant per message type.
///
/// Every variant carries only the fields meaningful to it, and a payload is
/// validated whenever it is built, whether through the constructors below or
/// through deserialization. A text message always has content; every other
/// type always has media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PayloadRepr", into = "PayloadRepr")]
pub enum MessagePayload {
    Text {
        content: String,
    },
    Image {
        media: MediaAttachment,
        caption: Option<String>,
    },
    Video {
        media: MediaAttachment,
        caption: Option<String>,
        duration_seconds: Option<u32>,
    },
    File {
        media: MediaAttachment,
        caption: Option<String>,
    },
    Voice {
        media_ref: String,
        duration_seconds: u32,
    },
}

impl MessagePayload {
    pub fn text(content: impl Into<String>) -> Result<Self, PayloadError> {
        PayloadRepr::Text { content: content.into() }.try_into()
    }

    pub fn image(media: MediaAttachment, caption: Option<String>) -> Result<Self, PayloadError> {
        PayloadRepr::Image { media, caption }.try_into()
    }

    pub fn video(
        media: MediaAttachment,
        caption: Option<String>,
        duration_seconds: Option<u32>,
    ) -> Result<Self, PayloadError> {
        PayloadRepr::Video { media, caption, duration_seconds }.try_into()
    }

    pub fn file(media: MediaAttachment, caption: Option<String>) -> Result<Self, PayloadError> {
        PayloadRepr::File { media, caption }.try_into()
    }

    pub fn voice(media_ref: impl Into<String>, duration_seconds: u32) -> Result<Self, PayloadError> {
        PayloadRepr::Voice { media_ref: media_ref.into(), duration_seconds }.try_into()
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text { .. } => MessageType::Text,
            Self::Image { .. } => MessageType::Image,
            Self::Video { .. } => MessageType::Video,
            Self::File { .. } => MessageType::File,
            Self::Voice { .. } => MessageType::Voice,
        }
    }

    /// Text content for text messages, the caption for media messages.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            Self::Image { caption, .. } | Self::Video { caption, .. } | Self::File { caption, .. } => {
                caption.as_deref()
            }
            Self::Voice { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        match self {
            Self::Text { content } => check_content(content),
            Self::Image { media, caption } | Self::File { media, caption } => {
                check_media(&media.media_ref)?;
                caption.as_deref().map_or(Ok(()), check_content)
            }
            Self::Video { media, caption, .. } => {
                check_media(&media.media_ref)?;
                caption.as_deref().map_or(Ok(()), check_content)
            }
            Self::Voice { media_ref, duration_seconds } => {
                check_media(media_ref)?;
                if *duration_seconds == 0 {
                    return Err(PayloadError::ZeroDuration);
                }
                Ok(())
            }
        }
    }
}

fn check_content(content: &str) -> Result<(), PayloadError> {
    if content.trim().is_empty() {
        return Err(PayloadError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(PayloadError::ContentTooLong { max: MAX_CONTENT_CHARS });
    }
    Ok(())
}

fn check_media(media_ref: &str) -> Result<(), PayloadError> {
    if media_ref.trim().is_empty() {
        return Err(PayloadError::MissingMedia);
    }
    Ok(())
}

/// Blank captions carry no information; store them as absent.
fn normalize_caption(caption: Option<String>) -> Option<String> {
    caption.filter(|c| !c.trim().is_empty())
}

/// Wire form of [`MessagePayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "lowercase")]
enum PayloadRepr {
    Text {
        content: String,
    },
    Image {
        media: MediaAttachment,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        media: MediaAttachment,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        duration_seconds: Option<u32>,
    },
    File {
        media: MediaAttachment,
        #[serde(default)]
        caption: Option<String>,
    },
    Voice {
        media_ref: String,
        duration_seconds: u32,
    },
}

impl TryFrom<PayloadRepr> for MessagePayload {
    type Error = PayloadError;

    fn try_from(repr: PayloadRepr) -> Result<Self, Self::Error> {
        let payload = match repr {
            PayloadRepr::Text { content } => Self::Text { content },
            PayloadRepr::Image { media, caption } => Self::Image {
                media,
                caption: normalize_caption(caption),
            },
            PayloadRepr::Video { media, caption, duration_seconds } => Self::Video {
                media,
                caption: normalize_caption(caption),
                duration_seconds,
            },
            PayloadRepr::File { media, caption } => Self::File {
                media,
                caption: normalize_caption(caption),
            },
            PayloadRepr::Voice { media_ref, duration_seconds } => Self::Voice { media_ref, duration_seconds },
        };
        payload.validate()?;
        Ok(payload)
    }
}

impl From<MessagePayload> for PayloadRepr {
    fn from(payload: MessagePayload) -> Self {
        match payload {
            MessagePayload::Text { content } => Self::Text { content },
            MessagePayload::Image { media, caption } => Self::Image { media, caption },
            MessagePayload::Video { media, caption, duration_seconds } => {
                Self::Video { media, caption, duration_seconds }
            }
            MessagePayload::File { media, caption } => Self::File { media, caption },
            MessagePayload::Voice { media_ref, duration_seconds } => Self::Voice { media_ref, duration_seconds },
        }
    }
}

/// A message to send: its body plus an optional message it replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub payload: MessagePayload,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
}

impl OutgoingMessage {
    pub fn replying_to(mut self, message_id: Uuid) -> Self {
        self.reply_to_id = Some(message_id);
        self
    }
}

impl From<MessagePayload> for OutgoingMessage {
    fn from(payload: MessagePayload) -> Self {
        Self { payload, reply_to_id: None }
    }
}
