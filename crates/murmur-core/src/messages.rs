use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_db::models::{MessageRow, NewMessage};
use murmur_db::timestamp;
use murmur_types::api::{MessagePage, MessageView, ReactionGroup, Resolved};
use murmur_types::models::{Message, MessageType};
use murmur_types::payload::{MAX_CONTENT_CHARS, MessagePayload, OutgoingMessage};

use crate::{ChatError, Result, Session, convert};

/// Message persistence and the enriched message views.
pub struct Messages<'a> {
    session: Session<'a>,
}

/// Column values of a message body, borrowed from a payload or a source row.
struct Body<'p> {
    message_type: &'p str,
    content: Option<&'p str>,
    media_ref: Option<&'p str>,
    media_thumbnail_ref: Option<&'p str>,
    file_name: Option<&'p str>,
    file_size: Option<i64>,
    duration_seconds: Option<i64>,
}

impl<'p> Body<'p> {
    fn from_payload(payload: &'p MessagePayload) -> Result<Self> {
        let message_type = payload.message_type().as_str();
        let content = payload.content();
        let body = match payload {
            MessagePayload::Text { .. } => Self {
                message_type,
                content,
                media_ref: None,
                media_thumbnail_ref: None,
                file_name: None,
                file_size: None,
                duration_seconds: None,
            },
            MessagePayload::Image { media, .. }
            | MessagePayload::File { media, .. }
            | MessagePayload::Video { media, .. } => Self {
                message_type,
                content,
                media_ref: Some(&media.media_ref),
                media_thumbnail_ref: media.thumbnail_ref.as_deref(),
                file_name: media.file_name.as_deref(),
                file_size: media
                    .file_size
                    .map(i64::try_from)
                    .transpose()
                    .map_err(|_| ChatError::Invalid("file size out of range".into()))?,
                duration_seconds: match payload {
                    MessagePayload::Video { duration_seconds, .. } => duration_seconds.map(i64::from),
                    _ => None,
                },
            },
            MessagePayload::Voice { media_ref, duration_seconds } => Self {
                message_type,
                content: None,
                media_ref: Some(media_ref),
                media_thumbnail_ref: None,
                file_name: None,
                file_size: None,
                duration_seconds: Some(i64::from(*duration_seconds)),
            },
        };
        Ok(body)
    }

    fn from_row(row: &'p MessageRow) -> Self {
        Self {
            message_type: &row.message_type,
            content: row.content.as_deref(),
            media_ref: row.media_ref.as_deref(),
            media_thumbnail_ref: row.media_thumbnail_ref.as_deref(),
            file_name: row.file_name.as_deref(),
            file_size: row.file_size,
            duration_seconds: row.duration_seconds,
        }
    }
}

impl<'a> Messages<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Sends a message as the caller. A reply target must be a live message
    /// in the same conversation.
    pub fn send(&self, conversation_id: Uuid, message: OutgoingMessage) -> Result<MessageView> {
        let s = &self.session;
        message.payload.validate()?;

        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let reply_to = match message.reply_to_id {
            Some(reply_id) => {
                let target = s.db().get_message(&reply_id.to_string())?;
                match target {
                    Some(row) if row.conversation_id == conv_id && row.deleted_at.is_none() => Some(row.id),
                    _ => return Err(ChatError::NotFound("reply target")),
                }
            }
            None => None,
        };

        let body = Body::from_payload(&message.payload)?;
        let row = self.insert(&conv_id, &body, reply_to.as_deref(), None)?;
        self.view_one(row)
    }

    fn insert(
        &self,
        conversation_id: &str,
        body: &Body<'_>,
        reply_to_id: Option<&str>,
        forwarded_from_id: Option<&str>,
    ) -> Result<MessageRow> {
        let s = &self.session;
        let id = Uuid::new_v4().to_string();
        let sender = s.caller_key();
        let now = s.now_key();

        s.db().insert_message(&NewMessage {
            id: &id,
            conversation_id,
            sender_id: &sender,
            content: body.content,
            message_type: body.message_type,
            media_ref: body.media_ref,
            media_thumbnail_ref: body.media_thumbnail_ref,
            file_name: body.file_name,
            file_size: body.file_size,
            duration_seconds: body.duration_seconds,
            reply_to_id,
            forwarded_from_id,
            created_at: &now,
        })?;
        debug!("User {} sent {} message {} to {}", sender, body.message_type, id, conversation_id);

        // Advisory: the message is stored even if the conversation is not touched.
        if let Err(e) = s.db().touch_last_message(conversation_id, &now) {
            warn!("Failed to update last_message_at on {}: {}", conversation_id, e);
        }

        s.db().get_message(&id)?.ok_or(ChatError::NotFound("message"))
    }

    /// Replaces the content of the caller's own message.
    pub fn edit(&self, message_id: Uuid, content: &str) -> Result<MessageView> {
        let s = &self.session;
        let row = s.message_row(message_id)?;
        if row.sender_id != s.caller_key() {
            return Err(ChatError::Forbidden("only the sender can edit a message"));
        }
        if row.deleted_at.is_some() {
            return Err(ChatError::NotFound("message"));
        }
        if row.message_type == MessageType::Voice.as_str() {
            return Err(ChatError::Invalid("voice messages have no text to edit".into()));
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Invalid("message content must not be empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ChatError::Invalid(format!("content exceeds {} characters", MAX_CONTENT_CHARS)));
        }

        if s.db().update_message_content(&row.id, content, &s.now_key())? == 0 {
            return Err(ChatError::NotFound("message"));
        }
        let row = s.message_row(message_id)?;
        self.view_one(row)
    }

    /// Marks the caller's own message as deleted. Deleting twice is a no-op.
    pub fn soft_delete(&self, message_id: Uuid) -> Result<()> {
        let s = &self.session;
        let row = s.message_row(message_id)?;
        if row.sender_id != s.caller_key() {
            return Err(ChatError::Forbidden("only the sender can delete a message"));
        }
        if row.deleted_at.is_some() {
            return Ok(());
        }

        s.db().soft_delete_message(&row.id, &s.now_key())?;
        info!("User {} deleted message {}", s.caller(), row.id);
        Ok(())
    }

    /// Copies a message into another conversation the caller belongs to.
    pub fn forward(&self, message_id: Uuid, target_conversation_id: Uuid) -> Result<MessageView> {
        let s = &self.session;
        let source = s.message_row(message_id)?;
        s.require_member(&source.conversation_id)?;

        let target = target_conversation_id.to_string();
        s.require_member(&target)?;

        if source.deleted_at.is_some() {
            return Err(ChatError::NotFound("message"));
        }

        let row = self.insert(&target, &Body::from_row(&source), None, Some(&source.id))?;
        self.view_one(row)
    }

    pub fn pin(&self, message_id: Uuid) -> Result<()> {
        self.set_pinned(message_id, true)
    }

    pub fn unpin(&self, message_id: Uuid) -> Result<()> {
        self.set_pinned(message_id, false)
    }

    /// Sets the flag rather than flipping it, so repeating a call is harmless.
    fn set_pinned(&self, message_id: Uuid, pinned: bool) -> Result<()> {
        let s = &self.session;
        let row = s.message_row(message_id)?;
        s.require_member(&row.conversation_id)?;
        if row.deleted_at.is_some() {
            return Err(ChatError::NotFound("message"));
        }

        s.db().set_message_pinned(&row.id, pinned)?;
        Ok(())
    }

    /// One page of live messages, oldest first. Page backwards by passing
    /// the oldest message of the previous page as `before_id`; it may have
    /// been deleted since but must belong to this conversation.
    pub fn list(&self, conversation_id: Uuid, page: MessagePage) -> Result<Vec<MessageView>> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let cursor = match page.before_id {
            Some(id) => {
                let row = s.db().get_message(&id.to_string())?;
                match row {
                    Some(row) if row.conversation_id == conv_id => Some(row.id),
                    _ => return Err(ChatError::NotFound("cursor message")),
                }
            }
            None => None,
        };

        let limit = s.config().page_size(page.limit);
        let before = page.before.map(timestamp);
        let mut rows = s
            .db()
            .list_messages(&conv_id, limit, before.as_deref(), cursor.as_deref())?;
        rows.reverse();
        self.views(rows)
    }

    /// Case-insensitive content search, newest first.
    pub fn search(&self, conversation_id: Uuid, text: &str) -> Result<Vec<MessageView>> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }

        let rows = s.db().search_messages(&conv_id, text, s.config().search_limit)?;
        self.views(rows)
    }

    pub fn pinned(&self, conversation_id: Uuid) -> Result<Vec<MessageView>> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let rows = s.db().pinned_messages(&conv_id)?;
        self.views(rows)
    }

    /// Resolves a message for rendering. Missing and deleted messages come
    /// back as `Unavailable`.
    pub fn get(&self, message_id: Uuid) -> Result<Resolved<MessageView>> {
        let s = &self.session;
        let Some(row) = s.db().get_message(&message_id.to_string())? else {
            return Ok(Resolved::Unavailable);
        };
        s.require_member(&row.conversation_id)?;

        if row.deleted_at.is_some() {
            return Ok(Resolved::Unavailable);
        }
        self.view_one(row).map(Resolved::Available)
    }

    fn view_one(&self, row: MessageRow) -> Result<MessageView> {
        self.views(vec![row])?
            .pop()
            .ok_or(ChatError::NotFound("message"))
    }

    /// Attaches sender profiles, reply and forward targets, read state and
    /// reactions to a batch of rows, keeping their order.
    fn views(&self, rows: Vec<MessageRow>) -> Result<Vec<MessageView>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let s = &self.session;
        let me = s.caller_key();

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let senders: Vec<String> = rows
            .iter()
            .map(|r| r.sender_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles = s.profiles(&senders)?;

        let referenced: Vec<String> = rows
            .iter()
            .flat_map(|r| [r.reply_to_id.clone(), r.forwarded_from_id.clone()])
            .flatten()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let targets: HashMap<String, Message> = s
            .db()
            .get_messages_by_ids(&referenced)?
            .iter()
            .map(|r| (r.id.clone(), convert::message(r)))
            .collect();
        let resolve = |id: &Option<String>| {
            id.as_ref().map(|id| match targets.get(id) {
                Some(m) if !m.is_deleted() => Resolved::Available(Box::new(m.clone())),
                _ => Resolved::Unavailable,
            })
        };

        let mut readers: HashMap<String, Vec<String>> = HashMap::new();
        for read in s.db().reads_for_messages(&ids)? {
            readers.entry(read.message_id).or_default().push(read.user_id);
        }

        // emoji groups per message, in order of first reaction
        let mut reactions: HashMap<String, Vec<ReactionGroup>> = HashMap::new();
        for r in s.db().reactions_for_messages(&ids)? {
            let groups = reactions.entry(r.message_id.clone()).or_default();
            let user = convert::uuid(&r.user_id, "reaction user_id");
            match groups.iter_mut().find(|g| g.emoji == r.emoji) {
                Some(group) => {
                    group.count += 1;
                    group.user_ids.push(user);
                }
                None => groups.push(ReactionGroup { emoji: r.emoji, count: 1, user_ids: vec![user] }),
            }
        }

        Ok(rows
            .iter()
            .map(|row| {
                let read_by = readers.get(&row.id).map(Vec::as_slice).unwrap_or_default();
                MessageView {
                    message: convert::message(row),
                    sender: profiles.get(&row.sender_id).cloned(),
                    reply_to: resolve(&row.reply_to_id),
                    forwarded_from: resolve(&row.forwarded_from_id),
                    is_read: row.sender_id == me || read_by.contains(&me),
                    read_by: read_by.iter().map(|u| convert::uuid(u, "reader id")).collect(),
                    reactions: reactions.remove(&row.id).unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use crate::ChatError;
    use crate::test_support::*;
    use murmur_types::api::{MessagePage, MessageView, Resolved};
    use murmur_types::models::MessageType;
    use murmur_types::payload::{MediaAttachment, MessagePayload, OutgoingMessage};

    fn text(content: &str) -> OutgoingMessage {
        MessagePayload::text(content).unwrap().into()
    }

    fn direct(h: &Harness) -> Uuid {
        h.as_user(ALICE).conversations().create_direct(BOB).unwrap().id
    }

    #[test]
    fn send_requires_membership() {
        let h = Harness::new();
        let conv = direct(&h);
        let err = h.as_user(CAROL).messages().send(conv, text("let me in")).unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn send_stores_media_fields_and_touches_conversation() {
        let h = Harness::new();
        let conv = direct(&h);

        let mut media = MediaAttachment::new("media/cat.jpg");
        media.thumbnail_ref = Some("media/cat.thumb.jpg".to_string());
        media.file_size = Some(2048);
        let payload = MessagePayload::image(media, Some("look".to_string())).unwrap();

        h.tick();
        let view = h.as_user(ALICE).messages().send(conv, payload.into()).unwrap();
        assert_eq!(view.message.message_type, MessageType::Image);
        assert_eq!(view.message.content.as_deref(), Some("look"));
        assert_eq!(view.message.media_thumbnail_ref.as_deref(), Some("media/cat.thumb.jpg"));
        assert_eq!(view.message.file_size, Some(2048));
        assert!(view.is_read);
        assert_eq!(view.sender.unwrap().id, ALICE);

        let voice = MessagePayload::voice("media/hello.ogg", 7).unwrap();
        let view = h.as_user(BOB).messages().send(conv, voice.into()).unwrap();
        assert_eq!(view.message.duration_seconds, Some(7));
        assert_eq!(view.message.content, None);

        let detail = h.as_user(ALICE).conversations().get(conv).unwrap();
        assert_eq!(detail.conversation.last_message_at, Some(view.message.created_at));
    }

    #[test]
    fn reply_target_must_live_in_the_same_conversation() {
        let h = Harness::new();
        let conv = direct(&h);
        let other = h.as_user(ALICE).conversations().create_direct(CAROL).unwrap().id;
        let elsewhere = h.as_user(CAROL).messages().send(other, text("psst")).unwrap();

        let err = h
            .as_user(ALICE)
            .messages()
            .send(conv, text("re").replying_to(elsewhere.message.id))
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound("reply target")));

        let err = h
            .as_user(ALICE)
            .messages()
            .send(conv, text("re").replying_to(Uuid::from_u128(0x1234)))
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound("reply target")));
    }

    #[test]
    fn deleted_reply_target_renders_unavailable() {
        let h = Harness::new();
        let conv = direct(&h);

        let m1 = h.as_user(ALICE).messages().send(conv, text("first")).unwrap();
        h.tick();
        let m2 = h
            .as_user(BOB)
            .messages()
            .send(conv, text("replying").replying_to(m1.message.id))
            .unwrap();
        assert!(m2.reply_to.as_ref().unwrap().is_available());

        h.as_user(ALICE).messages().soft_delete(m1.message.id).unwrap();

        let listed = h.as_user(ALICE).messages().list(conv, MessagePage::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message.id, m2.message.id);
        assert!(matches!(listed[0].reply_to, Some(Resolved::Unavailable)));

        // Receipt bookkeeping still works on the deleted message.
        assert!(h.as_user(ALICE).receipts().read_by(m1.message.id).unwrap().is_empty());
        assert!(matches!(h.as_user(ALICE).messages().get(m1.message.id).unwrap(), Resolved::Unavailable));
    }

    #[test]
    fn edit_and_delete_are_sender_only() {
        let h = Harness::new();
        let conv = direct(&h);
        let msg = h.as_user(ALICE).messages().send(conv, text("helo")).unwrap();

        let err = h.as_user(BOB).messages().edit(msg.message.id, "hijacked").unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
        let err = h.as_user(BOB).messages().soft_delete(msg.message.id).unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let err = h.as_user(ALICE).messages().edit(msg.message.id, "  ").unwrap_err();
        assert!(matches!(err, ChatError::Invalid(_)));

        h.clock.advance(Duration::seconds(5));
        let edited = h.as_user(ALICE).messages().edit(msg.message.id, "hello").unwrap();
        assert_eq!(edited.message.content.as_deref(), Some("hello"));
        assert!(edited.message.updated_at > edited.message.created_at);

        h.as_user(ALICE).messages().soft_delete(msg.message.id).unwrap();
        h.as_user(ALICE).messages().soft_delete(msg.message.id).unwrap();
        let err = h.as_user(ALICE).messages().edit(msg.message.id, "again").unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[test]
    fn forward_copies_body_but_not_reply_or_pin() {
        let h = Harness::new();
        let conv = direct(&h);
        let group = h.as_user(ALICE).conversations().create_group(Some("Team"), None, &[CAROL]).unwrap().id;

        let original = h.as_user(BOB).messages().send(conv, text("news")).unwrap();
        let reply = h
            .as_user(BOB)
            .messages()
            .send(conv, text("big news").replying_to(original.message.id))
            .unwrap();
        h.as_user(ALICE).messages().pin(reply.message.id).unwrap();

        // Bob is not in the group.
        let err = h.as_user(BOB).messages().forward(reply.message.id, group).unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let fwd = h.as_user(ALICE).messages().forward(reply.message.id, group).unwrap();
        assert_eq!(fwd.message.conversation_id, group);
        assert_eq!(fwd.message.sender_id, ALICE);
        assert_eq!(fwd.message.content.as_deref(), Some("big news"));
        assert_eq!(fwd.message.forwarded_from_id, Some(reply.message.id));
        assert!(fwd.message.reply_to_id.is_none());
        assert!(!fwd.message.is_pinned);
        assert!(fwd.forwarded_from.unwrap().is_available());
    }

    #[test]
    fn forwarding_a_deleted_message_fails() {
        let h = Harness::new();
        let conv = direct(&h);
        let msg = h.as_user(ALICE).messages().send(conv, text("oops")).unwrap();
        h.as_user(ALICE).messages().soft_delete(msg.message.id).unwrap();

        let err = h.as_user(ALICE).messages().forward(msg.message.id, conv).unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[test]
    fn pin_is_idempotent_and_listed() {
        let h = Harness::new();
        let conv = direct(&h);
        let msg = h.as_user(ALICE).messages().send(conv, text("rules")).unwrap();

        h.as_user(BOB).messages().pin(msg.message.id).unwrap();
        h.as_user(BOB).messages().pin(msg.message.id).unwrap();
        let pinned = h.as_user(ALICE).messages().pinned(conv).unwrap();
        assert_eq!(pinned.len(), 1);
        assert!(pinned[0].message.is_pinned);

        h.as_user(ALICE).messages().unpin(msg.message.id).unwrap();
        h.as_user(ALICE).messages().unpin(msg.message.id).unwrap();
        assert!(h.as_user(ALICE).messages().pinned(conv).unwrap().is_empty());

        let err = h.as_user(CAROL).messages().pin(msg.message.id).unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn list_pages_backwards_and_returns_oldest_first() {
        let h = Harness::new();
        let conv = direct(&h);
        let mut sent = Vec::new();
        for i in 0..5 {
            h.tick();
            sent.push(h.as_user(ALICE).messages().send(conv, text(&format!("m{}", i))).unwrap());
        }

        let page = h
            .as_user(BOB)
            .messages()
            .list(conv, MessagePage { limit: Some(2), ..Default::default() })
            .unwrap();
        let contents: Vec<_> = page.iter().map(|m| m.message.content.clone().unwrap()).collect();
        assert_eq!(contents, ["m3", "m4"]);
        assert!(!page[0].is_read);

        let older = h
            .as_user(BOB)
            .messages()
            .list(
                conv,
                MessagePage { limit: Some(2), before: Some(page[0].message.created_at), before_id: None },
            )
            .unwrap();
        let contents: Vec<_> = older.iter().map(|m| m.message.content.clone().unwrap()).collect();
        assert_eq!(contents, ["m1", "m2"]);
    }

    #[test]
    fn id_cursor_pages_through_messages_sent_in_the_same_instant() {
        let h = Harness::new();
        let conv = direct(&h);
        for i in 0..4 {
            h.as_user(ALICE).messages().send(conv, text(&format!("m{}", i))).unwrap();
        }
        let contents =
            |page: &[MessageView]| page.iter().map(|m| m.message.content.clone().unwrap()).collect::<Vec<_>>();

        let newest = h
            .as_user(BOB)
            .messages()
            .list(conv, MessagePage { limit: Some(2), ..Default::default() })
            .unwrap();
        assert_eq!(contents(&newest), ["m2", "m3"]);

        let older = h
            .as_user(BOB)
            .messages()
            .list(conv, MessagePage { limit: Some(2), before: None, before_id: Some(newest[0].message.id) })
            .unwrap();
        assert_eq!(contents(&older), ["m0", "m1"]);

        let other = h.as_user(ALICE).conversations().create_direct(CAROL).unwrap().id;
        let foreign = h.as_user(ALICE).messages().send(other, text("elsewhere")).unwrap();
        let err = h
            .as_user(ALICE)
            .messages()
            .list(conv, MessagePage { limit: None, before: None, before_id: Some(foreign.message.id) })
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound("cursor message")));
    }

    #[test]
    fn list_shows_read_state_and_reactions() {
        let h = Harness::new();
        let conv = direct(&h);
        let msg = h.as_user(ALICE).messages().send(conv, text("party?")).unwrap();

        h.as_user(BOB).receipts().mark_read(conv).unwrap();
        h.as_user(BOB).reactions().toggle(msg.message.id, "🎉").unwrap();
        h.as_user(ALICE).reactions().toggle(msg.message.id, "🎉").unwrap();

        let bob_view = h.as_user(BOB).messages().list(conv, MessagePage::default()).unwrap();
        assert!(bob_view[0].is_read);
        assert_eq!(bob_view[0].read_by, [BOB]);
        assert_eq!(bob_view[0].reactions.len(), 1);
        assert_eq!(bob_view[0].reactions[0].count, 2);
        assert_eq!(bob_view[0].reactions[0].user_ids, [BOB, ALICE]);
    }

    #[test]
    fn search_is_scoped_and_capped() {
        let h = Harness::new();
        let conv = direct(&h);
        let other = h.as_user(ALICE).conversations().create_direct(CAROL).unwrap().id;

        h.as_user(ALICE).messages().send(conv, text("Dinner at eight")).unwrap();
        h.as_user(BOB).messages().send(conv, text("dinner sounds good")).unwrap();
        h.as_user(CAROL).messages().send(other, text("dinner elsewhere")).unwrap();
        let gone = h.as_user(BOB).messages().send(conv, text("dinner cancelled")).unwrap();
        h.as_user(BOB).messages().soft_delete(gone.message.id).unwrap();

        let hits = h.as_user(ALICE).messages().search(conv, "DINNER").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(h.as_user(ALICE).messages().search(conv, "").unwrap().is_empty());

        let err = h.as_user(CAROL).messages().search(conv, "dinner").unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn search_matches_cyrillic_in_any_case() {
        let h = Harness::new();
        let conv = direct(&h);
        h.as_user(ALICE).messages().send(conv, text("Привет, как дела?")).unwrap();

        let hits = h.as_user(BOB).messages().search(conv, "привет").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.content.as_deref(), Some("Привет, как дела?"));
        assert_eq!(h.as_user(BOB).messages().search(conv, "КАК ДЕЛА").unwrap().len(), 1);
    }

    #[test]
    fn get_resolves_live_messages() {
        let h = Harness::new();
        let conv = direct(&h);
        let msg = h.as_user(ALICE).messages().send(conv, text("hi")).unwrap();

        let resolved = h.as_user(BOB).messages().get(msg.message.id).unwrap();
        assert_eq!(resolved.available().unwrap().message.id, msg.message.id);
        assert!(matches!(
            h.as_user(BOB).messages().get(Uuid::from_u128(0x77)).unwrap(),
            Resolved::Unavailable
        ));
    }
}
