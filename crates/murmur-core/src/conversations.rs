use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_db::models::{ConversationRow, MessageRow, NewConversation, NewParticipant, ParticipantRow};
use murmur_db::{fold_case, is_foreign_key_violation, is_unique_violation, timestamp};
use murmur_types::api::{ConversationDetail, ConversationSummary};
use murmur_types::models::{Conversation, ConversationKind, ParticipantRole, ProfileSummary};

use crate::{ChatError, Result, Session, convert};

/// Conversation lifecycle and membership.
pub struct Conversations<'a> {
    session: Session<'a>,
}

/// Canonical key of an unordered user pair.
fn pair_key(a: &str, b: &str) -> String {
    if a <= b { format!("{}:{}", a, b) } else { format!("{}:{}", b, a) }
}

impl<'a> Conversations<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Returns the direct conversation between the caller and `peer_id`,
    /// creating it if neither has one where both are still active.
    pub fn create_direct(&self, peer_id: Uuid) -> Result<Conversation> {
        let s = &self.session;
        if peer_id == s.caller() {
            return Err(ChatError::Invalid("cannot start a direct conversation with yourself".into()));
        }

        let me = s.caller_key();
        let peer = peer_id.to_string();
        if let Some(existing) = s.db().find_direct_between(&me, &peer)? {
            debug!("Direct conversation {} already exists", existing);
            return self.load(&existing);
        }

        let key = pair_key(&me, &peer);
        let members = [
            NewParticipant { user_id: &me, role: ParticipantRole::Member.as_str() },
            NewParticipant { user_id: &peer, role: ParticipantRole::Member.as_str() },
        ];

        if let Some(created) = self.insert(ConversationKind::Direct, None, None, Some(&key), &members)? {
            return Ok(created);
        }

        // Another caller holds the pair key. Either they just won a race and
        // the scan finds their conversation, or the key belongs to a direct
        // conversation somebody has since left.
        if let Some(winner) = s.db().find_direct_between(&me, &peer)? {
            debug!("Lost direct conversation race, returning {}", winner);
            return self.load(&winner);
        }

        warn!("Releasing stale pair key {}", key);
        s.db().release_pair_key(&key)?;
        self.insert(ConversationKind::Direct, None, None, Some(&key), &members)?
            .ok_or(ChatError::Conflict("direct conversation"))
    }

    /// Creates a group with the caller as its admin. The caller's own id and
    /// duplicates in `member_ids` are ignored.
    pub fn create_group(
        &self,
        name: Option<&str>,
        avatar_ref: Option<&str>,
        member_ids: &[Uuid],
    ) -> Result<Conversation> {
        let s = &self.session;
        let me = s.caller_key();

        let mut seen = HashSet::new();
        let others: Vec<String> = member_ids
            .iter()
            .filter(|id| **id != s.caller() && seen.insert(**id))
            .map(Uuid::to_string)
            .collect();

        let mut members = vec![NewParticipant { user_id: &me, role: ParticipantRole::Admin.as_str() }];
        members.extend(
            others
                .iter()
                .map(|id| NewParticipant { user_id: id, role: ParticipantRole::Member.as_str() }),
        );

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        self.insert(ConversationKind::Group, name, avatar_ref, None, &members)?
            .ok_or(ChatError::Conflict("group conversation"))
    }

    /// Inserts the conversation, then its participants. Returns `None` when
    /// the pair key is already taken. A failed participant insert removes the
    /// conversation again.
    fn insert(
        &self,
        kind: ConversationKind,
        name: Option<&str>,
        avatar_ref: Option<&str>,
        pair_key: Option<&str>,
        members: &[NewParticipant<'_>],
    ) -> Result<Option<Conversation>> {
        let s = &self.session;
        let id = Uuid::new_v4().to_string();
        let me = s.caller_key();
        let now = s.now_key();

        let new = NewConversation {
            id: &id,
            kind: kind.as_str(),
            name,
            avatar_ref,
            pair_key,
            created_by: &me,
            created_at: &now,
        };
        if let Err(e) = s.db().insert_conversation(&new) {
            if pair_key.is_some() && is_unique_violation(&e) {
                return Ok(None);
            }
            return Err(e.into());
        }

        if let Err(e) = s.db().insert_participants(&id, members, &now) {
            if let Err(cleanup) = s.db().delete_conversation(&id) {
                warn!("Failed to remove conversation {} after participant insert failed: {}", id, cleanup);
            }
            if is_foreign_key_violation(&e) {
                return Err(ChatError::NotFound("user"));
            }
            return Err(e.into());
        }

        info!("Created {} conversation {} with {} participants", kind.as_str(), id, members.len());
        self.load(&id).map(Some)
    }

    fn load(&self, conversation_id: &str) -> Result<Conversation> {
        let row = self.session.conversation_row(conversation_id)?;
        Ok(convert::conversation(&row))
    }

    /// Adds `user_id` to a group as a member. Adding someone who is already
    /// active changes nothing.
    pub fn add_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<()> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let conversation = self.load(&conv_id)?;
        if conversation.kind == ConversationKind::Direct {
            return Err(ChatError::Invalid("direct conversations cannot take new participants".into()));
        }

        let user = user_id.to_string();
        let member = [NewParticipant { user_id: &user, role: ParticipantRole::Member.as_str() }];
        match s.db().insert_participants(&conv_id, &member, &s.now_key()) {
            Ok(()) => {
                info!("User {} added {} to conversation {}", s.caller(), user_id, conv_id);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                debug!("User {} is already active in {}", user_id, conv_id);
                Ok(())
            }
            Err(e) if is_foreign_key_violation(&e) => Err(ChatError::NotFound("user")),
            Err(e) => Err(e.into()),
        }
    }

    /// Marks `user_id` as having left. Anyone may leave; removing someone
    /// else takes an admin.
    pub fn remove_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<()> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        let me = s.require_member(&conv_id)?;

        if user_id != s.caller() && convert::parse_role(&me.role) != ParticipantRole::Admin {
            return Err(ChatError::Forbidden("only admins can remove other participants"));
        }

        let left = s.db().leave_conversation(&conv_id, &user_id.to_string(), &s.now_key())?;
        if left == 0 {
            return Err(ChatError::NotFound("participant"));
        }
        info!("User {} left conversation {}", user_id, conv_id);
        Ok(())
    }

    /// Mutes the conversation for the caller until `until`; `None` unmutes.
    pub fn mute(&self, conversation_id: Uuid, until: Option<DateTime<Utc>>) -> Result<()> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let until = until.map(timestamp);
        s.db().set_muted_until(&conv_id, &s.caller_key(), until.as_deref())?;
        Ok(())
    }

    /// Every conversation the caller is active in, most recent activity first.
    pub fn list_for_caller(&self) -> Result<Vec<ConversationSummary>> {
        let s = &self.session;
        let memberships = s.db().memberships(&s.caller_key())?;
        if memberships.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<_> = memberships.iter().map(|m| &m.conversation).collect();
        let enrichment = self.enrich(&rows)?;

        let mut summaries: Vec<ConversationSummary> = memberships
            .iter()
            .map(|m| {
                let id = &m.conversation.id;
                ConversationSummary {
                    conversation: convert::conversation(&m.conversation),
                    last_message: enrichment.last_messages.get(id).map(convert::message),
                    unread_count: enrichment.unread.get(id).copied().unwrap_or(0),
                    other_participant: enrichment.other_participant(id),
                    muted_until: convert::participant(&m.participant, None).muted_until,
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            let (a, b) = (&a.conversation, &b.conversation);
            match (a.last_message_at, b.last_message_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.updated_at.cmp(&a.updated_at),
            }
        });
        Ok(summaries)
    }

    /// One conversation with its active participants.
    pub fn get(&self, conversation_id: Uuid) -> Result<ConversationDetail> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let row = s.conversation_row(&conv_id)?;
        let enrichment = self.enrich(&[&row])?;

        let participants = enrichment
            .participants
            .get(&row.id)
            .map(|rows| {
                rows.iter()
                    .map(|p| convert::participant(p, enrichment.profiles.get(&p.user_id).cloned()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ConversationDetail {
            conversation: convert::conversation(&row),
            participants,
            last_message: enrichment.last_messages.get(&row.id).map(convert::message),
            unread_count: enrichment.unread.get(&row.id).copied().unwrap_or(0),
            other_participant: enrichment.other_participant(&row.id),
        })
    }

    /// Partial metadata update; `None` fields are left as they are. Only
    /// groups carry a name.
    pub fn update_metadata(
        &self,
        conversation_id: Uuid,
        name: Option<&str>,
        avatar_ref: Option<&str>,
    ) -> Result<Conversation> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        if name.is_some_and(|n| n.trim().is_empty()) {
            return Err(ChatError::Invalid("conversation name must not be blank".into()));
        }
        if name.is_some() && self.load(&conv_id)?.kind == ConversationKind::Direct {
            return Err(ChatError::Invalid("direct conversations have no name".into()));
        }

        if name.is_some() || avatar_ref.is_some() {
            s.db()
                .update_conversation_metadata(&conv_id, name.map(str::trim), avatar_ref, &s.now_key())?;
        }
        self.load(&conv_id)
    }

    /// Hard-deletes the conversation and everything in it. Creator only.
    pub fn delete(&self, conversation_id: Uuid) -> Result<()> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        let row = s.conversation_row(&conv_id)?;

        if row.created_by != s.caller_key() {
            return Err(ChatError::Forbidden("only the creator can delete a conversation"));
        }

        s.db().delete_conversation(&conv_id)?;
        info!("User {} deleted conversation {}", s.caller(), conv_id);
        Ok(())
    }

    /// Case-insensitive match against conversation names and the display
    /// names and handles of the other participants.
    pub fn search(&self, query: &str) -> Result<Vec<ConversationSummary>> {
        let needle = fold_case(query.trim());
        if needle.is_empty() {
            return Ok(vec![]);
        }

        let s = &self.session;
        let me = s.caller_key();
        let summaries = self.list_for_caller()?;

        let ids: Vec<String> = summaries.iter().map(|c| c.conversation.id.to_string()).collect();
        let participants = s.db().active_participants(&ids)?;
        let user_ids: Vec<String> = participants
            .iter()
            .filter(|p| p.user_id != me)
            .map(|p| p.user_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles = s.profiles(&user_ids)?;

        let mut names: HashMap<String, Vec<&ProfileSummary>> = HashMap::new();
        for p in participants.iter().filter(|p| p.user_id != me) {
            if let Some(profile) = profiles.get(&p.user_id) {
                names.entry(p.conversation_id.clone()).or_default().push(profile);
            }
        }

        let contains = |field: Option<&str>| field.is_some_and(|f| fold_case(f).contains(&needle));
        let limit = s.config().search_limit as usize;

        Ok(summaries
            .into_iter()
            .filter(|c| {
                contains(c.conversation.name.as_deref())
                    || names.get(&c.conversation.id.to_string()).is_some_and(|profiles| {
                        profiles
                            .iter()
                            .any(|p| contains(p.display_name.as_deref()) || contains(p.handle.as_deref()))
                    })
            })
            .take(limit)
            .collect())
    }

    /// Batched lookups shared by the list and detail views.
    fn enrich(&self, conversations: &[&ConversationRow]) -> Result<Enrichment> {
        let s = &self.session;
        let me = s.caller_key();
        let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
        let kinds = conversations.iter().map(|c| (c.id.clone(), c.kind.clone())).collect();

        let last_messages = s
            .db()
            .last_messages(&ids)?
            .into_iter()
            .map(|m| (m.conversation_id.clone(), m))
            .collect();

        let unread = s
            .db()
            .unread_tallies(&me, &ids)?
            .into_iter()
            .map(|t| (t.conversation_id.clone(), t.unread()))
            .collect();

        let mut participants: HashMap<String, Vec<ParticipantRow>> = HashMap::new();
        for row in s.db().active_participants(&ids)? {
            participants.entry(row.conversation_id.clone()).or_default().push(row);
        }

        let user_ids: Vec<String> = participants
            .values()
            .flatten()
            .map(|p| p.user_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles = s.profiles(&user_ids)?;

        Ok(Enrichment { me, last_messages, unread, participants, profiles, kinds })
    }
}

struct Enrichment {
    me: String,
    last_messages: HashMap<String, MessageRow>,
    unread: HashMap<String, u64>,
    participants: HashMap<String, Vec<ParticipantRow>>,
    profiles: HashMap<String, ProfileSummary>,
    kinds: HashMap<String, String>,
}

impl Enrichment {
    /// For direct conversations, the profile of the other active participant.
    fn other_participant(&self, conversation_id: &str) -> Option<ProfileSummary> {
        if self.kinds.get(conversation_id).map(String::as_str) != Some(ConversationKind::Direct.as_str()) {
            return None;
        }
        self.participants
            .get(conversation_id)?
            .iter()
            .find(|p| p.user_id != self.me)
            .and_then(|p| self.profiles.get(&p.user_id).cloned())
    }
}
