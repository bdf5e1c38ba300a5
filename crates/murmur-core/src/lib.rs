//! Conversation and messaging core.
//!
//! Every operation runs on behalf of one caller through a [`Session`], checks
//! membership against the store, performs its writes, and returns a
//! denormalized view. The core keeps no state of its own between calls.

pub mod clock;
mod config;
mod conversations;
mod convert;
mod error;
mod identity;
mod messages;
mod presence;
mod reactions;
mod receipts;
mod typing;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{ConversationRow, MessageRow, ParticipantRow};
use murmur_types::models::ProfileSummary;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use conversations::Conversations;
pub use error::{ChatError, Result};
pub use identity::Identity;
pub use messages::Messages;
pub use presence::{MAX_PRESENCE_BATCH, Presence};
pub use reactions::Reactions;
pub use receipts::Receipts;
pub use typing::Typing;

pub struct Chat {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl Chat {
    pub fn new(db: Arc<Database>, config: CoreConfig) -> Self {
        Self::with_clock(db, Arc::new(SystemClock), config)
    }

    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn Clock>, config: CoreConfig) -> Self {
        Self { db, clock, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Opens a session for the caller, failing with `Unauthenticated` when
    /// the identity carries no user.
    pub fn session(&self, identity: &Identity) -> Result<Session<'_>> {
        let caller = identity.current_user_id().ok_or(ChatError::Unauthenticated)?;
        Ok(Session { chat: self, caller })
    }
}

#[derive(Clone, Copy)]
pub struct Session<'a> {
    chat: &'a Chat,
    caller: Uuid,
}

impl<'a> Session<'a> {
    pub fn caller(&self) -> Uuid {
        self.caller
    }

    pub fn conversations(self) -> Conversations<'a> {
        Conversations::new(self)
    }

    pub fn messages(self) -> Messages<'a> {
        Messages::new(self)
    }

    pub fn receipts(self) -> Receipts<'a> {
        Receipts::new(self)
    }

    pub fn typing(self) -> Typing<'a> {
        Typing::new(self)
    }

    pub fn reactions(self) -> Reactions<'a> {
        Reactions::new(self)
    }

    pub fn presence(self) -> Presence<'a> {
        Presence::new(self)
    }

    /// Creates or replaces the caller's own profile row. Profiles are owned
    /// by the identity side; this is the hook it provisions them through.
    pub fn upsert_profile(
        &self,
        display_name: Option<&str>,
        handle: Option<&str>,
        avatar_ref: Option<&str>,
    ) -> Result<ProfileSummary> {
        let id = self.caller_key();
        self.db()
            .upsert_profile(&id, display_name, handle, avatar_ref, &self.now_key())?;

        let rows = self.db().get_profiles(&[id])?;
        rows.first()
            .map(convert::profile)
            .ok_or(ChatError::NotFound("profile"))
    }

    pub(crate) fn db(&self) -> &'a Database {
        &self.chat.db
    }

    pub(crate) fn config(&self) -> &'a CoreConfig {
        &self.chat.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.chat.clock.now()
    }

    pub(crate) fn now_key(&self) -> String {
        murmur_db::timestamp(self.now())
    }

    pub(crate) fn caller_key(&self) -> String {
        self.caller.to_string()
    }

    pub(crate) fn conversation_row(&self, conversation_id: &str) -> Result<ConversationRow> {
        self.db()
            .get_conversation(conversation_id)?
            .ok_or(ChatError::NotFound("conversation"))
    }

    /// The caller's active membership row. `NotFound` when the conversation
    /// does not exist, `Forbidden` when the caller is not an active member.
    pub(crate) fn require_member(&self, conversation_id: &str) -> Result<ParticipantRow> {
        if let Some(row) = self.db().active_participant(conversation_id, &self.caller_key())? {
            return Ok(row);
        }
        self.conversation_row(conversation_id)?;
        Err(ChatError::Forbidden("not a participant of this conversation"))
    }

    pub(crate) fn message_row(&self, message_id: Uuid) -> Result<MessageRow> {
        self.db()
            .get_message(&message_id.to_string())?
            .ok_or(ChatError::NotFound("message"))
    }

    pub(crate) fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, ProfileSummary>> {
        let rows = self.db().get_profiles(user_ids)?;
        Ok(rows.iter().map(|row| (row.id.clone(), convert::profile(row))).collect())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    pub const ALICE: Uuid = Uuid::from_u128(0xa);
    pub const BOB: Uuid = Uuid::from_u128(0xb);
    pub const CAROL: Uuid = Uuid::from_u128(0xc);
    pub const DAVE: Uuid = Uuid::from_u128(0xd);

    pub struct Harness {
        pub chat: Chat,
        pub clock: Arc<ManualClock>,
    }

    impl Harness {
        pub fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()));
            let chat = Chat::with_clock(db, clock.clone(), CoreConfig::default());

            for (user, name) in [(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol"), (DAVE, "Dave")] {
                chat.session(&Identity::authenticated(user))
                    .unwrap()
                    .upsert_profile(Some(name), Some(&name.to_lowercase()), None)
                    .unwrap();
            }

            Self { chat, clock }
        }

        pub fn as_user(&self, user: Uuid) -> Session<'_> {
            self.chat.session(&Identity::authenticated(user)).unwrap()
        }

        /// Moves the clock forward a little so consecutive writes get distinct timestamps.
        pub fn tick(&self) {
            self.clock.advance(chrono::Duration::milliseconds(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn anonymous_callers_are_rejected() {
        let h = Harness::new();
        let err = h.chat.session(&Identity::anonymous()).err().unwrap();
        assert!(matches!(err, ChatError::Unauthenticated));
    }

    #[test]
    fn profile_upsert_returns_the_stored_profile() {
        let h = Harness::new();
        let profile = h
            .as_user(ALICE)
            .upsert_profile(Some("Alice Liddell"), Some("alice"), Some("avatars/alice.png"))
            .unwrap();
        assert_eq!(profile.id, ALICE);
        assert_eq!(profile.display_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(profile.avatar_ref.as_deref(), Some("avatars/alice.png"));
    }
}
