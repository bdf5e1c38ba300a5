use uuid::Uuid;

/// The caller on whose behalf an operation runs. Produced by the transport
/// from a verified token; the core never issues or checks credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    user_id: Option<Uuid>,
}

impl Identity {
    pub fn authenticated(user_id: Uuid) -> Self {
        Self { user_id: Some(user_id) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn current_user_id(&self) -> Option<Uuid> {
        self.user_id
    }
}
