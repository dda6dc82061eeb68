use uuid::Uuid;

/// Who is asking, as established by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// An end user holding a valid access token
    User { user_id: Uuid },
    /// A trusted backend caller (scheduler, join-in flow) holding the service token
    Internal,
}

impl Caller {
    pub fn is_internal(&self) -> bool {
        matches!(self, Caller::Internal)
    }

    /// Internal callers reach every episode; users only their own
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        match self {
            Caller::User { user_id } => *user_id == owner_id,
            Caller::Internal => true,
        }
    }
}
