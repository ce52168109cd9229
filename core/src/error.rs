use crate::objects::ObjectId;

/// Errors produced by the core. Connection- and world-level failures are
/// reported to the acting party and recovered locally; only heartbeat and
/// startup failures are allowed to escalate to process exit.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("that would create a cyclic relationship")]
    CyclicRelation,

    #[error("{0}")]
    AuthFailure(String),

    #[error("malformed frame from the edge: {0}")]
    ClientProtocol(String),

    #[error("edge link transport failure: {0}")]
    LinkTransport(#[from] async_tungstenite::tungstenite::Error),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("corrupt entity record {id}: {detail}")]
    CorruptRecord { id: ObjectId, detail: String },

    #[error("no such object: {0}")]
    NoSuchObject(ObjectId),

    #[error("there is no such destination")]
    InvalidDestination,

    #[error("no such command: {0}")]
    CommandNotFound(String),

    #[error("{0}")]
    FatalStartup(String),
}

impl CoreError {
    pub fn auth(msg: impl Into<String>) -> Self {
        CoreError::AuthFailure(msg.into())
    }

    /// Whether the error may be shown to a player verbatim.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            CoreError::CyclicRelation
                | CoreError::AuthFailure(_)
                | CoreError::InvalidDestination
                | CoreError::CommandNotFound(_)
        )
    }
}
