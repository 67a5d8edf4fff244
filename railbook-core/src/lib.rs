pub mod clock;
pub mod identity;
pub mod orders;
pub mod repository;
pub mod search;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{CredentialStore, MemoryCredentialStore, Session, SessionContext};

/// Failure talking to one of the backend collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Request rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Server-supplied message, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { message, .. } => message.as_deref(),
            GatewayError::Malformed(message) => Some(message),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure reading or writing the locally persisted credential.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored credential is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
