use stickler_domain::{DomainError, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("session {0} is already finalized")]
    SessionClosed(SessionId),
    #[error("session {0} not found")]
    UnknownSession(SessionId),
    #[error("drill {0:?} not found")]
    UnknownDrill(String),
}

impl TutorError {
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }
}

impl From<DomainError> for TutorError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Config(message) => TutorError::Config(message),
            DomainError::Validation(message) | DomainError::Serialization(message) => {
                TutorError::Validation(message)
            }
        }
    }
}
