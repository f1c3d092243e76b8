use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SidenoteError {
    #[error("Duplicate comment id: {0}")]
    DuplicateId(Uuid),

    #[error("Comment not found: {0}")]
    CommentNotFound(Uuid),

    #[error("Document is read-only")]
    ReadOnlyDocument,

    #[error("Invalid range {from}..{to} for document of length {len}")]
    InvalidRange { from: usize, to: usize, len: usize },

    #[error("Invalid export format: {0}")]
    InvalidFormat(String),

    #[error("Invalid comment data: {0}")]
    InvalidCommentData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SidenoteError>;
