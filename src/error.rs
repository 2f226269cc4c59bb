//! Error types for `teamgraph`.

/// Broad class of a [`StoreError`], used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, timeout or local I/O failure. Recoverable; shown as a banner.
    Transport,
    /// Missing or malformed data. Tolerated with a placeholder.
    Data,
    /// The store refused a write. Triggers a revert and a notice.
    Rejected,
}

/// Errors returned by an Entity Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The referenced entity does not exist.
    #[error("{entity} #{id} not found")]
    NotFound {
        /// Entity kind, e.g. "task".
        entity: &'static str,
        /// Identifier that was looked up.
        id: i64,
    },

    /// The store answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, if any.
        message: String,
    },

    /// A response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The caller passed something the store will not accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store has no implementation for this operation.
    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    /// A `SQLite` error from the local store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Transport(_) | StoreError::Database(_) => ErrorKind::Transport,
            StoreError::NotFound { .. } | StoreError::Malformed(_) => ErrorKind::Data,
            StoreError::Rejected { .. }
            | StoreError::InvalidInput(_)
            | StoreError::Unsupported(_) => ErrorKind::Rejected,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            StoreError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            StoreError::Malformed(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

/// A specialized Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
