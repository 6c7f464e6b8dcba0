/// Failure reaching a source API. Ends the current source for this cycle
/// but never the cycle itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

/// A single raw item could not be turned into a canonical job.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Unparseable timestamp: {0}")]
    Timestamp(String),

    #[error("Invalid link '{0}'")]
    Link(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job '{0}' already recorded")]
    DuplicateIdentity(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a failed insert, recognising primary-key collisions.
    pub fn from_insert(e: sqlx::Error, identity: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::DuplicateIdentity(identity.to_string());
        }
        StoreError::Storage(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification rejected with status {0}")]
    Rejected(u16),
}
