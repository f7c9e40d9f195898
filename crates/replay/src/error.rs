use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("no events loaded")]
    NoEvents,
    #[error("session has no full snapshot at or before {timestamp}")]
    NoFullSnapshot { timestamp: i64 },
    #[error("malformed session: {0}")]
    Decode(#[from] serde_json::Error),
}
