use thiserror::Error;

use crate::allocation::types::SlotStart;

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid roster row {row}: {reason}")]
    InvalidRoster { row: usize, reason: String },

    #[error("Invalid event time: {0}")]
    InvalidTime(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The candidate pool offered someone the ledger never listed as possible
    /// for the slot. The bookkeeping is inconsistent and the run must stop.
    #[error("{email} is not a candidate for the slot at {slot}")]
    NotACandidate { slot: SlotStart, email: String },

    #[error("No slot starts at {0}")]
    UnknownSlot(SlotStart),
}

pub type Result<T> = std::result::Result<T, AllocError>;
