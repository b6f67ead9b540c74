use thiserror::Error;

/// Errors raised for contract violations at the engine boundary.
///
/// Malformed data (bad dates, unparseable amounts, split groups without
/// children) never produces one of these; it degrades to a safe default.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("State key '{0}' is reserved and cannot be used")]
    ReservedKey(String),

    #[error("State key must not be empty")]
    EmptyKey,

    #[error("State key '{0}' is derived and cannot be written directly")]
    DerivedKey(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("Split group '{group_id}' does not balance: source {source_amount:.2}, children {children_amount:.2}")]
    SplitAmountMismatch {
        group_id: String,
        source_amount: f64,
        children_amount: f64,
    },

    #[error("Split group '{0}' needs at least one child")]
    EmptySplit(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
