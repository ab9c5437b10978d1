use crate::types::Days;

/// Rejections raised before any state change. Surfaced to callers verbatim.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Leave start date must not be after its end date")]
    InvalidDates,
    #[error("Leave ranges may not cross a year boundary")]
    CrossesYearBoundary,
    #[error("Dates overlap with existing request {0}")]
    Overlap(String),
    #[error("Dates intersect the blocked period '{0}'")]
    BlockedPeriod(String),
    #[error("Requested range contains no working days")]
    ZeroDuration,
    #[error("No entitlement for leave type {leave_type_id} in {year}")]
    NoEntitlement { leave_type_id: String, year: i32 },
    #[error("At least {required} days notice required, got {given}")]
    InsufficientNotice { required: u32, given: i64 },
    #[error("Requested {requested} days exceeds the {max} consecutive days allowed")]
    ExceedsMaxConsecutive { requested: Days, max: Days },
    #[error("An attachment is required for requests longer than {0} days")]
    AttachmentRequired(Days),
    #[error("Employee is not eligible for this leave type: {0}")]
    NotEligible(String),
    #[error("A justification is required")]
    EmptyJustification,
    #[error("A reason is required")]
    EmptyReason,
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Malformed approval flow: {0}")]
    MalformedFlow(String),
}

#[derive(thiserror::Error, Debug)]
pub enum LeaveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Insufficient balance: requested {requested} days, {remaining} remaining")]
    InsufficientBalance { requested: Days, remaining: Days },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Request already processed: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No policy governs leave type {0}")]
    PolicyMissing(String),
    #[error("Ledger invariant violated: {0}")]
    LedgerInvariant(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LeaveError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LeaveError::Conflict(_))
    }
}

impl From<sled::transaction::TransactionError<LeaveError>> for LeaveError {
    fn from(value: sled::transaction::TransactionError<LeaveError>) -> Self {
        match value {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => LeaveError::Storage(e),
        }
    }
}

pub type LeaveResult<T> = Result<T, LeaveError>;
