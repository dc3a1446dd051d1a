use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;
use uuid::Uuid;

/// Which bound an aborted aggregation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    /// Waiting for a connection to start the transaction.
    Begin,
    /// Waiting for a row lock held by another transaction.
    LockWait,
    /// Running the transaction body through commit.
    Transaction,
}

/// SQLSTATE `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Whether the store gave up waiting for a row lock.
pub(super) fn is_lock_timeout(err: &DbErr) -> bool {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(e)) | DbErr::Exec(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == LOCK_NOT_AVAILABLE),
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Testcase result {0} not found")]
    TestcaseNotFound(Uuid),

    #[error("Submission {submission_id} referenced by testcase result {testcase_id} not found")]
    SubmissionMissing {
        testcase_id: Uuid,
        submission_id: Uuid,
    },

    #[error(
        "Submission {submission_id} already has {evaluated} of {total} testcases evaluated; refusing to count another"
    )]
    CounterOverflow {
        submission_id: Uuid,
        evaluated: i32,
        total: i32,
    },

    #[error("Aggregation timed out after {elapsed_ms}ms ({stage:?})")]
    Timeout { stage: TimeoutStage, elapsed_ms: u64 },

    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

impl AggregationError {
    /// Whether the caller can expect a retry of the same callback to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Db(_))
    }
}
