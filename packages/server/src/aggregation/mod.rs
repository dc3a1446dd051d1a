//! Folding one testcase result into its submission.
//!
//! Each callback runs as one transaction:
//!
//! 1. lock the testcase result row and skip replays (`evaluated_at` already set),
//! 2. write the worker's output and status,
//! 3. lock the parent submission row,
//! 4. decide the new submission status from the locked snapshot,
//! 5. bump `evaluated_testcases` by one and store the status,
//! 6. commit.
//!
//! The submission row lock serializes all testcases of one submission, so two
//! results finishing together can never both see themselves as the last one.
//! Submissions never block each other. Any failure rolls the whole
//! transaction back.

mod error;
pub mod store;

use std::future::Future;
use std::time::Instant;

use common::{SubmissionStatus, TestcaseStatus};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AggregationConfig;

pub use error::{AggregationError, TimeoutStage};
pub use store::{SubmissionSnapshot, SubmissionStore, TestcaseResultStore};

/// One finished testcase as reported by the execution worker.
#[derive(Debug, Clone)]
pub struct TestcaseUpdate {
    pub testcase_id: Uuid,
    pub output: String,
    pub status: TestcaseStatus,
}

/// What a committed aggregation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// The result was counted; the snapshot is the post-commit state.
    Applied(SubmissionSnapshot),
    /// The result had already been counted; nothing was written.
    Duplicate(SubmissionSnapshot),
}

impl AggregationOutcome {
    pub fn snapshot(&self) -> &SubmissionSnapshot {
        match self {
            Self::Applied(s) | Self::Duplicate(s) => s,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Status transition computed for one testcase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub status: SubmissionStatus,
    pub evaluated_testcases: i32,
    /// True when this result moved the submission out of `Pending`.
    pub became_terminal: bool,
}

/// Decide the submission's next status after folding in `testcase`.
///
/// `current` must be read under the submission row lock. A failed testcase
/// rejects immediately; otherwise the last testcase decides between
/// `Accepted` and `Rejected`. A terminal status is never replaced.
pub fn decide(
    current: &SubmissionSnapshot,
    testcase: TestcaseStatus,
) -> Result<Decision, AggregationError> {
    if current.evaluated_testcases >= current.total_testcases {
        return Err(AggregationError::CounterOverflow {
            submission_id: current.id,
            evaluated: current.evaluated_testcases,
            total: current.total_testcases,
        });
    }

    let is_rejected = current.status == SubmissionStatus::Rejected || testcase.is_failed();
    let is_last = current.evaluated_testcases + 1 == current.total_testcases;

    let computed = if is_rejected {
        SubmissionStatus::Rejected
    } else if is_last {
        if testcase.is_passed() {
            SubmissionStatus::Accepted
        } else {
            SubmissionStatus::Rejected
        }
    } else {
        SubmissionStatus::Pending
    };

    let status = if current.status.is_terminal() {
        if computed != current.status {
            warn!(
                submission_id = %current.id,
                stored = %current.status,
                computed = %computed,
                testcase_status = %testcase,
                "Keeping terminal submission status"
            );
        }
        current.status
    } else {
        computed
    };

    Ok(Decision {
        status,
        evaluated_testcases: current.evaluated_testcases + 1,
        became_terminal: !current.status.is_terminal() && status.is_terminal(),
    })
}

/// Run the aggregation for one testcase result inside a bounded transaction.
///
/// `max_wait` bounds starting the transaction and, on PostgreSQL, each row
/// lock wait; `timeout` bounds the body through commit. Each bound reports
/// [`AggregationError::Timeout`] with its own [`TimeoutStage`]. On any error
/// or timeout the transaction is rolled back and nothing is persisted.
#[instrument(skip(db, limits, update), fields(testcase_id = %update.testcase_id, status = %update.status))]
pub async fn apply(
    db: &DatabaseConnection,
    limits: &AggregationConfig,
    update: TestcaseUpdate,
) -> Result<AggregationOutcome, AggregationError> {
    let started = Instant::now();

    let txn = bounded(limits.max_wait(), TimeoutStage::Begin, started, db.begin()).await??;

    // On timeout the transaction is dropped uncommitted, which rolls it back.
    bounded(
        limits.timeout(),
        TimeoutStage::Transaction,
        started,
        run_and_commit(txn, limits, update, started),
    )
    .await?
}

async fn run_and_commit(
    txn: DatabaseTransaction,
    limits: &AggregationConfig,
    update: TestcaseUpdate,
    started: Instant,
) -> Result<AggregationOutcome, AggregationError> {
    let result = match bound_lock_waits(&txn, limits).await {
        Ok(()) => aggregate(&txn, update).await,
        Err(e) => Err(e.into()),
    }
    .map_err(|e| match e {
        AggregationError::Db(db) if error::is_lock_timeout(&db) => AggregationError::Timeout {
            stage: TimeoutStage::LockWait,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        other => other,
    });

    match result {
        Ok(outcome) => {
            txn.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed aggregation also failed");
            }
            Err(e)
        }
    }
}

/// PostgreSQL waits for row locks indefinitely unless told otherwise.
async fn bound_lock_waits(txn: &DatabaseTransaction, limits: &AggregationConfig) -> Result<(), DbErr> {
    if txn.get_database_backend() == DbBackend::Postgres {
        txn.execute_unprepared(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            limits.max_wait_ms
        ))
        .await?;
    }
    Ok(())
}

/// The aggregation steps, without transaction management.
///
/// `conn` must be a transaction: the locks taken here are only meaningful
/// until it ends.
pub async fn aggregate<C: ConnectionTrait>(
    conn: &C,
    update: TestcaseUpdate,
) -> Result<AggregationOutcome, AggregationError> {
    let testcases = TestcaseResultStore::new(conn);
    let submissions = SubmissionStore::new(conn);

    let existing = testcases
        .find_for_update(update.testcase_id)
        .await?
        .ok_or(AggregationError::TestcaseNotFound(update.testcase_id))?;

    if existing.evaluated_at.is_some() {
        let snapshot = submissions
            .lock_for_update(existing.submission_id)
            .await?
            .ok_or(AggregationError::SubmissionMissing {
                testcase_id: update.testcase_id,
                submission_id: existing.submission_id,
            })?;

        info!(
            submission_id = %snapshot.id,
            evaluated = snapshot.evaluated_testcases,
            total = snapshot.total_testcases,
            "Testcase result already evaluated, ignoring replay"
        );
        return Ok(AggregationOutcome::Duplicate(snapshot));
    }

    if let TestcaseStatus::Unrecognized(code) = update.status {
        warn!(code, "Unrecognized worker status code, counting it as a failure");
    }

    let updated = testcases
        .update(update.testcase_id, update.output, update.status)
        .await?
        .ok_or(AggregationError::TestcaseNotFound(update.testcase_id))?;

    let current = submissions
        .lock_for_update(updated.submission_id)
        .await?
        .ok_or(AggregationError::SubmissionMissing {
            testcase_id: update.testcase_id,
            submission_id: updated.submission_id,
        })?;

    let decision = decide(&current, update.status)?;

    submissions
        .increment_and_set_status(&current, decision.status)
        .await?;
    if decision.became_terminal {
        submissions.mark_judged(current.id).await?;
    }

    info!(
        submission_id = %current.id,
        status = %decision.status,
        evaluated = decision.evaluated_testcases,
        total = current.total_testcases,
        "Testcase result aggregated"
    );

    Ok(AggregationOutcome::Applied(SubmissionSnapshot {
        status: decision.status,
        evaluated_testcases: decision.evaluated_testcases,
        ..current
    }))
}

async fn bounded<T>(
    limit: std::time::Duration,
    stage: TimeoutStage,
    started: Instant,
    fut: impl Future<Output = T>,
) -> Result<T, AggregationError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AggregationError::Timeout {
            stage,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
}
