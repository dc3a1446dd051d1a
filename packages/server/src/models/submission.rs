use chrono::{DateTime, Utc};
use common::{SubmissionStatus, TestcaseStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregation::AggregationOutcome;
use crate::entity::{submission, testcase_result};

/// Acknowledgment sent to the execution worker once its callback committed.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CallbackAck {
    #[schema(example = "Submission updated successfully")]
    pub message: String,
    pub submission_id: Uuid,
    /// Submission status after this callback.
    pub status: SubmissionStatus,
    #[schema(example = 2)]
    pub evaluated_testcases: i32,
    #[schema(example = 3)]
    pub total_testcases: i32,
    /// True when this testcase result had already been counted and the
    /// callback changed nothing.
    #[schema(example = false)]
    pub duplicate: bool,
}

impl From<AggregationOutcome> for CallbackAck {
    fn from(outcome: AggregationOutcome) -> Self {
        let message = if outcome.is_duplicate() {
            "Testcase result already recorded"
        } else {
            "Submission updated successfully"
        };
        let snapshot = outcome.snapshot();
        Self {
            message: message.into(),
            submission_id: snapshot.id,
            status: snapshot.status,
            evaluated_testcases: snapshot.evaluated_testcases,
            total_testcases: snapshot.total_testcases,
            duplicate: outcome.is_duplicate(),
        }
    }
}

/// One testcase result of a submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TestcaseResultResponse {
    pub id: Uuid,
    /// Raw worker status code.
    #[schema(example = 3)]
    pub status: i32,
    /// Label for `status`.
    #[schema(example = "Accepted")]
    pub status_label: String,
    #[schema(example = "15\n")]
    pub output: String,
    /// Null until the result has been folded into the submission.
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl From<testcase_result::Model> for TestcaseResultResponse {
    fn from(model: testcase_result::Model) -> Self {
        let status_label = TestcaseStatus::from_code(model.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| format!("Invalid ({})", model.status));
        Self {
            id: model.id,
            status: model.status,
            status_label,
            output: model.output,
            evaluated_at: model.evaluated_at,
        }
    }
}

/// Aggregate progress of a submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionProgressResponse {
    pub id: Uuid,
    pub status: SubmissionStatus,
    #[schema(example = 2)]
    pub evaluated_testcases: i32,
    #[schema(example = 3)]
    pub total_testcases: i32,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
    /// When the status became terminal, null while pending.
    pub judged_at: Option<DateTime<Utc>>,
    pub testcases: Vec<TestcaseResultResponse>,
}

impl SubmissionProgressResponse {
    pub fn new(sub: submission::Model, testcases: Vec<testcase_result::Model>) -> Self {
        Self {
            id: sub.id,
            status: sub.status,
            evaluated_testcases: sub.evaluated_testcases,
            total_testcases: sub.total_testcases,
            created_at: sub.created_at,
            judged_at: sub.judged_at,
            testcases: testcases.into_iter().map(Into::into).collect(),
        }
    }
}
