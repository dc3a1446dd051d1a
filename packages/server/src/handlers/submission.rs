use axum::Json;
use axum::extract::{Path, State};
use common::TestcaseCallback;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::admission::AdmissionPermit;
use crate::aggregation::{self, SubmissionStore, TestcaseResultStore, TestcaseUpdate};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::submission::*;
use crate::state::AppState;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("Invalid {what} ID")))
}

#[utoipa::path(
    post,
    path = "/testcases/{id}/callback",
    tag = "Submissions",
    operation_id = "testcaseCallback",
    summary = "Report a finished testcase",
    description = "Called by the code-execution pool when a testcase has finished running. Records the output and status, then folds the result into the parent submission's counter and overall status. A 429 means a callback for the same testcase is still being processed; retry later. A 500 is safe to retry: nothing was persisted.",
    params(
        ("id" = String, Path, description = "Testcase result ID (UUID)")
    ),
    request_body = TestcaseCallback,
    responses(
        (status = 200, description = "Result recorded (or already recorded)", body = CallbackAck),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 429, description = "Callback for this testcase already in flight (ALREADY_PROCESSING)", body = ErrorBody),
        (status = 500, description = "Not persisted (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(testcase_id = %id))]
pub async fn testcase_callback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<TestcaseCallback>,
) -> Result<Json<CallbackAck>, AppError> {
    let testcase_id = parse_id(&id, "testcase result")?;
    let status = payload
        .testcase_status()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let Some(_permit) = AdmissionPermit::try_acquire(state.admission.clone(), testcase_id) else {
        warn!("Callback for this testcase already in flight, shedding");
        return Err(AppError::AlreadyProcessing {
            retry_after: state.config.admission.retry_after_secs,
        });
    };

    let update = TestcaseUpdate {
        testcase_id,
        output: payload.into_output(),
        status,
    };

    let outcome = aggregation::apply(&state.db, &state.config.aggregation, update).await?;

    info!(
        submission_id = %outcome.snapshot().id,
        duplicate = outcome.is_duplicate(),
        "Testcase callback handled"
    );

    Ok(Json(CallbackAck::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Submissions",
    operation_id = "getSubmissionProgress",
    summary = "Get submission progress",
    description = "Returns the aggregate status and counters of a submission together with its testcase results.",
    params(
        ("id" = String, Path, description = "Submission ID (UUID)")
    ),
    responses(
        (status = 200, description = "Submission progress", body = SubmissionProgressResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(submission_id = %id))]
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionProgressResponse>, AppError> {
    let submission_id = parse_id(&id, "submission")?;

    let sub = SubmissionStore::new(&state.db)
        .find(submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

    let testcases = TestcaseResultStore::new(&state.db)
        .list_for_submission(submission_id)
        .await?;

    Ok(Json(SubmissionProgressResponse::new(sub, testcases)))
}
