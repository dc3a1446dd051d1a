use crate::common::{TestApp, routes};
use ::common::SubmissionStatus;
use aggregator::admission::AdmissionControl;
use serde_json::json;
use uuid::Uuid;

mod aggregation {
    use super::*;

    #[tokio::test]
    async fn all_passing_testcases_accept_the_submission() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(3).await;

        for (i, tc) in sub.testcases.iter().enumerate() {
            let res = app.callback(tc, 3).await;
            assert_eq!(res.status, 200, "callback {i} failed: {}", res.text);
            assert_eq!(res.body["evaluated_testcases"], i as i64 + 1);
            assert_eq!(res.body["duplicate"], false);
        }

        let stored = app.submission(sub.id).await;
        assert_eq!(stored.status, SubmissionStatus::Accepted);
        assert_eq!(stored.evaluated_testcases, 3);
        assert!(stored.judged_at.is_some());
    }

    #[tokio::test]
    async fn submission_stays_pending_until_last_testcase() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(3).await;

        let res = app.callback(sub.testcases[0], 3).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Pending");

        let stored = app.submission(sub.id).await;
        assert_eq!(stored.status, SubmissionStatus::Pending);
        assert_eq!(stored.evaluated_testcases, 1);
        assert!(stored.judged_at.is_none());
    }

    #[tokio::test]
    async fn failure_rejects_immediately_and_stays_rejected() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(3).await;

        let res = app.callback(sub.testcases[0], 3).await;
        assert_eq!(res.body["status"], "Pending");

        let res = app.callback(sub.testcases[1], 5).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Rejected");
        assert_eq!(res.body["evaluated_testcases"], 2);
        let judged_at = app.submission(sub.id).await.judged_at;
        assert!(judged_at.is_some());

        let res = app.callback(sub.testcases[2], 3).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Rejected");

        let stored = app.submission(sub.id).await;
        assert_eq!(stored.status, SubmissionStatus::Rejected);
        assert_eq!(stored.evaluated_testcases, 3);
        assert_eq!(stored.judged_at, judged_at, "judged_at is set only once");
    }

    #[tokio::test]
    async fn failing_last_testcase_rejects() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;

        app.callback(sub.testcases[0], 3).await;
        let res = app.callback(sub.testcases[1], 11).await;

        assert_eq!(res.body["status"], "Rejected");
        assert_eq!(app.submission(sub.id).await.status, SubmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn unfinished_status_on_last_testcase_rejects() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app.callback(sub.testcases[0], 2).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Rejected");
    }

    #[tokio::test]
    async fn records_output_and_status_on_the_testcase() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;

        let res = app
            .post_json(
                &routes::testcase_callback(sub.testcases[0]),
                &json!({"stdout": "42\n", "status": {"id": 4, "description": "Wrong Answer"}}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let tc = app.testcase(sub.testcases[0]).await;
        assert_eq!(tc.output, "42\n");
        assert_eq!(tc.status, 4);
        assert!(tc.evaluated_at.is_some());
    }

    #[tokio::test]
    async fn null_stdout_is_stored_as_empty_output() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app
            .post_json(
                &routes::testcase_callback(sub.testcases[0]),
                &json!({"stdout": null, "status": {"id": 3}}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.testcase(sub.testcases[0]).await.output, "");
    }

    #[tokio::test]
    async fn unrecognized_status_code_counts_as_failure() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;

        let res = app.callback(sub.testcases[0], 77).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Rejected");
        assert_eq!(app.testcase(sub.testcases[0]).await.status, 77);
    }
}

mod replay {
    use super::*;

    #[tokio::test]
    async fn repeated_callback_is_not_counted_twice() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(3).await;

        let first = app.callback(sub.testcases[0], 3).await;
        assert_eq!(first.status, 200);

        let again = app.callback(sub.testcases[0], 3).await;
        assert_eq!(again.status, 200, "{}", again.text);
        assert_eq!(again.body["duplicate"], true);
        assert_eq!(again.body["evaluated_testcases"], 1);

        assert_eq!(app.submission(sub.id).await.evaluated_testcases, 1);
    }

    #[tokio::test]
    async fn replay_with_different_payload_changes_nothing() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;

        app.callback(sub.testcases[0], 3).await;
        let before = app.testcase(sub.testcases[0]).await;

        let res = app.callback(sub.testcases[0], 6).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["duplicate"], true);
        assert_eq!(res.body["status"], "Pending");

        assert_eq!(app.testcase(sub.testcases[0]).await, before);
        assert_eq!(app.submission(sub.id).await.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn replay_after_completion_keeps_terminal_status() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        app.callback(sub.testcases[0], 3).await;
        let res = app.callback(sub.testcases[0], 4).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Accepted");
        let stored = app.submission(sub.id).await;
        assert_eq!(stored.status, SubmissionStatus::Accepted);
        assert_eq!(stored.evaluated_testcases, 1);
    }
}

mod admission {
    use super::*;

    #[tokio::test]
    async fn callback_in_flight_gets_429_with_retry_after() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;
        let tc = sub.testcases[0];

        assert!(app.admission.try_acquire(tc));

        let res = app.callback(tc, 3).await;
        assert_eq!(res.status, 429);
        assert_eq!(res.body["code"], "ALREADY_PROCESSING");
        assert_eq!(res.retry_after.as_deref(), Some("1"));

        // Nothing reached the transaction.
        assert!(app.testcase(tc).await.evaluated_at.is_none());
        assert_eq!(app.submission(sub.id).await.evaluated_testcases, 0);

        app.admission.release(tc);
        let res = app.callback(tc, 3).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn other_testcases_are_not_blocked() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;

        assert!(app.admission.try_acquire(sub.testcases[0]));

        let res = app.callback(sub.testcases[1], 3).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn mark_is_released_after_success() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        app.callback(sub.testcases[0], 3).await;

        assert!(app.admission.is_empty());
    }

    #[tokio::test]
    async fn mark_is_released_after_failure() {
        let app = TestApp::spawn().await;
        let missing = Uuid::now_v7();

        let res = app.callback(missing, 3).await;
        assert_eq!(res.status, 500);

        assert!(app.admission.is_empty());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn unknown_testcase_returns_500_and_mutates_nothing() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(2).await;
        let missing = Uuid::now_v7();

        let res = app.callback(missing, 3).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "INTERNAL_ERROR");
        assert!(
            !res.text.contains(&missing.to_string()),
            "internal detail leaked: {}",
            res.text
        );

        let stored = app.submission(sub.id).await;
        assert_eq!(stored.evaluated_testcases, 0);
        assert_eq!(stored.status, SubmissionStatus::Pending);
        for tc in &sub.testcases {
            assert!(app.testcase(*tc).await.evaluated_at.is_none());
        }
    }

    #[tokio::test]
    async fn orphaned_testcase_rolls_back_its_own_update() {
        let app = TestApp::spawn().await;
        let orphan = app.seed_orphan_testcase().await;

        let res = app.callback(orphan, 3).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "INTERNAL_ERROR");

        let tc = app.testcase(orphan).await;
        assert_eq!(tc.status, 1);
        assert_eq!(tc.output, "");
        assert!(tc.evaluated_at.is_none());
    }

    #[tokio::test]
    async fn counting_past_total_is_refused_and_rolled_back() {
        let app = TestApp::spawn().await;
        // Two result rows for a submission that expects one.
        let sub = app.seed_submission_with_rows(1, 2).await;

        let res = app.callback(sub.testcases[0], 3).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "Accepted");

        let res = app.callback(sub.testcases[1], 4).await;
        assert_eq!(res.status, 500);

        let stored = app.submission(sub.id).await;
        assert_eq!(stored.evaluated_testcases, 1);
        assert_eq!(stored.status, SubmissionStatus::Accepted);

        let tc = app.testcase(sub.testcases[1]).await;
        assert_eq!(tc.status, 1);
        assert!(tc.evaluated_at.is_none());
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_testcase_id() {
        let app = TestApp::spawn().await;

        let res = app.callback("not-a-uuid", 3).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_missing_body() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app
            .post_raw(&routes::testcase_callback(sub.testcases[0]), "")
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(res.body["message"], "Request body missing");
    }

    #[tokio::test]
    async fn rejects_body_without_status() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app
            .post_json(
                &routes::testcase_callback(sub.testcases[0]),
                &json!({"stdout": "1"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app
            .post_raw(&routes::testcase_callback(sub.testcases[0]), "{\"status\":")
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_non_positive_status_code() {
        let app = TestApp::spawn().await;
        let sub = app.seed_submission(1).await;

        let res = app.callback(sub.testcases[0], 0).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(app.testcase(sub.testcases[0]).await.evaluated_at.is_none());
    }
}
