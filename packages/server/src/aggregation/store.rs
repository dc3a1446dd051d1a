use chrono::Utc;
use common::{SubmissionStatus, TestcaseStatus};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::entity::{submission, testcase_result};

/// Point reads and writes on `testcase_result` rows.
pub struct TestcaseResultStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> TestcaseResultStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Read a testcase result with a row lock held until the transaction ends.
    pub async fn find_for_update(
        &self,
        id: Uuid,
    ) -> Result<Option<testcase_result::Model>, DbErr> {
        testcase_result::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    /// Record the worker's output and final status on an existing row and
    /// stamp it as evaluated. Returns `None` if no row has this id.
    pub async fn update(
        &self,
        id: Uuid,
        output: String,
        status: TestcaseStatus,
    ) -> Result<Option<testcase_result::Model>, DbErr> {
        let result = testcase_result::Entity::update_many()
            .col_expr(testcase_result::Column::Output, Expr::value(output))
            .col_expr(testcase_result::Column::Status, Expr::value(status.code()))
            .col_expr(
                testcase_result::Column::EvaluatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(testcase_result::Column::Id.eq(id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        testcase_result::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn list_for_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Vec<testcase_result::Model>, DbErr> {
        testcase_result::Entity::find()
            .filter(testcase_result::Column::SubmissionId.eq(submission_id))
            .order_by_asc(testcase_result::Column::Id)
            .all(self.conn)
            .await
    }
}

/// Counter and status of a submission as seen under its row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionSnapshot {
    pub id: Uuid,
    pub total_testcases: i32,
    pub evaluated_testcases: i32,
    pub status: SubmissionStatus,
}

impl From<submission::Model> for SubmissionSnapshot {
    fn from(model: submission::Model) -> Self {
        Self {
            id: model.id,
            total_testcases: model.total_testcases,
            evaluated_testcases: model.evaluated_testcases,
            status: model.status,
        }
    }
}

/// Reads and writes on the `submission` aggregate row.
pub struct SubmissionStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SubmissionStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<submission::Model>, DbErr> {
        submission::Entity::find_by_id(id).one(self.conn).await
    }

    /// Read the aggregate with a write lock held until the transaction ends.
    /// Every aggregation for the same submission queues up here.
    pub async fn lock_for_update(&self, id: Uuid) -> Result<Option<SubmissionSnapshot>, DbErr> {
        let model = submission::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(self.conn)
            .await?;
        Ok(model.map(SubmissionSnapshot::from))
    }

    /// Add one to `evaluated_testcases` and overwrite `status`.
    ///
    /// Must run while the lock from [`Self::lock_for_update`] is held. The
    /// update is conditional on the counter still matching `current`, so a
    /// store without row locks fails loudly instead of losing an increment.
    pub async fn increment_and_set_status(
        &self,
        current: &SubmissionSnapshot,
        status: SubmissionStatus,
    ) -> Result<(), DbErr> {
        let result = submission::Entity::update_many()
            .col_expr(
                submission::Column::EvaluatedTestcases,
                Expr::value(current.evaluated_testcases + 1),
            )
            .col_expr(submission::Column::Status, Expr::value(status))
            .filter(submission::Column::Id.eq(current.id))
            .filter(submission::Column::EvaluatedTestcases.eq(current.evaluated_testcases))
            .exec(self.conn)
            .await?;

        if result.rows_affected != 1 {
            return Err(DbErr::Custom(format!(
                "Submission {} changed while locked: expected 1 row at evaluated_testcases = {}, updated {}",
                current.id, current.evaluated_testcases, result.rows_affected
            )));
        }
        Ok(())
    }

    /// Stamp the moment the submission reached a terminal status.
    pub async fn mark_judged(&self, id: Uuid) -> Result<(), DbErr> {
        submission::Entity::update_many()
            .col_expr(submission::Column::JudgedAt, Expr::value(Some(Utc::now())))
            .filter(submission::Column::Id.eq(id))
            .filter(submission::Column::JudgedAt.is_null())
            .exec(self.conn)
            .await?;
        Ok(())
    }
}
