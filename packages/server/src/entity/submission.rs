use common::SubmissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Fixed when the submission is accepted for judging.
    pub total_testcases: i32,
    /// Number of testcase results folded in so far. Never exceeds `total_testcases`.
    pub evaluated_testcases: i32,
    pub status: SubmissionStatus,

    #[sea_orm(has_many)]
    pub testcase_results: HasMany<super::testcase_result::Entity>,

    pub created_at: DateTimeUtc,
    /// Set once, when `status` first becomes terminal.
    pub judged_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
