use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "testcase_result")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub submission_id: Uuid,
    #[sea_orm(belongs_to, from = "submission_id", to = "id")]
    pub submission: HasOne<super::submission::Entity>,

    #[sea_orm(column_type = "Text")]
    pub output: String,
    /// Raw worker status code, see `common::TestcaseStatus`.
    pub status: i32,

    /// Set by the aggregation that folded this result into its submission.
    /// A second callback for the same row is a replay when this is present.
    pub evaluated_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
