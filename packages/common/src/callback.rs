use serde::{Deserialize, Serialize};

use crate::testcase_status::{ParseTestcaseStatusError, TestcaseStatus};

/// Status object as sent by the execution worker.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CallbackStatus {
    /// Worker status code. 1 and 2 are in-flight, 3 is a pass, 4 and above are failures.
    #[schema(example = 3)]
    pub id: i32,
    /// Human-readable label, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Accepted")]
    pub description: Option<String>,
}

/// Body the execution worker posts once a testcase has finished running.
///
/// Unknown fields (timing, memory, tokens) are ignored.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TestcaseCallback {
    /// Captured standard output. Stored as an empty string when absent.
    #[schema(example = "15\n")]
    pub stdout: Option<String>,
    pub status: CallbackStatus,
}

impl TestcaseCallback {
    pub fn testcase_status(&self) -> Result<TestcaseStatus, ParseTestcaseStatusError> {
        TestcaseStatus::from_code(self.status.id)
    }

    pub fn into_output(self) -> String {
        self.stdout.unwrap_or_default()
    }
}
