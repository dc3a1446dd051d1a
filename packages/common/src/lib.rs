pub mod callback;
pub mod submission_status;
pub mod testcase_status;

pub use callback::{CallbackStatus, TestcaseCallback};
pub use submission_status::SubmissionStatus;
pub use testcase_status::{TestcaseOutcome, TestcaseStatus};
