pub mod submission;
pub mod testcase_result;
