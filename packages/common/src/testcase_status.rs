use std::fmt;

use thiserror::Error;

/// How a single testcase outcome affects its submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestcaseOutcome {
    /// The worker has not finished with the testcase.
    Pending,
    /// Output matched and the program exited cleanly.
    Passed,
    /// Any other terminal execution result.
    Failed,
}

/// Execution status reported by the code-execution pool for one testcase.
///
/// The numeric codes are the worker's `status.id` values. Codes above the
/// last known one are kept as [`TestcaseStatus::Unrecognized`] and count as
/// failures, so a worker upgrade can never turn a failure into a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestcaseStatus {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeErrorSigsegv,
    RuntimeErrorSigxfsz,
    RuntimeErrorSigfpe,
    RuntimeErrorSigabrt,
    RuntimeErrorNzec,
    RuntimeErrorOther,
    InternalError,
    ExecFormatError,
    Unrecognized(i32),
}

/// Error for status codes the worker protocol never produces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid testcase status code {0}; codes start at 1")]
pub struct ParseTestcaseStatusError(pub i32);

impl TestcaseStatus {
    /// Highest code with a named variant.
    pub const LAST_KNOWN_CODE: i32 = 14;

    pub fn from_code(code: i32) -> Result<Self, ParseTestcaseStatusError> {
        let status = match code {
            1 => Self::InQueue,
            2 => Self::Processing,
            3 => Self::Accepted,
            4 => Self::WrongAnswer,
            5 => Self::TimeLimitExceeded,
            6 => Self::CompilationError,
            7 => Self::RuntimeErrorSigsegv,
            8 => Self::RuntimeErrorSigxfsz,
            9 => Self::RuntimeErrorSigfpe,
            10 => Self::RuntimeErrorSigabrt,
            11 => Self::RuntimeErrorNzec,
            12 => Self::RuntimeErrorOther,
            13 => Self::InternalError,
            14 => Self::ExecFormatError,
            c if c > Self::LAST_KNOWN_CODE => Self::Unrecognized(c),
            c => return Err(ParseTestcaseStatusError(c)),
        };
        Ok(status)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::InQueue => 1,
            Self::Processing => 2,
            Self::Accepted => 3,
            Self::WrongAnswer => 4,
            Self::TimeLimitExceeded => 5,
            Self::CompilationError => 6,
            Self::RuntimeErrorSigsegv => 7,
            Self::RuntimeErrorSigxfsz => 8,
            Self::RuntimeErrorSigfpe => 9,
            Self::RuntimeErrorSigabrt => 10,
            Self::RuntimeErrorNzec => 11,
            Self::RuntimeErrorOther => 12,
            Self::InternalError => 13,
            Self::ExecFormatError => 14,
            Self::Unrecognized(code) => *code,
        }
    }

    pub fn outcome(&self) -> TestcaseOutcome {
        match self {
            Self::InQueue | Self::Processing => TestcaseOutcome::Pending,
            Self::Accepted => TestcaseOutcome::Passed,
            _ => TestcaseOutcome::Failed,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome() == TestcaseOutcome::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.outcome() == TestcaseOutcome::Failed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InQueue => "In Queue",
            Self::Processing => "Processing",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::CompilationError => "Compilation Error",
            Self::RuntimeErrorSigsegv => "Runtime Error (SIGSEGV)",
            Self::RuntimeErrorSigxfsz => "Runtime Error (SIGXFSZ)",
            Self::RuntimeErrorSigfpe => "Runtime Error (SIGFPE)",
            Self::RuntimeErrorSigabrt => "Runtime Error (SIGABRT)",
            Self::RuntimeErrorNzec => "Runtime Error (NZEC)",
            Self::RuntimeErrorOther => "Runtime Error (Other)",
            Self::InternalError => "Internal Error",
            Self::ExecFormatError => "Exec Format Error",
            Self::Unrecognized(_) => "Unrecognized",
        }
    }
}

impl TryFrom<i32> for TestcaseStatus {
    type Error = ParseTestcaseStatusError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<TestcaseStatus> for i32 {
    fn from(status: TestcaseStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TestcaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(code) => write!(f, "Unrecognized ({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}
