use std::fmt;

use crate::exit_codes::ExitCode;

/// A failed run: the error chain plus the exit code it maps to.
#[derive(Debug)]
pub struct RunError {
    code: ExitCode,
    err: anyhow::Error,
}

impl RunError {
    /// Bad flags or config. Nothing was started.
    pub fn invalid_input(err: anyhow::Error) -> Self {
        Self {
            code: ExitCode::InvalidInput,
            err,
        }
    }

    pub fn runtime(err: anyhow::Error) -> Self {
        Self {
            code: ExitCode::RuntimeError,
            err,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        self.code
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            ExitCode::InvalidInput => write!(f, "invalid configuration: {:#}", self.err),
            _ => write!(f, "error: {:#}", self.err),
        }
    }
}
