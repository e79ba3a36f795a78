#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean exit, including shutdown on interrupt.
    Success = 0,

    /// Invalid CLI/config (bad flags, unreadable or malformed config, no targets, bad durations, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (bind failure, metrics server error).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
