//! Exit code constants for revloop.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `WATCH_FAILED` | A directory could not be watched |
//! | 4 | `VALIDATION_FAILED` | One or more files miss requirements |
//! | 9 | `LOCK_HELD` | Another process holds the log directory lock |

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public API.
///
/// ```rust
/// use revloop_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(4), ExitCode::VALIDATION_FAILED);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Watch failed - a directory could not be registered for notifications
    pub const WATCH_FAILED: ExitCode = ExitCode(3);

    /// Validation failed - at least one file misses a requirement
    pub const VALIDATION_FAILED: ExitCode = ExitCode(4);

    /// Lock held - another process is writing to the same log directory
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
