pub mod atomic_write;
pub mod canonicalization;
pub mod clock;
pub mod content;
pub mod error;
pub mod exit_codes;
pub mod json_log;
pub mod logging;
pub mod shutdown;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
