//! Exit codes for xlaunch binaries
//!
//! The stub deliberately does not tell failure causes apart through its exit
//! status: every fatal condition uses [`EXIT_FAILURE`] and the cause is only
//! printed as a one-line phase message.

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Every fatal launcher condition: license rejected, staging failed, launch
/// failed, or the child was killed because the license expired.
///
/// On Unix only the low byte survives, so the parent observes 154.
pub const EXIT_FAILURE: i32 = 666;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Invalid command-line arguments (CLI mode and issuer only)
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (issuer only)
pub const EXIT_IO_ERROR: i32 = 106;

/// Configuration error (issuer only: malformed key, IV or dates)
pub const EXIT_CONFIG_ERROR: i32 = 109;
