//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Invalid input (clap uses the same code for usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure.
    pub const FAILURE: i32 = 1;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 2;

    /// Resource not found (config, saved search).
    pub const NOT_FOUND: i32 = 3;

    /// The caller does not own the saved search.
    pub const UNAUTHORIZED: i32 = 4;

    /// The listing index could not be read.
    pub const UNAVAILABLE: i32 = 5;
}
