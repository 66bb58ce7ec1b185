//! CLI error types for structured error handling.
//!
//! Core errors are mapped onto a small set of CLI errors, each with an exit
//! code and, where useful, a hint for the next command to run.

use std::fmt;

use lookout_core::LookoutError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, saved search)
    NotFound { message: String, hint: String },

    /// Caller does not own the saved search
    Unauthorized(String),

    /// Invalid user input
    InvalidInput(String),

    /// Listing index could not be read
    Unavailable { message: String, hint: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } | CliError::Unavailable { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::Unauthorized(message) | CliError::InvalidInput(message) => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Unauthorized(_) => exit_codes::UNAUTHORIZED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::Unavailable { .. } => exit_codes::UNAVAILABLE,
        }
    }

    /// Map a core error onto a CLI error, if it has a user-facing meaning.
    pub fn from_core(err: &LookoutError) -> Option<Self> {
        match err {
            LookoutError::Validation(message) => Some(CliError::invalid_input(message.clone())),
            LookoutError::NotFound(id) => Some(CliError::not_found(
                format!("Saved search {} not found", id),
                "Hint: Run `lookout list --user <USER>` to see your saved searches.",
            )),
            LookoutError::Unauthorized { search_id, user_id } => Some(CliError::Unauthorized(
                format!("Saved search {} does not belong to {}", search_id, user_id),
            )),
            LookoutError::IndexUnavailable(message) => Some(CliError::Unavailable {
                message: format!("Listing index unavailable: {}", message),
                hint: "Hint: Check the [index] listings path in your config.".to_string(),
            }),
            _ => None,
        }
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(core) = err.downcast_ref::<LookoutError>() {
        if let Some(cli) = CliError::from_core(core) {
            return cli.exit_code();
        }
    }
    exit_codes::FAILURE
}

/// Message for any error reaching `main`.
pub fn message_for(err: &anyhow::Error) -> String {
    if let Some(core) = err.downcast_ref::<LookoutError>() {
        if let Some(cli) = CliError::from_core(core) {
            return cli.to_string();
        }
    }
    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (LookoutError::Validation("bad".into()), exit_codes::INVALID_INPUT),
            (LookoutError::NotFound(id), exit_codes::NOT_FOUND),
            (
                LookoutError::Unauthorized {
                    search_id: id,
                    user_id: "bob".into(),
                },
                exit_codes::UNAUTHORIZED,
            ),
            (LookoutError::IndexUnavailable("down".into()), exit_codes::UNAVAILABLE),
            (LookoutError::Storage("disk".into()), exit_codes::FAILURE),
        ];
        for (core, expected) in cases {
            assert_eq!(exit_code_for(&anyhow::Error::new(core)), expected);
        }
    }

    #[test]
    fn test_not_found_message_carries_hint() {
        let err = anyhow::Error::new(LookoutError::NotFound(Uuid::nil()));
        let message = message_for(&err);
        assert!(message.contains("not found"));
        assert!(message.contains("Hint:"));
    }

    #[test]
    fn test_cli_error_passes_through() {
        let err = anyhow::Error::new(CliError::invalid_input("nope"));
        assert_eq!(exit_code_for(&err), exit_codes::INVALID_INPUT);
    }
}
