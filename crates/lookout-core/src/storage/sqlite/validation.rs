//! Input validation for saved-search writes.

use crate::error::{LookoutError, Result};

/// Maximum length of a saved search name, in characters.
pub const MAX_NAME_CHARS: usize = 50;

const MAX_USER_ID_BYTES: usize = 128;

/// Trim and validate a saved search name.
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LookoutError::Validation(
            "Search name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(LookoutError::Validation(format!(
            "Search name too long (max {} characters)",
            MAX_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(LookoutError::Validation(
            "User id must not be empty".to_string(),
        ));
    }
    if user_id.len() > MAX_USER_ID_BYTES {
        return Err(LookoutError::Validation(format!(
            "User id too long (max {} bytes)",
            MAX_USER_ID_BYTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(normalize_name("  Weekend cars ").unwrap(), "Weekend cars");
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(normalize_name("").is_err());
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(normalize_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn test_name_length_counts_characters_not_bytes() {
        let name = "ü".repeat(MAX_NAME_CHARS);
        assert!(normalize_name(&name).is_ok());
    }

    #[test]
    fn test_user_id_must_not_be_blank() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("user-42").is_ok());
    }
}
