//! # Reply validation rules
//!
//! Limits shared by the command layer, the in-memory store and the
//! `CHECK` constraint in the Postgres migration.

use crate::errors::{DomainError, DomainResult};

/// Maximum reply length, counted in characters.
pub const CONTENT_MAX_LENGTH: usize = 1000;

/// Nesting limit used when no configuration overrides it.
/// A value of 5 allows depths 0 through 4.
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Checks the storage-level constraints on reply content.
pub fn validate_content(content: &str) -> DomainResult<()> {
    if content.trim().is_empty() {
        return Err(DomainError::ConstraintViolation(
            "reply content must not be blank".into(),
        ));
    }
    let length = content.chars().count();
    if length > CONTENT_MAX_LENGTH {
        return Err(DomainError::ConstraintViolation(format!(
            "reply content is {length} characters, limit is {CONTENT_MAX_LENGTH}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_content() {
        assert!(matches!(
            validate_content("   \n\t"),
            Err(DomainError::ConstraintViolation(_))
        ));
        assert!(validate_content("").is_err());
    }

    #[test]
    fn length_is_counted_in_characters() {
        let at_limit = "é".repeat(CONTENT_MAX_LENGTH);
        assert!(validate_content(&at_limit).is_ok());

        let over = "a".repeat(CONTENT_MAX_LENGTH + 1);
        assert!(matches!(
            validate_content(&over),
            Err(DomainError::ConstraintViolation(_))
        ));
    }
}
