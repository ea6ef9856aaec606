//! Rule violations raised while validating post content and status changes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{field} is required")]
    Blank { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("published posts cannot be moved back to draft")]
    DraftAfterPublish,
}

/// Reject values that are empty once surrounding whitespace is ignored.
pub fn ensure_present(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Blank { field });
    }
    Ok(())
}

/// Length is counted in characters, not bytes.
pub fn ensure_max_chars(value: &str, field: &'static str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::TooLong { field, max });
    }
    Ok(())
}
