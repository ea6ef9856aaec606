//! Soft failures: errors in derived state (search index, caches, notifications)
//! that are logged and then ignored so the triggering operation still succeeds.

use std::fmt::Display;

use tracing::warn;

pub trait SoftFailure<T> {
    /// Log the error at `warn` and continue without the value.
    fn soft(self, target: &'static str, op: &'static str) -> Option<T>;
}

impl<T, E: Display> SoftFailure<T> for Result<T, E> {
    fn soft(self, target: &'static str, op: &'static str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target_module = target,
                    op,
                    error = %err,
                    "derived state update failed; continuing"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_keeps_values_and_swallows_errors() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(ok.soft("tests", "ok"), Some(3));

        let err: Result<u8, String> = Err("boom".to_string());
        assert_eq!(err.soft("tests", "err"), None);
    }
}
