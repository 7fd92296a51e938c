//! Unrecoverable-error helpers for startup paths.
//!

use tracing::error;

/// Extension trait for results whose failure leaves nothing to clean up.
pub trait OrFail<T> {
    /// Log the error and panic with `message`.
    fn or_fail(self, message: &str) -> T;
}

impl<T, E: core::fmt::Display> OrFail<T> for Result<T, E> {
    fn or_fail(self, message: &str) -> T {
        self.unwrap_or_else(|error| {
            error!("{message}: {error}");
            panic!("{message}: {error}");
        })
    }
}
