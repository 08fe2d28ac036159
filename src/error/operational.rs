//! Operational error context propagation with `anyhow`.
//!
//! This module provides extension traits and utilities for enhancing
//! error context and centralized error reporting.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Result as AnyhowResult},
    tracing::{debug, error, info, warn},
};

/// Extension trait for enhanced error context.
///
/// This trait provides methods to add contextual information to errors,
/// making debugging and user feedback more informative.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Adds context to an error with a formatted string.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Centralized error reporting and logging.
///
/// Used wherever a failure is absorbed instead of propagated, so that
/// swallowed errors still leave a trace in the log.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports a debug-level error.
    pub fn debug(error: &dyn StdError, context: &str) {
        debug!(context = context, error = %Self::chain_message(error), "Debug error");
    }

    /// Reports an info-level error (user actions and system events).
    pub fn info(error: &dyn StdError, context: &str) {
        info!(context = context, error = %Self::chain_message(error), "Info error");
    }

    /// Reports a warning-level error (recoverable issues).
    pub fn warn(error: &dyn StdError, context: &str) {
        warn!(context = context, error = %Self::chain_message(error), "Warning error");
    }

    /// Reports an error-level error (non-recoverable issues).
    pub fn error(error: &dyn StdError, context: &str) {
        error!(context = context, error = %Self::chain_message(error), "Error error");
    }

    /// Converts an error to the message shown to users.
    ///
    /// Only the top-level message is used; causes stay in the log.
    pub fn to_user_message(error: &dyn StdError) -> String {
        error.to_string()
    }

    /// Joins an error and all of its sources into one line.
    pub fn chain_message(error: &dyn StdError) -> String {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
        io::{Error as IoError, ErrorKind::TimedOut},
    };

    use crate::{
        bluetooth::ServiceId,
        error::{
            ConnectionError,
            operational::{ErrorReporter, ResultExt},
        },
    };

    #[derive(Debug)]
    struct TestError;

    impl Display for TestError {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            write!(f, "Test error")
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<i32, TestError> = Err(TestError);
        let with_context = result.add_context("Additional context");

        let error = with_context.unwrap_err();
        assert!(error.to_string().contains("Additional context"));
    }

    #[test]
    fn test_result_ext_with_contextf() {
        let result: Result<i32, TestError> = Err(TestError);
        let with_context = result.add_contextf(format_args!("Sending to {}", "aa:bb"));

        let error = with_context.unwrap_err();
        assert!(error.to_string().contains("Sending to aa:bb"));
    }

    #[test]
    fn test_user_message_is_top_level_only() {
        let error = ConnectionError::AllAttemptsExhausted {
            rounds: 3,
            last: Some(Box::new(ConnectionError::ConnectFailed {
                service: ServiceId::SERIAL_PORT,
                source: IoError::new(TimedOut, "host is down"),
            })),
        };

        assert_eq!(
            ErrorReporter::to_user_message(&error),
            "Failed to connect after 3 attempts"
        );

        let chain = ErrorReporter::chain_message(&error);
        assert!(chain.starts_with("Failed to connect after 3 attempts: "));
        assert!(chain.ends_with("host is down"));
    }
}
