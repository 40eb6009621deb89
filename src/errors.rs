//! Unified error type for the ledger.
//!
//! A point lookup miss is not an error (lookups return `Option`), and aggregate sums
//! over an empty range are `0.0`, so neither appears here.

use thiserror::Error;

/// Every failure the store, codec and configuration layers can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying persistence could not serve the operation.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[from] sea_orm::DbErr),

    /// Malformed or missing data, usually while decoding an import payload.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A monetary amount that is negative, NaN or infinite.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A budget period outside the calendar.
    #[error("Invalid budget period: {month}/{year}")]
    InvalidPeriod {
        /// Month, expected in `1..=12`
        month: i32,
        /// Year
        year: i32,
    },

    /// Sink or source unavailable during backup/restore.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or understood.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for decode and input-shape failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidAmount { .. } | Self::InvalidPeriod { .. }
        )
    }

    /// True when a sink or source failed.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        if value.is_io() {
            Self::Io(value.into())
        } else {
            Self::validation(value.to_string())
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_json_syntax_error_is_validation() {
        let err = serde_json::from_str::<Vec<u32>>("[1, 2").unwrap_err();
        let err: Error = err.into();
        assert!(err.is_validation());
        assert!(!err.is_io());
    }

    #[test]
    fn test_amount_and_period_are_validation() {
        assert!(Error::InvalidAmount { amount: -1.0 }.is_validation());
        assert!(Error::InvalidPeriod { month: 13, year: 2024 }.is_validation());
        assert!(!Error::Config { message: "x".into() }.is_validation());
    }
}
