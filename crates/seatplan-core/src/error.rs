//! Error types for `seatplan-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A record failed boundary validation; nothing was stored.
  #[error("invalid {field}: {reason}")]
  Invalid {
    field:  &'static str,
    reason: String,
  },

  #[error("unknown session: {0:?} (expected FN or AN)")]
  UnknownSession(String),
}

impl Error {
  pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Invalid { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
