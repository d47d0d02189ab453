//! Error type for `quire-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quire_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its enumerated set.
  #[error("cannot decode column value: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
