//! The `error` module defines the crate-wide error type.
//!
//! Each layer keeps its own error enum (`CodecError` for framing,
//! `StoreError` for the scheduling store); `Error` wraps them so the session
//! engine and cycle driver can propagate either with `?`.

use thiserror::Error;

use crate::codec::CodecError;
use crate::persistence::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
