//! Error type and Return values used by the packed Serializer.

use serde::ser;
use thiserror::Error;

/// Represents all possible errors that can happen during Serialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The value contains a type that has no `abi.encodePacked`
    /// representation.
    ///
    /// For example floating point numbers, maps, options and enums. Dynamic
    /// sequences are rejected, too: Solidity pads every array element to 32
    /// bytes even in packed mode, which the element types here cannot
    /// express. Use tuples or fixed-size arrays of bytes instead.
    #[error("type is not representable in packed encoding: {0}")]
    TypeNotRepresentable(&'static str),
    /// Raised by `Serialize` implementations through [ser::Error::custom].
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: core::fmt::Display,
    {
        Self::Custom(msg.to_string())
    }
}

/// Alias for `Result` using the [Error] returned by the Serializer.
pub type Result<T> = core::result::Result<T, Error>;
