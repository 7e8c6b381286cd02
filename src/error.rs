
//! Error type definitions.

use std::borrow::Cow;
use std::collections::TryReserveError;
use std::fmt;

/// A result that may contain an error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains an error.
pub type UnitResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;


/// An error that may happen while reading or writing a container file.
/// Distinguishes between contents that do not conform to the format
/// contract, `Io` errors of the underlying byte stream, and allocation
/// failures while decompressing.
#[derive(Debug)]
pub enum Error {

    /// The contents of the file are not conforming to the format contract.
    /// This includes bad magic bytes, impossible sizes,
    /// truncated run-length sections and corrupt compressed streams.
    Invalid(Cow<'static, str>),

    /// The contents declare a feature that this library does not support,
    /// for example an unknown container version.
    NotSupported(Cow<'static, str>),

    /// A specific field carries an unexpected value.
    Field {

        /// Name of the offending on-disk field.
        name: &'static str,

        /// Serialized representation of the value that was found.
        value: String,
    },

    /// The underlying byte stream could not be read or written.
    Io(IoError),

    /// The decoded contents would require more memory than available.
    Allocation,
}


impl Error {

    /// Create an error of the variant `Invalid`.
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Invalid(message.into())
    }

    /// Create an error of the variant `NotSupported`.
    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Create an error of the variant `Field`.
    pub(crate) fn field(name: &'static str, value: impl fmt::Display) -> Self {
        Error::Field { name, value: value.to_string() }
    }
}


/// Enable using the `?` operator on `io::Result`.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == std::io::ErrorKind::OutOfMemory { Error::Allocation }
        else { Error::Io(error) }
    }
}

/// Enable using the `?` operator on `Vec::try_reserve` results.
impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::Allocation
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid(message) => write!(formatter, "invalid: {}", message),
            Error::NotSupported(message) => write!(formatter, "unsupported: {}", message),
            Error::Field { name, value } => write!(formatter, "unexpected value for `{}`: {}", name, value),
            Error::Io(error) => write!(formatter, "io error: {}", error),
            Error::Allocation => write!(formatter, "out of memory"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}
