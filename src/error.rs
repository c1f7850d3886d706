//! Our error types for the monochromator.

use thiserror::Error;

use crate::parse::ParseError;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for monochromator communications.
///
/// Generic over the error type of the transport, so a serial port, a mock or the offline
/// placeholder all surface their own failures through [`Error::SerialError`].
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    /// The transport could not be written to or read from. Never retried by the protocol engine.
    #[error("Serial communication error")]
    SerialError(I),
    /// The `" ok\r\n"` terminator was not seen before the miss budget ran out.
    ///
    /// Recoverable: the caller may send the whole command again.
    #[error("Communication timeout after {misses} consecutive empty reads")]
    Timeout { misses: u8 },
    /// The response did not fit in the receive buffer. The rest of it was read and discarded.
    #[error("Response overflowed the receive buffer")]
    BufferError,
    /// The payload did not have the shape expected for this query.
    #[error("Invalid response received: {0}")]
    InvalidResponse(#[from] ParseError),
    /// A caller supplied value was rejected before anything was sent.
    #[error("Invalid range for {parameter}: {value}")]
    InvalidRange {
        parameter: &'static str,
        value: String,
    },
    /// A cached session value is needed but has not been read from the device yet.
    #[error("{0} has not been read from the device")]
    NotRead(&'static str),
}

impl<I: embedded_io::Error> Error<I> {
    pub(crate) fn invalid_range(parameter: &'static str, value: impl ToString) -> Self {
        Error::InvalidRange {
            parameter,
            value: value.to_string(),
        }
    }
}
