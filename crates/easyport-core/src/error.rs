//! Protocol errors

use thiserror::Error;

/// Errors that can occur during EasyPort communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serial port open/configure/read/write failure
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No reply arrived within the receive timeout
    #[error("Response timeout")]
    Timeout,

    /// Operation attempted without an open device
    #[error("Not connected to an EasyPort module")]
    NotConnected,

    /// Port name or device index did not resolve to a device
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// A request parameter is outside the protocol's documented range
    ///
    /// Rejected before any bytes are written to the channel.
    #[error("{field} out of range: {value} (max {max})")]
    OutOfRange {
        /// Name of the offending parameter
        field: &'static str,
        /// Value that was supplied
        value: u32,
        /// Largest value the protocol accepts
        max: u32,
    },

    /// Reply is missing the `=` delimiter or carries a non-hex payload
    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),

    /// I/O error from the underlying channel
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
