//! # EasyPort Core Library
//!
//! Core functionality for communicating with Festo EasyPort USB I/O modules.
//!
//! EasyPort modules speak a line-oriented ASCII protocol over a USB serial
//! link: each command is a carriage-return-terminated string such as
//! `DEB1.0.0` (display input byte) or `MAW1.2=1F4` (modify output word), and
//! each reply echoes the address portion followed by `=` and a hex value.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Command framing and response decoding for the EasyPort ASCII protocol
//! - Serial port discovery and configuration for EasyPort hardware
//! - Bit/byte/word register access with optional write verification
//! - A background monitoring mode that streams status words to a listener
//!
//! ## Example
//!
//! ```rust,ignore
//! use easyport_core::{EasyPort, ConnectionConfig, WriteByteParams};
//!
//! let mut port = EasyPort::open_index(0, ConnectionConfig::default())?;
//!
//! // Set output byte 0 of word 0 on module 1 to 9, verifying the echo
//! let ok = port.write_byte(WriteByteParams::new(1, 0, 0, 9)).await?;
//! assert!(ok);
//! ```

pub mod channel;
pub mod codec;
pub mod commands;
pub mod connection;
pub mod device;
pub mod error;
pub mod monitor;
pub mod serial;

pub use channel::{CommunicationChannel, SerialChannel};
pub use codec::{decode, encode, CommandFrame};
pub use commands::{
    AccessRequest, ReadBitParams, ReadByteParams, ReadWordParams, WriteBitParams, WriteByteParams,
    WriteWordParams,
};
pub use connection::{Connection, ConnectionConfig, DataCharacteristics, Timeouts, TranscriptEntry};
pub use device::{AccessOutcome, EasyPort};
pub use error::ProtocolError;
pub use monitor::MonitorState;
pub use serial::{find_devices, list_ports, open_port, PortInfo};

/// Default baud rate for EasyPort communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default transmit timeout in milliseconds
pub const DEFAULT_TX_TIMEOUT_MS: u64 = 1000;

/// Default receive timeout in milliseconds
pub const DEFAULT_RX_TIMEOUT_MS: u64 = 1000;

/// Interval between monitoring mode polls in milliseconds
///
/// The module streams its status word continuously while monitoring mode is
/// active; this is how often the engine drains and decodes the stream.
pub const MONITOR_POLL_INTERVAL_MS: u64 = 50;

/// Maximum reply length read for a single frame
///
/// Word replies and monitoring reads have no documented fixed width, so they
/// are bounded by this cap and located by the `=` delimiter instead.
pub const MAX_FRAME_LEN: usize = 100;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::{CommunicationChannel, SerialChannel};
    pub use crate::commands::{
        AccessRequest, ReadBitParams, ReadByteParams, ReadWordParams, WriteBitParams,
        WriteByteParams, WriteWordParams,
    };
    pub use crate::connection::{Connection, ConnectionConfig};
    pub use crate::device::EasyPort;
    pub use crate::error::ProtocolError;
    pub use crate::monitor::MonitorState;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
