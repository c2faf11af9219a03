//! EasyPort device facade
//!
//! [`EasyPort`] is the single owner of the channel to one device. Every
//! manual register access runs through a pause/execute/resume bracket that
//! serializes it against monitoring mode, so the two can never interleave
//! partial frames on the half-duplex link: the protocol allows exactly one
//! outstanding command/reply exchange at a time.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::channel::CommunicationChannel;
use crate::codec;
use crate::commands::{
    AccessRequest, ReadBitParams, ReadByteParams, ReadWordParams, WriteBitParams, WriteByteParams,
    WriteWordParams,
};
use crate::connection::{Connection, ConnectionConfig, TranscriptEntry};
use crate::error::ProtocolError;
use crate::monitor::{Monitor, MonitorState};

/// Result of one register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Decoded value of a read
    Value(u16),

    /// Whether a verified write echoed the requested value
    ///
    /// Always `true` for fire-and-forget writes. A `false` is an expected
    /// occasional outcome, not a fault.
    Verified(bool),
}

impl AccessOutcome {
    /// The decoded value; verification outcomes collapse to 0/1
    pub fn into_value(self) -> u16 {
        match self {
            AccessOutcome::Value(value) => value,
            AccessOutcome::Verified(ok) => ok as u16,
        }
    }

    /// Whether the access counts as verified; reads always do
    pub fn is_verified(&self) -> bool {
        match self {
            AccessOutcome::Value(_) => true,
            AccessOutcome::Verified(ok) => *ok,
        }
    }
}

/// Handle to one EasyPort device
pub struct EasyPort {
    conn: Arc<Mutex<Connection>>,
    monitor: Monitor,
}

impl EasyPort {
    /// Open the named serial port
    pub fn open(name: &str, config: ConnectionConfig) -> Result<Self, ProtocolError> {
        Ok(Self::from_connection(Connection::open(name, config)?))
    }

    /// Open the nth detected EasyPort device (ordered by port name)
    pub fn open_index(index: usize, config: ConnectionConfig) -> Result<Self, ProtocolError> {
        Ok(Self::from_connection(Connection::open_index(
            index, config,
        )?))
    }

    /// Build a device handle over an arbitrary channel
    ///
    /// Used by tests to substitute a scripted device.
    pub fn from_channel(channel: Box<dyn CommunicationChannel>, config: ConnectionConfig) -> Self {
        Self::from_connection(Connection::from_channel(channel, config))
    }

    fn from_connection(conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        let monitor = Monitor::new(Arc::clone(&conn));
        Self { conn, monitor }
    }

    /// Execute one register access under the monitoring-mode bracket
    ///
    /// Encoding errors reject the request before any I/O and without
    /// touching the monitoring session. On a transport or decode fault the
    /// transcript is dumped for diagnostics, the error is surfaced
    /// unchanged, and a paused session stays paused - no automatic retry,
    /// no half-resume.
    pub async fn execute(&mut self, request: AccessRequest) -> Result<AccessOutcome, ProtocolError> {
        let frame = codec::encode(&request)?;

        let result = self.bracket(&request, |conn| {
            if !request.expects_reply() {
                conn.write_frame(&frame)?;
                return Ok(AccessOutcome::Verified(true));
            }

            let reply = conn.transaction(&frame)?;
            let value = codec::decode(&reply)?;

            Ok(match request.written_value() {
                Some(expected) => AccessOutcome::Verified(value == expected),
                None => AccessOutcome::Value(value),
            })
        })
        .await;

        if let Err(e) = &result {
            tracing::error!(request = ?request, error = %e, "register access failed");
            self.conn.lock().await.log_transcript();
        }

        result
    }

    /// Pause monitoring around `op`, resuming it exactly once on success
    async fn bracket<T>(
        &mut self,
        request: &AccessRequest,
        op: impl FnOnce(&mut Connection) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        if self.monitor.is_enabled() {
            tracing::debug!(request = ?request, "pausing monitoring for manual access");
            self.monitor.pause().await?;
        }

        let value = {
            let mut conn = self.conn.lock().await;
            op(&mut conn)?
        };

        if self.monitor.should_resume() && !self.monitor.is_enabled() {
            self.monitor.resume().await?;
        }

        Ok(value)
    }

    /// Read an input bit
    #[doc(alias = "display_input_bit")]
    pub async fn read_bit(&mut self, params: ReadBitParams) -> Result<u8, ProtocolError> {
        let value = self
            .execute(AccessRequest::ReadBit(params))
            .await?
            .into_value();
        narrow(value)
    }

    /// Read an input byte
    #[doc(alias = "display_input_byte")]
    pub async fn read_byte(&mut self, params: ReadByteParams) -> Result<u8, ProtocolError> {
        let value = self
            .execute(AccessRequest::ReadByte(params))
            .await?
            .into_value();
        narrow(value)
    }

    /// Read an input word
    #[doc(alias = "display_input_word")]
    pub async fn read_word(&mut self, params: ReadWordParams) -> Result<u16, ProtocolError> {
        Ok(self
            .execute(AccessRequest::ReadWord(params))
            .await?
            .into_value())
    }

    /// Write an output bit, reporting whether the echo matched
    #[doc(alias = "modify_output_bit")]
    pub async fn write_bit(&mut self, params: WriteBitParams) -> Result<bool, ProtocolError> {
        Ok(self
            .execute(AccessRequest::WriteBit(params))
            .await?
            .is_verified())
    }

    /// Write an output byte, reporting whether the echo matched
    #[doc(alias = "modify_output_byte")]
    pub async fn write_byte(&mut self, params: WriteByteParams) -> Result<bool, ProtocolError> {
        Ok(self
            .execute(AccessRequest::WriteByte(params))
            .await?
            .is_verified())
    }

    /// Write an output word, reporting whether the echo matched
    #[doc(alias = "modify_output_word")]
    pub async fn write_word(&mut self, params: WriteWordParams) -> Result<bool, ProtocolError> {
        Ok(self
            .execute(AccessRequest::WriteWord(params))
            .await?
            .is_verified())
    }

    /// Switch the module into monitoring mode and start streaming values
    pub async fn enable_monitoring(&mut self) -> Result<(), ProtocolError> {
        self.monitor.enable().await
    }

    /// Stop monitoring; the session will not restart on its own
    pub async fn disable_monitoring(&mut self) -> Result<(), ProtocolError> {
        self.monitor.disable().await
    }

    /// Suspend monitoring, marking it for restoration by the next access
    pub async fn pause_monitoring(&mut self) -> Result<(), ProtocolError> {
        self.monitor.pause().await
    }

    /// Current monitoring state
    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Register the callback receiving each streamed status word
    ///
    /// Single slot: registering replaces the previous listener. The default
    /// listener discards values.
    pub fn set_value_listener(&self, listener: impl Fn(u16) + Send + Sync + 'static) {
        self.monitor.set_value_listener(Box::new(listener));
    }

    /// Register the callback notified when monitoring is enabled or disabled
    pub fn set_enabled_listener(&mut self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.monitor.set_enabled_listener(Box::new(listener));
    }

    /// Snapshot of every frame sent since the device was opened
    pub async fn sent_frames(&self) -> Vec<TranscriptEntry> {
        self.conn.lock().await.sent_frames().to_vec()
    }

    /// Snapshot of every non-empty frame received since the device was opened
    pub async fn received_frames(&self) -> Vec<TranscriptEntry> {
        self.conn.lock().await.received_frames().to_vec()
    }

    /// Shut the engine down, stopping any active monitoring session
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        if self.monitor.state() != MonitorState::Disabled {
            self.monitor.disable().await?;
        }
        Ok(())
    }
}

/// Narrow a decoded word to the u8 range of bit/byte replies
fn narrow(value: u16) -> Result<u8, ProtocolError> {
    u8::try_from(value)
        .map_err(|_| ProtocolError::MalformedResponse(format!("value {} exceeds u8", value)))
}
