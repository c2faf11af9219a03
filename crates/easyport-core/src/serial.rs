//! Serial port handling
//!
//! Provides low-level serial port access for EasyPort communication.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;

use crate::connection::ConnectionConfig;
use crate::error::ProtocolError;

/// USB vendor ID of the EasyPort's FTDI bridge
pub const EASYPORT_VID: u16 = 0x0403;

/// USB product ID of the EasyPort's FTDI bridge
pub const EASYPORT_PID: u16 = 0xaf80;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Whether this port reports the EasyPort's USB identifiers
    pub fn is_easyport(&self) -> bool {
        self.vid == Some(EASYPORT_VID) && self.pid == Some(EASYPORT_PID)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
                usb_info.serial_number,
            ),
            _ => (None, None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
            serial_number,
        }
    }
}

/// List all available serial ports in deterministic name order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}

/// List the ports that identify as EasyPort hardware
///
/// Indexable by the caller; `EasyPort::open_index` resolves against this
/// list.
pub fn find_devices() -> Vec<PortInfo> {
    let mut ports = list_ports();
    ports.retain(PortInfo::is_easyport);
    ports
}

/// Open a serial port with the configured baud rate
///
/// The port is opened with a short (100 ms) native timeout; the engine's own
/// receive deadline is enforced by polling in the connection layer.
pub fn open_port(name: &str, config: &ConnectionConfig) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, config.baud_rate)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// Configure a serial port for EasyPort communication
pub fn configure_port(
    port: &mut dyn SerialPort,
    config: &ConnectionConfig,
) -> Result<(), ProtocolError> {
    port.set_data_bits(config.data_characteristics.data_bits)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(config.data_characteristics.parity)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(config.data_characteristics.stop_bits)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // This test just ensures the function doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_is_easyport_filter() {
        let mut info = PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            vid: Some(EASYPORT_VID),
            pid: Some(EASYPORT_PID),
            manufacturer: None,
            product: None,
            serial_number: None,
        };
        assert!(info.is_easyport());

        info.pid = Some(0x6001);
        assert!(!info.is_easyport());

        info.vid = None;
        info.pid = None;
        assert!(!info.is_easyport());
    }
}
