//! Command framing and response decoding
//!
//! Builds the ASCII command lines the EasyPort understands and extracts hex
//! values from its replies.
//!
//! Command grammar:
//! - `DE<m>.<w>.<b>`  read bit (`b` is a single hex digit 0-F)
//! - `DEB<m>.<w>.<h>` read byte (`h` is the byte half, 0 or 1)
//! - `DEW<m>.<w>`     read word
//! - `MA<m>.<w>.<b>=<v>`  write bit
//! - `MAB<m>.<w>.<h>=<v>` write byte
//! - `MAW<m>.<w>=<v>`     write word
//!
//! Values are unpadded hex. Every frame is terminated by a carriage return
//! on the wire. Replies echo the command's address portion stripped of its
//! leading letter, then `=` and the hex value, e.g. `DEB1.0.0` is answered
//! by `EB1.0.0=FF`.

use crate::commands::AccessRequest;
use crate::error::ProtocolError;

/// Largest valid bit index within a word
const MAX_BIT_INDEX: u8 = 15;

/// Largest valid byte half within a word
const MAX_BYTE_INDEX: u8 = 1;

/// One ASCII command line, ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// The command text, without the terminating carriage return
    pub text: String,

    /// Expected reply length in bytes, when the protocol fixes it
    ///
    /// Bit and byte exchanges have deterministic reply lengths derived from
    /// the command length; word replies are variable-width and read up to
    /// the engine's frame cap. This is only a bounded-read hint - decoding
    /// always locates the value by the `=` delimiter.
    pub reply_len: Option<usize>,
}

impl CommandFrame {
    /// Create a frame from raw text and an optional reply-length hint
    pub fn new(text: impl Into<String>, reply_len: Option<usize>) -> Self {
        Self {
            text: text.into(),
            reply_len,
        }
    }

    /// Wire representation: the command text followed by a carriage return
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.text.as_bytes().to_vec();
        bytes.push(b'\r');
        bytes
    }
}

/// Render a value as unpadded uppercase hex
pub fn to_hex(value: u16) -> String {
    format!("{:X}", value)
}

/// Parse a hex string into a value
pub fn from_hex(text: &str) -> Result<u16, ProtocolError> {
    u16::from_str_radix(text.trim(), 16)
        .map_err(|_| ProtocolError::MalformedResponse(text.to_string()))
}

/// Build the command frame for a register access
///
/// Pure function; rejects out-of-range parameters before any I/O happens.
/// Byte and word value ranges are enforced by the parameter types.
pub fn encode(request: &AccessRequest) -> Result<CommandFrame, ProtocolError> {
    match request {
        AccessRequest::ReadBit(p) => {
            check_module(p.module)?;
            check_bit_index(p.bit)?;
            let text = format!("DE{}.{}.{:X}", p.module, p.word, p.bit);
            let reply_len = text.len() + 1;
            Ok(CommandFrame::new(text, Some(reply_len)))
        }
        AccessRequest::ReadByte(p) => {
            check_module(p.module)?;
            check_byte_index(p.byte)?;
            let text = format!("DEB{}.{}.{}", p.module, p.word, p.byte);
            let reply_len = text.len() + 2;
            Ok(CommandFrame::new(text, Some(reply_len)))
        }
        AccessRequest::ReadWord(p) => {
            check_module(p.module)?;
            let text = format!("DEW{}.{}", p.module, p.word);
            Ok(CommandFrame::new(text, None))
        }
        AccessRequest::WriteBit(p) => {
            check_module(p.module)?;
            check_bit_index(p.bit)?;
            if p.value > 1 {
                return Err(ProtocolError::OutOfRange {
                    field: "bit value",
                    value: p.value as u32,
                    max: 1,
                });
            }
            let text = format!("MA{}.{}.{:X}={}", p.module, p.word, p.bit, p.value);
            let reply_len = text.len() - 1;
            Ok(CommandFrame::new(text, Some(reply_len)))
        }
        AccessRequest::WriteByte(p) => {
            check_module(p.module)?;
            check_byte_index(p.byte)?;
            let text = format!(
                "MAB{}.{}.{}={}",
                p.module,
                p.word,
                p.byte,
                to_hex(p.value as u16)
            );
            let reply_len = text.len() - 1;
            Ok(CommandFrame::new(text, Some(reply_len)))
        }
        AccessRequest::WriteWord(p) => {
            check_module(p.module)?;
            let text = format!("MAW{}.{}={}", p.module, p.word, to_hex(p.value));
            Ok(CommandFrame::new(text, None))
        }
    }
}

/// Extract the hex value from a device reply
///
/// Replies use a single-byte character encoding, so each byte maps directly
/// to one character. Trailing whitespace and control bytes (CR/LF padding)
/// are trimmed, then the value is the hex payload after the `=` delimiter.
pub fn decode(reply: &[u8]) -> Result<u16, ProtocolError> {
    let text: String = reply.iter().map(|&b| b as char).collect();
    let trimmed = text.trim_end_matches(|c: char| c.is_ascii_whitespace() || c.is_ascii_control());

    let payload = trimmed
        .split_once('=')
        .map(|(_, tail)| tail)
        .ok_or_else(|| ProtocolError::MalformedResponse(trimmed.to_string()))?;

    if payload.is_empty() {
        return Err(ProtocolError::MalformedResponse(trimmed.to_string()));
    }

    from_hex(payload)
}

fn check_module(module: u8) -> Result<(), ProtocolError> {
    if module == 0 {
        return Err(ProtocolError::OutOfRange {
            field: "module",
            value: 0,
            max: u8::MAX as u32,
        });
    }
    Ok(())
}

fn check_bit_index(bit: u8) -> Result<(), ProtocolError> {
    if bit > MAX_BIT_INDEX {
        return Err(ProtocolError::OutOfRange {
            field: "bit index",
            value: bit as u32,
            max: MAX_BIT_INDEX as u32,
        });
    }
    Ok(())
}

fn check_byte_index(byte: u8) -> Result<(), ProtocolError> {
    if byte > MAX_BYTE_INDEX {
        return Err(ProtocolError::OutOfRange {
            field: "byte index",
            value: byte as u32,
            max: MAX_BYTE_INDEX as u32,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_read_bit() {
        let frame = encode(&AccessRequest::ReadBit(ReadBitParams::new(1, 0, 10))).unwrap();
        assert_eq!(frame.text, "DE1.0.A");
        assert_eq!(frame.reply_len, Some(8));
        assert_eq!(frame.to_bytes(), b"DE1.0.A\r".to_vec());
    }

    #[test]
    fn test_encode_read_byte() {
        let frame = encode(&AccessRequest::ReadByte(ReadByteParams::new(1, 0, 0))).unwrap();
        assert_eq!(frame.text, "DEB1.0.0");
        // DEB1.0.0 is answered by EB1.0.0=XX
        assert_eq!(frame.reply_len, Some(10));
    }

    #[test]
    fn test_encode_read_word() {
        let frame = encode(&AccessRequest::ReadWord(ReadWordParams::new(1, 2))).unwrap();
        assert_eq!(frame.text, "DEW1.2");
        assert_eq!(frame.reply_len, None);
    }

    #[test]
    fn test_encode_write_bit() {
        let frame = encode(&AccessRequest::WriteBit(WriteBitParams::new(1, 0, 15, 1))).unwrap();
        assert_eq!(frame.text, "MA1.0.F=1");
        assert_eq!(frame.reply_len, Some(8));
    }

    #[test]
    fn test_encode_write_byte() {
        let frame = encode(&AccessRequest::WriteByte(WriteByteParams::new(1, 0, 0, 9))).unwrap();
        assert_eq!(frame.text, "MAB1.0.0=9");
        assert_eq!(frame.reply_len, Some(9));
        assert_eq!(frame.to_bytes(), b"MAB1.0.0=9\r".to_vec());
    }

    #[test]
    fn test_encode_write_word_unpadded_hex() {
        let frame = encode(&AccessRequest::WriteWord(WriteWordParams::new(1, 2, 500))).unwrap();
        assert_eq!(frame.text, "MAW1.2=1F4");
        assert_eq!(frame.reply_len, None);
    }

    #[test]
    fn test_encode_rejects_module_zero() {
        let err = encode(&AccessRequest::ReadWord(ReadWordParams::new(0, 0))).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "module", .. }));
    }

    #[test]
    fn test_encode_rejects_bit_index_over_15() {
        let err = encode(&AccessRequest::ReadBit(ReadBitParams::new(1, 0, 16))).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "bit index", .. }));
    }

    #[test]
    fn test_encode_rejects_byte_index_over_1() {
        let err = encode(&AccessRequest::ReadByte(ReadByteParams::new(1, 0, 2))).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "byte index", .. }));
    }

    #[test]
    fn test_encode_rejects_bit_value_over_1() {
        let err = encode(&AccessRequest::WriteBit(WriteBitParams::new(1, 0, 0, 2))).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "bit value", .. }));
    }

    #[test]
    fn test_decode_word_reply() {
        assert_eq!(decode(b"EW1.2=1F4").unwrap(), 500);
    }

    #[test]
    fn test_decode_trims_trailing_control_bytes() {
        assert_eq!(decode(b"EB1.0.0=FF\r\n").unwrap(), 255);
        assert_eq!(decode(b"AB1.0.0=9\r").unwrap(), 9);
    }

    #[test]
    fn test_decode_lowercase_hex() {
        assert_eq!(decode(b"EW1.0=1f4").unwrap(), 500);
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let err = decode(b"EB1.0.0").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_non_hex_payload() {
        let err = decode(b"EB1.0.0=ZZ").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_empty_payload() {
        let err = decode(b"EB1.0.0=\r").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_empty_reply() {
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        for value in [0u16, 1, 9, 0xA, 0xF, 0x10, 0xFF, 0x100, 0x1F4, 0xFFFF] {
            assert_eq!(from_hex(&to_hex(value)).unwrap(), value);
        }
    }

    #[test]
    fn test_to_hex_unpadded() {
        assert_eq!(to_hex(9), "9");
        assert_eq!(to_hex(255), "FF");
        assert_eq!(to_hex(500), "1F4");
    }
}
