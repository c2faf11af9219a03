//! Protocol commands
//!
//! Defines the register-access operations supported by the EasyPort ASCII
//! protocol. Each operation targets one addressable I/O module (numbered
//! from 1) and a 16-bit status word within it; bit and byte accesses name a
//! sub-index into that word.

/// Read a single input bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBitParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
    /// Bit index within the word (0-15)
    pub bit: u8,
}

impl ReadBitParams {
    /// Create read-bit parameters
    pub fn new(module: u8, word: u16, bit: u8) -> Self {
        Self { module, word, bit }
    }
}

impl Default for ReadBitParams {
    fn default() -> Self {
        Self {
            module: 1,
            word: 0,
            bit: 0,
        }
    }
}

/// Read a single input byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadByteParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
    /// Byte half of the word (0 = low, 1 = high)
    pub byte: u8,
}

impl ReadByteParams {
    /// Create read-byte parameters
    pub fn new(module: u8, word: u16, byte: u8) -> Self {
        Self { module, word, byte }
    }
}

impl Default for ReadByteParams {
    fn default() -> Self {
        Self {
            module: 1,
            word: 0,
            byte: 0,
        }
    }
}

/// Read a full 16-bit input word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWordParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
}

impl ReadWordParams {
    /// Create read-word parameters
    pub fn new(module: u8, word: u16) -> Self {
        Self { module, word }
    }
}

impl Default for ReadWordParams {
    fn default() -> Self {
        Self { module: 1, word: 0 }
    }
}

/// Write a single output bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBitParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
    /// Bit index within the word (0-15)
    pub bit: u8,
    /// Value to write (0 or 1)
    pub value: u8,
    /// Check the device echo against the written value
    ///
    /// When false the write is fire-and-forget: no reply is read and the
    /// operation reports success immediately after transmission.
    pub verify: bool,
}

impl WriteBitParams {
    /// Create write-bit parameters with verification enabled
    pub fn new(module: u8, word: u16, bit: u8, value: u8) -> Self {
        Self {
            module,
            word,
            bit,
            value,
            verify: true,
        }
    }
}

impl Default for WriteBitParams {
    fn default() -> Self {
        Self {
            module: 1,
            word: 0,
            bit: 0,
            value: 0,
            verify: true,
        }
    }
}

/// Write a single output byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteByteParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
    /// Byte half of the word (0 = low, 1 = high)
    pub byte: u8,
    /// Value to write
    pub value: u8,
    /// Check the device echo against the written value
    pub verify: bool,
}

impl WriteByteParams {
    /// Create write-byte parameters with verification enabled
    pub fn new(module: u8, word: u16, byte: u8, value: u8) -> Self {
        Self {
            module,
            word,
            byte,
            value,
            verify: true,
        }
    }
}

impl Default for WriteByteParams {
    fn default() -> Self {
        Self {
            module: 1,
            word: 0,
            byte: 0,
            value: 0,
            verify: true,
        }
    }
}

/// Write a full 16-bit output word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWordParams {
    /// Module number on the device bus (>= 1)
    pub module: u8,
    /// Word index within the module
    pub word: u16,
    /// Value to write
    pub value: u16,
    /// Check the device echo against the written value
    pub verify: bool,
}

impl WriteWordParams {
    /// Create write-word parameters with verification enabled
    pub fn new(module: u8, word: u16, value: u16) -> Self {
        Self {
            module,
            word,
            value,
            verify: true,
        }
    }
}

impl Default for WriteWordParams {
    fn default() -> Self {
        Self {
            module: 1,
            word: 0,
            value: 0,
            verify: true,
        }
    }
}

/// One register-access operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    /// Read an input bit (`DE` command)
    ReadBit(ReadBitParams),

    /// Read an input byte (`DEB` command)
    ReadByte(ReadByteParams),

    /// Read an input word (`DEW` command)
    ReadWord(ReadWordParams),

    /// Write an output bit (`MA` command)
    WriteBit(WriteBitParams),

    /// Write an output byte (`MAB` command)
    WriteByte(WriteByteParams),

    /// Write an output word (`MAW` command)
    WriteWord(WriteWordParams),
}

impl AccessRequest {
    /// Whether this request writes to the device
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            AccessRequest::WriteBit(_) | AccessRequest::WriteByte(_) | AccessRequest::WriteWord(_)
        )
    }

    /// Whether a reply should be read for this request
    ///
    /// Unverified writes are fire-and-forget.
    pub fn expects_reply(&self) -> bool {
        match self {
            AccessRequest::WriteBit(p) => p.verify,
            AccessRequest::WriteByte(p) => p.verify,
            AccessRequest::WriteWord(p) => p.verify,
            _ => true,
        }
    }

    /// The value a verified write expects the device to echo
    pub fn written_value(&self) -> Option<u16> {
        match self {
            AccessRequest::WriteBit(p) => Some(p.value as u16),
            AccessRequest::WriteByte(p) => Some(p.value as u16),
            AccessRequest::WriteWord(p) => Some(p.value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_first_module() {
        assert_eq!(ReadBitParams::default().module, 1);
        assert_eq!(ReadWordParams::default().module, 1);
        assert!(WriteByteParams::default().verify);
    }

    #[test]
    fn test_expects_reply() {
        let mut params = WriteWordParams::new(1, 0, 500);
        assert!(AccessRequest::WriteWord(params).expects_reply());
        params.verify = false;
        assert!(!AccessRequest::WriteWord(params).expects_reply());
        assert!(AccessRequest::ReadBit(ReadBitParams::default()).expects_reply());
    }

    #[test]
    fn test_is_write() {
        assert!(AccessRequest::WriteBit(WriteBitParams::default()).is_write());
        assert!(!AccessRequest::ReadByte(ReadByteParams::default()).is_write());
    }

    #[test]
    fn test_written_value() {
        let req = AccessRequest::WriteBit(WriteBitParams::new(1, 0, 3, 1));
        assert_eq!(req.written_value(), Some(1));
        assert_eq!(
            AccessRequest::ReadWord(ReadWordParams::default()).written_value(),
            None
        );
    }
}
