//! Byte-level framing of the analyzer's register protocol.
//!
//! Every command starts with an opcode byte. Register commands carry the
//! register address next, writes append the little-endian value.
//!
//! ```text
//! 00                  no-op
//! 0D                  indicate, device answers 0x32 ('2')
//! 10|11|12 addr       read 1/2/4 bytes
//! 18 addr count       FIFO burst read, count * 32 bytes follow
//! 20|21|22|23 addr v  write 1/2/4/8 bytes
//! ```
use crate::drivers::VnaError;
pub const OP_NOP: u8 = 0x00;
pub const OP_INDICATE: u8 = 0x0D;
pub const OP_READ1: u8 = 0x10;
pub const OP_READ2: u8 = 0x11;
pub const OP_READ4: u8 = 0x12;
pub const OP_READ_FIFO: u8 = 0x18;
pub const OP_WRITE1: u8 = 0x20;
pub const OP_WRITE2: u8 = 0x21;
pub const OP_WRITE4: u8 = 0x22;
pub const OP_WRITE8: u8 = 0x23;
/// Byte the indicate command echoes for protocol version 2.
pub const INDICATE_V2: u8 = 0x32;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Nop,
    Indicate,
    Read { address: u8, width: usize },
    Write { address: u8, width: usize, value: u64 },
    ReadFifo { address: u8, count: u8 },
}
impl Command {
    pub fn encode(&self) -> Result<Vec<u8>, VnaError> {
        let bytes = match *self {
            Command::Nop => vec![OP_NOP],
            Command::Indicate => vec![OP_INDICATE],
            Command::Read { address, width } => vec![read_opcode(address, width)?, address],
            Command::Write {
                address,
                width,
                value,
            } => {
                let mut out = Vec::with_capacity(2 + width);
                out.push(write_opcode(address, width)?);
                out.push(address);
                out.extend_from_slice(&encode_value(address, width, value)?);
                out
            }
            Command::ReadFifo { address, count } => vec![OP_READ_FIFO, address, count],
        };
        Ok(bytes)
    }
    /// Parses one command from the front of `bytes`, returning it with the
    /// number of bytes consumed, or `None` if more bytes are needed.
    pub fn decode(bytes: &[u8]) -> Result<Option<(Command, usize)>, VnaError> {
        let Some(&opcode) = bytes.first() else {
            return Ok(None);
        };
        let need = match opcode {
            OP_NOP | OP_INDICATE => 1,
            OP_READ1 | OP_READ2 | OP_READ4 => 2,
            OP_READ_FIFO => 3,
            OP_WRITE1 => 3,
            OP_WRITE2 => 4,
            OP_WRITE4 => 6,
            OP_WRITE8 => 10,
            other => {
                return Err(VnaError::ProtocolViolation(format!(
                    "unknown opcode 0x{other:02X}"
                )))
            }
        };
        if bytes.len() < need {
            return Ok(None);
        }
        let command = match opcode {
            OP_NOP => Command::Nop,
            OP_INDICATE => Command::Indicate,
            OP_READ1 | OP_READ2 | OP_READ4 => Command::Read {
                address: bytes[1],
                width: 1 << (opcode - OP_READ1),
            },
            OP_READ_FIFO => Command::ReadFifo {
                address: bytes[1],
                count: bytes[2],
            },
            _ => {
                let width = 1 << (opcode - OP_WRITE1);
                Command::Write {
                    address: bytes[1],
                    width,
                    value: decode_value(&bytes[2..2 + width])?,
                }
            }
        };
        Ok(Some((command, need)))
    }
}
fn read_opcode(address: u8, width: usize) -> Result<u8, VnaError> {
    match width {
        1 => Ok(OP_READ1),
        2 => Ok(OP_READ2),
        4 => Ok(OP_READ4),
        _ => Err(VnaError::UnsupportedWidth { address, width }),
    }
}
fn write_opcode(address: u8, width: usize) -> Result<u8, VnaError> {
    match width {
        1 => Ok(OP_WRITE1),
        2 => Ok(OP_WRITE2),
        4 => Ok(OP_WRITE4),
        8 => Ok(OP_WRITE8),
        _ => Err(VnaError::UnsupportedWidth { address, width }),
    }
}
/// Little-endian encoding of `value` in `width` bytes. Values that do not fit
/// are rejected instead of truncated.
pub fn encode_value(address: u8, width: usize, value: u64) -> Result<Vec<u8>, VnaError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(VnaError::UnsupportedWidth { address, width });
    }
    if width < 8 && value >> (width * 8) != 0 {
        return Err(VnaError::InvalidParameter(format!(
            "value {value} does not fit the {width}-byte register 0x{address:02X}"
        )));
    }
    Ok(value.to_le_bytes()[..width].to_vec())
}
/// Decodes a little-endian unsigned value of 1, 2, 4 or 8 bytes.
pub fn decode_value(bytes: &[u8]) -> Result<u64, VnaError> {
    match bytes.len() {
        1 => Ok(bytes[0] as u64),
        2 => Ok(u16::from_le_bytes([bytes[0], bytes[1]]) as u64),
        4 => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(u64::from_le_bytes(raw))
        }
        width => Err(VnaError::UnsupportedWidth { address: 0, width }),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn encodes_known_frames() {
        assert_eq!(Command::Nop.encode().unwrap(), vec![0x00]);
        assert_eq!(Command::Indicate.encode().unwrap(), vec![0x0D]);
        assert_eq!(
            Command::Read { address: 0x20, width: 2 }.encode().unwrap(),
            vec![0x11, 0x20]
        );
        assert_eq!(
            Command::Write { address: 0x30, width: 1, value: 0 }.encode().unwrap(),
            vec![0x20, 0x30, 0x00]
        );
        assert_eq!(
            Command::Write { address: 0x00, width: 8, value: 500_000_000 }
                .encode()
                .unwrap(),
            vec![0x23, 0x00, 0x00, 0x65, 0xCD, 0x1D, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            Command::ReadFifo { address: 0x30, count: 255 }.encode().unwrap(),
            vec![0x18, 0x30, 0xFF]
        );
    }
    #[test]
    fn eight_byte_reads_have_no_opcode() {
        assert!(matches!(
            Command::Read { address: 0x00, width: 8 }.encode(),
            Err(VnaError::UnsupportedWidth { address: 0x00, width: 8 })
        ));
    }
    #[test]
    fn values_survive_each_width() {
        for (width, value) in [(1, 0xABu64), (2, 0xBEEF), (4, 0xDEAD_BEEF), (8, 4_000_000_000)] {
            let bytes = encode_value(0x10, width, value).unwrap();
            assert_eq!(bytes.len(), width);
            assert_eq!(decode_value(&bytes).unwrap(), value);
        }
    }
    #[test]
    fn oversized_values_are_rejected() {
        assert!(matches!(
            encode_value(0x20, 2, 70_000),
            Err(VnaError::InvalidParameter(_))
        ));
    }
    #[test]
    fn decode_waits_for_complete_frames() {
        assert_eq!(Command::decode(&[]).unwrap(), None);
        assert_eq!(Command::decode(&[0x21, 0x20, 0x65]).unwrap(), None);
        let (cmd, used) = Command::decode(&[0x21, 0x20, 0x65, 0x00, 0x0D]).unwrap().unwrap();
        assert_eq!(used, 4);
        assert_eq!(
            cmd,
            Command::Write { address: 0x20, width: 2, value: 101 }
        );
        assert!(Command::decode(&[0x7E]).is_err());
    }
}
