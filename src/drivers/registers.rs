//! Register map and scalar register access.
//!
//! The table is a closed enum so internal code cannot name an address the
//! device does not have. [`read_register`] and [`write_register`] take raw
//! addresses for callers and check them against the table first.
use log::debug;
use crate::drivers::protocol::{decode_value, Command};
use crate::drivers::transport::{read_exact, Transport};
use crate::drivers::VnaError;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterWidth {
    U8,
    U16,
    U32,
    U64,
    /// Burst-only FIFO; the payload is the size of one record.
    Fifo { record_bytes: usize },
}
impl RegisterWidth {
    pub fn bytes(self) -> usize {
        match self {
            RegisterWidth::U8 => 1,
            RegisterWidth::U16 => 2,
            RegisterWidth::U32 => 4,
            RegisterWidth::U64 => 8,
            RegisterWidth::Fifo { record_bytes } => record_bytes,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub address: u8,
    pub width: RegisterWidth,
    pub accessible: bool,
    pub mnemonic: &'static str,
    pub description: &'static str,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    SweepStartHz = 0x00,
    SweepStepHz = 0x10,
    SweepPoints = 0x20,
    ValuesPerFrequency = 0x22,
    SampleMode = 0x26,
    ValuesFifo = 0x30,
    AverageSetting = 0x40,
    Si5351Power = 0x41,
    Adf4350Power = 0x42,
    LcdDump = 0xEE,
    DeviceVariant = 0xF0,
    ProtocolVersion = 0xF1,
    HardwareRevision = 0xF2,
    FirmwareMajor = 0xF3,
    FirmwareMinor = 0xF4,
}
impl Register {
    pub const ALL: [Register; 15] = [
        Register::SweepStartHz,
        Register::SweepStepHz,
        Register::SweepPoints,
        Register::ValuesPerFrequency,
        Register::SampleMode,
        Register::ValuesFifo,
        Register::AverageSetting,
        Register::Si5351Power,
        Register::Adf4350Power,
        Register::LcdDump,
        Register::DeviceVariant,
        Register::ProtocolVersion,
        Register::HardwareRevision,
        Register::FirmwareMajor,
        Register::FirmwareMinor,
    ];
    pub fn address(self) -> u8 {
        self as u8
    }
    pub fn from_address(address: u8) -> Option<Register> {
        Self::ALL.iter().copied().find(|r| r.address() == address)
    }
    pub const fn descriptor(self) -> RegisterDescriptor {
        use RegisterWidth::*;
        let (width, accessible, mnemonic, description) = match self {
            Register::SweepStartHz => (U64, true, "sweepStartHz", "Sweep start frequency in Hz"),
            Register::SweepStepHz => (U64, true, "sweepStepHz", "Sweep step frequency in Hz"),
            Register::SweepPoints => (U16, true, "sweepPoints", "Number of sweep frequency points"),
            Register::ValuesPerFrequency => (
                U16,
                true,
                "valuesPerFrequency",
                "Number of values to sample and output per data point",
            ),
            Register::SampleMode => (
                U8,
                true,
                "sampleMode",
                "0 is VNA data, 1 is raw data and 2 exits USB data mode",
            ),
            Register::ValuesFifo => (
                Fifo { record_bytes: 32 },
                true,
                "valuesFIFO",
                "VNA sweep data points. Writing anything clears the FIFO",
            ),
            Register::AverageSetting => (U8, true, "averageSetting", "Number of samples to average"),
            Register::Si5351Power => (U8, false, "si5351power", "SI5351 power"),
            Register::Adf4350Power => (U8, true, "adf4350power", "ADF4350 power"),
            Register::LcdDump => (U8, false, "lcddump", "Dump LCD data"),
            Register::DeviceVariant => (
                U8,
                true,
                "deviceVariant",
                "The device type (0x02 for the NanoVNA v2)",
            ),
            Register::ProtocolVersion => (U8, true, "protocolVersion", "The protocol version"),
            Register::HardwareRevision => (U8, true, "hardwareRevision", "Hardware revision"),
            Register::FirmwareMajor => (U8, true, "firmwareMajor", "Major firmware version"),
            Register::FirmwareMinor => (U8, true, "firmwareMinor", "Minor firmware version"),
        };
        RegisterDescriptor {
            address: self as u8,
            width,
            accessible,
            mnemonic,
            description,
        }
    }
    pub fn mnemonic(self) -> &'static str {
        self.descriptor().mnemonic
    }
}
/// Looks up `address` and checks that the driver may touch it.
pub fn lookup(address: u8) -> Result<RegisterDescriptor, VnaError> {
    match Register::from_address(address).map(Register::descriptor) {
        Some(desc) if desc.accessible => Ok(desc),
        _ => Err(VnaError::InvalidRegister { address }),
    }
}
/// Reads a scalar register.
///
/// 8-byte registers are read as two 4-byte halves, low word at `address` and
/// high word at `address + 4`. The device does not latch the pair, so a value
/// that changes between the two reads can come back torn.
pub fn read_register<T: Transport + ?Sized>(port: &mut T, address: u8) -> Result<u64, VnaError> {
    let desc = lookup(address)?;
    let value = match desc.width {
        RegisterWidth::U8 | RegisterWidth::U16 | RegisterWidth::U32 => {
            read_raw(port, address, desc.width.bytes())?
        }
        RegisterWidth::U64 => {
            let low = read_raw(port, address, 4)?;
            let high = read_raw(port, address.wrapping_add(4), 4)?;
            (high << 32) | low
        }
        RegisterWidth::Fifo { .. } => {
            return Err(VnaError::UnsupportedWidth {
                address,
                width: desc.width.bytes(),
            })
        }
    };
    debug!("read {} = {}", desc.mnemonic, value);
    Ok(value)
}
/// Writes a scalar register. Nothing is read back here.
pub fn write_register<T: Transport + ?Sized>(
    port: &mut T,
    address: u8,
    value: u64,
) -> Result<(), VnaError> {
    let desc = lookup(address)?;
    let width = match desc.width {
        RegisterWidth::Fifo { .. } => {
            return Err(VnaError::UnsupportedWidth {
                address,
                width: desc.width.bytes(),
            })
        }
        other => other.bytes(),
    };
    let frame = Command::Write {
        address,
        width,
        value,
    }
    .encode()?;
    debug!("write {} = {}", desc.mnemonic, value);
    port.write_all(&frame)
}
fn read_raw<T: Transport + ?Sized>(port: &mut T, address: u8, width: usize) -> Result<u64, VnaError> {
    let frame = Command::Read { address, width }.encode()?;
    port.write_all(&frame)?;
    let bytes = read_exact(port, width)?;
    decode_value(&bytes)
}
