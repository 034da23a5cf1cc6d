use thiserror::Error;
#[derive(Debug, Error)]
pub enum VnaError {
    #[error("device is not connected")]
    NotConnected,
    #[error("register 0x{address:02X} is unknown or not accessible")]
    InvalidRegister { address: u8 },
    #[error("register 0x{address:02X} has width {width} which the scalar codec cannot handle")]
    UnsupportedWidth { address: u8, width: usize },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("device reports firmware major 0xFF and is in bootloader (DFU) mode")]
    DeviceInBootloaderMode,
    #[error("timed out waiting for device data: expected {expected} bytes, got {received}")]
    Timeout { expected: usize, received: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("device rejected {register}: wrote {written}, read back {read}")]
    ParameterRejected {
        register: &'static str,
        written: u64,
        read: u64,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}
