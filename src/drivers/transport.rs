use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use log::debug;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use crate::drivers::VnaError;
/// Baud rate sent to the port. The USB CDC link ignores it, but some hosts insist on one.
pub const BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
/// Blocking byte stream the driver speaks its register protocol over.
///
/// `read` returns the number of bytes placed in `buf`; `Ok(0)` means nothing
/// arrived before the transport's own timeout expired.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, VnaError>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), VnaError>;
}
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, VnaError> {
        (**self).read(buf)
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), VnaError> {
        (**self).write_all(bytes)
    }
}
/// Reads exactly `len` bytes, looping over short reads.
///
/// Fails with [`VnaError::Timeout`] as soon as a read comes back empty while
/// bytes are still outstanding.
pub fn read_exact<T: Transport + ?Sized>(port: &mut T, len: usize) -> Result<Vec<u8>, VnaError> {
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = port.read(&mut out[filled..])?;
        if n == 0 {
            return Err(VnaError::Timeout {
                expected: len,
                received: filled,
            });
        }
        filled += n;
    }
    Ok(out)
}
/// Serial port transport with the protocol's fixed 8N1 framing.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}
impl SerialTransport {
    pub fn open(port_name: &str, timeout: Duration) -> Result<Self, VnaError> {
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(timeout)
            .open()?;
        debug!("opened serial port {port_name} (timeout {timeout:?})");
        Ok(Self { port })
    }
}
impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, VnaError> {
        match Read::read(&mut self.port, buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), VnaError> {
        Write::write_all(&mut self.port, bytes)?;
        Write::flush(&mut self.port)?;
        Ok(())
    }
}
/// In-memory transport that replays queued response bytes and records
/// everything written to it. Useful for tests that check exact command bytes.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<u8>,
    written: Vec<u8>,
    max_chunk: Option<usize>,
}
impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = u8>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            written: Vec::new(),
            max_chunk: None,
        }
    }
    /// Caps every read at `max_chunk` bytes to exercise short-read handling.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = Some(max_chunk.max(1));
        self
    }
    pub fn written(&self) -> &[u8] {
        &self.written
    }
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}
impl Transport for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, VnaError> {
        let limit = self.max_chunk.unwrap_or(usize::MAX).min(buf.len());
        let mut n = 0;
        while n < limit {
            match self.responses.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), VnaError> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn read_exact_stitches_short_reads() {
        let mut port = ScriptedTransport::new(0u8..10).with_max_chunk(3);
        let bytes = read_exact(&mut port, 10).unwrap();
        assert_eq!(bytes, (0u8..10).collect::<Vec<_>>());
        assert_eq!(port.remaining(), 0);
    }
    #[test]
    fn read_exact_times_out_on_empty_read() {
        let mut port = ScriptedTransport::new([1u8, 2, 3]);
        match read_exact(&mut port, 5) {
            Err(VnaError::Timeout { expected, received }) => {
                assert_eq!(expected, 5);
                assert_eq!(received, 3);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
    #[test]
    fn boxed_transport_forwards() {
        let mut port: Box<dyn Transport> = Box::new(ScriptedTransport::new([7u8]));
        Transport::write_all(&mut port, &[1, 2]).unwrap();
        assert_eq!(read_exact(&mut port, 1).unwrap(), vec![7]);
    }
}
