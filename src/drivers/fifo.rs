use log::debug;
use crate::drivers::protocol::Command;
use crate::drivers::registers::{Register, RegisterWidth};
use crate::drivers::transport::{read_exact, Transport};
use crate::drivers::VnaError;
/// Largest record count a single burst-read command can ask for.
pub const MAX_BURST_POINTS: usize = 255;
pub const RECORD_BYTES: usize = 32;
/// One integer I/Q pair as delivered by the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IqSample {
    pub re: i32,
    pub im: i32,
}
impl IqSample {
    pub fn new(re: i32, im: i32) -> Self {
        Self { re, im }
    }
}
/// A decoded FIFO entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    pub fwd0: IqSample,
    pub rev0: IqSample,
    pub rev1: IqSample,
    /// Index within the sweep window currently programmed on the device.
    pub frequency_index: u16,
}
impl SampleRecord {
    /// Layout: six `i32` (fwd0, rev0, rev1 as re/im), `u16` frequency index,
    /// then 6 bytes of padding. Little-endian.
    pub fn decode(bytes: &[u8]) -> Result<Self, VnaError> {
        if bytes.len() != RECORD_BYTES {
            return Err(VnaError::ProtocolViolation(format!(
                "FIFO record is {} bytes, expected {RECORD_BYTES}",
                bytes.len()
            )));
        }
        let word = |i: usize| {
            let at = i * 4;
            i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Ok(Self {
            fwd0: IqSample::new(word(0), word(1)),
            rev0: IqSample::new(word(2), word(3)),
            rev1: IqSample::new(word(4), word(5)),
            frequency_index: u16::from_le_bytes([bytes[24], bytes[25]]),
        })
    }
    pub fn encode(&self) -> [u8; RECORD_BYTES] {
        let mut out = [0u8; RECORD_BYTES];
        let words = [
            self.fwd0.re,
            self.fwd0.im,
            self.rev0.re,
            self.rev0.im,
            self.rev1.re,
            self.rev1.im,
        ];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out[24..26].copy_from_slice(&self.frequency_index.to_le_bytes());
        out
    }
}
/// Splits a drained FIFO buffer into records.
pub fn decode_records(buffer: &[u8]) -> Result<Vec<SampleRecord>, VnaError> {
    if buffer.len() % RECORD_BYTES != 0 {
        return Err(VnaError::ProtocolViolation(format!(
            "FIFO buffer of {} bytes is not a whole number of records",
            buffer.len()
        )));
    }
    buffer.chunks_exact(RECORD_BYTES).map(SampleRecord::decode).collect()
}
/// Drains the sweep-data FIFO in bursts of at most [`MAX_BURST_POINTS`].
pub struct FifoReader {
    address: u8,
    record_bytes: usize,
}
impl Default for FifoReader {
    fn default() -> Self {
        let desc = Register::ValuesFifo.descriptor();
        let record_bytes = match desc.width {
            RegisterWidth::Fifo { record_bytes } => record_bytes,
            other => other.bytes(),
        };
        Self {
            address: desc.address,
            record_bytes,
        }
    }
}
impl FifoReader {
    /// Clears stale samples, then reads `total_points` records.
    ///
    /// The returned buffer is always `total_points * record_bytes` long.
    pub fn drain_and_read<T: Transport + ?Sized>(
        &self,
        port: &mut T,
        total_points: usize,
    ) -> Result<Vec<u8>, VnaError> {
        self.clear(port)?;
        let mut out = Vec::with_capacity(total_points * self.record_bytes);
        let mut remaining = total_points;
        while remaining > 0 {
            let batch = remaining.min(MAX_BURST_POINTS);
            let frame = Command::ReadFifo {
                address: self.address,
                count: batch as u8,
            }
            .encode()?;
            port.write_all(&frame)?;
            let chunk = read_exact(port, batch * self.record_bytes)?;
            out.extend_from_slice(&chunk);
            remaining -= batch;
            debug!("FIFO burst of {batch} records, {remaining} outstanding");
        }
        Ok(out)
    }
    fn clear<T: Transport + ?Sized>(&self, port: &mut T) -> Result<(), VnaError> {
        let frame = Command::Write {
            address: self.address,
            width: 1,
            value: 0,
        }
        .encode()?;
        port.write_all(&frame)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::transport::ScriptedTransport;
    fn record(index: u16) -> SampleRecord {
        SampleRecord {
            fwd0: IqSample::new(1000, -2000),
            rev0: IqSample::new(-3, 4),
            rev1: IqSample::new(i32::MIN, i32::MAX),
            frequency_index: index,
        }
    }
    fn burst_commands(written: &[u8]) -> Vec<u8> {
        // after the 3-byte clear, every command is [0x18, 0x30, count]
        written[3..].chunks(3).map(|c| c[2]).collect()
    }
    #[test]
    fn decodes_record_layout() {
        let mut raw = [0u8; RECORD_BYTES];
        raw[0..4].copy_from_slice(&2i32.to_le_bytes());
        raw[8..12].copy_from_slice(&1i32.to_le_bytes());
        raw[20..24].copy_from_slice(&(-7i32).to_le_bytes());
        raw[24..26].copy_from_slice(&42u16.to_le_bytes());
        raw[26..32].copy_from_slice(&[0xAA; 6]);
        let rec = SampleRecord::decode(&raw).unwrap();
        assert_eq!(rec.fwd0, IqSample::new(2, 0));
        assert_eq!(rec.rev0, IqSample::new(1, 0));
        assert_eq!(rec.rev1, IqSample::new(0, -7));
        assert_eq!(rec.frequency_index, 42);
        assert_eq!(SampleRecord::decode(&record(9).encode()).unwrap(), record(9));
    }
    #[test]
    fn rejects_partial_records() {
        assert!(decode_records(&[0u8; 40]).is_err());
        assert!(SampleRecord::decode(&[0u8; 31]).is_err());
    }
    #[test]
    fn single_burst_is_cleared_first() {
        let data: Vec<u8> = (0..3).flat_map(|i| record(i).encode()).collect();
        let mut port = ScriptedTransport::new(data.clone());
        let buffer = FifoReader::default().drain_and_read(&mut port, 3).unwrap();
        assert_eq!(buffer, data);
        assert_eq!(port.written(), &[0x20, 0x30, 0x00, 0x18, 0x30, 0x03]);
    }
    #[test]
    fn large_reads_are_split_into_bursts() {
        for n in [0usize, 1, 255, 256, 510, 600] {
            let mut port = ScriptedTransport::new(vec![0x5A; n * RECORD_BYTES]).with_max_chunk(100);
            let buffer = FifoReader::default().drain_and_read(&mut port, n).unwrap();
            assert_eq!(buffer.len(), n * RECORD_BYTES);
            let bursts = burst_commands(port.written());
            assert_eq!(bursts.len(), (n + MAX_BURST_POINTS - 1) / MAX_BURST_POINTS);
            assert_eq!(bursts.iter().map(|&c| c as usize).sum::<usize>(), n);
        }
    }
    #[test]
    fn missing_burst_bytes_time_out() {
        let mut port = ScriptedTransport::new(vec![0u8; RECORD_BYTES + 5]);
        let err = FifoReader::default().drain_and_read(&mut port, 2).unwrap_err();
        assert!(matches!(
            err,
            VnaError::Timeout { expected: 64, received: 37 }
        ));
    }
    #[test]
    fn decodes_whole_buffers() {
        let data: Vec<u8> = [record(4), record(2)].iter().flat_map(|r| r.encode()).collect();
        let records = decode_records(&data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].frequency_index, 2);
    }
}
