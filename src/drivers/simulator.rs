//! Software model of the analyzer for tests and offline runs.
//!
//! The model decodes the same command stream the real device does, keeps a
//! byte-addressed register file, and fills its FIFO with sweeps of a simple
//! resonator: a notch in reflection and a peak in transmission at
//! `resonance_hz`, plus seeded noise.
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use crate::drivers::fifo::{IqSample, SampleRecord, MAX_BURST_POINTS};
use crate::drivers::protocol::{decode_value, Command, INDICATE_V2};
use crate::drivers::registers::Register;
use crate::drivers::transport::Transport;
use crate::drivers::VnaError;
/// Amplitude of the forward (incident) signal in ADC counts.
const FORWARD_AMPLITUDE: f64 = 1_000_000.0;
pub struct SimulatedVna {
    memory: [u8; 256],
    pending: Vec<u8>,
    output: VecDeque<u8>,
    fifo: VecDeque<SampleRecord>,
    commands: Vec<Command>,
    rng: StdRng,
    indicate: u8,
    rejected: Vec<u8>,
    max_chunk: usize,
    noise: i32,
    shuffle_bursts: bool,
    silent_fifo: bool,
    unplugged: bool,
    resonance_hz: f64,
    bandwidth_hz: f64,
    cable_delay_s: f64,
}
impl SimulatedVna {
    pub fn new(seed: u64) -> Self {
        let mut memory = [0u8; 256];
        memory[Register::DeviceVariant.address() as usize] = 2;
        memory[Register::ProtocolVersion.address() as usize] = 1;
        memory[Register::HardwareRevision.address() as usize] = 3;
        memory[Register::FirmwareMajor.address() as usize] = 1;
        memory[Register::FirmwareMinor.address() as usize] = 2;
        Self {
            memory,
            pending: Vec::new(),
            output: VecDeque::new(),
            fifo: VecDeque::new(),
            commands: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            indicate: INDICATE_V2,
            rejected: Vec::new(),
            max_chunk: usize::MAX,
            noise: 20,
            shuffle_bursts: false,
            silent_fifo: false,
            unplugged: false,
            resonance_hz: 500_000_000.0,
            bandwidth_hz: 5_000_000.0,
            cable_delay_s: 2.0e-9,
        }
    }
    /// Bytes waiting in the receive buffer before the host says anything.
    pub fn with_stale_output(mut self, bytes: &[u8]) -> Self {
        self.output.extend(bytes);
        self
    }
    pub fn with_indicate(mut self, byte: u8) -> Self {
        self.indicate = byte;
        self
    }
    pub fn with_firmware_major(mut self, major: u8) -> Self {
        self.memory[Register::FirmwareMajor.address() as usize] = major;
        self
    }
    /// Caps every read to exercise short-read handling.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }
    pub fn with_noise(mut self, counts: i32) -> Self {
        self.noise = counts.abs();
        self
    }
    /// Delivers the records of every burst in random order.
    pub fn with_shuffled_bursts(mut self) -> Self {
        self.shuffle_bursts = true;
        self
    }
    pub fn with_resonance(mut self, resonance_hz: f64, bandwidth_hz: f64) -> Self {
        self.resonance_hz = resonance_hz;
        self.bandwidth_hz = bandwidth_hz;
        self
    }
    /// Stops answering burst reads, as a wedged device would.
    pub fn silence_fifo(&mut self) {
        self.silent_fifo = true;
    }
    /// Ignores future writes to `address`, so read-back shows the old value.
    pub fn reject_writes_to(&mut self, address: u8) {
        self.rejected.push(address);
    }
    /// Makes every further transfer fail.
    pub fn unplug(&mut self) {
        self.unplugged = true;
    }
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
    pub fn usb_mode_exited(&self) -> bool {
        self.memory[Register::SampleMode.address() as usize] == 2
    }
    fn register(&self, reg: Register, width: usize) -> u64 {
        let at = reg.address() as usize;
        decode_value(&self.memory[at..at + width]).unwrap_or(0)
    }
    /// Reflection and transmission of the simulated resonator at `freq_hz`.
    pub fn response(&self, freq_hz: f64) -> ((f64, f64), (f64, f64)) {
        // s21 = 1 / (1 + jx), s11 = jx / (1 + jx)
        let x = (freq_hz - self.resonance_hz) / self.bandwidth_hz;
        let d = 1.0 + x * x;
        let s21 = (1.0 / d, -x / d);
        let s11 = (x * x / d, x / d);
        (s11, s21)
    }
    fn record_for(&mut self, freq_hz: f64, index: u16) -> SampleRecord {
        let phase = 2.0 * PI * freq_hz * self.cable_delay_s;
        let fwd = (FORWARD_AMPLITUDE * phase.cos(), FORWARD_AMPLITUDE * phase.sin());
        let (s11, s21) = self.response(freq_hz);
        let mul = |s: (f64, f64)| (s.0 * fwd.0 - s.1 * fwd.1, s.0 * fwd.1 + s.1 * fwd.0);
        let (rev0, rev1) = (mul(s11), mul(s21));
        SampleRecord {
            fwd0: self.quantize(fwd),
            rev0: self.quantize(rev0),
            rev1: self.quantize(rev1),
            frequency_index: index,
        }
    }
    fn quantize(&mut self, value: (f64, f64)) -> IqSample {
        let noise = self.noise;
        let mut jitter = || self.rng.gen_range(-noise..=noise);
        IqSample::new(
            value.0.round() as i32 + jitter(),
            value.1.round() as i32 + jitter(),
        )
    }
    fn restart_sweep(&mut self) {
        let start = self.register(Register::SweepStartHz, 8) as f64;
        let step = self.register(Register::SweepStepHz, 8) as f64;
        let points = self.register(Register::SweepPoints, 2) as u16;
        let per_point = self.register(Register::ValuesPerFrequency, 2).max(1);
        self.fifo.clear();
        for index in 0..points {
            let freq = start + index as f64 * step;
            for _ in 0..per_point {
                let record = self.record_for(freq, index);
                self.fifo.push_back(record);
            }
        }
        debug!("simulated sweep of {points} points from {start} Hz");
    }
    fn execute(&mut self, command: Command) {
        self.commands.push(command);
        match command {
            Command::Nop => {}
            Command::Indicate => self.output.push_back(self.indicate),
            Command::Read { address, width } => {
                let at = address as usize;
                for offset in 0..width {
                    self.output
                        .push_back(self.memory.get(at + offset).copied().unwrap_or(0));
                }
            }
            Command::Write {
                address,
                width,
                value,
            } => {
                if address == Register::ValuesFifo.address() {
                    self.restart_sweep();
                    return;
                }
                if self.rejected.contains(&address) {
                    return;
                }
                let at = address as usize;
                let bytes = value.to_le_bytes();
                for (offset, byte) in bytes.iter().take(width).enumerate() {
                    if let Some(slot) = self.memory.get_mut(at + offset) {
                        *slot = *byte;
                    }
                }
            }
            Command::ReadFifo { count, .. } => {
                if self.silent_fifo {
                    return;
                }
                let count = (count as usize).min(MAX_BURST_POINTS);
                let mut burst = Vec::with_capacity(count);
                for _ in 0..count {
                    if self.fifo.is_empty() {
                        self.restart_sweep();
                    }
                    match self.fifo.pop_front() {
                        Some(record) => burst.push(record),
                        None => break,
                    }
                }
                if self.shuffle_bursts {
                    burst.shuffle(&mut self.rng);
                }
                for record in burst {
                    self.output.extend(record.encode());
                }
            }
        }
    }
}
impl Transport for SimulatedVna {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, VnaError> {
        if self.unplugged {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged").into());
        }
        let n = buf.len().min(self.max_chunk).min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), VnaError> {
        if self.unplugged {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged").into());
        }
        self.pending.extend_from_slice(bytes);
        while let Some((command, used)) = Command::decode(&self.pending)? {
            self.pending.drain(..used);
            self.execute(command);
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::registers::{read_register, write_register};
    #[test]
    fn register_file_round_trips() {
        let mut sim = SimulatedVna::new(1);
        write_register(&mut sim, 0x00, 3_999_999_999).unwrap();
        write_register(&mut sim, 0x20, 1024).unwrap();
        assert_eq!(read_register(&mut sim, 0x00).unwrap(), 3_999_999_999);
        assert_eq!(read_register(&mut sim, 0x20).unwrap(), 1024);
    }
    #[test]
    fn resonator_shape() {
        let sim = SimulatedVna::new(1).with_resonance(100e6, 1e6);
        let (s11, s21) = sim.response(100e6);
        assert!(s11.0.abs() < 1e-12 && s11.1.abs() < 1e-12);
        assert!((s21.0 - 1.0).abs() < 1e-12);
        let (far11, far21) = sim.response(200e6);
        assert!(far11.0 > 0.99);
        assert!(far21.0 < 0.01);
    }
    #[test]
    fn fifo_clear_restarts_the_sweep() {
        let mut sim = SimulatedVna::new(1).with_noise(0);
        write_register(&mut sim, 0x00, 1_000_000).unwrap();
        write_register(&mut sim, 0x10, 1_000).unwrap();
        write_register(&mut sim, 0x20, 3).unwrap();
        write_register(&mut sim, 0x22, 2).unwrap();
        sim.write_all(&[0x20, 0x30, 0x00]).unwrap();
        assert_eq!(sim.fifo.len(), 6);
        let indices: Vec<u16> = sim.fifo.iter().map(|r| r.frequency_index).collect();
        assert_eq!(indices, vec![0, 0, 1, 1, 2, 2]);
    }
}
