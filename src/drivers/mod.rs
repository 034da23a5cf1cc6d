// src/drivers/mod.rs
pub mod error;
pub mod fifo;
pub mod protocol;
pub mod registers;
pub mod session;
pub mod simulator;
pub mod sweep;
pub mod trace;
pub mod transport;
pub use error::VnaError;
pub use fifo::{FifoReader, IqSample, SampleRecord};
pub use registers::{read_register, write_register, Register, RegisterDescriptor, RegisterWidth};
pub use session::{DeviceIdentity, Session};
pub use simulator::SimulatedVna;
pub use sweep::{plan, FirstPointPolicy, SweepParameters, SweepPlan};
pub use trace::{complex_divide, query_trace, Trace, TracePoint};
pub use transport::{ScriptedTransport, SerialTransport, Transport};
