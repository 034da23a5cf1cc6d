//! Host-side driver for NanoVNA V2 class vector network analyzers.
//!
//! [`drivers::Session`] owns the serial link, runs the bring-up handshake and
//! returns raw (uncalibrated) S-parameter traces stitched from as many device
//! sweep windows as the requested range needs.
pub mod config;
pub mod drivers;
pub use drivers::{Session, Trace, VnaError};
