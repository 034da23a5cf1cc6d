// src/config.rs
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use crate::drivers::sweep;
/// Where the fetch utility gets its data from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Hardware,
    Simulation,
}
/// Settings of the command-line fetch utility, read from a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub port: String,
    pub mode: ConnectionMode,
    pub timeout_secs: f64,
    pub start_hz: f64,
    pub stop_hz: f64,
    pub step_hz: f64,
    pub samples_per_point: u16,
    pub discard_first_point: bool,
    pub s00: bool,
    pub s01: bool,
    pub phases: bool,
}
impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_owned(),
            mode: ConnectionMode::Hardware,
            timeout_secs: 15.0,
            start_hz: 50e6,
            stop_hz: 1e9,
            step_hz: 1e6,
            samples_per_point: 1,
            discard_first_point: false,
            s00: true,
            s01: true,
            phases: false,
        }
    }
}
impl FetchConfig {
    pub const MIN_HZ: f64 = 50e6;
    pub const MAX_HZ: f64 = 4e9;
    pub const MIN_STEP_HZ: f64 = 1e3;
    pub const MAX_STEP_HZ: f64 = 10e6;
    /// Parses a JSON settings file. Fields left out keep their defaults.
    /// Nothing is validated yet, so command-line overrides can still apply.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.001))
    }
    pub fn validate(&self) -> Result<()> {
        let in_band = |f: f64| (Self::MIN_HZ..=Self::MAX_HZ).contains(&f);
        if !in_band(self.start_hz) || !in_band(self.stop_hz) {
            bail!(
                "start {} Hz or end {} Hz is outside the supported 50 MHz to 4 GHz",
                self.start_hz,
                self.stop_hz
            );
        }
        if self.start_hz >= self.stop_hz {
            bail!("start frequency has to be below the end frequency");
        }
        if !(Self::MIN_STEP_HZ..=Self::MAX_STEP_HZ).contains(&self.step_hz) {
            bail!("step size has to be between 1 kHz and 10 MHz");
        }
        if !self.s00 && !self.s01 {
            bail!("select at least one of s00 or s01");
        }
        if self.samples_per_point == 0 {
            bail!("samples per point must be positive");
        }
        sweep::plan(self.start_hz, self.stop_hz, self.step_hz, self.discard_first_point)
            .context("requested range cannot be swept")?;
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn missing_fields_take_defaults() {
        let config: FetchConfig =
            serde_json::from_str(r#"{"port": "/dev/ttyU0", "mode": "simulation", "step_hz": 1e5}"#)
                .unwrap();
        assert_eq!(config.port, "/dev/ttyU0");
        assert_eq!(config.mode, ConnectionMode::Simulation);
        assert_eq!(config.step_hz, 1e5);
        assert_eq!(config.start_hz, 50e6);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn rejects_bad_ranges() {
        let base = FetchConfig::default();
        assert!(base.validate().is_ok());
        assert!(FetchConfig { start_hz: 10e6, ..base.clone() }.validate().is_err());
        assert!(FetchConfig { stop_hz: 5e9, ..base.clone() }.validate().is_err());
        assert!(FetchConfig { start_hz: 100e6, stop_hz: 100e6, ..base.clone() }.validate().is_err());
        assert!(FetchConfig { step_hz: 20e6, ..base.clone() }.validate().is_err());
        assert!(FetchConfig { s00: false, s01: false, ..base.clone() }.validate().is_err());
        assert!(FetchConfig { step_hz: 1_500.5, ..base }.validate().is_err());
    }
    #[test]
    fn range_must_survive_window_rounding() {
        let near_ceiling = FetchConfig {
            start_hz: 3e9,
            stop_hz: 3.95e9,
            step_hz: 1e6,
            ..FetchConfig::default()
        };
        assert!(near_ceiling.validate().is_err());
        assert!(FetchConfig { stop_hz: 3.9e9, ..near_ceiling }.validate().is_ok());
    }
}
