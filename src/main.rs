// src/main.rs
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use nanovna_link::config::{ConnectionMode, FetchConfig};
use nanovna_link::drivers::{SerialTransport, Session, SimulatedVna, Trace, Transport};
/// NanoVNA V2 USB fetching utility. Prints one sweep as CSV on stdout.
#[derive(Parser, Debug)]
#[command(name = "nanovna-fetch", about = "Fetch a raw S-parameter sweep from a NanoVNA V2")]
struct Cli {
    /// JSON settings file. Flags given here override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial port of the analyzer.
    #[arg(long)]
    port: Option<String>,
    /// Talk to the built-in simulated analyzer instead of a serial port.
    #[arg(long)]
    simulate: bool,
    /// Log every register access.
    #[arg(long)]
    debug: bool,
    /// Output S00 (reflection).
    #[arg(long)]
    s00: bool,
    /// Output S01 (transmission).
    #[arg(long)]
    s01: bool,
    /// Output phases for every selected channel.
    #[arg(long)]
    phases: bool,
    /// Start frequency in Hz.
    #[arg(long)]
    start: Option<f64>,
    /// End frequency in Hz.
    #[arg(long)]
    end: Option<f64>,
    /// Step size in Hz.
    #[arg(long)]
    step: Option<f64>,
    #[arg(long)]
    samples_per_point: Option<u16>,
    /// Sweep one extra point per window and drop it.
    #[arg(long)]
    discard_first_point: bool,
}
impl Cli {
    /// Layers the flags over `base` and checks the result.
    fn into_config(self, base: FetchConfig) -> Result<FetchConfig> {
        let mut config = base;
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.simulate {
            config.mode = ConnectionMode::Simulation;
        }
        // channel flags replace the configured selection only when given
        if self.s00 || self.s01 {
            config.s00 = self.s00;
            config.s01 = self.s01;
        }
        config.phases |= self.phases;
        config.discard_first_point |= self.discard_first_point;
        if let Some(start) = self.start {
            config.start_hz = start;
        }
        if let Some(end) = self.end {
            config.stop_hz = end;
        }
        if let Some(step) = self.step {
            config.step_hz = step;
        }
        if let Some(samples) = self.samples_per_point {
            config.samples_per_point = samples;
        }
        config.validate()?;
        Ok(config)
    }
}
fn open_transport(config: &FetchConfig) -> Result<Box<dyn Transport>> {
    match config.mode {
        ConnectionMode::Simulation => Ok(Box::new(SimulatedVna::new(0x5EED))),
        ConnectionMode::Hardware => {
            let port = SerialTransport::open(&config.port, config.timeout())
                .with_context(|| format!("failed to open {}", config.port))?;
            Ok(Box::new(port))
        }
    }
}
fn print_trace(config: &FetchConfig, trace: &Trace) {
    let mut header = vec!["freq_mhz"];
    if config.s00 {
        header.push("s00_db");
        if config.phases {
            header.push("s00_phase");
        }
    }
    if config.s01 {
        header.push("s01_db");
        if config.phases {
            header.push("s01_phase");
        }
    }
    println!("{}", header.join(","));
    for (i, point) in trace.points.iter().enumerate() {
        let mut row = vec![format!("{:.6}", point.frequency_hz / 1e6)];
        if config.s00 {
            row.push(format!("{:.3}", trace.s00_db[i]));
            if config.phases {
                row.push(format!("{:.4}", trace.s00_phase[i]));
            }
        }
        if config.s01 {
            row.push(format!("{:.3}", trace.s01_db[i]));
            if config.phases {
                row.push(format!("{:.4}", trace.s01_phase[i]));
            }
        }
        println!("{}", row.join(","));
    }
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    let base = match &cli.config {
        Some(path) => FetchConfig::load(path)?,
        None => FetchConfig::default(),
    };
    let config = cli.into_config(base)?;
    debug!("configuration: {config:?}");
    let transport = open_transport(&config)?;
    let mut session = Session::new(transport).with_discard_first_point(config.discard_first_point);
    let identity = session.bring_up().context("device bring-up failed")?;
    info!(
        "{} firmware {}.{}",
        identity.title(),
        identity.firmware_major,
        identity.firmware_minor
    );
    if config.samples_per_point != 1 {
        session.set_samples_per_point(config.samples_per_point)?;
    }
    let plan = session.set_sweep_range(config.start_hz, config.stop_hz, config.step_hz)?;
    info!(
        "querying {} points in {} segments",
        plan.total_points(),
        plan.segment_count
    );
    let trace = session.query_trace().context("trace query failed")?;
    print_trace(&config, &trace);
    session.close();
    Ok(())
}
#[cfg(test)]
mod tests {
    use super::*;
    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nanovna-fetch").chain(args.iter().copied())).unwrap()
    }
    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--port", "/dev/ttyU0", "--s01", "--phases", "--start", "100e6", "--end", "200e6",
            "--step", "1e5",
        ])
        .into_config(FetchConfig::default())
        .unwrap();
        assert_eq!(config.port, "/dev/ttyU0");
        assert!(!config.s00 && config.s01 && config.phases);
        assert_eq!(config.start_hz, 100e6);
        assert_eq!(config.stop_hz, 200e6);
        assert_eq!(config.step_hz, 1e5);
        assert_eq!(config.mode, ConnectionMode::Hardware);
    }
    #[test]
    fn channel_selection_from_file_survives_without_flags() {
        let base = FetchConfig {
            s00: false,
            ..FetchConfig::default()
        };
        let config = parse(&["--simulate"]).into_config(base).unwrap();
        assert!(!config.s00 && config.s01);
        assert_eq!(config.mode, ConnectionMode::Simulation);
    }
    #[test]
    fn out_of_range_flags_are_rejected() {
        assert!(parse(&["--start", "10e6"]).into_config(FetchConfig::default()).is_err());
        assert!(parse(&["--step", "20e6"]).into_config(FetchConfig::default()).is_err());
        assert!(Cli::try_parse_from(["nanovna-fetch", "--start", "fast"]).is_err());
    }
}
