use log::{debug, info, warn};
use crate::drivers::protocol::{Command, INDICATE_V2};
use crate::drivers::registers::{read_register, write_register, Register};
use crate::drivers::sweep::{self, FirstPointPolicy, SweepParameters, SweepPlan, WINDOW_POINTS};
use crate::drivers::trace::{self, Trace};
use crate::drivers::transport::{read_exact, Transport};
use crate::drivers::VnaError;
/// No-op bytes sent to terminate whatever command the device may be halfway through.
pub const FLUSH_NOPS: usize = 64;
/// Firmware major version reported while the bootloader is running.
pub const DFU_FIRMWARE_MAJOR: u64 = 0xFF;
/// Value of `sampleMode` that makes the device leave USB data mode.
pub const SAMPLE_MODE_EXIT_USB: u64 = 2;
pub const DEFAULT_START_HZ: u64 = 500_000_000;
pub const DEFAULT_STEP_HZ: u64 = 1_000_000;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub variant: u8,
    pub protocol_version: u8,
    pub hardware_revision: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
}
impl DeviceIdentity {
    pub fn title(&self) -> &'static str {
        "NanoVNA V2"
    }
    pub fn firmware(&self) -> (u8, u8) {
        (self.firmware_major, self.firmware_minor)
    }
}
/// A connection to one analyzer.
///
/// Creating a session does no I/O; [`Session::bring_up`] performs the
/// handshake. Every other operation fails with [`VnaError::NotConnected`]
/// until bring-up has succeeded.
pub struct Session<T: Transport> {
    port: Option<T>,
    identity: Option<DeviceIdentity>,
    sweep: Option<SweepParameters>,
    active_plan: Option<SweepPlan>,
    policy: FirstPointPolicy,
}
impl<T: Transport> Session<T> {
    pub fn new(port: T) -> Self {
        Self {
            port: Some(port),
            identity: None,
            sweep: None,
            active_plan: None,
            policy: FirstPointPolicy::default(),
        }
    }
    /// Creates the session and runs the bring-up handshake.
    pub fn open(port: T) -> Result<Self, VnaError> {
        let mut session = Self::new(port);
        session.bring_up()?;
        Ok(session)
    }
    pub fn with_discard_first_point(mut self, discard: bool) -> Self {
        self.policy = FirstPointPolicy::new(discard);
        self
    }
    /// Flushes the link, checks the protocol version, reads the identity
    /// registers and programs a default sweep window.
    pub fn bring_up(&mut self) -> Result<DeviceIdentity, VnaError> {
        let port = self.port.as_mut().ok_or(VnaError::NotConnected)?;
        let nop = Command::Nop.encode()?;
        for _ in 0..FLUSH_NOPS {
            port.write_all(&nop)?;
        }
        let mut byte = [0u8; 1];
        let mut stale = 0usize;
        while port.read(&mut byte)? > 0 {
            stale += 1;
        }
        if stale > 0 {
            debug!("discarded {stale} stale bytes");
        }
        port.write_all(&Command::Indicate.encode()?)?;
        let indicated = read_exact(port, 1)?[0];
        if indicated != INDICATE_V2 {
            return Err(VnaError::ProtocolViolation(format!(
                "expected protocol version 2 (0x{INDICATE_V2:02X}), device indicated 0x{indicated:02X}"
            )));
        }
        let firmware_major = read_register(port, Register::FirmwareMajor.address())?;
        if firmware_major == DFU_FIRMWARE_MAJOR {
            return Err(VnaError::DeviceInBootloaderMode);
        }
        let identity = DeviceIdentity {
            variant: read_register(port, Register::DeviceVariant.address())? as u8,
            protocol_version: read_register(port, Register::ProtocolVersion.address())? as u8,
            hardware_revision: read_register(port, Register::HardwareRevision.address())? as u8,
            firmware_major: firmware_major as u8,
            firmware_minor: read_register(port, Register::FirmwareMinor.address())? as u8,
        };
        info!(
            "connected to {} variant {} protocol {} hw rev {} firmware {}.{}",
            identity.title(),
            identity.variant,
            identity.protocol_version,
            identity.hardware_revision,
            identity.firmware_major,
            identity.firmware_minor
        );
        self.identity = Some(identity);
        let plan = SweepPlan::single_window(
            DEFAULT_START_HZ,
            DEFAULT_STEP_HZ,
            self.policy.usable_points(WINDOW_POINTS),
            self.policy,
        );
        let outcome = plan
            .device_parameters(0, 1)
            .and_then(|params| self.program_sweep(params));
        if let Err(err) = outcome {
            self.identity = None;
            return Err(err);
        }
        self.active_plan = Some(plan);
        Ok(identity)
    }
    pub(crate) fn ensure_connected(&self) -> Result<(), VnaError> {
        match (&self.port, &self.identity) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(VnaError::NotConnected),
        }
    }
    /// The underlying transport.
    pub fn port_mut(&mut self) -> Result<&mut T, VnaError> {
        self.port.as_mut().ok_or(VnaError::NotConnected)
    }
    pub fn identity(&self) -> Result<&DeviceIdentity, VnaError> {
        self.ensure_connected()?;
        self.identity.as_ref().ok_or(VnaError::NotConnected)
    }
    /// Sweep parameters last confirmed by the device.
    pub fn sweep(&self) -> Option<SweepParameters> {
        self.sweep
    }
    pub fn active_plan(&self) -> Option<&SweepPlan> {
        self.active_plan.as_ref()
    }
    pub fn values_per_point(&self) -> u16 {
        self.sweep.map(|s| s.values_per_point).unwrap_or(1)
    }
    pub fn discard_first_point(&self) -> bool {
        self.policy.discards()
    }
    /// Applies to sweeps configured after this call.
    pub fn set_discard_first_point(&mut self, discard: bool) {
        self.policy = FirstPointPolicy::new(discard);
    }
    /// Writes device-level sweep parameters and reads them back.
    ///
    /// On a mismatch the recorded parameters are left untouched.
    pub fn program_sweep(&mut self, params: SweepParameters) -> Result<(), VnaError> {
        self.ensure_connected()?;
        params.validate()?;
        let port = self.port_mut()?;
        let fields = [
            (Register::SweepStartHz, params.start_hz),
            (Register::SweepStepHz, params.step_hz),
            (Register::SweepPoints, params.points as u64),
            (Register::ValuesPerFrequency, params.values_per_point as u64),
        ];
        for (reg, value) in fields {
            write_register(port, reg.address(), value)?;
        }
        for (reg, written) in fields {
            let read = read_register(port, reg.address())?;
            if read != written {
                warn!("{} read back as {read}, wrote {written}", reg.mnemonic());
                return Err(VnaError::ParameterRejected {
                    register: reg.mnemonic(),
                    written,
                    read,
                });
            }
        }
        info!(
            "sweep {} Hz + n * {} Hz, {} points, {} values per point",
            params.start_hz, params.step_hz, params.points, params.values_per_point
        );
        self.sweep = Some(params);
        Ok(())
    }
    /// Configures a range sweep that may span several device windows.
    ///
    /// Only the plan is stored; windows are programmed by [`Session::query_trace`].
    pub fn set_sweep_range(
        &mut self,
        start_hz: f64,
        stop_hz: f64,
        step_hz: f64,
    ) -> Result<SweepPlan, VnaError> {
        self.ensure_connected()?;
        let plan = sweep::plan(start_hz, stop_hz, step_hz, self.policy.discards())?;
        info!(
            "planned {} segments of {} points up to {} Hz",
            plan.segment_count,
            plan.points_per_window,
            plan.actual_stop_hz()
        );
        self.active_plan = Some(plan);
        Ok(plan)
    }
    /// Programs a single window of `count` points starting at `start_hz`.
    pub fn set_sweep_start_step_count(
        &mut self,
        start_hz: f64,
        step_hz: f64,
        count: u16,
    ) -> Result<SweepPlan, VnaError> {
        self.ensure_connected()?;
        let start = sweep::whole_hz("start", start_hz)?;
        let step = sweep::whole_hz("step", step_hz)?;
        if count == 0 {
            return Err(VnaError::InvalidParameter("point count must be positive".into()));
        }
        let plan = SweepPlan::single_window(start, step, count, self.policy);
        let params = plan.device_parameters(0, self.values_per_point())?;
        self.program_sweep(params)?;
        self.active_plan = Some(plan);
        Ok(plan)
    }
    /// Programs a single window of `count` points spread from `start_hz` to
    /// `stop_hz`. The step is rounded down to whole hertz.
    pub fn set_sweep_start_stop_count(
        &mut self,
        start_hz: f64,
        stop_hz: f64,
        count: u16,
    ) -> Result<SweepPlan, VnaError> {
        self.ensure_connected()?;
        let start = sweep::whole_hz("start", start_hz)?;
        let stop = sweep::whole_hz("stop", stop_hz)?;
        if count < 2 || stop <= start {
            return Err(VnaError::InvalidParameter(format!(
                "need at least two points and stop above start, got {count} points {start}..{stop} Hz"
            )));
        }
        let step = (stop - start) / (count as u64 - 1);
        self.set_sweep_start_step_count(start as f64, step as f64, count)
    }
    /// Changes how many values the device reports per frequency point.
    pub fn set_samples_per_point(&mut self, samples: u16) -> Result<(), VnaError> {
        self.ensure_connected()?;
        if samples == 0 {
            return Err(VnaError::InvalidParameter(
                "samples per point must be positive".into(),
            ));
        }
        let current = self.sweep.ok_or(VnaError::NotConnected)?;
        self.program_sweep(SweepParameters {
            values_per_point: samples,
            ..current
        })
    }
    /// Sweeps the active plan and returns the assembled trace.
    pub fn query_trace(&mut self) -> Result<Trace, VnaError> {
        self.ensure_connected()?;
        let plan = self
            .active_plan
            .ok_or_else(|| VnaError::InvalidParameter("no sweep configured".into()))?;
        trace::query_trace(&plan, self)
    }
    /// Drops the transport without talking to the device.
    pub fn disconnect(&mut self) -> Option<T> {
        self.identity = None;
        self.sweep = None;
        self.active_plan = None;
        self.port.take()
    }
    /// Leaves USB data mode and releases the transport. Never fails.
    pub fn close(mut self) {
        self.leave_usb_mode();
        self.disconnect();
    }
    fn leave_usb_mode(&mut self) {
        if self.identity.is_none() {
            return;
        }
        if let Some(port) = self.port.as_mut() {
            if let Err(err) =
                write_register(port, Register::SampleMode.address(), SAMPLE_MODE_EXIT_USB)
            {
                warn!("ignoring error while leaving USB data mode: {err}");
            }
        }
    }
}
impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.leave_usb_mode();
    }
}
