use log::{debug, info};
use rustfft::num_complex::Complex64;
use crate::drivers::fifo::{decode_records, FifoReader, IqSample, SampleRecord};
use crate::drivers::session::Session;
use crate::drivers::sweep::SweepPlan;
use crate::drivers::transport::Transport;
use crate::drivers::VnaError;
/// `a / b` via multiplication with the conjugate of `b`.
///
/// A zero-magnitude divisor gives `NaN + NaN·i` so a single dead point does
/// not abort a whole sweep.
pub fn complex_divide(a: IqSample, b: IqSample) -> Complex64 {
    let (a_re, a_im) = (a.re as f64, a.im as f64);
    let (b_re, b_im) = (b.re as f64, b.im as f64);
    let denom = b_re * b_re + b_im * b_im;
    if denom == 0.0 {
        return Complex64::new(f64::NAN, f64::NAN);
    }
    Complex64::new(
        (a_re * b_re + a_im * b_im) / denom,
        (a_im * b_re - a_re * b_im) / denom,
    )
}
/// One frequency point of a trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TracePoint {
    pub frequency_hz: f64,
    pub fwd0: IqSample,
    pub rev0: IqSample,
    pub rev1: IqSample,
    /// Raw reflection, `rev0 / fwd0`.
    pub s00_raw: Complex64,
    /// Raw transmission, `rev1 / fwd0`.
    pub s01_raw: Complex64,
}
impl TracePoint {
    pub fn from_record(frequency_hz: f64, record: &SampleRecord) -> Self {
        Self {
            frequency_hz,
            fwd0: record.fwd0,
            rev0: record.rev0,
            rev1: record.rev1,
            s00_raw: complex_divide(record.rev0, record.fwd0),
            s01_raw: complex_divide(record.rev1, record.fwd0),
        }
    }
}
pub fn magnitude_db(s: Complex64) -> f64 {
    20.0 * s.norm().log10()
}
pub fn phase_rad(s: Complex64) -> f64 {
    s.im.atan2(s.re)
}
/// A complete sweep, index-aligned to its frequency axis.
#[derive(Clone, Debug)]
pub struct Trace {
    pub points: Vec<TracePoint>,
    pub s00_db: Vec<f64>,
    pub s00_phase: Vec<f64>,
    pub s01_db: Vec<f64>,
    pub s01_phase: Vec<f64>,
}
impl Trace {
    /// Wraps assembled points and derives magnitude and phase over all of them.
    pub fn new(points: Vec<TracePoint>) -> Self {
        let series = |f: fn(Complex64) -> f64, s: fn(&TracePoint) -> Complex64| {
            points.iter().map(|p| f(s(p))).collect::<Vec<_>>()
        };
        let s00_db = series(magnitude_db, |p| p.s00_raw);
        let s00_phase = series(phase_rad, |p| p.s00_raw);
        let s01_db = series(magnitude_db, |p| p.s01_raw);
        let s01_phase = series(phase_rad, |p| p.s01_raw);
        Self {
            points,
            s00_db,
            s00_phase,
            s01_db,
            s01_phase,
        }
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.frequency_hz)
    }
}
/// Runs every window of `plan` on the device and stitches the results.
///
/// Any failure aborts the whole query; no partial trace is returned.
pub fn query_trace<T: Transport>(
    plan: &SweepPlan,
    session: &mut Session<T>,
) -> Result<Trace, VnaError> {
    session.ensure_connected()?;
    let values_per_point = session.values_per_point();
    let axis = plan.frequencies();
    let window = plan.points_per_window as usize;
    let mut slots: Vec<Option<TracePoint>> = vec![None; axis.len()];
    let reader = FifoReader::default();
    for segment in 0..plan.segment_count {
        let params = plan.device_parameters(segment, values_per_point)?;
        session.program_sweep(params)?;
        let records = params.points as usize * params.values_per_point as usize;
        let buffer = reader.drain_and_read(session.port_mut()?, records)?;
        let base = segment * window;
        for record in decode_records(&buffer)? {
            let Some(local) = plan.policy.local_index(record.frequency_index) else {
                continue;
            };
            let local = local as usize;
            if local >= window {
                return Err(VnaError::ProtocolViolation(format!(
                    "frequency index {} outside a window of {} points",
                    record.frequency_index, params.points
                )));
            }
            let index = base + local;
            slots[index] = Some(TracePoint::from_record(axis[index], &record));
        }
        debug!(
            "segment {}/{} at {} Hz done",
            segment + 1,
            plan.segment_count,
            params.start_hz
        );
    }
    let points = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| {
                VnaError::ProtocolViolation(format!("device never reported point {i}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "trace of {} points from {} Hz to {} Hz",
        points.len(),
        plan.window_start_hz,
        plan.actual_stop_hz()
    );
    Ok(Trace::new(points))
}
