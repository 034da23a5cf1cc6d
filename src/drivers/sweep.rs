//! Sweep parameters and multi-window sweep planning.
//!
//! The device sweeps at most one window of [`WINDOW_POINTS`] points per
//! request, so longer ranges are cut into segments that are programmed and
//! drained one after another.
use crate::drivers::VnaError;
pub const WINDOW_POINTS: u16 = 101;
pub const MIN_FREQUENCY_HZ: u64 = 50_000;
/// Highest start frequency accepted when planning a range sweep.
pub const MAX_RANGE_START_HZ: u64 = 3_000_000_000;
/// Highest frequency the device can be programmed to directly.
pub const MAX_FREQUENCY_HZ: u64 = 4_000_000_000;
/// Handles the synthesizer settling quirk.
///
/// When enabled, every window asks the device for one extra point that starts
/// one step early, and that first point is thrown away. All the index and
/// frequency shifting this needs is kept here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirstPointPolicy {
    discard: bool,
}
impl FirstPointPolicy {
    pub fn new(discard: bool) -> Self {
        Self { discard }
    }
    pub fn discards(&self) -> bool {
        self.discard
    }
    fn lead_in(&self) -> u16 {
        self.discard as u16
    }
    /// Points per window that end up in the trace.
    pub fn usable_points(&self, device_points: u16) -> u16 {
        device_points - self.lead_in()
    }
    /// Points the device must sweep to deliver `usable` fresh ones.
    pub fn device_points(&self, usable: u16) -> Result<u16, VnaError> {
        usable.checked_add(self.lead_in()).ok_or_else(|| {
            VnaError::InvalidParameter(format!("{usable} points per window is too many"))
        })
    }
    /// Frequency the device window must start at so its first usable point
    /// lands on `start_hz`.
    pub fn device_start(&self, start_hz: u64, step_hz: u64) -> u64 {
        if self.discard {
            start_hz.saturating_sub(step_hz)
        } else {
            start_hz
        }
    }
    /// Maps a device frequency index to a trace-local index, or `None` for
    /// the settling point.
    pub fn local_index(&self, device_index: u16) -> Option<u16> {
        device_index.checked_sub(self.lead_in())
    }
}
/// Parameters as programmed into (and read back from) the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepParameters {
    pub start_hz: u64,
    pub step_hz: u64,
    pub points: u16,
    pub values_per_point: u16,
}
impl SweepParameters {
    pub fn end_hz(&self) -> u64 {
        self.start_hz + self.step_hz * (self.points.max(1) as u64 - 1)
    }
    /// Checks the range against what the device can sweep.
    pub fn validate(&self) -> Result<(), VnaError> {
        if self.start_hz == 0 || self.step_hz == 0 || self.points == 0 || self.values_per_point == 0
        {
            return Err(VnaError::InvalidParameter(
                "sweep start, step, points and values per point must all be positive".into(),
            ));
        }
        let end_hz = self
            .step_hz
            .checked_mul(self.points as u64 - 1)
            .and_then(|span| span.checked_add(self.start_hz))
            .ok_or_else(|| VnaError::InvalidParameter("sweep end frequency overflows".into()))?;
        if self.start_hz < MIN_FREQUENCY_HZ {
            return Err(VnaError::InvalidParameter(format!(
                "sweep start {} Hz is below {MIN_FREQUENCY_HZ} Hz",
                self.start_hz
            )));
        }
        if end_hz > MAX_FREQUENCY_HZ {
            return Err(VnaError::InvalidParameter(format!(
                "sweep end {end_hz} Hz is above {MAX_FREQUENCY_HZ} Hz"
            )));
        }
        Ok(())
    }
}
/// A sweep split into equally sized windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    pub window_start_hz: u64,
    pub step_hz: u64,
    /// Usable (retained) points per window.
    pub points_per_window: u16,
    pub segment_count: usize,
    pub policy: FirstPointPolicy,
}
impl SweepPlan {
    /// One window programmed directly, as the start/step/count setters do.
    pub fn single_window(start_hz: u64, step_hz: u64, points: u16, policy: FirstPointPolicy) -> Self {
        Self {
            window_start_hz: start_hz,
            step_hz,
            points_per_window: points,
            segment_count: 1,
            policy,
        }
    }
    pub fn total_points(&self) -> usize {
        self.points_per_window as usize * self.segment_count
    }
    /// Exclusive end of the planned range. Can lie past the requested stop.
    /// Saturates for plans that never passed [`plan`].
    pub fn actual_stop_hz(&self) -> u64 {
        self.step_hz
            .saturating_mul(self.total_points() as u64)
            .saturating_add(self.window_start_hz)
    }
    /// First retained frequency of `segment`.
    pub fn segment_start_hz(&self, segment: usize) -> Result<u64, VnaError> {
        (self.points_per_window as u64)
            .checked_mul(segment as u64)
            .and_then(|points| points.checked_mul(self.step_hz))
            .and_then(|offset| offset.checked_add(self.window_start_hz))
            .ok_or_else(|| {
                VnaError::InvalidParameter(format!("start of segment {segment} overflows"))
            })
    }
    /// Device parameters for `segment`, with the settling shift applied.
    pub fn device_parameters(
        &self,
        segment: usize,
        values_per_point: u16,
    ) -> Result<SweepParameters, VnaError> {
        let params = SweepParameters {
            start_hz: self
                .policy
                .device_start(self.segment_start_hz(segment)?, self.step_hz),
            step_hz: self.step_hz,
            points: self.policy.device_points(self.points_per_window)?,
            values_per_point,
        };
        params.validate()?;
        Ok(params)
    }
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.total_points() as u64)
            .map(|i| (self.window_start_hz + i * self.step_hz) as f64)
            .collect()
    }
}
/// Converts a caller-supplied frequency to whole hertz.
pub fn whole_hz(name: &str, value: f64) -> Result<u64, VnaError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(VnaError::InvalidParameter(format!(
            "{name} must be a positive number of Hz, got {value}"
        )));
    }
    if value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(VnaError::InvalidParameter(format!(
            "{name} must be a whole number of Hz, got {value}"
        )));
    }
    Ok(value as u64)
}
/// Plans a range sweep from `start_hz` up to at least `stop_hz`.
///
/// The range is rounded up to whole windows, and every window of the
/// rounded-up range has to fit below [`MAX_FREQUENCY_HZ`]. A stop close to
/// the ceiling can therefore be rejected even though it is in range itself.
pub fn plan(
    start_hz: f64,
    stop_hz: f64,
    step_hz: f64,
    discard_first_point: bool,
) -> Result<SweepPlan, VnaError> {
    let start = whole_hz("start", start_hz)?;
    let stop = whole_hz("stop", stop_hz)?;
    let step = whole_hz("step", step_hz)?;
    if start < MIN_FREQUENCY_HZ {
        return Err(VnaError::InvalidParameter(format!(
            "start {start} Hz is below {MIN_FREQUENCY_HZ} Hz"
        )));
    }
    if start > MAX_RANGE_START_HZ {
        return Err(VnaError::InvalidParameter(format!(
            "start {start} Hz is above {MAX_RANGE_START_HZ} Hz"
        )));
    }
    if stop <= start {
        return Err(VnaError::InvalidParameter(format!(
            "stop {stop} Hz must be above start {start} Hz"
        )));
    }
    let policy = FirstPointPolicy::new(discard_first_point);
    let usable = policy.usable_points(WINDOW_POINTS);
    let requested = (stop - start).div_ceil(step);
    let segment_count = requested.div_ceil(usable as u64).max(1) as usize;
    let plan = SweepPlan {
        window_start_hz: start,
        step_hz: step,
        points_per_window: usable,
        segment_count,
        policy,
    };
    // first and last window bound every window in between
    plan.device_parameters(0, 1)?;
    plan.device_parameters(segment_count - 1, 1)?;
    Ok(plan)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn policy_shifts_only_when_discarding() {
        let keep = FirstPointPolicy::new(false);
        let drop = FirstPointPolicy::new(true);
        assert_eq!(keep.usable_points(WINDOW_POINTS), 101);
        assert_eq!(drop.usable_points(WINDOW_POINTS), 100);
        assert_eq!(drop.device_points(100).unwrap(), 101);
        assert_eq!(keep.device_start(1_000_000, 1_000), 1_000_000);
        assert_eq!(drop.device_start(1_000_000, 1_000), 999_000);
        assert_eq!(keep.local_index(0), Some(0));
        assert_eq!(drop.local_index(0), None);
        assert_eq!(drop.local_index(5), Some(4));
    }
    #[test]
    fn one_window_range() {
        let plan = plan(100_000_000.0, 100_101_000.0, 1_000.0, false).unwrap();
        assert_eq!(plan.segment_count, 1);
        assert_eq!(plan.total_points(), 101);
        let axis = plan.frequencies();
        assert_eq!(axis.len(), 101);
        for (i, f) in axis.iter().enumerate() {
            assert_eq!(*f, 100_000_000.0 + i as f64 * 1_000.0);
        }
        assert_eq!(*axis.last().unwrap(), 100_100_000.0);
        assert_eq!(plan.actual_stop_hz(), 100_101_000);
    }
    #[test]
    fn segment_count_is_ceiling() {
        for discard in [false, true] {
            let usable = if discard { 100 } else { 101 };
            for requested in [1u64, 99, 100, 101, 102, 250, 1000] {
                let start = 10_000_000u64;
                let step = 10_000u64;
                let p = plan(
                    start as f64,
                    (start + requested * step) as f64,
                    step as f64,
                    discard,
                )
                .unwrap();
                assert_eq!(p.points_per_window, usable);
                assert_eq!(p.segment_count as u64, (requested + usable as u64 - 1) / usable as u64);
                assert!(p.segment_count >= 1);
                assert!(p.actual_stop_hz() >= start + requested * step);
            }
        }
    }
    #[test]
    fn discard_mode_windows_overlap_by_one_step() {
        let p = plan(1_000_000.0, 3_000_000.0, 10_000.0, true).unwrap();
        assert_eq!(p.segment_count, 2);
        let first = p.device_parameters(0, 1).unwrap();
        let second = p.device_parameters(1, 1).unwrap();
        assert_eq!(first.start_hz, 990_000);
        assert_eq!(first.points, 101);
        assert_eq!(first.end_hz(), 1_990_000);
        assert_eq!(second.start_hz, first.end_hz());
        let axis = p.frequencies();
        assert_eq!(axis.len(), 200);
        assert_eq!(axis[100], 2_000_000.0);
    }
    #[test]
    fn rejects_out_of_range_requests() {
        assert!(plan(40_000.0, 1_000_000.0, 1_000.0, false).is_err());
        assert!(plan(3_100_000_000.0, 3_200_000_000.0, 1_000.0, false).is_err());
        assert!(plan(1_000_000.0, 1_000_000.0, 1_000.0, false).is_err());
        assert!(plan(1_000_000.0, 2_000_000.0, 0.0, false).is_err());
        assert!(plan(1_000_000.5, 2_000_000.0, 1_000.0, false).is_err());
        assert!(plan(1_000_000.0, 2_000_000.0, 0.25, false).is_err());
        assert!(matches!(
            plan(f64::NAN, 2_000_000.0, 1_000.0, false),
            Err(VnaError::InvalidParameter(_))
        ));
    }
    #[test]
    fn huge_steps_are_rejected_not_overflowed() {
        for step in [1.8e17, 1.8e19] {
            assert!(matches!(
                plan(1_000_000.0, 2_000_000.0, step, false),
                Err(VnaError::InvalidParameter(_))
            ));
        }
        let wide = SweepPlan {
            window_start_hz: 1_000_000,
            step_hz: u64::MAX / 2,
            points_per_window: 101,
            segment_count: 3,
            policy: FirstPointPolicy::default(),
        };
        assert!(matches!(
            wide.segment_start_hz(2),
            Err(VnaError::InvalidParameter(_))
        ));
        assert!(wide.device_parameters(1, 1).is_err());
        assert_eq!(wide.actual_stop_hz(), u64::MAX);
    }
    #[test]
    fn whole_hz_rejects_two_to_the_sixty_fourth() {
        assert!(whole_hz("step", 18_446_744_073_709_551_616.0).is_err());
        assert_eq!(whole_hz("step", 4_000_000_000.0).unwrap(), 4_000_000_000);
    }
    #[test]
    fn rounded_up_range_must_fit_under_the_ceiling() {
        let err = plan(3_000_000_000.0, 3_950_000_000.0, 1_000_000.0, false).unwrap_err();
        assert!(matches!(err, VnaError::InvalidParameter(_)));
        assert!(plan(3_000_000_000.0, 3_900_000_000.0, 1_000_000.0, false).is_ok());
    }
    #[test]
    fn direct_parameters_allow_four_gigahertz() {
        let ok = SweepParameters {
            start_hz: 3_900_000_000,
            step_hz: 1_000_000,
            points: 101,
            values_per_point: 1,
        };
        assert!(ok.validate().is_ok());
        let too_high = SweepParameters {
            step_hz: 2_000_000,
            ..ok
        };
        assert!(too_high.validate().is_err());
        let too_low = SweepParameters {
            start_hz: 10_000,
            ..ok
        };
        assert!(too_low.validate().is_err());
    }
}
