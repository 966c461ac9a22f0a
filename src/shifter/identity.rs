//! Identity phase locking (Laroche & Dolson III.C.1, DAFX ch. 7.4.3)

use microfft::Complex32;

use crate::config::{PhaseResetMode, TransientDetectionMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::utils::math::princarg;

use super::{FrameScope, PhaseShifter, ShifterCore, find_magnitude_peaks, is_silent,
            region_upper_bound, spectrum_magnitudes, spectrum_phases};

/// Locks every bin of a partial to the phase rotation of its magnitude peak.
///
/// The peak's own synthesis phase advances by basic unwrapping; the rotation
/// between that target and the measured peak phase is then applied verbatim
/// to the peak's whole region of influence, so all bins of one sinusoid
/// rotate in lock-step and cross-bin beating cancels.
pub struct IdentityPhaseShifter {
    core: ShifterCore,
    peak_shadow: usize,
}

impl IdentityPhaseShifter {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset: PhaseResetMode,
    ) -> Result<Self, VocoderError> {
        Ok(Self { core: ShifterCore::new(info, detection, reset)?, peak_shadow: 1 })
    }

    /// Rotation between the peak's propagated synthesis phase and its
    /// measured phase. The peak is matched to itself across frames.
    fn peak_phase_rotation(&self, phase: &[f64], peak: usize) -> f64 {
        let core = &self.core;
        let delta = core.phase_delta_target[peak]
            + princarg(
                phase[peak] - core.phase_analysis_prev[peak] - core.phase_delta_target[peak],
            );
        let target = princarg(
            core.phase_synthesis[peak] + delta * core.info.time_stretch_ratio,
        );
        princarg(target - phase[peak])
    }
}

impl PhaseShifter for IdentityPhaseShifter {
    fn process(&mut self, spectrum: &[Complex32]) -> Result<&[f64], VocoderError> {
        self.core.check_spectrum(spectrum)?;
        let magnitude = spectrum_magnitudes(spectrum);
        let phase = spectrum_phases(spectrum);
        if is_silent(&magnitude) {
            self.core.phase_analysis_prev.copy_from_slice(&phase);
            return Ok(&self.core.phase_synthesis);
        }

        match self.core.frame_scope(&magnitude, &phase) {
            FrameScope::Bypass => {}
            FrameScope::Propagate(range) => {
                let peaks = find_magnitude_peaks(&magnitude, range.clone(), self.peak_shadow);
                if peaks.is_empty() {
                    // no peak to lock to; fall back to per-bin unwrapping
                    self.core.propagate_basic(range, &phase);
                } else {
                    let nyquist = self.core.nyquist();
                    let clamp = self.core.is_band_limited(&range);
                    let mut synthesis = vec![0.0f64; nyquist];
                    let mut upper = range.start;
                    for &peak in &peaks {
                        let rotation = self.peak_phase_rotation(&phase, peak);
                        let mut lower = upper;
                        upper = region_upper_bound(&magnitude, &peaks, peak, nyquist);
                        if clamp {
                            lower = lower.max(self.core.band_low);
                            upper = upper.min(self.core.band_high);
                        }
                        for k in lower..upper {
                            synthesis[k] = princarg(phase[k] + rotation);
                        }
                    }
                    self.core.phase_synthesis[range.clone()]
                        .copy_from_slice(&synthesis[range]);
                }
            }
        }

        self.core.finish_frame(&phase);
        Ok(&self.core.phase_synthesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowType;
    use crate::fft;
    use approx::assert_relative_eq;
    use core::f64::consts::PI;

    fn info() -> TrackInfo {
        TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap()
    }

    fn sine_spectrum(info: &TrackInfo, cycles: f64) -> Vec<Complex32> {
        let frame: Vec<f32> = (0..info.frame_size)
            .map(|i| libm::sin(2.0 * PI * cycles * i as f64 / info.frame_size as f64) as f32)
            .collect();
        fft::forward(&frame).unwrap()
    }

    #[test]
    fn identical_frames_at_unit_ratio_pass_phase_through() {
        let info = info();
        let mut shifter = IdentityPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        let spectrum = sine_spectrum(&info, 24.0);
        shifter.process(&spectrum).unwrap();
        let synthesis = shifter.process(&spectrum).unwrap().to_vec();
        let analysis = spectrum_phases(&spectrum);
        // bins carrying actual signal energy are locked to their partial
        let magnitude = spectrum_magnitudes(&spectrum);
        let peak_magnitude = magnitude.iter().cloned().fold(0.0f64, f64::max);
        for k in 0..info.frame_size_nyquist {
            if magnitude[k] > peak_magnitude * 1e-3 {
                assert_relative_eq!(
                    princarg(synthesis[k] - analysis[k]),
                    0.0,
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn synthesis_phase_stays_wrapped() {
        let info = TrackInfo::new(44_100, -4, 4, WindowType::Hann, false).unwrap();
        let mut shifter = IdentityPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        for cycles in [24.0, 24.3, 24.7, 25.0, 80.0] {
            let phases = shifter.process(&sine_spectrum(&info, cycles)).unwrap();
            assert!(phases.iter().all(|p| p.abs() <= PI + 1e-9));
        }
    }

    #[test]
    fn silent_frame_produces_no_update() {
        let info = info();
        let mut shifter = IdentityPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        shifter.process(&sine_spectrum(&info, 24.0)).unwrap();
        let before = shifter.core.phase_synthesis.clone();
        let silence = vec![Complex32 { re: 0.0, im: 0.0 }; info.frame_size_nyquist];
        let after = shifter.process(&silence).unwrap();
        assert_eq!(before, after);
    }
}
