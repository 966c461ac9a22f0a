//! Laminar bin-to-bin phase inheritance (after the Rubberband stretcher)

use microfft::Complex32;

use crate::config::{PhaseResetMode, TransientDetectionMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::utils::math::princarg;

use super::{FrameScope, PhaseShifter, ShifterCore, is_silent, spectrum_magnitudes,
            spectrum_phases};

/// Longest run of consecutive bins that may inherit phase from below.
const INHERIT_DISTANCE_MAX: usize = 8;

/// Sweeps the spectrum bottom-up and lets each bin either advance its own
/// unwrapped phase or inherit a blend of its own advance and the rotation of
/// the bin below. Locking regions flow from bin to bin without the hard
/// boundaries of identity locking.
pub struct LaminarPhaseShifter {
    core: ShifterCore,
    limit_low: usize,
    limit_mid: usize,
    limit_high: usize,
    phase_deviation_prev: Vec<f64>,
}

impl LaminarPhaseShifter {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset: PhaseResetMode,
    ) -> Result<Self, VocoderError> {
        // inheritance bands at roughly 600 / 1200 / 12000 Hz; the low edge is
        // lifted for large stretches so locking does not reach too far down
        let stretch_deviation = info.time_stretch_ratio - 1.0;
        let lifted = 600.0 + 1200.0 * stretch_deviation * stretch_deviation * stretch_deviation;
        let freq_low = 600.0f64.max(lifted);
        let freq_mid = freq_low * 2.0;
        let freq_high = freq_low * 20.0;
        let to_bin = |freq: f64| {
            libm::floor(freq * info.frame_size_padded as f64 / info.sample_rate as f64) as usize
        };

        Ok(Self {
            core: ShifterCore::new(info, detection, reset)?,
            limit_low: to_bin(freq_low),
            limit_mid: to_bin(freq_mid),
            limit_high: to_bin(freq_high),
            phase_deviation_prev: vec![0.0; info.frame_size_nyquist],
        })
    }

    fn inherit_budget(&self, bin: usize) -> usize {
        if bin <= self.limit_low {
            0
        } else if bin <= self.limit_mid {
            1
        } else if bin <= self.limit_high {
            3
        } else {
            INHERIT_DISTANCE_MAX
        }
    }
}

impl PhaseShifter for LaminarPhaseShifter {
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
                let ratio = self.core.info.time_stretch_ratio;
                let band_limited = self.core.reset_mode == PhaseResetMode::BandLimited;
                let mut inherit_count = 0usize;
                let mut deviation_delta_prev = 0.0f64;
                let mut growing_prev = false;
                for i in range {
                    let deviation = princarg(
                        phase[i]
                            - self.core.phase_analysis_prev[i]
                            - self.core.phase_delta_target[i],
                    );
                    let deviation_delta = (deviation - self.phase_deviation_prev[i]).abs();
                    let growing = deviation > self.phase_deviation_prev[i];

                    let inherit = if inherit_count > self.inherit_budget(i) || i == 0 {
                        false
                    } else if band_limited
                        && (i == self.core.band_low || i == self.core.band_high)
                    {
                        // locking must not flow across a reset-band boundary
                        false
                    } else {
                        deviation_delta > deviation_delta_prev && growing == growing_prev
                    };

                    let phase_delta_own =
                        princarg(ratio * (self.core.phase_delta_target[i] + deviation));
                    if inherit {
                        let inherited = princarg(
                            self.core.phase_synthesis[i - 1] - phase[i - 1],
                        );
                        let blended = (phase_delta_own * inherit_count as f64
                            + inherited * (INHERIT_DISTANCE_MAX - inherit_count) as f64)
                            / INHERIT_DISTANCE_MAX as f64;
                        self.core.phase_synthesis[i] = phase[i] + blended;
                        inherit_count += 1;
                    } else {
                        self.core.phase_synthesis[i] += phase_delta_own;
                        inherit_count = 0;
                    }

                    deviation_delta_prev = deviation_delta;
                    growing_prev = growing;
                    self.phase_deviation_prev[i] = deviation;
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

    fn make(info: &TrackInfo) -> LaminarPhaseShifter {
        LaminarPhaseShifter::new(
            info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap()
    }

    fn noise_spectrum(info: &TrackInfo, seed: u32) -> Vec<Complex32> {
        let frame: Vec<f32> = (0..info.frame_size)
            .map(|i| {
                let x = libm::sin(i as f64 * 78.233 + seed as f64 * 0.71) * 12_543.853;
                (x - libm::floor(x)) as f32 - 0.5
            })
            .collect();
        fft::forward(&frame).unwrap()
    }

    #[test]
    fn band_limits_scale_with_the_stretch_ratio() {
        let unity = TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap();
        let stretched = TrackInfo::new(44_100, 12, 4, WindowType::Hann, false).unwrap();
        let shifter_unity = make(&unity);
        let shifter_stretched = make(&stretched);
        // 600 Hz at 44.1 kHz / 2048 bins
        assert_eq!(shifter_unity.limit_low, 600 * 2048 / 44_100);
        assert!(shifter_stretched.limit_low > shifter_unity.limit_low);
        assert_eq!(shifter_unity.limit_mid, 2 * 600 * 2048 / 44_100);
    }

    #[test]
    fn inherit_budget_grows_with_frequency() {
        let info = TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap();
        let shifter = make(&info);
        assert_eq!(shifter.inherit_budget(0), 0);
        assert_eq!(shifter.inherit_budget(shifter.limit_low), 0);
        assert_eq!(shifter.inherit_budget(shifter.limit_low + 1), 1);
        assert_eq!(shifter.inherit_budget(shifter.limit_mid + 1), 3);
        assert_eq!(shifter.inherit_budget(shifter.limit_high + 1), INHERIT_DISTANCE_MAX);
    }

    #[test]
    fn steady_input_settles_into_pure_horizontal_propagation() {
        // once the per-bin deviation stops changing, no bin inherits and the
        // synthesis phase freezes for identical frames at unit ratio
        let info = TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap();
        let mut shifter = make(&info);
        let spectrum = noise_spectrum(&info, 2);
        shifter.process(&spectrum).unwrap();
        shifter.process(&spectrum).unwrap();
        let third = shifter.process(&spectrum).unwrap().to_vec();
        let fourth = shifter.process(&spectrum).unwrap().to_vec();
        for (a, b) in third.iter().zip(&fourth) {
            assert_relative_eq!(princarg(a - b), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn synthesis_phase_stays_wrapped() {
        let info = TrackInfo::new(44_100, 3, 4, WindowType::Hann, false).unwrap();
        let mut shifter = make(&info);
        for seed in 0..10 {
            let phases = shifter.process(&noise_spectrum(&info, seed)).unwrap();
            assert!(phases.iter().all(|p| p.abs() <= PI + 1e-9));
        }
    }
}
