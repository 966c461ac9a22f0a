//! Scaled phase locking (Laroche & Dolson III.C.2, DAFX ch. 7.4.3)

use microfft::Complex32;

use crate::config::{PhaseResetMode, TransientDetectionMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::utils::math::{TWO_PI, princarg};

use super::{FrameScope, PhaseShifter, ShifterCore, find_magnitude_peaks, is_silent,
            region_upper_bound, spectrum_magnitudes, spectrum_phases};

/// Locks regions to their peak like identity locking, but matches each peak
/// to the nearest peak of the previous frame and scales the unwrapped phase
/// offsets within a region by a configurable factor.
pub struct ScaledPhaseShifter {
    core: ShifterCore,
    peaks_prev: Vec<usize>,
    peak_shadow: usize,
    scale_factor: f64,
}

impl ScaledPhaseShifter {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset: PhaseResetMode,
        scale_factor: f64,
    ) -> Result<Self, VocoderError> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(VocoderError::InvalidConfig("scale_factor must be positive"));
        }
        Ok(Self {
            core: ShifterCore::new(info, detection, reset)?,
            peaks_prev: Vec::new(),
            peak_shadow: 1,
            scale_factor,
        })
    }

    /// Nearest previous-frame peak by monotone scan. `cursor` only moves
    /// forward across one frame's peak loop.
    fn related_peak(&self, cursor: &mut usize, peak: usize) -> usize {
        while *cursor < self.peaks_prev.len() - 1
            && self.peaks_prev[*cursor + 1].abs_diff(peak)
                < self.peaks_prev[*cursor].abs_diff(peak)
        {
            *cursor += 1;
        }
        self.peaks_prev[*cursor]
    }

    /// Synthesis phase and unwrapped analysis phase at a peak, using the
    /// average bin index of the matched peak pair for the expected advance.
    fn peak_synthesis_phase(
        &self,
        phase: &[f64],
        peak_prev: usize,
        peak: usize,
    ) -> (f64, f64) {
        let core = &self.core;
        let average_index = (peak + peak_prev) as f64 / 2.0;
        let expected = TWO_PI * core.info.hop_size_analysis as f64 * average_index
            / core.info.frame_size_padded as f64;
        let delta = expected
            + princarg(phase[peak] - core.phase_analysis_prev[peak_prev] - expected);
        let unwrapped = core.phase_analysis_prev[peak_prev] + delta;
        let synthesis =
            core.phase_synthesis[peak] + delta * core.info.time_stretch_ratio;
        (synthesis, unwrapped)
    }
}

impl PhaseShifter for ScaledPhaseShifter {
    fn process(&mut self, spectrum: &[Complex32]) -> Result<&[f64], VocoderError> {
        self.core.check_spectrum(spectrum)?;
        let magnitude = spectrum_magnitudes(spectrum);
        let phase = spectrum_phases(spectrum);
        if is_silent(&magnitude) {
            self.core.phase_analysis_prev.copy_from_slice(&phase);
            return Ok(&self.core.phase_synthesis);
        }

        let nyquist = self.core.nyquist();
        let peaks = find_magnitude_peaks(&magnitude, 0..nyquist, self.peak_shadow);

        match self.core.frame_scope(&magnitude, &phase) {
            FrameScope::Bypass => {}
            FrameScope::Propagate(range) => {
                if peaks.is_empty() || self.peaks_prev.is_empty() {
                    // either frame is peakless; per-bin unwrapping instead
                    self.core.propagate_basic(range, &phase);
                } else {
                    let clamp = self.core.is_band_limited(&range);
                    let mut synthesis = vec![0.0f64; nyquist];
                    let mut cursor = 0usize;
                    let mut upper = 0usize;
                    for &peak in &peaks {
                        let peak_prev = self.related_peak(&mut cursor, peak);
                        if clamp && !(self.core.band_low..self.core.band_high).contains(&peak)
                        {
                            continue;
                        }
                        let (peak_synthesis, peak_unwrapped) =
                            self.peak_synthesis_phase(&phase, peak_prev, peak);
                        let mut lower = upper;
                        upper = region_upper_bound(&magnitude, &peaks, peak, nyquist);
                        if clamp {
                            lower = lower.max(self.core.band_low);
                            upper = upper.min(self.core.band_high);
                        }
                        for k in lower..upper {
                            let unwrapped = self.core.phase_analysis_prev[k]
                                + self.core.phase_delta_target[k]
                                + princarg(
                                    phase[k]
                                        - self.core.phase_analysis_prev[k]
                                        - self.core.phase_delta_target[k],
                                );
                            synthesis[k] = peak_synthesis
                                + self.scale_factor * (unwrapped - peak_unwrapped);
                        }
                    }
                    self.core.phase_synthesis[range.clone()]
                        .copy_from_slice(&synthesis[range]);
                }
            }
        }

        self.core.finish_frame(&phase);
        self.peaks_prev = peaks;
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

    fn make(info: &TrackInfo, scale_factor: f64) -> ScaledPhaseShifter {
        ScaledPhaseShifter::new(
            info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
            scale_factor,
        )
        .unwrap()
    }

    fn mixture_spectrum(info: &TrackInfo, cycle_list: &[f64]) -> Vec<Complex32> {
        let frame: Vec<f32> = (0..info.frame_size)
            .map(|i| {
                cycle_list
                    .iter()
                    .map(|c| libm::sin(2.0 * PI * c * i as f64 / info.frame_size as f64))
                    .sum::<f64>() as f32
            })
            .collect();
        fft::forward(&frame).unwrap()
    }

    #[test]
    fn rejects_non_positive_scale_factor() {
        assert!(ScaledPhaseShifter::new(
            &info(),
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
            0.0,
        )
        .is_err());
    }

    #[test]
    fn identical_frames_at_unit_ratio_pass_phase_through() {
        let info = info();
        let mut shifter = make(&info, 1.0);
        let spectrum = mixture_spectrum(&info, &[10.0, 40.0, 80.0]);
        shifter.process(&spectrum).unwrap();
        let synthesis = shifter.process(&spectrum).unwrap().to_vec();
        let analysis = spectrum_phases(&spectrum);
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
        let info = TrackInfo::new(44_100, 5, 4, WindowType::Hann, false).unwrap();
        let mut shifter = make(&info, 1.0);
        for cycles in [20.0, 20.4, 21.1, 22.0] {
            let phases = shifter.process(&mixture_spectrum(&info, &[cycles])).unwrap();
            assert!(phases.iter().all(|p| p.abs() <= PI + 1e-9));
        }
    }
}
