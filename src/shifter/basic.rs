//! Basic phase unwrapping (DAFX ch. 7.3.5)

use microfft::Complex32;

use crate::config::{PhaseResetMode, TransientDetectionMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;

use super::{FrameScope, PhaseShifter, ShifterCore, is_silent, spectrum_magnitudes,
            spectrum_phases};

/// Propagates every bin independently: the measured phase advance is
/// unwrapped around the expected advance and scaled by the stretch ratio.
pub struct BasicPhaseShifter {
    core: ShifterCore,
}

impl BasicPhaseShifter {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset: PhaseResetMode,
    ) -> Result<Self, VocoderError> {
        Ok(Self { core: ShifterCore::new(info, detection, reset)? })
    }
}

impl PhaseShifter for BasicPhaseShifter {
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
            FrameScope::Propagate(range) => self.core.propagate_basic(range, &phase),
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
    use crate::utils::math::princarg;
    use approx::assert_relative_eq;
    use core::f64::consts::PI;

    fn info() -> TrackInfo {
        TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap()
    }

    fn noise_spectrum(info: &TrackInfo, seed: u32) -> Vec<Complex32> {
        let frame: Vec<f32> = (0..info.frame_size)
            .map(|i| {
                let x = libm::sin(i as f64 * 12.9898 + seed as f64) * 43_758.5453;
                (x - libm::floor(x)) as f32 - 0.5
            })
            .collect();
        fft::forward(&frame).unwrap()
    }

    #[test]
    fn first_frame_reads_only_initialized_state() {
        let info = info();
        let mut shifter = BasicPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        let spectrum = noise_spectrum(&info, 1);
        let phases = shifter.process(&spectrum).unwrap();
        assert_eq!(phases.len(), info.frame_size_nyquist);
        assert!(phases.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn identical_frames_at_unit_ratio_pass_phase_through() {
        let info = info();
        assert_relative_eq!(info.time_stretch_ratio, 1.0);
        let mut shifter = BasicPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        let spectrum = noise_spectrum(&info, 7);
        shifter.process(&spectrum).unwrap();
        let synthesis = shifter.process(&spectrum).unwrap().to_vec();
        let analysis = spectrum_phases(&spectrum);
        for (s, a) in synthesis.iter().zip(&analysis) {
            assert_relative_eq!(princarg(s - a), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn synthesis_phase_stays_wrapped() {
        let info = TrackInfo::new(44_100, 7, 4, WindowType::Hann, false).unwrap();
        let mut shifter = BasicPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        for seed in 0..12 {
            let phases = shifter.process(&noise_spectrum(&info, seed)).unwrap();
            assert!(phases.iter().all(|p| p.abs() <= PI + 1e-9));
        }
    }

    #[test]
    fn silent_frame_leaves_state_untouched() {
        let info = info();
        let mut shifter = BasicPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        shifter.process(&noise_spectrum(&info, 3)).unwrap();
        let before = shifter.core.phase_synthesis.clone();
        let silence = vec![Complex32 { re: 0.0, im: 0.0 }; info.frame_size_nyquist];
        let after = shifter.process(&silence).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn mismatched_spectrum_is_an_invariant_violation() {
        let info = info();
        let mut shifter = BasicPhaseShifter::new(
            &info,
            TransientDetectionMode::None,
            PhaseResetMode::FullRange,
        )
        .unwrap();
        let short = vec![Complex32 { re: 0.0, im: 0.0 }; 10];
        assert!(shifter.process(&short).is_err());
    }
}
