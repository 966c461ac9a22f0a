//! The phase propagation algorithms
//!
//! Five interchangeable shifters produce a synthesis phase vector from the
//! complex spectrum of one analysis frame plus per-bin state carried from the
//! previous frame. They share framing state, transient detection and the
//! phase-reset policy through [`ShifterCore`]; the variants are siblings
//! behind the one-method [`PhaseShifter`] trait.

use core::ops::Range;

use microfft::Complex32;

use crate::config::{PhaseResetMode, RenderConfig, ShifterKind, TransientDetectionMode};
use crate::detect::TransientDetector;
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::utils::math::{TWO_PI, princarg};

mod basic;
mod dynamic;
mod identity;
mod laminar;
mod scaled;

pub use basic::BasicPhaseShifter;
pub use dynamic::DynamicPhaseShifter;
pub use identity::IdentityPhaseShifter;
pub use laminar::LaminarPhaseShifter;
pub use scaled::ScaledPhaseShifter;

/// A frame-synchronous phase propagation algorithm.
///
/// Frames must arrive in strictly ascending time order; the returned slice is
/// the synthesis phase for every bin up to Nyquist, wrapped to (−π, π].
/// A shifter is bound to one [`TrackInfo`] and must not be reused across
/// tracks.
pub trait PhaseShifter: Send {
    fn process(&mut self, spectrum: &[Complex32]) -> Result<&[f64], VocoderError>;
}

/// Build the configured shifter variant for one track.
pub fn build(
    info: &TrackInfo,
    config: &RenderConfig,
) -> Result<Box<dyn PhaseShifter>, VocoderError> {
    let detection = config.transient_detection;
    let reset = config.phase_reset;
    Ok(match config.shifter {
        ShifterKind::Basic => Box::new(BasicPhaseShifter::new(info, detection, reset)?),
        ShifterKind::LockedIdentity => {
            Box::new(IdentityPhaseShifter::new(info, detection, reset)?)
        }
        ShifterKind::LockedScaled => Box::new(ScaledPhaseShifter::new(
            info,
            detection,
            reset,
            config.scale_factor,
        )?),
        ShifterKind::Laminar => Box::new(LaminarPhaseShifter::new(info, detection, reset)?),
        ShifterKind::LockedDynamic => Box::new(DynamicPhaseShifter::new(
            info,
            detection,
            reset,
            config.magnitude_min_factor,
        )?),
    })
}

/// How one frame is handled after transient detection.
pub(crate) enum FrameScope {
    /// Full-range phase reset happened; propagation is skipped entirely.
    Bypass,
    /// Propagate over these bins (the full range, or the mid band when a
    /// band-limited reset fired).
    Propagate(Range<usize>),
}

/// Framing state, transient detection and reset policy shared by all
/// shifter variants.
pub(crate) struct ShifterCore {
    pub info: TrackInfo,
    /// Expected per-bin phase advance per analysis hop,
    /// `2π · hop_analysis · k / frame_size_padded`.
    pub phase_delta_target: Vec<f64>,
    pub phase_analysis_prev: Vec<f64>,
    pub phase_synthesis: Vec<f64>,
    pub detector: TransientDetector,
    pub reset_mode: PhaseResetMode,
    pub band_low: usize,
    pub band_high: usize,
}

impl ShifterCore {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset_mode: PhaseResetMode,
    ) -> Result<Self, VocoderError> {
        let nyquist = info.frame_size_nyquist;
        let band_low = (150 * info.frame_size_padded / info.sample_rate as usize).min(nyquist);
        let band_high = (1000 * info.frame_size_padded / info.sample_rate as usize).min(nyquist);
        if reset_mode == PhaseResetMode::BandLimited && band_low >= band_high {
            return Err(VocoderError::InvalidConfig(
                "band-limited reset bounds collapse at this sample rate",
            ));
        }

        let phase_delta_target = (0..nyquist)
            .map(|k| TWO_PI * info.hop_size_analysis as f64 * k as f64
                / info.frame_size_padded as f64)
            .collect();

        Ok(Self {
            info: *info,
            phase_delta_target,
            phase_analysis_prev: vec![0.0; nyquist],
            phase_synthesis: vec![0.0; nyquist],
            detector: TransientDetector::new(detection, nyquist),
            reset_mode,
            band_low,
            band_high,
        })
    }

    pub fn nyquist(&self) -> usize {
        self.info.frame_size_nyquist
    }

    pub fn check_spectrum(&self, spectrum: &[Complex32]) -> Result<(), VocoderError> {
        if spectrum.len() != self.nyquist() {
            return Err(VocoderError::InvariantViolation(
                "spectrum length does not match the configured frame size",
            ));
        }
        Ok(())
    }

    /// Run transient detection and, on a hit, apply the reset policy.
    pub fn frame_scope(&mut self, magnitude: &[f64], phase: &[f64]) -> FrameScope {
        if !self.detector.has_transient(magnitude) {
            return FrameScope::Propagate(0..self.nyquist());
        }
        match self.reset_mode {
            PhaseResetMode::FullRange => {
                self.phase_synthesis.copy_from_slice(phase);
                FrameScope::Bypass
            }
            PhaseResetMode::BandLimited => {
                let nyquist = self.nyquist();
                self.phase_synthesis[..self.band_low].copy_from_slice(&phase[..self.band_low]);
                self.phase_synthesis[self.band_high..nyquist]
                    .copy_from_slice(&phase[self.band_high..nyquist]);
                FrameScope::Propagate(self.band_low..self.band_high)
            }
        }
    }

    /// Whether `range` is the clamped mid band of a band-limited reset.
    pub fn is_band_limited(&self, range: &Range<usize>) -> bool {
        range.start > 0 || range.end < self.nyquist()
    }

    /// Horizontal phase propagation by per-bin unwrapping (DAFX ch. 7.3.5).
    pub fn propagate_basic(&mut self, range: Range<usize>, phase: &[f64]) {
        let ratio = self.info.time_stretch_ratio;
        for k in range {
            let delta = self.phase_delta_target[k]
                + princarg(
                    phase[k] - self.phase_analysis_prev[k] - self.phase_delta_target[k],
                );
            self.phase_synthesis[k] = princarg(self.phase_synthesis[k] + delta * ratio);
        }
    }

    /// Cache this frame's analysis phase and wrap the synthesis phase.
    ///
    /// Every consumer of the carried synthesis phase is 2π-periodic, so the
    /// wrap never changes the rendered output.
    pub fn finish_frame(&mut self, phase: &[f64]) {
        self.phase_analysis_prev.copy_from_slice(phase);
        for value in &mut self.phase_synthesis {
            *value = princarg(*value);
        }
    }
}

/// Per-bin magnitudes of a spectrum; NaN magnitudes are treated as silent.
pub(crate) fn spectrum_magnitudes(spectrum: &[Complex32]) -> Vec<f64> {
    spectrum
        .iter()
        .map(|c| {
            let m = libm::sqrt((c.re as f64) * (c.re as f64) + (c.im as f64) * (c.im as f64));
            if m.is_nan() { 0.0 } else { m }
        })
        .collect()
}

/// Per-bin phase angles of a spectrum.
pub(crate) fn spectrum_phases(spectrum: &[Complex32]) -> Vec<f64> {
    spectrum.iter().map(|c| libm::atan2(c.im as f64, c.re as f64)).collect()
}

pub(crate) fn is_silent(magnitude: &[f64]) -> bool {
    magnitude.iter().all(|&m| m == 0.0)
}

/// Local magnitude maxima overlooking `shadow` bins to each side.
///
/// Zero-magnitude bins are skipped; a found peak shadows the next `shadow`
/// candidates. Indices are absolute even when `range` is band-limited.
pub(crate) fn find_magnitude_peaks(
    magnitude: &[f64],
    range: Range<usize>,
    shadow: usize,
) -> Vec<usize> {
    let mut peaks = Vec::new();
    let end = range.end.saturating_sub(shadow);
    let mut i = range.start + shadow;
    while i < end {
        if magnitude[i] == 0.0 {
            i += 1;
            continue;
        }
        let mut is_peak = true;
        for j in i - shadow..=i + shadow {
            if magnitude[i] < magnitude[j] {
                is_peak = false;
                break;
            }
        }
        if is_peak {
            peaks.push(i);
            i += shadow;
        }
        i += 1;
    }
    peaks
}

/// Walk downhill from a peak to the end of its region of influence.
///
/// The last peak of the frame always owns every bin up to Nyquist.
pub(crate) fn region_upper_bound(
    magnitude: &[f64],
    peaks: &[usize],
    peak: usize,
    nyquist: usize,
) -> usize {
    if peaks.len() <= 1 || peak == *peaks.last().unwrap() {
        return nyquist;
    }
    let mut bound = peak;
    while bound < nyquist - 1 && magnitude[bound] > magnitude[bound + 1] {
        bound += 1;
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowType;

    fn info() -> TrackInfo {
        TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap()
    }

    #[test]
    fn band_edges_follow_the_sample_rate() {
        let core = ShifterCore::new(
            &info(),
            TransientDetectionMode::None,
            PhaseResetMode::BandLimited,
        )
        .unwrap();
        // 150 Hz and 1000 Hz at 44.1 kHz / 2048 bins
        assert_eq!(core.band_low, 150 * 2048 / 44_100);
        assert_eq!(core.band_high, 1000 * 2048 / 44_100);
        assert!(core.band_low < core.band_high);
    }

    #[test]
    fn target_delta_is_linear_in_the_bin_index() {
        let core =
            ShifterCore::new(&info(), TransientDetectionMode::None, PhaseResetMode::FullRange)
                .unwrap();
        let slope = TWO_PI * core.info.hop_size_analysis as f64 / 2048.0;
        assert_eq!(core.phase_delta_target[0], 0.0);
        approx::assert_relative_eq!(core.phase_delta_target[7], slope * 7.0, epsilon = 1e-12);
    }

    #[test]
    fn peak_scan_finds_isolated_maxima() {
        let mut magnitude = vec![0.0f64; 32];
        magnitude[5] = 1.0;
        magnitude[4] = 0.5;
        magnitude[6] = 0.5;
        magnitude[20] = 2.0;
        magnitude[19] = 1.0;
        magnitude[21] = 0.5;
        let peaks = find_magnitude_peaks(&magnitude, 0..32, 1);
        assert_eq!(peaks, vec![5, 20]);
    }

    #[test]
    fn peak_scan_respects_the_range() {
        let mut magnitude = vec![0.0f64; 32];
        magnitude[5] = 1.0;
        magnitude[20] = 2.0;
        magnitude[19] = 1.0;
        magnitude[21] = 0.5;
        let peaks = find_magnitude_peaks(&magnitude, 10..32, 1);
        assert_eq!(peaks, vec![20]);
    }

    #[test]
    fn region_bound_walks_downhill() {
        let magnitude = vec![0.0, 1.0, 3.0, 2.0, 1.5, 1.6, 0.0, 0.0];
        let peaks = vec![2, 5];
        assert_eq!(region_upper_bound(&magnitude, &peaks, 2, 8), 4);
        // last peak owns everything up to Nyquist
        assert_eq!(region_upper_bound(&magnitude, &peaks, 5, 8), 8);
    }

    #[test]
    fn nan_magnitudes_become_silence() {
        let spectrum = [
            Complex32 { re: f32::NAN, im: 0.0 },
            Complex32 { re: 3.0, im: 4.0 },
        ];
        let magnitude = spectrum_magnitudes(&spectrum);
        assert_eq!(magnitude[0], 0.0);
        approx::assert_relative_eq!(magnitude[1], 5.0, epsilon = 1e-9);
    }
}
