//! Per-frame transform driver

use microfft::Complex32;

use crate::config::{RenderConfig, TransformMode};
use crate::error::VocoderError;
use crate::fft;
use crate::resample::LinearResampler;
use crate::shifter::{self, PhaseShifter};
use crate::track::TrackInfo;
use crate::window;

/// Drives one analysis frame through the spectral pipeline:
/// window → zero-pad → forward FFT → phase shift → magnitude with the new
/// phase → inverse FFT → unpad → window again → resample (pitch-shift mode).
pub struct FrameTransform {
    info: TrackInfo,
    window: Vec<f32>,
    window_squared: Vec<f32>,
    shifter: Box<dyn PhaseShifter>,
    resampler: Option<LinearResampler>,
}

impl FrameTransform {
    /// Build the transform for one track and configuration. The resampler is
    /// only attached in pitch-shift mode; a time stretch keeps the frame
    /// length.
    pub fn new(info: TrackInfo, config: &RenderConfig) -> Result<Self, VocoderError> {
        let shifter = shifter::build(&info, config)?;
        let resampler = match config.mode {
            TransformMode::PitchShift => Some(LinearResampler::new(&info)),
            TransformMode::TimeStretch => None,
        };
        Ok(Self {
            info,
            window: window::build(info.window_type, info.frame_size),
            window_squared: window::build_squared(info.window_type, info.frame_size),
            shifter,
            resampler,
        })
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn window_squared(&self) -> &[f32] {
        &self.window_squared
    }

    /// Length of the frames handed back by [`Self::process`].
    pub fn output_len(&self) -> usize {
        match &self.resampler {
            Some(resampler) => resampler.output_len(),
            None => self.info.frame_size,
        }
    }

    pub fn process(&mut self, frame: &[f32]) -> Result<Vec<f32>, VocoderError> {
        if frame.len() != self.info.frame_size {
            return Err(VocoderError::InvariantViolation(
                "analysis frame length does not match the frame size",
            ));
        }

        let mut windowed: Vec<f32> =
            frame.iter().zip(&self.window).map(|(&x, &w)| x * w).collect();
        windowed.resize(self.info.frame_size_padded, 0.0);

        let spectrum = fft::forward(&windowed)?;
        let synthesis_phase = self.shifter.process(&spectrum)?;

        let shifted: Vec<Complex32> = spectrum
            .iter()
            .zip(synthesis_phase)
            .map(|(c, &phi)| {
                let mut m =
                    libm::sqrt((c.re as f64) * (c.re as f64) + (c.im as f64) * (c.im as f64));
                if m.is_nan() {
                    m = 0.0;
                }
                Complex32 {
                    re: (m * libm::cos(phi)) as f32,
                    im: (m * libm::sin(phi)) as f32,
                }
            })
            .collect();

        let mut synthesized = fft::inverse(&shifted)?;
        synthesized.truncate(self.info.frame_size);
        for (x, &w) in synthesized.iter_mut().zip(&self.window) {
            *x *= w;
        }

        match &self.resampler {
            Some(resampler) => Ok(resampler.process(&synthesized)),
            None => Ok(synthesized),
        }
    }
}
