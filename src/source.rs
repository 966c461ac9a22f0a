//! Test-signal sources with analytic reference renderings

use crate::config::{RenderConfig, TransformMode};
use crate::error::VocoderError;
use crate::track::{Track, TrackInfo};
use crate::utils::math::TWO_PI;

/// Equal-weight mixture of sine partials.
pub fn sine_mixture(sample_rate: u32, seconds: f64, frequencies: &[f64]) -> Vec<f32> {
    let count = (sample_rate as f64 * seconds) as usize;
    let amplitude = 1.0 / frequencies.len().max(1) as f64;
    (0..count)
        .map(|i| {
            frequencies
                .iter()
                .map(|&f| amplitude * libm::sin(TWO_PI * f * i as f64 / sample_rate as f64))
                .sum::<f64>() as f32
        })
        .collect()
}

/// Silence with a single unit impulse at `position`.
pub fn impulse(sample_rate: u32, seconds: f64, position: usize) -> Vec<f32> {
    let mut samples = vec![0.0f32; (sample_rate as f64 * seconds) as usize];
    if position < samples.len() {
        samples[position] = 1.0;
    }
    samples
}

/// Build a sine-mixture track whose reference is the analytically shifted
/// (or stretched) rendering of the same mixture.
pub fn sine_track(
    sample_rate: u32,
    seconds: f64,
    frequencies: &[f64],
    config: &RenderConfig,
) -> Result<Track, VocoderError> {
    let info = TrackInfo::from_config(sample_rate, config)?;
    let base = sine_mixture(sample_rate, seconds, frequencies);
    let reference = match config.mode {
        TransformMode::PitchShift => {
            let shifted: Vec<f64> =
                frequencies.iter().map(|f| f * info.pitch_shift_factor).collect();
            sine_mixture(sample_rate, seconds, &shifted)
        }
        TransformMode::TimeStretch => {
            sine_mixture(sample_rate, seconds * info.time_stretch_ratio, frequencies)
        }
    };
    let name = format!(
        "sine_{}",
        frequencies
            .iter()
            .map(|f| format!("{f:.0}"))
            .collect::<Vec<_>>()
            .join("-")
    );
    Ok(Track { name, sample_rate, base, reference })
}
