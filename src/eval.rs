//! Rendering evaluation: time alignment and magnitude RMSD

use crate::error::VocoderError;
use crate::fft;
use crate::track::TrackInfo;
use crate::window;

/// Frames skipped at the head of both signals before alignment; the first
/// frames carry edge-padding artifacts from both renderers.
const SKIP_FRAME_COUNT: usize = 5;

/// Root mean squared deviation between the per-frame magnitude spectra of a
/// reference rendering and a transformed rendering.
///
/// The signals are time-aligned by an exhaustive integer-offset search over
/// one frame, truncated to a common frame-aligned length, then compared
/// frame by frame with each magnitude vector normalized by its own maximum.
pub fn evaluate(
    info: &TrackInfo,
    reference: &[f32],
    transformed: &[f32],
) -> Result<f64, VocoderError> {
    let (reference, transformed) =
        time_align_crop(info, reference, transformed, SKIP_FRAME_COUNT)?;
    let window = window::build(info.window_type, info.frame_size);

    let half = info.frame_size / 2;
    let mut sum = 0.0f64;
    let mut frame_count = 0usize;
    let mut offset = 0usize;
    while offset + info.frame_size < reference.len() {
        let reference_magnitude =
            normalized_magnitudes(&reference[offset..offset + info.frame_size], &window)?;
        let transformed_magnitude =
            normalized_magnitudes(&transformed[offset..offset + info.frame_size], &window)?;
        for k in 0..=half {
            // interior bins appear twice in the full spectrum
            let weight = if k == 0 || k == half { 1.0 } else { 2.0 };
            let diff = reference_magnitude[k] - transformed_magnitude[k];
            sum += weight * diff * diff;
        }
        frame_count += 1;
        offset += info.hop_size_synthesis;
    }

    if frame_count == 0 {
        return Err(VocoderError::InvalidConfig("signals too short for evaluation"));
    }
    Ok(libm::sqrt(sum / (frame_count * info.frame_size) as f64))
}

/// Find the integer offset of `transformed` against `reference` that
/// minimizes the time-domain deviation, then crop both to the common
/// frame-aligned length.
fn time_align_crop<'a>(
    info: &TrackInfo,
    reference: &'a [f32],
    transformed: &'a [f32],
    skip_frame_count: usize,
) -> Result<(&'a [f32], &'a [f32]), VocoderError> {
    let skip = skip_frame_count * info.frame_size;
    let needed = skip + 2 * info.frame_size;
    if reference.len() < needed || transformed.len() < needed {
        return Err(VocoderError::InvalidConfig("signals too short for evaluation"));
    }
    let reference = &reference[skip..];
    let transformed = &transformed[skip..];

    let mut align_offset = 0usize;
    let mut min_deviation = 1.0f64;
    for offset in 0..info.frame_size {
        let mut deviation = 0.0f64;
        for j in 0..info.frame_size {
            let diff = transformed[offset + j] as f64 - reference[j] as f64;
            deviation += diff * diff;
        }
        deviation = libm::sqrt(deviation / info.sample_rate as f64);
        if deviation < min_deviation {
            min_deviation = deviation;
            align_offset = offset;
        }
    }
    log::debug!("evaluator alignment offset: {align_offset}");

    let frames = reference.len().min(transformed.len()) / info.frame_size;
    let length = frames.saturating_sub(skip_frame_count) * info.frame_size;
    let length = length
        .min(transformed.len() - align_offset)
        .min(reference.len())
        / info.frame_size
        * info.frame_size;
    if length == 0 {
        return Err(VocoderError::InvalidConfig("signals too short for evaluation"));
    }
    Ok((&reference[..length], &transformed[align_offset..align_offset + length]))
}

fn normalized_magnitudes(frame: &[f32], window: &[f32]) -> Result<Vec<f64>, VocoderError> {
    let windowed: Vec<f32> = frame.iter().zip(window).map(|(&x, &w)| x * w).collect();
    let spectrum = fft::forward(&windowed)?;
    let mut magnitude: Vec<f64> = spectrum
        .iter()
        .map(|c| libm::sqrt((c.re as f64) * (c.re as f64) + (c.im as f64) * (c.im as f64)))
        .collect();
    let peak = magnitude.iter().cloned().fold(0.0f64, f64::max);
    if peak > 0.0 {
        for m in &mut magnitude {
            *m /= peak;
        }
    }
    Ok(magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowType;
    use core::f64::consts::PI;

    fn info() -> TrackInfo {
        TrackInfo::new(44_100, 0, 4, WindowType::Hann, false).unwrap()
    }

    fn sine(count: usize, freq: f64) -> Vec<f32> {
        (0..count)
            .map(|i| libm::sin(2.0 * PI * freq * i as f64 / 44_100.0) as f32)
            .collect()
    }

    #[test]
    fn identical_signals_have_zero_deviation() {
        let info = info();
        let signal = sine(44_100, 440.0);
        let rmsd = evaluate(&info, &signal, &signal).unwrap();
        assert_eq!(rmsd, 0.0);
    }

    #[test]
    fn alignment_absorbs_a_small_lag() {
        let info = info();
        let signal = sine(44_100, 440.0);
        // transformed lags the reference by 100 samples
        let rmsd = evaluate(&info, &signal[100..], &signal).unwrap();
        assert!(rmsd < 1e-4, "rmsd = {rmsd}");
    }

    #[test]
    fn different_tones_have_visible_deviation() {
        let info = info();
        let a = sine(44_100, 440.0);
        let b = sine(44_100, 660.0);
        let rmsd = evaluate(&info, &a, &b).unwrap();
        assert!(rmsd > 1e-3, "rmsd = {rmsd}");
    }

    #[test]
    fn too_short_signals_are_rejected() {
        let info = info();
        let short = sine(1000, 440.0);
        assert!(evaluate(&info, &short, &short).is_err());
    }
}
