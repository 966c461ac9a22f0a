//! Framing and overlap-add around the per-frame transform

use crate::config::{RenderConfig, TransformMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::transform::FrameTransform;
use crate::utils::math::rms;

/// Splits a signal into overlapped analysis frames, runs each through the
/// spectral transform and accumulates the results.
///
/// In pitch-shift mode the resampled frame is summed back at its analysis
/// offset, so the rendering keeps the input duration; in time-stretch mode
/// the frame is summed at the synthesis hop and the duration scales with the
/// stretch ratio.
pub struct OverlapAdd {
    transform: FrameTransform,
    mode: TransformMode,
    normalize: bool,
}

impl OverlapAdd {
    pub fn new(info: TrackInfo, config: &RenderConfig) -> Result<Self, VocoderError> {
        Ok(Self {
            transform: FrameTransform::new(info, config)?,
            mode: config.mode,
            normalize: config.normalize,
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, VocoderError> {
        let info = *self.transform.info();
        if samples.len() < info.frame_size {
            return Err(VocoderError::InvalidConfig(
                "input shorter than one analysis frame",
            ));
        }

        let padded = pad(samples, info.frame_size);
        let ratio = info.time_stretch_ratio;

        // room for the stretched signal plus one frame of spill on both ends;
        // a large downward shift resamples frames beyond the analysis length
        let spill = info.frame_size.max(self.transform.output_len());
        let capacity = libm::ceil(padded.len() as f64 * ratio.max(1.0)) as usize
            + info.frame_size
            + spill;
        let mut synthesis = vec![0.0f32; capacity];

        let mut output_offset = 0usize;
        for analysis_offset in
            (0..padded.len() - info.frame_size).step_by(info.hop_size_analysis)
        {
            let frame = &padded[analysis_offset..analysis_offset + info.frame_size];
            let mut transformed = self.transform.process(frame)?;
            if self.normalize {
                rms_normalize(frame, &mut transformed, self.transform.window_squared());
            }
            let target = match self.mode {
                TransformMode::PitchShift => analysis_offset,
                TransformMode::TimeStretch => output_offset,
            };
            for (i, &x) in transformed.iter().enumerate() {
                synthesis[target + i] += x;
            }
            output_offset += info.hop_size_synthesis;
        }

        let (head, target_len) = match self.mode {
            TransformMode::PitchShift => (info.frame_size, samples.len()),
            TransformMode::TimeStretch => (
                libm::round(info.frame_size as f64 * ratio) as usize,
                libm::round(samples.len() as f64 * ratio) as usize,
            ),
        };
        let available = synthesis.len().saturating_sub(head);
        let mut output = synthesis[head..head + target_len.min(available)].to_vec();
        rescale(&mut output, self.transform.window_squared(), info.hop_size_synthesis);
        Ok(output)
    }
}

/// Pitch-shift `samples` by the configured semitone offset, preserving the
/// duration.
pub fn pitch_shift(
    samples: &[f32],
    sample_rate: u32,
    config: &RenderConfig,
) -> Result<Vec<f32>, VocoderError> {
    let config = RenderConfig { mode: TransformMode::PitchShift, ..*config };
    let info = TrackInfo::from_config(sample_rate, &config)?;
    OverlapAdd::new(info, &config)?.process(samples)
}

/// Time-stretch `samples` by the configured ratio, preserving the pitch.
pub fn time_stretch(
    samples: &[f32],
    sample_rate: u32,
    config: &RenderConfig,
) -> Result<Vec<f32>, VocoderError> {
    let config = RenderConfig { mode: TransformMode::TimeStretch, ..*config };
    let info = TrackInfo::from_config(sample_rate, &config)?;
    OverlapAdd::new(info, &config)?.process(samples)
}

/// Extend both ends by one frame of the reversed-and-negated outer edge.
/// Suppresses the boundary transient a hard cut would smear into the output.
fn pad(samples: &[f32], frame_size: usize) -> Vec<f32> {
    let mut padded = Vec::with_capacity(samples.len() + 2 * frame_size);
    padded.extend(samples[..frame_size].iter().rev().map(|&x| -x));
    padded.extend_from_slice(samples);
    padded.extend(samples[samples.len() - frame_size..].iter().rev().map(|&x| -x));
    padded
}

/// Undo the overlap-add gain: divide by the window-power COLA constant, or by
/// the output peak when that is larger, so the result never clips.
fn rescale(samples: &mut [f32], window_squared: &[f32], hop_size_synthesis: usize) {
    let cola = window_squared.iter().sum::<f32>() / hop_size_synthesis as f32;
    let peak = samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    let denominator = cola.max(peak);
    if denominator > 0.0 {
        for x in samples {
            *x /= denominator;
        }
    }
}

/// Match the synthesized frame's RMS to the double-windowed input frame's.
fn rms_normalize(frame_in: &[f32], frame_out: &mut [f32], window_squared: &[f32]) {
    let windowed: Vec<f32> =
        frame_in.iter().zip(window_squared).map(|(&x, &w)| x * w).collect();
    let rms_in = rms(&windowed);
    let rms_out = rms(frame_out);
    if rms_out > 0.0 {
        let gain = (rms_in / rms_out) as f32;
        for x in frame_out {
            *x *= gain;
        }
    }
}
