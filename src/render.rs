//! Batch rendering of configurations over one track

use std::time::Instant;

use crate::config::{RenderConfig, TransformMode};
use crate::error::VocoderError;
use crate::eval;
use crate::ola;
use crate::track::{Track, TrackInfo};

/// One finished rendering together with its timing and evaluation numbers.
#[derive(Debug, Clone)]
pub struct Rendering {
    pub key: String,
    pub samples: Vec<f32>,
    pub processing_seconds: f64,
    /// Processing time divided by the rendered duration; below 1.0 means
    /// faster than playback.
    pub realtime_ratio: f64,
    pub root_mean_squared_deviation: f64,
}

/// Render every configuration over the track and evaluate each result
/// against the track's reference.
pub fn render_track(
    track: &Track,
    configs: &[RenderConfig],
) -> Result<Vec<Rendering>, VocoderError> {
    log::info!("processing track: {}", track.name);
    let mut renderings = Vec::with_capacity(configs.len());
    for config in configs {
        let key = config.config_key();
        log::info!(
            "rendering {key}, pitch shift: {} semitones",
            config.half_tone_steps_to_shift
        );
        let info = TrackInfo::from_config(track.sample_rate, config)?;

        let start = Instant::now();
        let samples = match config.mode {
            TransformMode::PitchShift => {
                ola::pitch_shift(&track.base, track.sample_rate, config)?
            }
            TransformMode::TimeStretch => {
                ola::time_stretch(&track.base, track.sample_rate, config)?
            }
        };
        let processing_seconds = start.elapsed().as_secs_f64();
        let rendered_seconds = samples.len() as f64 / track.sample_rate as f64;
        let realtime_ratio = processing_seconds / rendered_seconds;

        let root_mean_squared_deviation = eval::evaluate(&info, &track.reference, &samples)?;
        log::info!(
            "{key}: rmsd {root_mean_squared_deviation:.6}, \
             {processing_seconds:.2}s ({realtime_ratio:.2}x realtime)"
        );

        renderings.push(Rendering {
            key,
            samples,
            processing_seconds,
            realtime_ratio,
            root_mean_squared_deviation,
        });
    }
    Ok(renderings)
}
