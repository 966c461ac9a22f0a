//! WAV input and output and the rendered-track directory layout

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::VocoderError;
use crate::render::Rendering;
use crate::track::Track;

/// Read a WAV file as mono 32-bit float samples.
///
/// Integer input is scaled to [−1, 1]; multi-channel input is averaged down
/// to one channel.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), VocoderError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            reader.samples::<f32>().collect::<Result<_, _>>()?
        }
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    if channels <= 1 {
        return Ok((samples, spec.sample_rate));
    }
    let mono: Vec<f32> = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Write mono samples as 24-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), VocoderError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let scale = ((1i32 << 23) - 1) as f32;
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * scale) as i32;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Persist a track and its renderings under the contractual layout:
///
/// ```text
/// <out_root>/<track_name>_<shift>/
///   base_<shift>.wav
///   reference_<shift>.wav
///   <config_key>_<shift>.wav
/// ```
///
/// Returns the track's output directory.
pub fn write_track(
    out_root: &Path,
    track: &Track,
    half_tone_steps_to_shift: i32,
    renderings: &[Rendering],
) -> Result<PathBuf, VocoderError> {
    let folder = out_root.join(track.folder_name(half_tone_steps_to_shift));
    fs::create_dir_all(&folder)
        .map_err(|err| VocoderError::Input(hound::Error::IoError(err)))?;

    let shift = half_tone_steps_to_shift;
    write_wav(
        &folder.join(track.file_name("base", shift, "wav")),
        &track.base,
        track.sample_rate,
    )?;
    write_wav(
        &folder.join(track.file_name("reference", shift, "wav")),
        &track.reference,
        track.sample_rate,
    )?;
    for rendering in renderings {
        write_wav(
            &folder.join(track.file_name(&rendering.key, shift, "wav")),
            &rendering.samples,
            track.sample_rate,
        )?;
    }
    Ok(folder)
}
