//! Track metadata and frame sizing

use crate::config::{RenderConfig, WindowType};
use crate::error::VocoderError;
use crate::fft;

/// Derived framing parameters for one track and one transformation.
///
/// All quantities are computed once by [`TrackInfo::new`] and are immutable
/// afterwards; changing any input requires building a fresh value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub half_tone_steps_to_shift: i32,
    pub hop_size_factor: usize,
    pub window_type: WindowType,
    pub zero_padding: bool,

    /// Analysis window length, `2^round(log2(sample_rate / 20))` (about 50 ms).
    pub frame_size: usize,
    /// FFT length, twice the frame size when zero padding is enabled.
    pub frame_size_padded: usize,
    /// Number of non-redundant spectrum bins, `frame_size_padded / 2 + 1`.
    pub frame_size_nyquist: usize,
    /// Length a synthesized frame is resampled to in pitch-shift mode.
    pub frame_size_resampling: usize,
    pub hop_size_analysis: usize,
    pub hop_size_synthesis: usize,
    pub pitch_shift_factor: f64,
    /// Effective stretch ratio, `hop_size_synthesis / hop_size_analysis`.
    pub time_stretch_ratio: f64,
}

impl TrackInfo {
    pub fn new(
        sample_rate: u32,
        half_tone_steps_to_shift: i32,
        hop_size_factor: usize,
        window_type: WindowType,
        zero_padding: bool,
    ) -> Result<Self, VocoderError> {
        if sample_rate == 0 {
            return Err(VocoderError::InvalidConfig("sample_rate must be positive"));
        }
        if hop_size_factor == 0 {
            return Err(VocoderError::InvalidConfig("hop_size_factor must be positive"));
        }

        let exponent = libm::round(libm::log2(sample_rate as f64 / 20.0));
        if exponent < 6.0 || exponent > 14.0 {
            return Err(VocoderError::InvalidConfig(
                "sample_rate outside the supported range",
            ));
        }
        let frame_size = 1usize << exponent as u32;
        let frame_size_padded = if zero_padding { frame_size * 2 } else { frame_size };
        if !fft::is_supported(frame_size_padded) {
            return Err(VocoderError::UnsupportedFrameSize(frame_size_padded));
        }

        if frame_size % hop_size_factor != 0 {
            return Err(VocoderError::InvalidConfig(
                "hop_size_factor must divide the frame size",
            ));
        }
        let hop_size_synthesis = frame_size / hop_size_factor;
        if hop_size_synthesis == 0 {
            return Err(VocoderError::InvalidConfig("hop_size_factor larger than frame"));
        }

        let pitch_shift_factor = libm::exp2(half_tone_steps_to_shift as f64 / 12.0);
        let hop_size_analysis = (hop_size_synthesis as f64 / pitch_shift_factor) as usize;
        if hop_size_analysis == 0 {
            return Err(VocoderError::InvalidConfig(
                "pitch shift too large for the analysis hop",
            ));
        }

        Ok(Self {
            sample_rate,
            half_tone_steps_to_shift,
            hop_size_factor,
            window_type,
            zero_padding,
            frame_size,
            frame_size_padded,
            frame_size_nyquist: frame_size_padded / 2 + 1,
            frame_size_resampling: frame_size * hop_size_analysis / hop_size_synthesis,
            hop_size_analysis,
            hop_size_synthesis,
            pitch_shift_factor,
            time_stretch_ratio: hop_size_synthesis as f64 / hop_size_analysis as f64,
        })
    }

    pub fn from_config(sample_rate: u32, config: &RenderConfig) -> Result<Self, VocoderError> {
        config.validate()?;
        Self::new(
            sample_rate,
            config.half_tone_steps_to_shift,
            config.hop_size_factor,
            config.window_type,
            config.zero_padding,
        )
    }
}

/// One piece of audio together with the reference rendering it is judged
/// against.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub sample_rate: u32,
    /// Mono samples to be transformed.
    pub base: Vec<f32>,
    /// Reference rendering of the same transformation, used by the evaluator.
    pub reference: Vec<f32>,
}

impl Track {
    /// Output directory name, `<track_name>_<shift>`.
    pub fn folder_name(&self, half_tone_steps_to_shift: i32) -> String {
        format!("{}_{}", self.name.replace(' ', "_"), half_tone_steps_to_shift)
    }

    /// Output file name, `<stem>_<shift>.<ext>`.
    pub fn file_name(&self, stem: &str, half_tone_steps_to_shift: i32, ext: &str) -> String {
        format!("{stem}_{half_tone_steps_to_shift}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cd_rate_sizing() {
        let info = TrackInfo::new(44_100, 5, 4, WindowType::Hann, false).unwrap();
        assert_eq!(info.frame_size, 2048);
        assert_eq!(info.frame_size_padded, 2048);
        assert_eq!(info.frame_size_nyquist, 1025);
        assert_eq!(info.hop_size_synthesis, 512);
        // 512 / 2^(5/12) = 383.58 truncated
        assert_eq!(info.hop_size_analysis, 383);
        assert_eq!(info.frame_size_resampling, 2048 * 383 / 512);
        assert_relative_eq!(info.time_stretch_ratio, 512.0 / 383.0, epsilon = 1e-12);
        assert_relative_eq!(info.pitch_shift_factor, libm::exp2(5.0 / 12.0), epsilon = 1e-12);
    }

    #[test]
    fn zero_padding_doubles_the_transform() {
        let info = TrackInfo::new(44_100, 0, 4, WindowType::Hann, true).unwrap();
        assert_eq!(info.frame_size, 2048);
        assert_eq!(info.frame_size_padded, 4096);
        assert_eq!(info.frame_size_nyquist, 2049);
    }

    #[test]
    fn zero_shift_keeps_hops_equal() {
        let info = TrackInfo::new(48_000, 0, 4, WindowType::Hamming, false).unwrap();
        assert_eq!(info.hop_size_analysis, info.hop_size_synthesis);
        assert_relative_eq!(info.time_stretch_ratio, 1.0);
    }

    #[test]
    fn low_sample_rates_pick_smaller_frames() {
        let info = TrackInfo::new(8_000, 0, 4, WindowType::Hann, false).unwrap();
        assert_eq!(info.frame_size, 512);
        let info = TrackInfo::new(22_050, 0, 4, WindowType::Hann, false).unwrap();
        assert_eq!(info.frame_size, 1024);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(TrackInfo::new(0, 0, 4, WindowType::Hann, false).is_err());
        assert!(TrackInfo::new(44_100, 0, 0, WindowType::Hann, false).is_err());
        // 3 does not divide 2048
        assert!(TrackInfo::new(44_100, 0, 3, WindowType::Hann, false).is_err());
    }

    #[test]
    fn track_names_follow_the_output_layout() {
        let track = Track {
            name: "my song".into(),
            sample_rate: 44_100,
            base: Vec::new(),
            reference: Vec::new(),
        };
        assert_eq!(track.folder_name(-5), "my_song_-5");
        assert_eq!(track.file_name("base", -5, "wav"), "base_-5.wav");
    }
}
