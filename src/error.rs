//! Error types for the phase vocoder pipeline

/// Errors surfaced by configuration, setup and processing.
///
/// Per-frame numerical degeneracies (silent frames, all-zero spectra) are
/// recovered locally inside the phase shifters and never reach this type.
#[derive(Debug)]
pub enum VocoderError {
    /// Configuration rejected before any allocation or processing
    InvalidConfig(&'static str),
    /// No FFT kernel available for the requested transform length
    UnsupportedFrameSize(usize),
    /// Internal state violated an invariant; processing of the track halts
    InvariantViolation(&'static str),
    /// Audio input could not be read or has an unsupported format
    #[cfg(feature = "wav")]
    Input(hound::Error),
}

impl core::fmt::Display for VocoderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            VocoderError::InvalidConfig(reason) => {
                write!(f, "invalid configuration: {reason}")
            }
            VocoderError::UnsupportedFrameSize(size) => {
                write!(f, "unsupported transform length: {size}")
            }
            VocoderError::InvariantViolation(reason) => {
                write!(f, "internal invariant violated: {reason}")
            }
            #[cfg(feature = "wav")]
            VocoderError::Input(err) => write!(f, "audio input error: {err}"),
        }
    }
}

impl std::error::Error for VocoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "wav")]
            VocoderError::Input(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "wav")]
impl From<hound::Error> for VocoderError {
    fn from(err: hound::Error) -> Self {
        VocoderError::Input(err)
    }
}
