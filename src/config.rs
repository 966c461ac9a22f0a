//! Configuration types for the phase vocoder pipeline

use crate::error::VocoderError;

/// Analysis/synthesis window shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Hann,
    Hamming,
}

/// Whether the pipeline preserves duration (pitch shift) or scales it
/// (time stretch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformMode {
    #[default]
    PitchShift,
    TimeStretch,
}

/// Transient detector driving the phase-reset policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransientDetectionMode {
    #[default]
    None,
    Percussive,
    Compound,
    HighFreq,
}

/// Which bins bypass phase propagation when a transient fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseResetMode {
    #[default]
    FullRange,
    BandLimited,
}

/// The phase propagation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShifterKind {
    /// Per-bin phase unwrapping (DAFX ch. 7.3.5)
    #[default]
    Basic,
    /// Identity phase locking around magnitude peaks (Laroche & Dolson III.C.1)
    LockedIdentity,
    /// Scaled phase locking with cross-frame peak matching (Laroche & Dolson III.C.2)
    LockedScaled,
    /// Laminar bin-to-bin phase inheritance (Rubberband style)
    Laminar,
    /// Heap-driven propagation from spectral peaks ("Phase Vocoder Done Right")
    LockedDynamic,
}

/// One rendering configuration consumed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub mode: TransformMode,
    pub shifter: ShifterKind,
    pub window_type: WindowType,
    /// Window-overlap denominator; 4 means 75% overlap.
    pub hop_size_factor: usize,
    /// Per-frame RMS renormalization of the synthesized frame.
    pub normalize: bool,
    pub half_tone_steps_to_shift: i32,
    pub transient_detection: TransientDetectionMode,
    pub phase_reset: PhaseResetMode,
    /// Locking strength of the scaled shifter.
    pub scale_factor: f64,
    /// Significance floor of the dynamic shifter, relative to the running
    /// maximum magnitude.
    pub magnitude_min_factor: f64,
    /// Zero-pad each analysis frame to twice its length before the FFT.
    pub zero_padding: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: TransformMode::PitchShift,
            shifter: ShifterKind::Basic,
            window_type: WindowType::Hann,
            hop_size_factor: 4,
            normalize: false,
            half_tone_steps_to_shift: 0,
            transient_detection: TransientDetectionMode::None,
            phase_reset: PhaseResetMode::FullRange,
            scale_factor: 1.0,
            magnitude_min_factor: 1e-6,
            zero_padding: false,
        }
    }
}

impl RenderConfig {
    /// Check the option ranges that do not depend on the sample rate.
    pub fn validate(&self) -> Result<(), VocoderError> {
        if self.hop_size_factor == 0 {
            return Err(VocoderError::InvalidConfig("hop_size_factor must be positive"));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(VocoderError::InvalidConfig("scale_factor must be positive"));
        }
        if !(self.magnitude_min_factor > 0.0 && self.magnitude_min_factor < 1.0) {
            return Err(VocoderError::InvalidConfig(
                "magnitude_min_factor must lie in (0, 1)",
            ));
        }
        Ok(())
    }

    /// External identification key:
    /// `{ps|ts}-pv-<variant>[-t{p|c|h}-{full|limit}]`.
    pub fn config_key(&self) -> String {
        let mode = match self.mode {
            TransformMode::PitchShift => "ps",
            TransformMode::TimeStretch => "ts",
        };
        let variant = match self.shifter {
            ShifterKind::Basic => "base",
            ShifterKind::LockedIdentity => "lock-id",
            ShifterKind::LockedScaled => "lock-sc",
            ShifterKind::Laminar => "lam",
            ShifterKind::LockedDynamic => "lock-dyn",
        };
        let mut key = format!("{mode}-pv-{variant}");
        if self.transient_detection != TransientDetectionMode::None {
            let detection = match self.transient_detection {
                TransientDetectionMode::Percussive => "tp",
                TransientDetectionMode::Compound => "tc",
                TransientDetectionMode::HighFreq => "th",
                TransientDetectionMode::None => unreachable!(),
            };
            let reset = match self.phase_reset {
                PhaseResetMode::FullRange => "full",
                PhaseResetMode::BandLimited => "limit",
            };
            key.push_str(&format!("-{detection}-{reset}"));
        }
        key
    }
}
