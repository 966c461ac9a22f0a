//! Phase-vocoder pitch shifting and time stretching.
//!
//! The pipeline cuts a signal into overlapped windowed frames, transforms
//! each frame into the frequency domain, rebuilds a coherent synthesis phase
//! with one of five interchangeable phase-propagation algorithms, and
//! overlap-adds the resynthesized frames. Pitch shifting is time stretching
//! followed by a per-frame linear resample back to the original duration.
//!
//! ```
//! use phasewarp::{RenderConfig, pitch_shift};
//!
//! let samples: Vec<f32> = (0..44_100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
//!     .collect();
//! let config = RenderConfig { half_tone_steps_to_shift: 5, ..Default::default() };
//! let shifted = pitch_shift(&samples, 44_100, &config).unwrap();
//! assert_eq!(shifted.len(), samples.len());
//! ```
//!
//! Transient-aware configurations add a per-frame detector and a phase-reset
//! policy that lets attacks through unsmeared; see [`RenderConfig`].

pub mod config;
pub mod detect;
pub mod error;
pub mod eval;
pub mod fft;
pub mod ola;
pub mod render;
pub mod resample;
pub mod shifter;
pub mod source;
pub mod track;
pub mod transform;
pub mod utils;
pub mod window;

#[cfg(feature = "wav")]
pub mod fileio;

pub use config::{
    PhaseResetMode, RenderConfig, ShifterKind, TransformMode, TransientDetectionMode,
    WindowType,
};
pub use error::VocoderError;
pub use eval::evaluate;
pub use ola::{OverlapAdd, pitch_shift, time_stretch};
pub use render::{Rendering, render_track};
pub use shifter::PhaseShifter;
pub use track::{Track, TrackInfo};
