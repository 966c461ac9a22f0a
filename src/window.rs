//! Analysis/synthesis window generation

use crate::config::WindowType;
use crate::utils::math::TWO_PI;

/// Build a periodic window of the given length.
///
/// Periodic (DFT-even) windows keep the overlap-add sum of squared windows
/// constant at the synthesis hop, which the OLA rescale relies on.
pub fn build(window_type: WindowType, size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| {
            let x = libm::cos(TWO_PI * n as f64 / size as f64);
            let w = match window_type {
                WindowType::Hann => 0.5 - 0.5 * x,
                WindowType::Hamming => 0.54 - 0.46 * x,
            };
            w as f32
        })
        .collect()
}

pub fn build_squared(window_type: WindowType, size: usize) -> Vec<f32> {
    let mut window = build(window_type, size);
    for w in &mut window {
        *w *= *w;
    }
    window
}
