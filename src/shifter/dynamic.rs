//! Heap-driven phase propagation ("Phase Vocoder Done Right")

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use microfft::Complex32;

use crate::config::{PhaseResetMode, TransientDetectionMode};
use crate::error::VocoderError;
use crate::track::TrackInfo;
use crate::utils::math::princarg;

use super::{FrameScope, PhaseShifter, ShifterCore, is_silent, spectrum_magnitudes,
            spectrum_phases};

/// One heap entry of the priority sweep.
///
/// `time_index < 0` marks an entry seeded from the previous frame (pending
/// horizontal integration); `0` marks a bin of the current frame spreading
/// its rotation vertically. Ordering is by magnitude with the bin index as a
/// deterministic tie-break.
#[derive(Debug, Clone, Copy)]
struct HeapBin {
    magnitude: f64,
    bin: usize,
    time_index: i8,
    phase_rotation: f64,
}

impl PartialEq for HeapBin {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapBin {}

impl PartialOrd for HeapBin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapBin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.magnitude
            .total_cmp(&other.magnitude)
            .then_with(|| other.bin.cmp(&self.bin))
    }
}

/// Spreads phase coherence outward from spectral peaks.
///
/// Significant bins (above a floor relative to the running maximum
/// magnitude) are processed in descending magnitude order: the loudest
/// pending bin integrates its own phase horizontally (trapezoidal rule over
/// the previous and current phase delta), then propagates its rotation
/// vertically to pending neighbours. Insignificant bins fall back to basic
/// propagation.
pub struct DynamicPhaseShifter {
    core: ShifterCore,
    magnitude_min_factor: f64,
    max_magnitude: f64,
    magnitude_prev: Vec<f64>,
    phase_delta_prev: Vec<f64>,
}

impl DynamicPhaseShifter {
    pub fn new(
        info: &TrackInfo,
        detection: TransientDetectionMode,
        reset: PhaseResetMode,
        magnitude_min_factor: f64,
    ) -> Result<Self, VocoderError> {
        if !(magnitude_min_factor > 0.0 && magnitude_min_factor < 1.0) {
            return Err(VocoderError::InvalidConfig(
                "magnitude_min_factor must lie in (0, 1)",
            ));
        }
        let nyquist = info.frame_size_nyquist;
        Ok(Self {
            core: ShifterCore::new(info, detection, reset)?,
            magnitude_min_factor,
            max_magnitude: 0.0,
            magnitude_prev: vec![0.0; nyquist],
            phase_delta_prev: vec![0.0; nyquist],
        })
    }
}

impl PhaseShifter for DynamicPhaseShifter {
    fn process(&mut self, spectrum: &[Complex32]) -> Result<&[f64], VocoderError> {
        self.core.check_spectrum(spectrum)?;
        let magnitude = spectrum_magnitudes(spectrum);
        let phase = spectrum_phases(spectrum);
        if is_silent(&magnitude) {
            self.core.phase_analysis_prev.copy_from_slice(&phase);
            return Ok(&self.core.phase_synthesis);
        }

        let ratio = self.core.info.time_stretch_ratio;
        let phase_delta: Vec<f64> = (0..self.core.nyquist())
            .map(|k| {
                let delta = self.core.phase_delta_target[k]
                    + princarg(
                        phase[k]
                            - self.core.phase_analysis_prev[k]
                            - self.core.phase_delta_target[k],
                    );
                delta * ratio
            })
            .collect();

        match self.core.frame_scope(&magnitude, &phase) {
            FrameScope::Bypass => {}
            FrameScope::Propagate(range) => {
                self.max_magnitude =
                    magnitude.iter().cloned().fold(self.max_magnitude, f64::max);
                let min_magnitude = self.magnitude_min_factor * self.max_magnitude;

                let mut pending = vec![false; self.core.nyquist()];
                let mut pending_count = 0usize;
                let mut heap = BinaryHeap::new();
                for k in range {
                    if magnitude[k] > min_magnitude {
                        pending[k] = true;
                        pending_count += 1;
                        heap.push(HeapBin {
                            magnitude: self.magnitude_prev[k],
                            bin: k,
                            time_index: -1,
                            phase_rotation: 0.0,
                        });
                    } else {
                        self.core.phase_synthesis[k] += phase_delta[k];
                    }
                }

                while pending_count > 0 {
                    let Some(entry) = heap.pop() else {
                        return Err(VocoderError::InvariantViolation(
                            "propagation heap drained with bins still pending",
                        ));
                    };
                    if entry.time_index < 0 {
                        // stale entries for already-settled bins are skipped
                        if !pending[entry.bin] {
                            continue;
                        }
                        let k = entry.bin;
                        self.core.phase_synthesis[k] +=
                            (self.phase_delta_prev[k] + phase_delta[k]) / 2.0;
                        let rotation =
                            princarg(self.core.phase_synthesis[k] - phase[k]);
                        heap.push(HeapBin {
                            magnitude: magnitude[k],
                            bin: k,
                            time_index: 0,
                            phase_rotation: rotation,
                        });
                        pending[k] = false;
                        pending_count -= 1;
                    } else {
                        for neighbour in [entry.bin.wrapping_sub(1), entry.bin + 1] {
                            if neighbour < pending.len() && pending[neighbour] {
                                self.core.phase_synthesis[neighbour] =
                                    phase[neighbour] + entry.phase_rotation;
                                heap.push(HeapBin {
                                    magnitude: magnitude[neighbour],
                                    bin: neighbour,
                                    time_index: 0,
                                    phase_rotation: entry.phase_rotation,
                                });
                                pending[neighbour] = false;
                                pending_count -= 1;
                            }
                        }
                    }
                }
            }
        }

        self.core.finish_frame(&phase);
        self.phase_delta_prev = phase_delta;
        self.magnitude_prev = magnitude;
        Ok(&self.core.phase_synthesis)
    }
}
