//! Frame resampling for pitch-shift mode

use crate::track::TrackInfo;

/// Linear-interpolation resampler from `frame_size` to `frame_size_resampling`
/// samples (DAFX ch. 7.4.4, block-by-block approach).
///
/// Index and weight vectors are precomputed once per track; the source frame
/// is virtually extended by one trailing zero so the right neighbour of the
/// last position is always defined.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    index_left: Vec<usize>,
    weight_left: Vec<f32>,
    weight_right: Vec<f32>,
}

impl LinearResampler {
    pub fn new(info: &TrackInfo) -> Self {
        let step = info.frame_size as f64 / info.frame_size_resampling as f64;
        let mut index_left = Vec::with_capacity(info.frame_size_resampling);
        let mut weight_left = Vec::with_capacity(info.frame_size_resampling);
        let mut weight_right = Vec::with_capacity(info.frame_size_resampling);
        for i in 0..info.frame_size_resampling {
            let position = i as f64 * step;
            let left = libm::floor(position) as usize;
            let right_weight = (position - left as f64) as f32;
            index_left.push(left);
            weight_left.push(1.0 - right_weight);
            weight_right.push(right_weight);
        }
        Self { index_left, weight_left, weight_right }
    }

    pub fn output_len(&self) -> usize {
        self.index_left.len()
    }

    pub fn process(&self, frame: &[f32]) -> Vec<f32> {
        (0..self.index_left.len())
            .map(|i| {
                let left = self.index_left[i];
                let right = if left + 1 < frame.len() { frame[left + 1] } else { 0.0 };
                frame[left] * self.weight_left[i] + right * self.weight_right[i]
            })
            .collect()
    }
}
