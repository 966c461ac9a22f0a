//! Per-frame transient detection over magnitude spectra

use crate::config::TransientDetectionMode;
use crate::utils::stats::{AvgQueue, MovingMedian};

/// Probability above which a frame may be flagged as a transient.
pub const TRANSIENT_PROBABILITY_THRESHOLD: f64 = 0.35;

/// Window of the rolling filters feeding both detectors.
const FILTER_WINDOW: usize = 19;

/// Amplitude ratio equivalent to a 3 dB rise (`10^(3/20)`).
const MAGNITUDE_RATIO_3DB: f64 = 1.4125375446227544;

/// Bins quieter than this fraction of the rolling peak average are treated
/// as silent by the percussive detector.
const ZERO_THRESHOLD_FACTOR: f64 = 1e-5;

/// Frame-synchronous transient detector.
///
/// Both detectors return a probability in [0, 1]; a transient fires only when
/// the probability exceeds the threshold *and* strictly grew since the
/// previous frame, so a sustained loud passage triggers at most once.
#[derive(Debug, Clone)]
pub struct TransientDetector {
    mode: TransientDetectionMode,
    probability_prev: f64,
    // percussive state
    magnitude_prev: Vec<f64>,
    peak_average: AvgQueue,
    // high-frequency state
    weighted_sum_filter: MovingMedian,
    weighted_deriv_filter: MovingMedian,
    weighted_sum_last: f64,
    deriv_delta_last: f64,
    rising_count: u32,
}

impl TransientDetector {
    pub fn new(mode: TransientDetectionMode, frame_size_nyquist: usize) -> Self {
        Self {
            mode,
            probability_prev: 0.0,
            magnitude_prev: vec![0.0; frame_size_nyquist],
            peak_average: AvgQueue::new(FILTER_WINDOW),
            weighted_sum_filter: MovingMedian::new(FILTER_WINDOW, 85.0),
            weighted_deriv_filter: MovingMedian::new(FILTER_WINDOW, 90.0),
            weighted_sum_last: 0.0,
            deriv_delta_last: 0.0,
            rising_count: 0,
        }
    }

    pub fn mode(&self) -> TransientDetectionMode {
        self.mode
    }

    /// Transient probability of this frame under the configured mode.
    pub fn probability(&mut self, magnitude: &[f64]) -> f64 {
        match self.mode {
            TransientDetectionMode::None => 0.0,
            TransientDetectionMode::Percussive => self.percussive(magnitude),
            TransientDetectionMode::HighFreq => self.high_frequency(magnitude),
            TransientDetectionMode::Compound => {
                let percussive = self.percussive(magnitude);
                let high_freq = self.high_frequency(magnitude);
                percussive.max(high_freq)
            }
        }
    }

    /// Whether this frame starts a transient. Updates all rolling state.
    pub fn has_transient(&mut self, magnitude: &[f64]) -> bool {
        if self.mode == TransientDetectionMode::None {
            return false;
        }
        let probability = self.probability(magnitude);
        let fired = probability > self.probability_prev
            && probability > TRANSIENT_PROBABILITY_THRESHOLD;
        self.probability_prev = probability;
        fired
    }

    /// Ratio of bins rising by 3 dB or more among all significant bins.
    ///
    /// A transient shows up as many simultaneous broadband magnitude jumps;
    /// bins coming up from silence count as a 3 dB event.
    fn percussive(&mut self, magnitude: &[f64]) -> f64 {
        let frame_peak = magnitude.iter().cloned().fold(0.0f64, f64::max);
        self.peak_average.push_pop(frame_peak);
        let zero_threshold = ZERO_THRESHOLD_FACTOR * self.peak_average.average();

        let mut rising = 0usize;
        let mut significant = 0usize;
        for (n, &current) in magnitude.iter().enumerate() {
            let increase_ratio = if self.magnitude_prev[n] > zero_threshold {
                current / self.magnitude_prev[n]
            } else if current > zero_threshold {
                MAGNITUDE_RATIO_3DB
            } else {
                0.0
            };
            if increase_ratio >= MAGNITUDE_RATIO_3DB {
                rising += 1;
            }
            if current > zero_threshold {
                significant += 1;
            }
        }
        self.magnitude_prev.copy_from_slice(magnitude);

        if significant == 0 {
            return 0.0;
        }
        rising as f64 / significant as f64
    }

    /// Shoulder detector for high-frequency energy bursts.
    ///
    /// Tracks the center-frequency-weighted magnitude sum against its rolling
    /// 85th percentile and the sum's first difference against its rolling
    /// 90th percentile. While the excess gradient keeps growing we are on the
    /// rising slope; the first non-growing frame after at least four growing
    /// ones marks the transient.
    fn high_frequency(&mut self, magnitude: &[f64]) -> f64 {
        let mut weighted_sum = 0.0f64;
        for (n, &m) in magnitude.iter().enumerate() {
            weighted_sum += m * n as f64;
        }
        let deriv = weighted_sum - self.weighted_sum_last;
        self.weighted_sum_filter.put(weighted_sum);
        self.weighted_deriv_filter.put(deriv);
        let sum_filtered = self.weighted_sum_filter.get();
        let deriv_filtered = self.weighted_deriv_filter.get();
        self.weighted_sum_last = weighted_sum;

        let deriv_delta = if weighted_sum - sum_filtered > 0.0 {
            deriv - deriv_filtered
        } else {
            0.0
        };

        let mut probability = 0.0;
        if deriv_delta < self.deriv_delta_last {
            if self.rising_count > 3 && self.deriv_delta_last > 0.0 {
                probability = 0.5;
            }
            self.rising_count = 0;
        } else {
            self.rising_count += 1;
        }
        self.deriv_delta_last = deriv_delta;
        probability
    }
}
