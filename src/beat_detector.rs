// Beat Detector Module - Onset detection from low-frequency spectral energy
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Parameters of the energy detector, mostly as exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub block_duration_ms: f64,
    pub low_hz: f64,
    pub high_hz: f64,
    /// Width of the spectrum display, also sets the frequency resolution
    pub columns: usize,
    /// Number of lowest FFT bins summed into the energy statistic
    pub max_bin: usize,
    /// Smoothing factor of the moving statistics
    pub gamma: f64,
    pub threshold_offset: f64,
    /// Minimum time between two beats, 0 disables the limit
    pub refractory_ms: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        DetectorSettings {
            block_duration_ms: 50.0,
            low_hz: 100.0,
            high_hz: 2000.0,
            columns: 80,
            max_bin: 7,
            gamma: 0.995,
            threshold_offset: 0.5,
            refractory_ms: 0.0,
        }
    }
}

impl DetectorSettings {
    /// FFT length giving one display column per `(high - low) / (columns - 1)` Hz.
    pub fn fft_size(&self, sample_rate: f64) -> usize {
        let delta_f = (self.high_hz - self.low_hz) / (self.columns.max(2) - 1) as f64;
        ((sample_rate / delta_f).ceil() as usize).max(self.max_bin.max(1))
    }

    /// Samples per analysed block.
    pub fn block_size(&self, sample_rate: f64) -> usize {
        ((sample_rate * self.block_duration_ms / 1000.0) as usize).max(1)
    }

    /// First FFT bin of the displayed range.
    pub fn low_bin(&self) -> usize {
        let delta_f = (self.high_hz - self.low_hz) / (self.columns.max(2) - 1) as f64;
        (self.low_hz / delta_f).floor() as usize
    }
}

/// Exponential moving mean of a value and of its square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingStats {
    pub avg: f64,
    pub var: f64,
    gamma: f64,
}

impl MovingStats {
    pub fn new(gamma: f64) -> Self {
        MovingStats {
            avg: 0.0,
            var: 1.0,
            gamma,
        }
    }

    pub fn update(&mut self, x: f64) {
        self.avg = self.gamma * self.avg + (1.0 - self.gamma) * x;
        self.var = self.gamma * self.var + (1.0 - self.gamma) * x * x;
    }

    pub fn std(&self) -> f64 {
        self.var.max(f64::EPSILON).sqrt()
    }
}

/// Result of analysing one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub energy: f64,
    /// Normalized deviation minus the offset; positive means a beat
    pub score: f64,
    pub is_beat: bool,
    /// False for an all-zero block, which leaves the statistics untouched
    pub has_input: bool,
}

/// Fires when the energy of the lowest bins rises well above its rolling mean.
///
/// All buffers are allocated up front so [`EnergyBeatDetector::process_block`]
/// can run inside an audio callback.
pub struct EnergyBeatDetector {
    settings: DetectorSettings,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    stats: MovingStats,
    last_beat: Option<f64>,
}

impl EnergyBeatDetector {
    pub fn new(settings: DetectorSettings, fft_size: usize) -> Self {
        let fft_size = fft_size.max(1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        EnergyBeatDetector {
            settings,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            magnitudes: vec![0.0; fft_size / 2 + 1],
            stats: MovingStats::new(settings.gamma),
            last_beat: None,
        }
    }

    pub fn for_sample_rate(settings: DetectorSettings, sample_rate: f64) -> Self {
        Self::new(settings, settings.fft_size(sample_rate))
    }

    pub fn fft_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> MovingStats {
        self.stats
    }

    /// Magnitude spectrum of the last processed block (non-negative bins).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Analyse one block of mono samples captured at time `t` (seconds).
    ///
    /// The block is zero-padded or truncated to the FFT length. Digital
    /// silence is skipped so the rolling statistics keep tracking the music.
    pub fn process_block(&mut self, samples: &[f32], t: f64) -> Detection {
        if samples.iter().all(|s| *s == 0.0) {
            self.magnitudes.fill(0.0);
            return Detection {
                energy: 0.0,
                score: 0.0,
                is_beat: false,
                has_input: false,
            };
        }

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(samples.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm();
        }

        // Weighted towards the fundamental
        let bins = self.settings.max_bin.min(self.magnitudes.len());
        let energy: f64 = self.magnitudes[..bins]
            .iter()
            .enumerate()
            .map(|(k, m)| *m as f64 / (1 + k) as f64)
            .sum();

        self.observe(energy, t)
    }

    /// Feed one energy value; the score uses the statistics from before this value.
    pub fn observe(&mut self, energy: f64, t: f64) -> Detection {
        let score = (energy - self.stats.avg) / self.stats.std() - self.settings.threshold_offset;
        self.stats.update(energy);

        let refractory = self.settings.refractory_ms / 1000.0;
        let rested = self
            .last_beat
            .map_or(true, |last| refractory <= 0.0 || t - last >= refractory);
        let is_beat = score > 0.0 && rested;
        if is_beat {
            self.last_beat = Some(t);
        }

        Detection {
            energy,
            score,
            is_beat,
            has_input: true,
        }
    }
}
