// Tempo Module - Beat sources feeding pulses to the active animation
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A beat fired by a tempo source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beat {
    /// Seconds since the driver started
    pub time: f64,
    /// Tempo at the time of the beat, when the source knows it
    pub bpm: Option<f64>,
}

/// Anything that can tell the driver a beat happened.
pub trait BeatSource: Send {
    /// Called once per tick with the current time; returns at most one beat.
    fn poll(&mut self, t: f64) -> Option<Beat>;
}

/// Parameters of the simulated clock: `bpm = base + swing * sin(t / period)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSettings {
    pub base_bpm: f64,
    pub swing_bpm: f64,
    pub period: f64,
    /// Two half-beats out of every five
    pub syncopation: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        ClockSettings {
            base_bpm: 120.0,
            swing_bpm: 30.0,
            period: 40.0,
            syncopation: true,
        }
    }
}

/// Simulated beat clock with a slowly drifting tempo, for testing without audio.
pub struct SimulatedClock {
    settings: ClockSettings,
    next_beat: f64,
    num_beats: u64,
}

impl SimulatedClock {
    pub fn new(settings: ClockSettings) -> Self {
        SimulatedClock {
            settings,
            next_beat: 0.0,
            num_beats: 0,
        }
    }

    pub fn bpm_at(&self, t: f64) -> f64 {
        self.settings.base_bpm + self.settings.swing_bpm * (t / self.settings.period).sin()
    }

    pub fn next_beat(&self) -> f64 {
        self.next_beat
    }

    pub fn num_beats(&self) -> u64 {
        self.num_beats
    }
}

impl BeatSource for SimulatedClock {
    fn poll(&mut self, t: f64) -> Option<Beat> {
        if t <= self.next_beat {
            return None;
        }

        let bpm = self.bpm_at(t);
        let secs_per_beat = 60.0 / bpm.max(1.0);
        self.next_beat = if self.settings.syncopation && self.num_beats % 5 < 2 {
            t + secs_per_beat / 2.0
        } else {
            t + secs_per_beat
        };
        self.num_beats += 1;

        Some(Beat {
            time: t,
            bpm: Some(bpm),
        })
    }
}

/// Lock-free hand-off of beat timestamps from the audio thread.
///
/// The audio callback only ever stores a timestamp and raises a flag; the
/// driver takes it on its next tick. Beats arriving between two ticks
/// collapse into the latest one.
#[derive(Debug, Default)]
pub struct PulseSignal {
    pending: AtomicBool,
    time_bits: AtomicU64,
    level_bits: AtomicU64,
    silent: AtomicBool,
}

impl PulseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, t: f64) {
        self.time_bits.store(t.to_bits(), Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    pub fn take(&self) -> Option<f64> {
        if self.pending.swap(false, Ordering::Acquire) {
            Some(f64::from_bits(self.time_bits.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Latest detector score, for display.
    pub fn set_level(&self, score: f64) {
        self.level_bits.store(score.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f64 {
        f64::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Whether the last analysed block was all zeros.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::Relaxed);
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }
}

/// Beats detected from live audio, delivered through a [`PulseSignal`].
pub struct AudioBeats {
    signal: Arc<PulseSignal>,
}

impl AudioBeats {
    pub fn new(signal: Arc<PulseSignal>) -> Self {
        AudioBeats { signal }
    }
}

impl BeatSource for AudioBeats {
    fn poll(&mut self, _t: f64) -> Option<Beat> {
        self.signal.take().map(|time| Beat { time, bpm: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_poll_after_start_fires() {
        let mut clock = SimulatedClock::new(ClockSettings::default());
        assert!(clock.poll(0.0).is_none());
        let beat = clock.poll(0.01).unwrap();
        assert_eq!(beat.time, 0.01);
        assert!(clock.poll(0.02).is_none());
    }

    #[test]
    fn test_syncopated_spacing() {
        let settings = ClockSettings {
            swing_bpm: 0.0,
            ..Default::default()
        };
        let mut clock = SimulatedClock::new(settings);
        let mut t = 1.0;
        let mut gaps = Vec::new();
        for _ in 0..10 {
            clock.poll(t).unwrap();
            gaps.push(clock.next_beat() - t);
            t = clock.next_beat() + 1e-9;
        }
        // 120 bpm: half-beats of 0.25 s for beats 0 and 1 of every 5
        for (i, gap) in gaps.iter().enumerate() {
            let expected = if i % 5 < 2 { 0.25 } else { 0.5 };
            assert_relative_eq!(*gap, expected, epsilon = 1e-6);
        }
        assert_eq!(clock.num_beats(), 10);
    }

    #[test]
    fn test_tempo_drifts() {
        let clock = SimulatedClock::new(ClockSettings::default());
        assert_relative_eq!(clock.bpm_at(0.0), 120.0);
        assert_relative_eq!(clock.bpm_at(40.0 * std::f64::consts::FRAC_PI_2), 150.0);
    }

    #[test]
    fn test_pulse_signal_hand_off() {
        let signal = Arc::new(PulseSignal::new());
        let mut beats = AudioBeats::new(signal.clone());
        assert!(beats.poll(0.0).is_none());
        signal.raise(1.5);
        signal.raise(1.75);
        assert_eq!(beats.poll(2.0), Some(Beat { time: 1.75, bpm: None }));
        assert!(beats.poll(2.1).is_none());
    }

    #[test]
    fn test_pulse_signal_silence_flag() {
        let signal = PulseSignal::new();
        assert!(!signal.is_silent());
        signal.set_silent(true);
        assert!(signal.is_silent());
        assert!(signal.take().is_none());
        signal.set_silent(false);
        assert!(!signal.is_silent());
    }
}
