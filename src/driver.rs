// Driver Module - Fixed-rate tick loop tying beats, animations and outputs together
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::animations::{random_animation, Animation, AnimationKind, AnimationSettings};
use crate::error::EngineError;
use crate::renderer::{Frame, FrameSink};
use crate::structure::Structure;
use crate::tempo::{Beat, BeatSource};

/// Which animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A random show animation, replaced every few beats
    Random,
    /// Always the same animation
    Fixed(AnimationKind),
}

impl Selection {
    pub fn from_name(name: &str) -> std::result::Result<Self, EngineError> {
        if name.trim().eq_ignore_ascii_case("random") {
            Ok(Selection::Random)
        } else {
            AnimationKind::from_name(name).map(Selection::Fixed)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub update_rate: f64,
    pub switch_every_beats: u64,
    pub selection: Selection,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            update_rate: crate::animations::UPDATE_RATE,
            switch_every_beats: 20,
            selection: Selection::Random,
        }
    }
}

/// Owns the structure and the active animation; the only writer of the pixels.
pub struct Driver {
    structure: Structure,
    animation_settings: AnimationSettings,
    settings: DriverSettings,
    animation: Box<dyn Animation>,
    beats: Box<dyn BeatSource>,
    sinks: Vec<Box<dyn FrameSink>>,
    rng: StdRng,
    num_beats: u64,
}

impl Driver {
    pub fn new(
        structure: Structure,
        animation_settings: AnimationSettings,
        settings: DriverSettings,
        beats: Box<dyn BeatSource>,
        mut rng: StdRng,
    ) -> Result<Self> {
        if !structure.is_finalized() {
            return Err(EngineError::NotFinalized.into());
        }
        animation_settings.validate()?;

        let animation = match settings.selection {
            Selection::Random => random_animation(&structure, &animation_settings, &mut rng),
            Selection::Fixed(kind) => {
                kind.build(&structure, &animation_settings, StdRng::seed_from_u64(rng.gen()))
            }
        };
        log::info!("Animation: {}", animation.name());

        Ok(Driver {
            structure,
            animation_settings,
            settings,
            animation,
            beats,
            sinks: Vec::new(),
            rng,
            num_beats: 0,
        })
    }

    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        log::info!("Output: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn animation_name(&self) -> &'static str {
        self.animation.name()
    }

    pub fn num_beats(&self) -> u64 {
        self.num_beats
    }

    /// One tick at time `t`: deliver a pending beat, recompute the pixels,
    /// hand a snapshot to every output.
    pub fn tick(&mut self, t: f64) -> Result<Option<Beat>> {
        let beat = self.beats.poll(t);
        if let Some(beat) = beat {
            self.animation.pulse(beat.time, &mut self.structure)?;
            match beat.bpm {
                Some(bpm) => log::debug!("pulse #{} tempo={:.1} t={:.1}", self.num_beats, bpm, beat.time),
                None => log::debug!("pulse #{} t={:.1}", self.num_beats, beat.time),
            }
            self.num_beats += 1;
        }

        self.animation.update(t, &mut self.structure)?;

        let frame = Frame::capture(&self.structure, t, beat.is_some())?;
        for sink in &mut self.sinks {
            sink.present(&frame)?;
        }

        if beat.is_some() && self.should_switch() {
            self.animation =
                random_animation(&self.structure, &self.animation_settings, &mut self.rng);
            log::info!("Animation: {}", self.animation.name());
        }

        Ok(beat)
    }

    fn should_switch(&self) -> bool {
        self.settings.selection == Selection::Random
            && self.num_beats % self.settings.switch_every_beats.max(1) == 0
    }

    /// Tick at the configured rate until `shutdown` is raised. Times are
    /// seconds since `start`, the same origin the beat source uses.
    pub fn run(&mut self, start: Instant, shutdown: &AtomicBool) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.update_rate.max(1.0));
        let mut next_frame = Instant::now();

        let result = loop {
            if shutdown.load(Ordering::Relaxed) {
                break Ok(());
            }

            if let Err(e) = self.tick(start.elapsed().as_secs_f64()) {
                break Err(e);
            }

            next_frame += frame_duration;
            let now = Instant::now();
            if next_frame > now {
                thread::sleep(next_frame - now);
            } else {
                // Fell behind, don't try to catch up
                next_frame = now;
            }
        };

        for sink in &mut self.sinks {
            if let Err(e) = sink.shutdown() {
                log::warn!("Failed to shut down {}: {:#}", sink.name(), e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{cube, CubeLayout};
    use std::sync::{Arc, Mutex};

    /// Fires a beat on every listed tick index.
    struct ScriptedBeats {
        ticks: Vec<usize>,
        count: usize,
    }

    impl BeatSource for ScriptedBeats {
        fn poll(&mut self, t: f64) -> Option<Beat> {
            let tick = self.count;
            self.count += 1;
            self.ticks.contains(&tick).then_some(Beat { time: t, bpm: None })
        }
    }

    struct Recorder(Arc<Mutex<Vec<Frame>>>);

    impl FrameSink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn present(&mut self, frame: &Frame) -> Result<()> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    fn driver(selection: Selection, ticks: Vec<usize>, switch_every_beats: u64) -> Driver {
        let structure = cube(&CubeLayout { leds_per_edge: 5, ..Default::default() }).unwrap();
        Driver::new(
            structure,
            AnimationSettings::default(),
            DriverSettings {
                selection,
                switch_every_beats,
                ..Default::default()
            },
            Box::new(ScriptedBeats { ticks, count: 0 }),
            StdRng::seed_from_u64(42),
        )
        .unwrap()
    }

    #[test]
    fn test_selection_from_name() {
        assert_eq!(Selection::from_name(" Random"), Ok(Selection::Random));
        assert_eq!(
            Selection::from_name("strobe"),
            Ok(Selection::Fixed(AnimationKind::BasicStrobe))
        );
        assert!(Selection::from_name("nope").is_err());
    }

    #[test]
    fn test_rejects_unfinalized_structure() {
        let result = Driver::new(
            Structure::new(),
            AnimationSettings::default(),
            DriverSettings::default(),
            Box::new(ScriptedBeats { ticks: vec![], count: 0 }),
            StdRng::seed_from_u64(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_beat_pulses_animation_and_reaches_sinks() {
        let mut d = driver(Selection::Fixed(AnimationKind::BasicStrobe), vec![1], 20);
        let frames = Arc::new(Mutex::new(Vec::new()));
        d.add_sink(Box::new(Recorder(frames.clone())));

        assert!(d.tick(10.0).unwrap().is_none());
        assert!(d.tick(10.1).unwrap().is_some());
        d.tick(10.2).unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[1].beat);
        // Long after the default pulse time: dark
        assert!(frames[0].pixels[0].x < 1e-6);
        assert_eq!(frames[1].pixels[0].x, 1.0);
        assert!(frames[2].pixels[0].x < 1.0);
        assert_eq!(d.num_beats(), 1);
    }

    #[test]
    fn test_random_selection_switches_every_n_beats() {
        let mut d = driver(Selection::Random, (0..200).collect(), 2);
        let mut names = std::collections::HashSet::new();
        for i in 0..200 {
            d.tick(i as f64 * 0.1).unwrap();
            names.insert(d.animation_name());
        }
        assert!(names.len() > 1);
        assert!(!names.contains("test_sequence"));
    }

    #[test]
    fn test_fixed_selection_never_switches() {
        let mut d = driver(Selection::Fixed(AnimationKind::TestSequence), (0..50).collect(), 1);
        for i in 0..50 {
            d.tick(i as f64 * 0.1).unwrap();
            assert_eq!(d.animation_name(), "test_sequence");
        }
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let mut d = driver(Selection::Random, vec![], 20);
        let shutdown = AtomicBool::new(true);
        d.run(Instant::now(), &shutdown).unwrap();
    }
}
