// Calibration sequence - walks one lit LED through the wiring order
use glam::Vec3;
use rand::rngs::StdRng;

use super::{Animation, AnimationSettings};
use crate::error::Result;
use crate::structure::Structure;

/// Lights a single LED per tick, edge by edge in index order, then wraps.
///
/// Not beat-reactive and never picked at random. A tick is an `update` with
/// a later timestamp than the previous one, so repeated calls with the same
/// time redraw the same LED.
pub struct TestSequence {
    cursor: usize,
    last_tick: Option<f64>,
}

impl TestSequence {
    pub fn new(_structure: &Structure, _settings: &AnimationSettings, _rng: StdRng) -> Self {
        TestSequence {
            cursor: 0,
            last_tick: None,
        }
    }

    /// Flat index of the LED currently lit.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Animation for TestSequence {
    fn name(&self) -> &'static str {
        "test_sequence"
    }

    fn pulse(&mut self, _t: f64, _structure: &mut Structure) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let num_leds = structure.num_leds();
        let pixels = structure.pixels_mut()?;
        if num_leds == 0 {
            return Ok(());
        }

        match self.last_tick {
            Some(last) if t <= last => {}
            Some(_) => {
                self.cursor = (self.cursor + 1) % num_leds;
                self.last_tick = Some(t);
            }
            None => self.last_tick = Some(t),
        }

        pixels.fill(Vec3::ZERO);
        pixels[self.cursor] = Vec3::ONE;
        Ok(())
    }
}
