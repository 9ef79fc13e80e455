// Animations Module - Beat-reactive effects drawn onto a Structure
//
// Every animation reacts to two events: `pulse` when a beat fires and
// `update` once per tick. Both receive the structure mutably for the
// duration of the call only; the pixel buffer always belongs to the
// structure.
use glam::Vec3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{EngineError, Result};
use crate::structure::Structure;

mod calibration;
mod orbit;
mod strobe;

pub use calibration::TestSequence;
pub use orbit::RotatingLight;
pub use strobe::{BasicStrobe, ColorStrobe, EdgeStrobe, PosiStrobe};

/// Frequency at which animations are updated
pub const UPDATE_RATE: f64 = 30.0;

/// Time between each update (in seconds)
pub const UPDATE_TIME: f64 = 1.0 / UPDATE_RATE;

/// Closest an LED is treated as being to a light source in inverse-square shading
pub const MIN_DISTANCE: f32 = 1e-2;

pub trait Animation: Send {
    fn name(&self) -> &'static str;

    /// Called when a beat or notable audio change occurs
    fn pulse(&mut self, t: f64, structure: &mut Structure) -> Result<()>;

    /// Called at a regular interval to recompute every pixel
    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()>;
}

/// Exponential fade after a pulse: `base ^ (rate * dt)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decay {
    pub base: f64,
    pub rate: f64,
}

impl Default for Decay {
    fn default() -> Self {
        Decay {
            base: 0.94,
            rate: 100.0,
        }
    }
}

impl Decay {
    /// Brightness `dt` seconds after a pulse. Times before the pulse count as 0.
    pub fn brightness(&self, dt: f64) -> f32 {
        self.base.powf(self.rate * dt.max(0.0)) as f32
    }
}

/// Tunables shared by all animations.
#[derive(Debug, Clone)]
pub struct AnimationSettings {
    pub decay: Decay,
    /// Colors sampled by the colored strobe
    pub palette: Vec<Vec3>,
    /// Angular speed of the rotating light, radians per second
    pub orbit_speed: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        AnimationSettings {
            decay: Decay::default(),
            palette: vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            orbit_speed: 2.0,
        }
    }
}

impl AnimationSettings {
    pub fn validate(&self) -> Result<()> {
        if self.palette.is_empty() {
            return Err(EngineError::EmptyPalette);
        }
        Ok(())
    }
}

/// Inverse-square falloff from `light`, with the distance clamped to [`MIN_DISTANCE`].
pub fn inverse_square(led: Vec3, light: Vec3) -> f32 {
    let d = led.distance(light).max(MIN_DISTANCE);
    1.0 / (d * d)
}

/// Uniformly sample a point inside the structure's bounding box.
pub(crate) fn random_point(structure: &Structure, rng: &mut StdRng) -> Vec3 {
    match structure.extents() {
        Some(e) => Vec3::new(
            lerp(e.min.x, e.max.x, rng.gen()),
            lerp(e.min.y, e.max.y, rng.gen()),
            lerp(e.min.z, e.max.z, rng.gen()),
        ),
        None => Vec3::ZERO,
    }
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + (b - a) * f
}

// Single list of every animation. `show` marks the ones eligible for
// random selection during a performance.
macro_rules! register_animations {
    ($($kind:ident => $name:literal, $ty:ty, show = $show:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum AnimationKind {
            $($kind,)*
        }

        impl AnimationKind {
            pub const ALL: &'static [AnimationKind] = &[$(AnimationKind::$kind,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(AnimationKind::$kind => $name,)*
                }
            }

            pub fn is_show(self) -> bool {
                match self {
                    $(AnimationKind::$kind => $show,)*
                }
            }

            pub fn build(
                self,
                structure: &Structure,
                settings: &AnimationSettings,
                rng: StdRng,
            ) -> Box<dyn Animation> {
                match self {
                    $(AnimationKind::$kind => Box::new(<$ty>::new(structure, settings, rng)),)*
                }
            }
        }
    };
}

register_animations! {
    BasicStrobe => "strobe", BasicStrobe, show = true;
    PosiStrobe => "posi_strobe", PosiStrobe, show = true;
    ColorStrobe => "color_strobe", ColorStrobe, show = true;
    EdgeStrobe => "edge_strobe", EdgeStrobe, show = true;
    RotatingLight => "rotating_light", RotatingLight, show = true;
    TestSequence => "test_sequence", TestSequence, show = false;
}

impl AnimationKind {
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| EngineError::UnknownAnimation(name.to_string()))
    }
}

/// Animations eligible for random selection (everything but the calibration sequence).
pub fn list_animations() -> Vec<AnimationKind> {
    AnimationKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.is_show())
        .collect()
}

/// Pick one of [`list_animations`] uniformly and build it for `structure`.
pub fn random_animation<R: Rng>(
    structure: &Structure,
    settings: &AnimationSettings,
    rng: &mut R,
) -> Box<dyn Animation> {
    let kinds = list_animations();
    let kind = kinds
        .choose(rng)
        .copied()
        .unwrap_or(AnimationKind::BasicStrobe);
    kind.build(structure, settings, StdRng::seed_from_u64(rng.gen()))
}
