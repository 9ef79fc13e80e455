// ledburn - Beat-reactive animations for LED structures
//
// A `Structure` is a set of LED strips laid along the edges of a 3D shape.
// Animations recompute its pixels every tick and react to beats, which come
// from a simulated clock or from live audio.
pub mod animations;
pub mod audio;
pub mod beat_detector;
pub mod config;
pub mod driver;
pub mod error;
pub mod multi_device;
pub mod preview;
pub mod renderer;
pub mod structure;
pub mod tempo;
pub mod types;

pub use error::{EngineError, Result};
