// Renderer Module - Frame snapshots and the sinks that display them
use anyhow::Result;
use glam::Vec3;

use crate::structure::Structure;

/// Copy of the pixel buffer taken after an update, safe to hand to outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: Vec<Vec3>,
    /// LED count of every edge, in edge order
    pub edge_lengths: Vec<usize>,
    /// Time of the update that produced this frame
    pub time: f64,
    /// Whether a beat fired on this tick
    pub beat: bool,
}

impl Frame {
    pub fn capture(structure: &Structure, time: f64, beat: bool) -> Result<Self> {
        Ok(Frame {
            pixels: structure.pixels()?.to_vec(),
            edge_lengths: structure.edges().iter().map(|e| e.num_leds).collect(),
            time,
            beat,
        })
    }

    /// Pixels of each edge in order.
    pub fn edges(&self) -> impl Iterator<Item = &[Vec3]> {
        let mut offset = 0;
        self.edge_lengths.iter().map(move |len| {
            let edge = &self.pixels[offset..offset + len];
            offset += len;
            edge
        })
    }

    /// Flat RGB bytes, one triple per LED in edge-major order.
    pub fn to_rgb_bytes(&self, brightness: f64, gamma: f64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for p in &self.pixels {
            bytes.push(quantize(p.x, brightness, gamma));
            bytes.push(quantize(p.y, brightness, gamma));
            bytes.push(quantize(p.z, brightness, gamma));
        }
        bytes
    }
}

/// Clamp a channel to [0, 1], apply gamma and brightness, scale to 0-255.
pub fn quantize(value: f32, brightness: f64, gamma: f64) -> u8 {
    let v = if value.is_finite() {
        value.clamp(0.0, 1.0) as f64
    } else {
        0.0
    };
    let v = v.powf(gamma.max(0.01)) * brightness.clamp(0.0, 1.0);
    (v * 255.0).round() as u8
}

/// Consumer of rendered frames: LED hardware, a preview, a recorder.
pub trait FrameSink {
    fn name(&self) -> &str;

    fn present(&mut self, frame: &Frame) -> Result<()>;

    /// Called once when the driver stops
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
