// Shared types module - Color parsing used by config and animations

use anyhow::Result;
use glam::Vec3;

// RGB color representation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    /// Color as floats in [0, 1], the form animations work in
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }
}

// Parse a comma-separated list of hex colors, e.g. "0000FF,00FFFF,FF00FF"
pub fn parse_palette(color_str: &str) -> Result<Vec<Vec3>> {
    let colors = color_str
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|hex| Rgb::from_hex(hex).map(Rgb::to_vec3))
        .collect::<Result<Vec<_>>>()?;

    if colors.is_empty() {
        anyhow::bail!("Palette has no colors: '{}'", color_str);
    }
    Ok(colors)
}
