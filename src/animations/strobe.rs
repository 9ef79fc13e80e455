// Strobe animations - flashes re-armed by each pulse, fading in between
use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;

use super::{inverse_square, random_point, Animation, AnimationSettings, Decay};
use crate::error::Result;
use crate::structure::Structure;

/// Basic strobe light that pulses to the beat
pub struct BasicStrobe {
    decay: Decay,
    pulse_time: f64,
}

impl BasicStrobe {
    pub fn new(_structure: &Structure, settings: &AnimationSettings, _rng: StdRng) -> Self {
        BasicStrobe {
            decay: settings.decay,
            pulse_time: 0.0,
        }
    }
}

impl Animation for BasicStrobe {
    fn name(&self) -> &'static str {
        "strobe"
    }

    fn pulse(&mut self, t: f64, _structure: &mut Structure) -> Result<()> {
        self.pulse_time = t;
        Ok(())
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let color = Vec3::ONE * self.decay.brightness(t - self.pulse_time);
        structure.pixels_mut()?.fill(color);
        Ok(())
    }
}

/// Flash from a random point inside the structure, shaded by inverse-square distance.
pub struct PosiStrobe {
    decay: Decay,
    pulse_time: f64,
    focus: Vec3,
    rng: StdRng,
}

impl PosiStrobe {
    pub fn new(structure: &Structure, settings: &AnimationSettings, rng: StdRng) -> Self {
        PosiStrobe {
            decay: settings.decay,
            pulse_time: 0.0,
            focus: structure.extents().map(|e| e.center()).unwrap_or(Vec3::ZERO),
            rng,
        }
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }
}

impl Animation for PosiStrobe {
    fn name(&self) -> &'static str {
        "posi_strobe"
    }

    fn pulse(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        self.pulse_time = t;
        self.focus = random_point(structure, &mut self.rng);
        Ok(())
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let brightness = self.decay.brightness(t - self.pulse_time);
        shade_from_point(structure, self.focus, Vec3::ONE * brightness)
    }
}

/// Positional strobe whose color is drawn from the palette on every pulse.
pub struct ColorStrobe {
    decay: Decay,
    palette: Vec<Vec3>,
    pulse_time: f64,
    focus: Vec3,
    color: Vec3,
    rng: StdRng,
}

impl ColorStrobe {
    pub fn new(structure: &Structure, settings: &AnimationSettings, rng: StdRng) -> Self {
        ColorStrobe {
            decay: settings.decay,
            palette: settings.palette.clone(),
            pulse_time: 0.0,
            focus: structure.extents().map(|e| e.center()).unwrap_or(Vec3::ZERO),
            color: settings.palette.first().copied().unwrap_or(Vec3::ONE),
            rng,
        }
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }
}

impl Animation for ColorStrobe {
    fn name(&self) -> &'static str {
        "color_strobe"
    }

    fn pulse(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        self.pulse_time = t;
        self.focus = random_point(structure, &mut self.rng);
        if !self.palette.is_empty() {
            self.color = self.palette[self.rng.gen_range(0..self.palette.len())];
        }
        Ok(())
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let brightness = self.decay.brightness(t - self.pulse_time);
        shade_from_point(structure, self.focus, self.color * brightness)
    }
}

fn shade_from_point(structure: &mut Structure, focus: Vec3, color: Vec3) -> Result<()> {
    let (positions, pixels) = structure.split_mut()?;
    for (pixel, pos) in pixels.iter_mut().zip(positions) {
        *pixel = color * inverse_square(*pos, focus);
    }
    Ok(())
}

/// Lights a single random edge per pulse, everything else stays dark.
pub struct EdgeStrobe {
    decay: Decay,
    pulse_time: f64,
    edge: Option<usize>,
    rng: StdRng,
}

impl EdgeStrobe {
    pub fn new(_structure: &Structure, settings: &AnimationSettings, rng: StdRng) -> Self {
        EdgeStrobe {
            decay: settings.decay,
            pulse_time: 0.0,
            edge: None,
            rng,
        }
    }

    pub fn edge(&self) -> Option<usize> {
        self.edge
    }

    /// Pulse with a chosen edge instead of a random one. An unknown edge
    /// is rejected and leaves the strobe as it was.
    pub fn pulse_edge(&mut self, t: f64, edge: usize, structure: &mut Structure) -> Result<()> {
        structure.edge(edge)?;
        self.pulse_time = t;
        self.edge = Some(edge);
        self.paint(structure, Vec3::ONE)
    }

    fn paint(&self, structure: &mut Structure, color: Vec3) -> Result<()> {
        structure.pixels_mut()?.fill(Vec3::ZERO);
        if let Some(edge) = self.edge {
            structure.edge_pixels_mut(edge)?.fill(color);
        }
        Ok(())
    }
}

impl Animation for EdgeStrobe {
    fn name(&self) -> &'static str {
        "edge_strobe"
    }

    fn pulse(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        if structure.num_edges() == 0 {
            self.pulse_time = t;
            return self.paint(structure, Vec3::ZERO);
        }
        let edge = self.rng.gen_range(0..structure.num_edges());
        self.pulse_edge(t, edge, structure)
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let brightness = self.decay.brightness(t - self.pulse_time);
        self.paint(structure, Vec3::ONE * brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animations::MIN_DISTANCE;
    use crate::error::EngineError;
    use crate::structure::{cube, CubeLayout};
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn setup() -> (Structure, AnimationSettings) {
        (cube(&CubeLayout::default()).unwrap(), AnimationSettings::default())
    }

    #[test]
    fn test_basic_strobe_uniform_decay() {
        let (mut s, settings) = setup();
        let mut anim = BasicStrobe::new(&s, &settings, StdRng::seed_from_u64(0));
        anim.pulse(1.0, &mut s).unwrap();
        anim.update(1.0, &mut s).unwrap();
        assert!(s.pixels().unwrap().iter().all(|p| *p == Vec3::ONE));

        anim.update(1.05, &mut s).unwrap();
        let expected = 0.94f32.powi(5);
        for p in s.pixels().unwrap() {
            assert_relative_eq!(p.x, expected, max_relative = 1e-4);
            assert_eq!(p.x, p.y);
            assert_eq!(p.y, p.z);
        }
    }

    #[test]
    fn test_posi_strobe_focus_inside_bounds() {
        let (mut s, settings) = setup();
        let mut anim = PosiStrobe::new(&s, &settings, StdRng::seed_from_u64(11));
        let e = s.extents().unwrap();
        for i in 0..50 {
            anim.pulse(i as f64, &mut s).unwrap();
            let f = anim.focus();
            assert!(f.cmpge(e.min).all() && f.cmple(e.max).all());
        }
    }

    #[test]
    fn test_posi_strobe_darker_further_away() {
        let (mut s, settings) = setup();
        let mut anim = PosiStrobe::new(&s, &settings, StdRng::seed_from_u64(5));
        anim.pulse(0.0, &mut s).unwrap();
        anim.update(0.02, &mut s).unwrap();

        let focus = anim.focus();
        let positions = s.positions().unwrap();
        let pixels = s.pixels().unwrap();
        let mut order: Vec<usize> = (0..positions.len()).collect();
        order.sort_by(|a, b| {
            positions[*a]
                .distance(focus)
                .total_cmp(&positions[*b].distance(focus))
        });
        for pair in order.windows(2) {
            let (near, far) = (pair[0], pair[1]);
            let (dn, df) = (positions[near].distance(focus), positions[far].distance(focus));
            if df > dn + 1e-4 && dn > MIN_DISTANCE {
                assert!(pixels[near].x > pixels[far].x);
            }
        }
    }

    #[test]
    fn test_color_strobe_uses_palette() {
        let (mut s, settings) = setup();
        let mut anim = ColorStrobe::new(&s, &settings, StdRng::seed_from_u64(9));
        for i in 0..30 {
            anim.pulse(i as f64, &mut s).unwrap();
            assert!(settings.palette.contains(&anim.color()));
        }
        anim.update(29.0, &mut s).unwrap();
        // Channels missing from the chosen color stay dark
        let c = anim.color();
        for p in s.pixels().unwrap() {
            if c.x == 0.0 {
                assert_eq!(p.x, 0.0);
            }
            if c.y == 0.0 {
                assert_eq!(p.y, 0.0);
            }
        }
    }

    #[test]
    fn test_edge_strobe_lights_one_edge() {
        let (mut s, settings) = setup();
        let mut anim = EdgeStrobe::new(&s, &settings, StdRng::seed_from_u64(2));
        anim.pulse(0.0, &mut s).unwrap();
        let edge = anim.edge().unwrap();
        assert!(edge < s.num_edges());
        let range = s.edges()[edge].range();
        for (i, p) in s.pixels().unwrap().iter().enumerate() {
            if range.contains(&i) {
                assert_eq!(*p, Vec3::ONE);
            } else {
                assert_eq!(*p, Vec3::ZERO);
            }
        }
    }

    #[test]
    fn test_edge_strobe_rejects_unknown_edge() {
        let (mut s, settings) = setup();
        let mut anim = EdgeStrobe::new(&s, &settings, StdRng::seed_from_u64(2));
        anim.pulse_edge(0.0, 5, &mut s).unwrap();

        assert_eq!(
            anim.pulse_edge(1.0, 12, &mut s),
            Err(EngineError::InvalidEdge { index: 12, count: 12 })
        );
        assert_eq!(anim.edge(), Some(5));

        anim.update(0.1, &mut s).unwrap();
        let lit = s.edges()[5].range();
        for (i, p) in s.pixels().unwrap().iter().enumerate() {
            if lit.contains(&i) {
                assert_relative_eq!(p.x, 0.94f32.powi(10), max_relative = 1e-4);
            } else {
                assert_eq!(*p, Vec3::ZERO);
            }
        }
    }

    #[test]
    fn test_edge_strobe_dark_before_first_pulse() {
        let (mut s, settings) = setup();
        let mut anim = EdgeStrobe::new(&s, &settings, StdRng::seed_from_u64(2));
        anim.update(0.5, &mut s).unwrap();
        assert!(s.pixels().unwrap().iter().all(|p| *p == Vec3::ZERO));
    }
}
