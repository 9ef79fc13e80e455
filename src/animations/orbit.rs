// Rotating point light - continuous illumination, the beat flips its direction
use glam::Vec3;
use rand::rngs::StdRng;

use super::{inverse_square, Animation, AnimationSettings};
use crate::error::Result;
use crate::structure::Structure;

// Orbit radius relative to the structure's half-width
const ORBIT_RADIUS_FACTOR: f32 = 1.5;

pub struct RotatingLight {
    center: Vec3,
    radius: f32,
    height: f32,
    /// Light strength, chosen so the closest LEDs land near full brightness
    power: f32,
    speed: f32,
    angle: f32,
    direction: f32,
    last_update: Option<f64>,
}

impl RotatingLight {
    pub fn new(structure: &Structure, settings: &AnimationSettings, _rng: StdRng) -> Self {
        let (center, half_width, height) = match structure.extents() {
            Some(e) => {
                let size = e.size();
                let half = 0.5 * size.x.max(size.z);
                (e.center(), half, 0.25 * size.y)
            }
            None => (Vec3::ZERO, 0.5, 0.0),
        };
        let half_width = half_width.max(0.1);
        let radius = ORBIT_RADIUS_FACTOR * half_width;
        let gap = radius - half_width;

        RotatingLight {
            center,
            radius,
            height,
            power: gap * gap,
            speed: settings.orbit_speed,
            angle: 0.0,
            direction: 1.0,
            last_update: None,
        }
    }

    /// Current position of the orbiting light.
    pub fn light_position(&self) -> Vec3 {
        self.center
            + Vec3::new(
                self.radius * self.angle.cos(),
                self.height,
                self.radius * self.angle.sin(),
            )
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }
}

impl Animation for RotatingLight {
    fn name(&self) -> &'static str {
        "rotating_light"
    }

    fn pulse(&mut self, _t: f64, _structure: &mut Structure) -> Result<()> {
        self.direction = -self.direction;
        Ok(())
    }

    fn update(&mut self, t: f64, structure: &mut Structure) -> Result<()> {
        let (positions, pixels) = structure.split_mut()?;

        let dt = self.last_update.map_or(0.0, |last| (t - last).max(0.0));
        self.last_update = Some(t);
        self.angle = (self.angle + self.direction * self.speed * dt as f32)
            .rem_euclid(std::f32::consts::TAU);

        let light = self.light_position();
        for (pixel, pos) in pixels.iter_mut().zip(positions) {
            *pixel = Vec3::ONE * (self.power * inverse_square(*pos, light));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{cube, CubeLayout};
    use rand::SeedableRng;

    fn setup() -> (Structure, RotatingLight) {
        let s = cube(&CubeLayout::default()).unwrap();
        let anim = RotatingLight::new(&s, &AnimationSettings::default(), StdRng::seed_from_u64(0));
        (s, anim)
    }

    #[test]
    fn test_light_orbits_outside_structure() {
        let (mut s, mut anim) = setup();
        for i in 0..60 {
            anim.update(i as f64 * 0.1, &mut s).unwrap();
            let p = anim.light_position();
            assert!((p.x * p.x + p.z * p.z).sqrt() > 0.5);
        }
    }

    #[test]
    fn test_pulse_reverses_direction() {
        let (mut s, mut anim) = setup();
        anim.update(0.0, &mut s).unwrap();
        anim.update(0.5, &mut s).unwrap();
        let forward = anim.light_position();

        anim.pulse(0.5, &mut s).unwrap();
        assert_eq!(anim.direction(), -1.0);
        anim.update(1.0, &mut s).unwrap();
        let back = anim.light_position();
        anim.update(1.0, &mut s).unwrap();
        assert_eq!(back, anim.light_position());
        assert!((back - forward).length() > 0.1);

        // Half a second back the other way returns to the start angle
        let start = Vec3::new(0.75, 0.25, 0.0);
        assert!((back - start).length() < 1e-4);
    }

    #[test]
    fn test_no_decay_over_time() {
        let (mut s, mut anim) = setup();
        anim.update(0.0, &mut s).unwrap();
        let total_a: f32 = s.pixels().unwrap().iter().map(|p| p.x).sum();
        for i in 1..=40 {
            anim.update(i as f64 * 0.25, &mut s).unwrap();
        }
        let total_b: f32 = s.pixels().unwrap().iter().map(|p| p.x).sum();
        assert!(total_a > 0.0 && total_b > 0.0);
        // Energy changes only with orbit position, not with elapsed time
        assert!((total_b / total_a) > 0.5 && (total_b / total_a) < 2.0);
    }
}
