use approx::assert_relative_eq;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ledburn::animations::{
    random_animation, Animation, AnimationKind, AnimationSettings, EdgeStrobe, TestSequence,
};
use ledburn::beat_detector::{DetectorSettings, EnergyBeatDetector};
use ledburn::renderer::Frame;
use ledburn::structure::{cube, CubeLayout, Structure};
use ledburn::tempo::{BeatSource, ClockSettings, SimulatedClock};

/// The full-size sculpture: 12 edges of 60 LEDs.
fn reference_cube() -> Structure {
    cube(&CubeLayout::default()).unwrap()
}

#[test]
fn edge_strobe_lights_and_fades_one_edge() {
    let mut s = reference_cube();
    let settings = AnimationSettings::default();
    let mut anim = EdgeStrobe::new(&s, &settings, StdRng::seed_from_u64(0));

    anim.pulse_edge(0.0, 3, &mut s).unwrap();
    let lit = s.edges()[3].range();
    let pixels = s.pixels().unwrap();
    assert_eq!(pixels.iter().filter(|p| **p == Vec3::ONE).count(), 60);
    assert_eq!(pixels.iter().filter(|p| **p == Vec3::ZERO).count(), 660);
    assert!(pixels[lit.clone()].iter().all(|p| *p == Vec3::ONE));

    anim.update(0.1, &mut s).unwrap();
    let expected = 0.94f32.powi(10);
    for (i, p) in s.pixels().unwrap().iter().enumerate() {
        if lit.contains(&i) {
            assert_relative_eq!(p.x, expected, max_relative = 1e-4);
            assert_eq!(p.x, p.y);
            assert_eq!(p.y, p.z);
        } else {
            assert_eq!(*p, Vec3::ZERO);
        }
    }
}

#[test]
fn seeded_edge_strobe_picks_edge_from_its_rng() {
    let mut s = reference_cube();
    let settings = AnimationSettings::default();
    let mut anim = AnimationKind::EdgeStrobe.build(&s, &settings, StdRng::seed_from_u64(7));
    let expected = StdRng::seed_from_u64(7).gen_range(0..12);

    anim.pulse(0.0, &mut s).unwrap();
    let lit = s.edges()[expected].range();
    for (i, p) in s.pixels().unwrap().iter().enumerate() {
        let want = if lit.contains(&i) { Vec3::ONE } else { Vec3::ZERO };
        assert_eq!(*p, want, "LED {}", i);
    }

    anim.update(0.1, &mut s).unwrap();
    let pixels = s.pixels().unwrap();
    assert_relative_eq!(pixels[lit.start].x, 0.94f32.powi(10), max_relative = 1e-4);
    assert_eq!(pixels.iter().filter(|p| **p == Vec3::ZERO).count(), 660);
}

#[test]
fn test_sequence_walks_every_led_in_wiring_order() {
    let mut s = reference_cube();
    let mut anim = TestSequence::new(&s, &AnimationSettings::default(), StdRng::seed_from_u64(0));

    for i in 0..s.num_leds() + 5 {
        anim.update(i as f64, &mut s).unwrap();
        let (edge, led) = ((i % 720) / 60, i % 60);
        assert_eq!(s.pixel(edge, led).unwrap(), Vec3::ONE, "tick {}", i);
        let lit = s.pixels().unwrap().iter().filter(|p| **p != Vec3::ZERO).count();
        assert_eq!(lit, 1);
    }
}

#[test]
fn led_positions_interpolate_along_edges() {
    let s = reference_cube();
    for edge in s.edges() {
        let a = s.vertices()[edge.start].pos;
        let b = s.vertices()[edge.end].pos;
        for l in 0..edge.num_leds {
            let f = (l as f32 + 0.5) / edge.num_leds as f32;
            let p = s.position(edge.index, l).unwrap();
            assert!(p.abs_diff_eq(a + (b - a) * f, 1e-5));
        }
    }
    let e = s.extents().unwrap();
    assert!(e.min.abs_diff_eq(Vec3::splat(-0.5), 1e-6));
    assert!(e.max.abs_diff_eq(Vec3::splat(0.5), 1e-6));
}

#[test]
fn random_selection_skips_calibration() {
    let s = reference_cube();
    let settings = AnimationSettings::default();
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..1000 {
        let anim = random_animation(&s, &settings, &mut rng);
        assert_ne!(anim.name(), AnimationKind::TestSequence.name());
    }
}

#[test]
fn simulated_clock_drives_strobe() {
    let mut s = reference_cube();
    let settings = AnimationSettings::default();
    let mut anim = AnimationKind::BasicStrobe.build(&s, &settings, StdRng::seed_from_u64(0));
    let mut clock = SimulatedClock::new(ClockSettings::default());

    let mut beats = 0;
    for tick in 1..=300 {
        let t = tick as f64 / 30.0;
        if let Some(beat) = clock.poll(t) {
            anim.pulse(beat.time, &mut s).unwrap();
            beats += 1;
        }
        anim.update(t, &mut s).unwrap();
        let frame = Frame::capture(&s, t, false).unwrap();
        assert_eq!(frame.to_rgb_bytes(1.0, 1.0).len(), 720 * 3);
    }
    // Ten seconds around 120 BPM, with two half-beats in every five
    assert!(beats > 20 && beats < 40, "{} beats", beats);
}

#[test]
fn detector_quiet_on_steady_tone_fires_on_burst() {
    let sample_rate = 48000.0;
    let settings = DetectorSettings::default();
    let mut detector = EnergyBeatDetector::for_sample_rate(settings, sample_rate);
    let block = settings.block_size(sample_rate);

    // Background hum well below the detection threshold
    let quiet: Vec<f32> = (0..block)
        .map(|i| 0.0005 * (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 48000.0).sin())
        .collect();
    for i in 0..400 {
        let d = detector.process_block(&quiet, i as f64 * 0.05);
        assert!(!d.is_beat, "fired on block {} (energy {})", i, d.energy);
    }

    let loud: Vec<f32> = quiet.iter().map(|s| s * 1000.0).collect();
    assert!(detector.process_block(&loud, 20.0).is_beat);
}
