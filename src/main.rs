// ledburn - Drive beat-reactive animations on an LED cube
use anyhow::{bail, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ledburn::animations::{list_animations, AnimationKind};
use ledburn::audio::{list_audio_devices, start_capture, AudioCapture};
use ledburn::config::{Args, Config};
use ledburn::driver::{Driver, DriverSettings, Selection};
use ledburn::multi_device::DdpOutput;
use ledburn::preview::TerminalPreview;
use ledburn::structure::cube;
use ledburn::tempo::{AudioBeats, BeatSource, PulseSignal, SimulatedClock};

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn print_animations() {
    println!("Animations:");
    for kind in AnimationKind::ALL {
        let note = if list_animations().contains(kind) { "" } else { " (not in random rotation)" };
        println!("  {}{}", kind.name(), note);
    }
    println!("  random");
}

fn print_audio_devices() -> Result<()> {
    println!("Available audio input devices:");
    for (i, name) in list_audio_devices()?.iter().enumerate() {
        println!("  {}. {}", i, name);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet);

    if args.list_devices {
        return print_audio_devices();
    }

    if args.list_animations {
        print_animations();
        return Ok(());
    }

    let config_path = Config::config_path(args.cfg.as_deref())?;
    let (mut config, config_file_exists) = Config::load_or_default(config_path)?;
    let args_provided = config.merge_with_args(&args)?;

    // Save config only on first run or when the command line changed something
    if !config_file_exists || args_provided {
        config.save()?;
    }
    if let Some(path) = &config.config_path {
        log::info!("Using config file: {}", path.display());
    }

    let structure = cube(&config.cube_layout())?;
    log::info!(
        "Cube: {} edges, {} LEDs",
        structure.num_edges(),
        structure.num_leds()
    );

    let start = Instant::now();
    let signal = Arc::new(PulseSignal::new());

    // The capture stream stops when it is dropped
    let (beats, _capture): (Box<dyn BeatSource>, Option<AudioCapture>) = match config.mode.as_str() {
        "simulated" => {
            let clock = SimulatedClock::new(config.clock_settings());
            (Box::new(clock) as Box<dyn BeatSource>, None)
        }
        "audio" => {
            let capture = start_capture(
                &config.audio_device,
                config.detector_settings(),
                signal.clone(),
                start,
            )?;
            log::info!(
                "Listening on '{}' ({} Hz)",
                capture.device_name,
                capture.sample_rate
            );
            (Box::new(AudioBeats::new(signal.clone())) as Box<dyn BeatSource>, Some(capture))
        }
        other => bail!("Unknown mode '{}', expected \"simulated\" or \"audio\"", other),
    };

    let settings = DriverSettings {
        update_rate: config.update_rate,
        switch_every_beats: config.switch_every_beats,
        selection: Selection::from_name(&config.animation)?,
    };
    let mut driver = Driver::new(
        structure,
        config.animation_settings()?,
        settings,
        beats,
        StdRng::from_entropy(),
    )?;

    if !config.wled_devices.is_empty() {
        driver.add_sink(Box::new(DdpOutput::new(config.ddp_output_config())?));
    }

    if config.preview {
        let columns = config.columns();
        let level = (config.mode == "audio").then(|| signal.clone());
        driver.add_sink(Box::new(TerminalPreview::new(columns, config.gain, level)?));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))?;

    log::info!("Running at {:.0} updates/s, press Ctrl+C to stop", config.update_rate);
    driver.run(start, &shutdown)?;
    log::info!("Stopped after {} beats", driver.num_beats());
    Ok(())
}
