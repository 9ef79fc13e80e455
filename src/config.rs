// Config Module - Configuration management and command-line argument parsing
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::animations::{AnimationSettings, Decay};
use crate::beat_detector::DetectorSettings;
use crate::multi_device::{DdpOutputConfig, LedDevice};
use crate::structure::CubeLayout;
use crate::tempo::ClockSettings;
use crate::types::parse_palette;

const CONFIG_DIR: &str = "ledburn";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const DEFAULT_COLUMNS: usize = 80;

#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Beat-reactive animations for an LED cube",
    long_about = "Drives animations on a cube of LED edges from a simulated beat clock or live audio.\n\
                  Frames go to WLED controllers over DDP and/or a terminal preview."
)]
pub struct Args {
    /// Show list of audio input devices and exit
    #[arg(short = 'l', long)]
    pub list_devices: bool,

    /// Show list of animations and exit
    #[arg(long)]
    pub list_animations: bool,

    /// Beat source: simulated or audio
    #[arg(long)]
    pub mode: Option<String>,

    /// Animation name, or "random" to rotate through them
    #[arg(short = 'a', long)]
    pub animation: Option<String>,

    /// Audio block size in milliseconds
    #[arg(short = 'b', long = "block-duration", value_name = "DURATION")]
    pub block_duration: Option<f64>,

    /// Width of the preview and spectrum display
    #[arg(short = 'c', long)]
    pub columns: Option<usize>,

    /// Input device (numeric ID or substring)
    #[arg(short = 'd', long)]
    pub device: Option<String>,

    /// Gain factor of the level meter
    #[arg(short = 'g', long)]
    pub gain: Option<f64>,

    /// Frequency range in Hz
    #[arg(short = 'r', long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub range: Option<Vec<f64>>,

    /// WLED device address (replaces configured devices with a single one)
    #[arg(short = 'w', long)]
    pub wled_ip: Option<String>,

    /// LEDs on every cube edge
    #[arg(short = 'L', long)]
    pub leds_per_edge: Option<usize>,

    /// Disable the terminal preview
    #[arg(long)]
    pub no_preview: bool,

    /// Config file path or name (e.g., --cfg /full/path or --cfg stage for ~/.config/ledburn/stage.toml)
    #[arg(long)]
    pub cfg: Option<String>,

    /// Quiet mode
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub ip: String,
    #[serde(default)]
    pub led_offset: usize,
    pub led_count: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// "simulated" or "audio"
    pub mode: String,
    /// Animation name or "random"
    pub animation: String,
    pub update_rate: f64,
    pub switch_every_beats: u64,

    // Structure
    pub leds_per_edge: usize,
    pub cube_scale: f32,
    pub rotate_x_deg: f32,
    pub rotate_y_deg: f32,

    // Animations
    pub decay_base: f64,
    pub decay_rate: f64,
    pub palette: String,
    pub orbit_speed: f32,

    // Simulated clock
    pub base_bpm: f64,
    pub bpm_swing: f64,
    pub bpm_period: f64,
    pub syncopation: bool,

    // Audio detector
    pub audio_device: String,
    pub block_duration_ms: f64,
    pub low_hz: f64,
    pub high_hz: f64,
    /// Unset means the terminal width, or 80 without a terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
    pub gain: f64,
    pub max_bin: usize,
    pub gamma: f64,
    pub threshold_offset: f64,
    pub refractory_ms: f64,

    // Output
    pub preview: bool,
    pub global_brightness: f64,
    pub gamma_correction: f64,
    pub fail_fast: bool,
    pub wled_devices: Vec<DeviceConfig>,

    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let detector = DetectorSettings::default();
        let clock = ClockSettings::default();
        let decay = Decay::default();
        let cube = CubeLayout::default();

        Config {
            mode: "simulated".to_string(),
            animation: "random".to_string(),
            update_rate: 30.0,
            switch_every_beats: 20,
            leds_per_edge: cube.leds_per_edge,
            cube_scale: cube.scale,
            rotate_x_deg: 0.0,
            rotate_y_deg: 0.0,
            decay_base: decay.base,
            decay_rate: decay.rate,
            palette: "0000FF,00FFFF,FF00FF".to_string(),
            orbit_speed: AnimationSettings::default().orbit_speed,
            base_bpm: clock.base_bpm,
            bpm_swing: clock.swing_bpm,
            bpm_period: clock.period,
            syncopation: clock.syncopation,
            audio_device: String::new(),
            block_duration_ms: detector.block_duration_ms,
            low_hz: detector.low_hz,
            high_hz: detector.high_hz,
            columns: None,
            gain: 10.0,
            max_bin: detector.max_bin,
            gamma: detector.gamma,
            threshold_offset: detector.threshold_offset,
            refractory_ms: detector.refractory_ms,
            preview: true,
            global_brightness: 1.0,
            gamma_correction: 1.0,
            fail_fast: false,
            wled_devices: Vec::new(),
            config_path: None,
        }
    }
}

impl Config {
    pub fn merge_with_args(&mut self, args: &Args) -> Result<bool> {
        // Track if any args were actually provided
        let mut args_provided = false;

        if let Some(ref mode) = args.mode {
            self.mode = mode.clone();
            args_provided = true;
        }

        if let Some(ref animation) = args.animation {
            self.animation = animation.clone();
            args_provided = true;
        }

        if let Some(block_duration) = args.block_duration {
            self.block_duration_ms = block_duration;
            args_provided = true;
        }

        if let Some(columns) = args.columns {
            self.columns = Some(columns);
            args_provided = true;
        }

        if let Some(ref device) = args.device {
            self.audio_device = device.clone();
            args_provided = true;
        }

        if let Some(gain) = args.gain {
            self.gain = gain;
            args_provided = true;
        }

        if let Some(ref range) = args.range {
            if let &[low, high] = range.as_slice() {
                if high <= low {
                    anyhow::bail!("HIGH must be greater than LOW");
                }
                self.low_hz = low;
                self.high_hz = high;
                args_provided = true;
            }
        }

        if let Some(leds) = args.leds_per_edge {
            self.leds_per_edge = leds;
            args_provided = true;
        }

        // A single device covering the whole cube
        if let Some(ref ip) = args.wled_ip {
            let led_count = self.total_leds();
            self.wled_devices = vec![DeviceConfig {
                ip: ip.clone(),
                led_offset: 0,
                led_count,
                enabled: true,
            }];
            args_provided = true;
        }

        if args.no_preview {
            self.preview = false;
            args_provided = true;
        }

        self.sanitize();
        Ok(args_provided)
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        if let Some(cfg) = cfg_arg {
            let path = PathBuf::from(cfg);

            // Absolute or relative path
            if path.is_absolute() || cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Otherwise treat as config name in config directory
            let config_dir = Self::config_dir()?;
            let filename = if cfg.ends_with(".toml") {
                cfg.to_string()
            } else {
                format!("{}.toml", cfg)
            };
            Ok(config_dir.join(filename))
        } else {
            Ok(Self::config_dir()?.join(DEFAULT_CONFIG_FILE))
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let config_dir = PathBuf::from(home).join(".config").join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(contents)?;
        parsed.sanitize();
        Ok(parsed)
    }

    /// Load the config at `path`, or defaults if the file does not exist yet.
    pub fn load_or_default(path: PathBuf) -> Result<(Self, bool)> {
        if !path.exists() {
            let config = Config {
                config_path: Some(path),
                ..Default::default()
            };
            return Ok((config, false));
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config =
            Self::parse(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.config_path = Some(path);
        Ok((config, true))
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        self.mode = self.mode.trim().to_lowercase();
        self.animation = self.animation.trim().to_lowercase();
        self.palette = self.palette.trim().trim_matches(',').to_uppercase();
        self.audio_device = self.audio_device.trim().to_string();
        for device in &mut self.wled_devices {
            device.ip = device.ip.trim().to_string();
        }

        // Clamp numeric values to reasonable ranges
        self.update_rate = self.update_rate.clamp(1.0, 500.0);
        self.switch_every_beats = self.switch_every_beats.max(1);
        self.leds_per_edge = self.leds_per_edge.clamp(1, 10000);
        self.cube_scale = self.cube_scale.clamp(0.01, 100.0);
        self.decay_base = self.decay_base.clamp(0.01, 0.9999);
        self.decay_rate = self.decay_rate.clamp(0.0, 10000.0);
        self.orbit_speed = self.orbit_speed.clamp(-100.0, 100.0);
        self.base_bpm = self.base_bpm.clamp(20.0, 400.0);
        self.bpm_swing = self.bpm_swing.clamp(0.0, self.base_bpm - 10.0);
        self.bpm_period = self.bpm_period.clamp(0.1, 10000.0);
        self.block_duration_ms = self.block_duration_ms.clamp(1.0, 1000.0);
        self.low_hz = self.low_hz.clamp(0.0, 20000.0);
        self.high_hz = self.high_hz.clamp(self.low_hz + 1.0, 24000.0);
        self.columns = self.columns.map(|c| c.clamp(8, 1000));
        self.gain = self.gain.clamp(0.0, 1000.0);
        self.max_bin = self.max_bin.clamp(1, 1024);
        self.gamma = self.gamma.clamp(0.0, 0.99999);
        self.refractory_ms = self.refractory_ms.clamp(0.0, 10000.0);
        self.global_brightness = self.global_brightness.clamp(0.0, 1.0);
        self.gamma_correction = self.gamma_correction.clamp(0.1, 5.0);
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::config_path(None)?,
        };

        let mut sanitized = self.clone();
        sanitized.sanitize();

        let contents = format!(
            "# ledburn configuration\n\
             # mode: \"simulated\" or \"audio\"; animation: a name from --list-animations or \"random\"\n\n{}",
            toml::to_string_pretty(&sanitized)?
        );
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Display width: the configured value, else the terminal width.
    pub fn columns(&self) -> usize {
        resolve_columns(
            self.columns,
            crossterm::terminal::size().ok().map(|(w, _)| w as usize),
        )
    }

    pub fn total_leds(&self) -> usize {
        12 * self.leds_per_edge
    }

    pub fn cube_layout(&self) -> CubeLayout {
        CubeLayout {
            leds_per_edge: self.leds_per_edge,
            scale: self.cube_scale,
            rotate_x: self.rotate_x_deg.to_radians(),
            rotate_y: self.rotate_y_deg.to_radians(),
        }
    }

    pub fn animation_settings(&self) -> Result<AnimationSettings> {
        Ok(AnimationSettings {
            decay: Decay {
                base: self.decay_base,
                rate: self.decay_rate,
            },
            palette: parse_palette(&self.palette)?,
            orbit_speed: self.orbit_speed,
        })
    }

    pub fn clock_settings(&self) -> ClockSettings {
        ClockSettings {
            base_bpm: self.base_bpm,
            swing_bpm: self.bpm_swing,
            period: self.bpm_period,
            syncopation: self.syncopation,
        }
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            block_duration_ms: self.block_duration_ms,
            low_hz: self.low_hz,
            high_hz: self.high_hz,
            columns: self.columns(),
            max_bin: self.max_bin,
            gamma: self.gamma,
            threshold_offset: self.threshold_offset,
            refractory_ms: self.refractory_ms,
        }
    }

    pub fn ddp_output_config(&self) -> DdpOutputConfig {
        DdpOutputConfig {
            devices: self
                .wled_devices
                .iter()
                .map(|d| LedDevice {
                    ip: d.ip.clone(),
                    led_offset: d.led_offset,
                    led_count: d.led_count,
                    enabled: d.enabled,
                })
                .collect(),
            brightness: self.global_brightness,
            gamma: self.gamma_correction,
            fail_fast: self.fail_fast,
        }
    }
}

fn resolve_columns(configured: Option<usize>, terminal: Option<usize>) -> usize {
    configured
        .or(terminal)
        .unwrap_or(DEFAULT_COLUMNS)
        .clamp(8, 1000)
}
