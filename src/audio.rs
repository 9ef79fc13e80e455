// Audio Module - Input device lookup and beat detection on the capture thread
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::beat_detector::{DetectorSettings, EnergyBeatDetector};
use crate::tempo::PulseSignal;

/// List input devices, default first, as "name" or "name (default)".
pub fn list_audio_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut device_list = Vec::new();
    let mut seen_devices = HashSet::new();

    // WORKAROUND: Get default device first to avoid hanging on some macOS systems
    if let Some(device) = host.default_input_device() {
        if let Ok(name) = device.name() {
            device_list.push(format!("{} (default)", name));
            seen_devices.insert(name);
        }
    }

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                if !seen_devices.contains(&name) {
                    device_list.push(name.clone());
                    seen_devices.insert(name);
                }
            }
        }
    }

    if device_list.is_empty() {
        return Err(anyhow!("No audio input devices found"));
    }

    Ok(device_list)
}

/// Find an input device by numeric index into [`list_audio_devices`] or by
/// case-insensitive substring. An empty selector picks the default device.
pub fn find_audio_device(selector: &str) -> Result<Device> {
    let host = cpal::default_host();
    let selector = selector.trim().replace(" (default)", "");

    if selector.is_empty() || selector.eq_ignore_ascii_case("default") {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default audio input device available"));
    }

    if let Ok(index) = selector.parse::<usize>() {
        let names = list_audio_devices()?;
        let name = names
            .get(index)
            .ok_or_else(|| anyhow!("Audio device index {} out of range (0-{})", index, names.len() - 1))?;
        return find_audio_device(name);
    }

    let wanted = selector.to_lowercase();

    if let Some(device) = host.default_input_device() {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains(&wanted) {
                return Ok(device);
            }
        }
    }

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                if name.to_lowercase().contains(&wanted) {
                    return Ok(device);
                }
            }
        }
    }

    Err(anyhow!("Audio device '{}' not found", selector))
}

/// Per-stream state living inside the audio callback.
///
/// Gathers channel 0 into fixed-size blocks and runs the detector on each;
/// beats leave the callback only through the [`PulseSignal`].
struct BlockAnalyzer {
    detector: EnergyBeatDetector,
    block: Vec<f32>,
    block_size: usize,
    channels: usize,
    start: Instant,
    signal: Arc<PulseSignal>,
}

impl BlockAnalyzer {
    fn push<T: Copy>(&mut self, data: &[T], to_f32: fn(T) -> f32) {
        for frame in data.chunks(self.channels) {
            self.block.push(to_f32(frame[0]));
            if self.block.len() == self.block_size {
                let t = self.start.elapsed().as_secs_f64();
                let detection = self.detector.process_block(&self.block, t);
                self.signal.set_silent(!detection.has_input);
                self.signal.set_level(detection.score);
                if detection.is_beat {
                    self.signal.raise(t);
                }
                self.block.clear();
            }
        }
    }
}

/// Running capture stream. Dropping it stops the capture.
pub struct AudioCapture {
    _stream: cpal::Stream,
    pub device_name: String,
    pub sample_rate: u32,
    pub fft_size: usize,
    pub block_size: usize,
}

/// Open `selector` and start detecting beats; timestamps are seconds since `start`.
pub fn start_capture(
    selector: &str,
    settings: DetectorSettings,
    signal: Arc<PulseSignal>,
    start: Instant,
) -> Result<AudioCapture> {
    let device = find_audio_device(selector)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let device_config = device
        .default_input_config()
        .with_context(|| format!("Device '{}' does not support input capture", device_name))?;

    let sample_rate = device_config.sample_rate().0;
    let sample_format = device_config.sample_format();
    let channels = device_config.channels().max(1) as usize;

    let detector = EnergyBeatDetector::for_sample_rate(settings, sample_rate as f64);
    let fft_size = detector.fft_size();
    let block_size = settings.block_size(sample_rate as f64);

    log::info!(
        "Audio input '{}': {} Hz, {} channel(s), {:?}",
        device_name,
        sample_rate,
        channels,
        sample_format
    );
    log::info!("Block size: {} samples, FFT size: {}", block_size, fft_size);

    let analyzer = BlockAnalyzer {
        detector,
        block: Vec::with_capacity(block_size),
        block_size,
        channels,
        start,
        signal,
    };

    let config: cpal::StreamConfig = device_config.into();
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, analyzer, |s| s)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, analyzer, |s| s as f32 / 32768.0)?,
        SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, analyzer, |s| (s as f32 - 32768.0) / 32768.0)?
        }
        other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
    };

    stream.play()?;

    Ok(AudioCapture {
        _stream: stream,
        device_name,
        sample_rate,
        fft_size,
        block_size,
    })
}

fn build_stream<T: SizedSample + Copy + Send + 'static>(
    device: &Device,
    config: &cpal::StreamConfig,
    mut analyzer: BlockAnalyzer,
    to_f32: fn(T) -> f32,
) -> Result<cpal::Stream> {
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| analyzer.push(data, to_f32),
        |err| log::error!("Audio stream error: {}", err),
        None,
    )?;
    Ok(stream)
}
