// Multi-device output - pushes frames to WLED controllers over DDP
use anyhow::{anyhow, Context, Result};
use ddp_rs::connection::DDPConnection;
use ddp_rs::protocol::{PixelConfig, ID};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

use crate::renderer::{Frame, FrameSink};

// WLED DDP timeout is ~1 second, so send keepalive every 500ms to be safe
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

const DDP_PORT: u16 = 4048;

/// One controller driving a contiguous run of the structure's LEDs.
#[derive(Debug, Clone, PartialEq)]
pub struct LedDevice {
    pub ip: String,
    pub led_offset: usize,
    pub led_count: usize,
    pub enabled: bool,
}

impl LedDevice {
    fn byte_range(&self) -> std::ops::Range<usize> {
        self.led_offset * 3..(self.led_offset + self.led_count) * 3
    }
}

#[derive(Debug, Clone)]
pub struct DdpOutputConfig {
    pub devices: Vec<LedDevice>,
    pub brightness: f64,
    pub gamma: f64,
    /// Abort the frame on the first device error instead of reporting and continuing
    pub fail_fast: bool,
}

/// Reject empty configurations and overlapping LED ranges among enabled devices.
pub fn validate_devices(devices: &[LedDevice]) -> Result<()> {
    let enabled: Vec<&LedDevice> = devices.iter().filter(|d| d.enabled).collect();
    if enabled.is_empty() {
        return Err(anyhow!("No devices configured"));
    }

    for (i, a) in enabled.iter().enumerate() {
        for b in &enabled[i + 1..] {
            let (a_start, a_end) = (a.led_offset, a.led_offset + a.led_count);
            let (b_start, b_end) = (b.led_offset, b.led_offset + b.led_count);
            if a_start < b_end && a_end > b_start {
                return Err(anyhow!(
                    "Overlapping LED ranges: Device {} ({}-{}) overlaps with Device {} ({}-{})",
                    a.ip,
                    a_start,
                    a_end.saturating_sub(1),
                    b.ip,
                    b_start,
                    b_end.saturating_sub(1)
                ));
            }
        }
    }

    Ok(())
}

/// The part of a byte frame addressed to `device`, or `None` if it runs past the end.
pub fn device_slice<'a>(frame: &'a [u8], device: &LedDevice) -> Option<&'a [u8]> {
    frame.get(device.byte_range())
}

struct DeviceConnection {
    device: LedDevice,
    ddp: DDPConnection,
    last_send: Option<Instant>,
}

impl DeviceConnection {
    fn new(device: LedDevice) -> Result<Self> {
        let dest_addr = format!("{}:{}", device.ip, DDP_PORT);
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let ddp = DDPConnection::try_new(&dest_addr, PixelConfig::default(), ID::Default, socket)
            .with_context(|| format!("Failed to open DDP connection to {}", dest_addr))?;

        Ok(DeviceConnection {
            device,
            ddp,
            last_send: None,
        })
    }

    fn needs_keepalive(&self) -> bool {
        self.last_send
            .map_or(true, |last| last.elapsed() >= KEEPALIVE_INTERVAL)
    }
}

/// DDP output to every enabled device.
pub struct DdpOutput {
    devices: Vec<DeviceConnection>,
    config: DdpOutputConfig,
}

impl DdpOutput {
    pub fn new(config: DdpOutputConfig) -> Result<Self> {
        validate_devices(&config.devices)?;

        let mut devices = Vec::new();
        for device in config.devices.iter().filter(|d| d.enabled) {
            match DeviceConnection::new(device.clone()) {
                Ok(conn) => {
                    log::info!(
                        "DDP device {} drives LEDs {}-{}",
                        device.ip,
                        device.led_offset,
                        device.led_offset + device.led_count.max(1) - 1
                    );
                    devices.push(conn);
                }
                Err(e) => log::warn!("Failed to connect to {}: {:#}", device.ip, e),
            }
        }

        if devices.is_empty() {
            return Err(anyhow!("No devices connected successfully"));
        }

        Ok(DdpOutput { devices, config })
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut errors = Vec::new();

        for conn in &mut self.devices {
            let Some(device_frame) = device_slice(bytes, &conn.device) else {
                let err = format!(
                    "Device {} range exceeds frame size (device wants LEDs {}-{}, frame has {} LEDs)",
                    conn.device.ip,
                    conn.device.led_offset,
                    conn.device.led_offset + conn.device.led_count.max(1) - 1,
                    bytes.len() / 3
                );
                if self.config.fail_fast {
                    return Err(anyhow!(err));
                }
                errors.push(err);
                continue;
            };

            // Skip sending if all zeros AND we don't need a keepalive
            let all_zeros = device_frame.iter().all(|&b| b == 0);
            if all_zeros && !conn.needs_keepalive() {
                continue;
            }

            match conn.ddp.write(device_frame) {
                Ok(_) => conn.last_send = Some(Instant::now()),
                Err(e) => {
                    let err = format!("Failed to send to {}: {}", conn.device.ip, e);
                    if self.config.fail_fast {
                        return Err(anyhow!(err));
                    }
                    errors.push(err);
                }
            }
        }

        for err in errors {
            log::warn!("{}", err);
        }
        Ok(())
    }
}

impl FrameSink for DdpOutput {
    fn name(&self) -> &str {
        "ddp"
    }

    fn present(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.to_rgb_bytes(self.config.brightness, self.config.gamma);
        self.send(&bytes)
    }

    fn shutdown(&mut self) -> Result<()> {
        // Leave the strips dark
        let len = self
            .devices
            .iter()
            .map(|d| d.device.led_offset + d.device.led_count)
            .max()
            .unwrap_or(0);
        for conn in &mut self.devices {
            conn.last_send = None;
        }
        self.send(&vec![0; len * 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(ip: &str, offset: usize, count: usize) -> LedDevice {
        LedDevice {
            ip: ip.to_string(),
            led_offset: offset,
            led_count: count,
            enabled: true,
        }
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let devices = vec![device("10.0.0.1", 0, 360), device("10.0.0.2", 300, 420)];
        let err = validate_devices(&devices).unwrap_err().to_string();
        assert!(err.contains("Overlapping"));
    }

    #[test]
    fn test_validate_ignores_disabled() {
        let mut second = device("10.0.0.2", 300, 420);
        second.enabled = false;
        assert!(validate_devices(&[device("10.0.0.1", 0, 360), second.clone()]).is_ok());
        assert!(validate_devices(&[second]).is_err());
        assert!(validate_devices(&[]).is_err());
    }

    #[test]
    fn test_adjacent_ranges_are_fine() {
        let devices = vec![device("10.0.0.1", 0, 360), device("10.0.0.2", 360, 360)];
        assert!(validate_devices(&devices).is_ok());
    }

    #[test]
    fn test_device_slice() {
        let frame: Vec<u8> = (0..30).collect();
        assert_eq!(device_slice(&frame, &device("a", 2, 3)), Some(&frame[6..15]));
        assert_eq!(device_slice(&frame, &device("a", 8, 3)), None);
    }
}
