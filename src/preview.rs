// Preview Module - Terminal stand-in for the sculpture while developing
use anyhow::Result;
use crossterm::cursor::{Hide, MoveToColumn, MoveUp, Show};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use glam::Vec3;
use std::io::{self, Stdout, Write};
use std::sync::Arc;

use crate::renderer::{quantize, Frame, FrameSink};
use crate::tempo::PulseSignal;

const CELL: &str = "█";
const BEAT_MARK: char = '/';
const NO_INPUT: &str = "no input";

/// Draws every edge as a row of colored cells, with a beat meter underneath.
pub struct TerminalPreview {
    out: Stdout,
    columns: usize,
    gain: f64,
    level: Option<Arc<PulseSignal>>,
    drawn_rows: u16,
}

impl TerminalPreview {
    pub fn new(columns: usize, gain: f64, level: Option<Arc<PulseSignal>>) -> Result<Self> {
        let mut out = io::stdout();
        execute!(out, Hide)?;
        Ok(TerminalPreview {
            out,
            columns: columns.max(8),
            gain,
            level,
            drawn_rows: 0,
        })
    }
}

/// Average an edge's LEDs into at most `width` cells.
pub fn downsample(leds: &[Vec3], width: usize) -> Vec<Vec3> {
    if leds.len() <= width || width == 0 {
        return leds.to_vec();
    }
    (0..width)
        .map(|i| {
            let start = i * leds.len() / width;
            let end = ((i + 1) * leds.len() / width).max(start + 1);
            leds[start..end].iter().copied().sum::<Vec3>() / (end - start) as f32
        })
        .collect()
}

/// Beat meter line: a full bar of marks on a beat, otherwise a bar sized by
/// `level`. `None` means the input is silent.
pub fn meter_line(beat: bool, level: Option<f64>, width: usize) -> String {
    if beat {
        return std::iter::repeat(BEAT_MARK).take(width).collect();
    }
    let Some(level) = level else {
        return format!("{:<width$.width$}", NO_INPUT, width = width);
    };
    let filled = ((level.max(0.0) * width as f64) as usize).min(width);
    let mut line: String = std::iter::repeat(':').take(filled).collect();
    line.extend(std::iter::repeat(' ').take(width - filled));
    line
}

impl FrameSink for TerminalPreview {
    fn name(&self) -> &str {
        "preview"
    }

    fn present(&mut self, frame: &Frame) -> Result<()> {
        if self.drawn_rows > 0 {
            queue!(self.out, MoveUp(self.drawn_rows))?;
        }

        let width = self.columns.saturating_sub(6);
        let mut rows = 0u16;
        for (index, edge) in frame.edges().enumerate() {
            queue!(self.out, MoveToColumn(0), ResetColor, Print(format!("{:>3} ", index)))?;
            for p in downsample(edge, width) {
                let color = Color::Rgb {
                    r: quantize(p.x, 1.0, 1.0),
                    g: quantize(p.y, 1.0, 1.0),
                    b: quantize(p.z, 1.0, 1.0),
                };
                queue!(self.out, SetForegroundColor(color), Print(CELL))?;
            }
            queue!(self.out, ResetColor, Clear(ClearType::UntilNewLine), Print("\n"))?;
            rows += 1;
        }

        let level = match &self.level {
            Some(signal) if signal.is_silent() => None,
            Some(signal) => Some(signal.level() * self.gain / 100.0),
            None => Some(0.0),
        };
        queue!(
            self.out,
            MoveToColumn(0),
            Print(meter_line(frame.beat, level, width)),
            Clear(ClearType::UntilNewLine),
            Print("\n")
        )?;
        rows += 1;

        self.drawn_rows = rows;
        self.out.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        execute!(self.out, ResetColor, Show)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_averages_buckets() {
        let leds: Vec<Vec3> = (0..8).map(|i| Vec3::splat(i as f32)).collect();
        let cells = downsample(&leds, 4);
        assert_eq!(cells, vec![Vec3::splat(0.5), Vec3::splat(2.5), Vec3::splat(4.5), Vec3::splat(6.5)]);
        assert_eq!(downsample(&leds, 20).len(), 8);
    }

    #[test]
    fn test_meter_line() {
        assert_eq!(meter_line(true, Some(0.0), 4), "////");
        assert_eq!(meter_line(false, Some(0.5), 4), "::  ");
        assert_eq!(meter_line(false, Some(-3.0), 4), "    ");
        assert_eq!(meter_line(false, Some(9.0), 4), "::::");
        assert_eq!(meter_line(false, None, 10), "no input  ");
        assert_eq!(meter_line(false, None, 4), "no i");
    }
}
