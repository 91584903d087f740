//! Hardware boundary: frames and the sinks that receive them.
//!
//! Pixel and PWM drivers live outside this crate. A sink only has to accept
//! one [`Frame`] per tick per zone.

use crate::ZoneId;
use crate::color::{HsvColor, Rgb};
use std::sync::Mutex;
use thiserror::Error;

/// One hardware frame: a full-value RGB color plus a 0-100 brightness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub color: Rgb,
    pub brightness: u8,
}

impl Frame {
    pub fn from_hsv(color: HsvColor) -> Self {
        let c = color.normalized();
        Self {
            color: c.chroma(),
            brightness: c.value.round() as u8,
        }
    }

    /// The color the LEDs actually show once brightness is applied.
    pub fn effective(&self) -> Rgb {
        self.color.apply_brightness(self.brightness)
    }
}

#[derive(Debug, Error)]
#[error("frame emission failed on {zone}: {reason}")]
pub struct SinkError {
    pub zone: ZoneId,
    pub reason: String,
}

/// Receives frames for every zone. Implementations must be shareable between
/// zone tasks; each zone emits its own frames sequentially.
pub trait HardwareSink: Send + Sync {
    fn emit_frame(&self, zone: ZoneId, frame: Frame) -> Result<(), SinkError>;
}

/// Writes frames to the trace log. Used when no LED driver is attached.
#[derive(Debug, Default)]
pub struct LogSink;

impl HardwareSink for LogSink {
    fn emit_frame(&self, zone: ZoneId, frame: Frame) -> Result<(), SinkError> {
        let rgb = frame.effective();
        tracing::trace!(
            %zone,
            r = rgb.r,
            g = rgb.g,
            b = rgb.b,
            brightness = frame.brightness,
            "frame"
        );
        Ok(())
    }
}

/// Keeps every emitted frame in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<(ZoneId, Frame)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<(ZoneId, Frame)> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent frame emitted for `zone`.
    pub fn last_frame(&self, zone: ZoneId) -> Option<Frame> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .rev()
            .find(|(z, _)| *z == zone)
            .map(|(_, f)| *f)
    }
}

impl HardwareSink for RecordingSink {
    fn emit_frame(&self, zone: ZoneId, frame: Frame) -> Result<(), SinkError> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((zone, frame));
        Ok(())
    }
}
