//! Effects: deterministic, time-indexed animations for one zone.
//!
//! An effect is a pure function of the seconds elapsed since it became
//! active plus its own parameters. The only value captured at activation is
//! the fade's starting color (the last color emitted before it).
//!
//! ## Rust concepts
//! - `enum` with data variants instead of a class hierarchy
//! - Exhaustive `match` so every variant answers every question

use crate::color::{HsvColor, theme};
use std::f64::consts::TAU;

/// One animation. `Static` and `Glow` never complete (steady-state);
/// `Fade` and `Blink` complete (transient).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Emit `color` indefinitely.
    Static { color: HsvColor },
    /// Linear HSV interpolation from `from` to `to` over `duration` seconds.
    Fade {
        from: HsvColor,
        to: HsvColor,
        duration: f64,
    },
    /// `count` on/off cycles at `frequency` Hz, "on" first.
    Blink {
        color: HsvColor,
        frequency: f64,
        count: u32,
    },
    /// Sinusoidal oscillation between `low` and `high` at `frequency` Hz.
    Glow {
        low: HsvColor,
        high: HsvColor,
        frequency: f64,
    },
}

impl Effect {
    pub fn fixed(color: HsvColor) -> Self {
        Self::Static { color }
    }

    /// A fade towards `to`. The starting color is filled in by [`Effect::begin`].
    pub fn fade(to: HsvColor, duration: f64) -> Self {
        Self::Fade {
            from: theme::BLACK,
            to,
            duration,
        }
    }

    pub fn blink(color: HsvColor, frequency: f64, count: u32) -> Self {
        Self::Blink {
            color,
            frequency,
            count,
        }
    }

    pub fn glow(low: HsvColor, high: HsvColor, frequency: f64) -> Self {
        Self::Glow {
            low,
            high,
            frequency,
        }
    }

    /// Called when the effect becomes active; `previous` is the color the
    /// zone emitted last.
    pub fn begin(self, previous: HsvColor) -> Self {
        match self {
            Self::Fade { to, duration, .. } => Self::Fade {
                from: previous,
                to,
                duration,
            },
            other => other,
        }
    }

    /// Steady-state effects never complete and represent the zone's ambient status.
    pub fn is_steady_state(&self) -> bool {
        matches!(self, Self::Static { .. } | Self::Glow { .. })
    }

    pub fn is_complete(&self, elapsed: f64) -> bool {
        let elapsed = elapsed.max(0.0);
        match *self {
            Self::Static { .. } | Self::Glow { .. } => false,
            Self::Fade { duration, .. } => elapsed >= duration,
            Self::Blink {
                frequency, count, ..
            } => !(frequency > 0.0 && frequency.is_finite()) || elapsed * frequency >= count as f64,
        }
    }

    /// The color to show `elapsed` seconds after activation.
    pub fn frame(&self, elapsed: f64) -> HsvColor {
        let elapsed = elapsed.max(0.0);
        match *self {
            Self::Static { color } => color,
            Self::Fade { from, to, duration } => {
                if duration <= 0.0 || elapsed >= duration {
                    to
                } else {
                    from.lerp(to, elapsed / duration)
                }
            }
            Self::Blink {
                color, frequency, ..
            } => {
                let half_cycle = (elapsed * frequency * 2.0).floor() as u64;
                if half_cycle % 2 == 0 {
                    color
                } else {
                    color.with_value(0.0)
                }
            }
            Self::Glow {
                low,
                high,
                frequency,
            } => {
                let t = ((elapsed * frequency * TAU).sin() + 1.0) / 2.0;
                low.lerp(high, t)
            }
        }
    }

    /// Short name for log output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::Fade { .. } => "fade",
            Self::Blink { .. } => "blink",
            Self::Glow { .. } => "glow",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
