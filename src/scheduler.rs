//! Per-zone effect queue.
//!
//! The queue is FIFO with one twist: the steady-state effect (if any) always
//! sits at the tail, and there is at most one of them. Transient effects are
//! inserted ahead of it, play to completion, and then the zone falls back to
//! its steady-state effect.
//!
//! ```text
//!   [ blink (active) | fade | static ]
//!     ^ head                  ^ steady-state tail
//! ```
//!
//! ## Rust concepts
//! - `VecDeque` as a double-ended queue
//! - `Option<Instant>` to mark which slot has been started
//! - Returning `Result` from `tick` so a failed emission is visible to the caller

use crate::ZoneId;
use crate::color::{HsvColor, theme};
use crate::effect::Effect;
use crate::sink::{Frame, HardwareSink, SinkError};
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Debug)]
struct Slot {
    effect: Effect,
    started: Option<Instant>,
}

impl Slot {
    fn elapsed(&self, now: Instant) -> f64 {
        self.started
            .map(|s| now.saturating_duration_since(s).as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[derive(Debug)]
pub struct EffectQueue {
    zone: ZoneId,
    entries: VecDeque<Slot>,
    last_color: HsvColor,
}

impl EffectQueue {
    pub fn new(zone: ZoneId) -> Self {
        Self {
            zone,
            entries: VecDeque::new(),
            last_color: theme::BLACK,
        }
    }

    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    /// Queue an effect.
    ///
    /// A steady-state effect replaces the queued steady-state effect (if any)
    /// and goes to the tail. A transient effect is inserted just ahead of the
    /// steady-state tail; if that tail was playing it is interrupted and
    /// restarts once the transients are done.
    ///
    /// Requesting the steady-state effect that is already queued is a no-op,
    /// so repeated re-evaluation does not restart a glow mid-cycle.
    pub fn enqueue(&mut self, effect: Effect, now: Instant) {
        if effect.is_steady_state() && self.entries.back().is_some_and(|slot| slot.effect == effect) {
            return;
        }

        let has_steady_tail = self
            .entries
            .back()
            .is_some_and(|slot| slot.effect.is_steady_state());

        if effect.is_steady_state() {
            if has_steady_tail {
                self.entries.pop_back();
            }
            self.entries.push_back(Slot {
                effect,
                started: None,
            });
        } else {
            let index = if has_steady_tail {
                self.entries.len() - 1
            } else {
                self.entries.len()
            };
            if index == 0 {
                if let Some(head) = self.entries.front_mut() {
                    head.started = None;
                }
            }
            self.entries.insert(
                index,
                Slot {
                    effect,
                    started: None,
                },
            );
        }

        tracing::debug!(
            zone = %self.zone,
            effect = effect.name(),
            queued = self.entries.len(),
            "enqueue"
        );
        self.start_head(now);
    }

    /// True when more than one effect is pending.
    pub fn has_effect_in_queue(&self) -> bool {
        self.entries.len() > 1
    }

    /// The effect currently playing.
    pub fn active(&self) -> Option<&Effect> {
        self.entries.front().map(|slot| &slot.effect)
    }

    /// All queued effects, head first.
    pub fn pending(&self) -> impl Iterator<Item = &Effect> {
        self.entries.iter().map(|slot| &slot.effect)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last color successfully emitted to the hardware.
    pub fn last_color(&self) -> HsvColor {
        self.last_color
    }

    /// Drop completed effects from the head and start the next one.
    ///
    /// The final frame of each dropped effect becomes the color the next
    /// effect starts from. Nothing is emitted.
    pub fn advance(&mut self, now: Instant) {
        while let Some(head) = self.entries.front() {
            let elapsed = head.elapsed(now);
            if head.started.is_none() || !head.effect.is_complete(elapsed) {
                break;
            }
            self.last_color = head.effect.frame(elapsed);
            self.entries.pop_front();
            self.start_head(now);
        }
    }

    /// Advance past completed effects and emit one frame for the active effect.
    ///
    /// A completed effect that is the only entry is dropped and the zone holds
    /// its final color. If the sink fails, the queue is left as is and the
    /// next tick simply tries again.
    pub fn tick(&mut self, now: Instant, sink: &dyn HardwareSink) -> Result<HsvColor, SinkError> {
        self.advance(now);

        let color = match self.entries.front() {
            Some(head) => head.effect.frame(head.elapsed(now)),
            None => self.last_color,
        };

        sink.emit_frame(self.zone, Frame::from_hsv(color))?;
        self.last_color = color;
        Ok(color)
    }

    fn start_head(&mut self, now: Instant) {
        let previous = self.last_color;
        if let Some(head) = self.entries.front_mut() {
            if head.started.is_none() {
                head.effect = head.effect.begin(previous);
                head.started = Some(now);
                tracing::debug!(zone = %self.zone, effect = head.effect.name(), "effect active");
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
