//! Zone controllers and the task that drives them.
//!
//! Each zone is owned by exactly one tokio task. That task serializes
//! everything that touches the zone: frame ticks, printer events, facade
//! commands and the controller's own deferred callback (party mode). No
//! locks are needed because nothing else ever sees the controller.
//!
//! ```text
//!            ┌──────────── zone task ─────────────┐
//!  interval ─┤                                    │
//!  events  ──┤ select! → controller → EffectQueue ├─→ HardwareSink
//!  commands ─┤                                    │
//!  deadline ─┤                                    │
//!            └────────────────────────────────────┘
//! ```
//!
//! ## Rust concepts
//! - Traits with associated types (`type Command`)
//! - `tokio::select!` over several event sources
//! - `broadcast` for fan-out, `mpsc` + `oneshot` for request/response

pub mod button_ring;
pub mod head_slot;
pub mod main_lighting;

pub use button_ring::{ButtonRingController, RingCommand};
pub use head_slot::HeadSlotController;
pub use main_lighting::{MainCommand, MainLightingController, ModeFlag, RuntimeFlag};

use crate::ZoneId;
use crate::color::HsvColor;
use crate::printer::PrinterEvent;
use crate::scheduler::EffectQueue;
use crate::sink::{HardwareSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

/// Fade-in time when a zone starts.
pub const STARTUP_FADE_TIME: f64 = 6.0;

/// Behavior shared by every zone controller.
pub trait ZoneController: Send + 'static {
    /// Requests the facade can send to this zone.
    type Command: Send + 'static;

    fn queue(&self) -> &EffectQueue;

    fn queue_mut(&mut self) -> &mut EffectQueue;

    fn zone(&self) -> ZoneId {
        self.queue().zone()
    }

    fn on_printer_event(&mut self, event: &PrinterEvent);

    fn handle(&mut self, command: Self::Command);

    /// When the controller wants [`ZoneController::on_deadline`] to run.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn on_deadline(&mut self) {}

    fn tick(&mut self, now: Instant, sink: &dyn HardwareSink) -> Result<HsvColor, SinkError> {
        self.queue_mut().tick(now, sink)
    }
}

/// Drive one zone until its command channel closes.
pub async fn run_zone<C: ZoneController>(
    mut controller: C,
    mut commands: mpsc::Receiver<C::Command>,
    mut events: broadcast::Receiver<PrinterEvent>,
    sink: Arc<dyn HardwareSink>,
    frame_interval: Duration,
) {
    let zone = controller.zone();
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut events_open = true;
    let mut failed_frames: u64 = 0;

    tracing::info!(%zone, "Zone task started");

    loop {
        let deadline = controller.deadline();

        tokio::select! {
            now = ticker.tick() => {
                if let Err(e) = controller.tick(now, sink.as_ref()) {
                    failed_frames += 1;
                    // Only log the first few; the sink keeps being retried every tick.
                    if failed_frames <= 5 {
                        tracing::warn!(%zone, "{}", e);
                    }
                }
            }

            command = commands.recv() => match command {
                Some(command) => controller.handle(command),
                None => break,
            },

            event = events.recv(), if events_open => match event {
                Ok(event) => controller.on_printer_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(%zone, "Missed {} printer events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(%zone, "Printer event stream closed");
                    events_open = false;
                }
            },

            _ = sleep_until(deadline), if deadline.is_some() => controller.on_deadline(),
        }
    }

    if failed_frames > 5 {
        tracing::warn!(%zone, "{} frames could not be emitted", failed_frames);
    }
    tracing::info!(%zone, "Zone task stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
