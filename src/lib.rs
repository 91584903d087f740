//! Status lighting core for a 3D printer.
//!
//! Maps printer/job state and user color preferences onto a continuously
//! running LED effect for each light zone (frame lighting, button ring,
//! head slots).
//!
//! Data flow:
//! printer event → controller priority policy → effect → zone queue →
//! periodic tick → hardware frame.
//!
//! This module holds the types every other module shares:
//! - Zone identifiers
//! - Service configuration
//! - Signal handling for clean shutdown

pub mod color;
pub mod controller;
pub mod effect;
pub mod error;
pub mod printer;
pub mod properties;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod sink;

pub use error::LedError;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ── Zones ──────────────────────────────────────────────────────────

/// An independently animated lighting area.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable, `Hash, Eq` let it key a map,
/// and `Debug` gives us `{:?}` formatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoneId {
    Main,
    ButtonRing,
    HeadSlot(u8),
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::ButtonRing => f.write_str("button_ring"),
            Self::HeadSlot(i) => write!(f, "head_slot_{i}"),
        }
    }
}

// ── Configuration ──────────────────────────────────────────────────

/// Service-wide configuration.
///
/// Explicit and passed by value: no hidden global state.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Frames per second emitted for each zone.
    pub frame_rate: u32,
    /// Whether the machine has a button ring.
    pub button_ring: bool,
    /// Number of head slot indicators.
    pub head_slots: u8,
    /// Where non-volatile lighting settings live. `None` keeps them in memory.
    pub preferences: Option<PathBuf>,
}

impl ServiceConfig {
    /// Time between two ticks of a zone.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.frame_rate.max(1) as u64)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            button_ring: true,
            head_slots: 2,
            preferences: Some(PathBuf::from("main_lighting.json")),
        }
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the main loop and the signal handler. `Arc`
/// lets both own it and `AtomicBool` makes a single bool thread-safe
/// without a mutex.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
