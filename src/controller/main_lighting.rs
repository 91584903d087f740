//! Main frame lighting.
//!
//! Features:
//! - A user HSV color, each channel settable on its own
//! - Persisted mode flags and a persisted user brightness (0-100) that
//!   scales every color this zone shows
//! - Volatile runtime flags other subsystems raise to get attention
//! - Blink on request
//! - Fade in from black at startup
//!
//! The shown effect is recomputed from scratch whenever any input changes,
//! using a fixed priority order (first match wins):
//!
//! 1. party mode → fade to a random hue every 2 s
//! 2. `authenticating` / `message` runtime flag → glow user color ↔ dark user color
//! 3. printing, job waiting for cleanup (or no job) → purple
//! 4. printing → cyan
//! 5. maintenance → yellow
//! 6. error → red
//! 7. otherwise → green

use crate::ZoneId;
use crate::color::{HsvColor, theme};
use crate::controller::{STARTUP_FADE_TIME, ZoneController};
use crate::effect::Effect;
use crate::error::LedError;
use crate::printer::{JobState, PrinterEvent, PrinterSnapshot, PrinterState};
use crate::properties::PropertyContainer;
use crate::scheduler::EffectQueue;
use crate::settings::SettingValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub const USER_BRIGHTNESS: &str = "user_brightness";
const DEFAULT_USER_BRIGHTNESS: f64 = 100.0;

const GLOW_FREQUENCY: f64 = 0.1;
const DARK_COLOR_FACTOR: f64 = 0.3;
const PARTY_FADE_TIME: f64 = 2.0;
/// Retry delay when a party fade could not be queued because the zone was busy.
const PARTY_RETRY: Duration = Duration::from_millis(250);

// ── Flags ──────────────────────────────────────────────────────────

/// Persisted on/off modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModeFlag {
    /// Glow when a print is finished and the build plate needs clearing.
    GlowWhenPrintIsFinished,
    /// Lights only on while printing.
    OnWhenPrinting,
    /// Cycle through random colors.
    Party,
}

impl ModeFlag {
    pub const ALL: [ModeFlag; 3] = [Self::GlowWhenPrintIsFinished, Self::OnWhenPrinting, Self::Party];

    pub fn key(self) -> &'static str {
        match self {
            Self::GlowWhenPrintIsFinished => "glow_when_print_is_finished",
            Self::OnWhenPrinting => "on_when_printing",
            Self::Party => "party",
        }
    }

    /// Value a fresh install (or a factory reset) starts with.
    pub fn default_value(self) -> bool {
        match self {
            Self::GlowWhenPrintIsFinished => true,
            Self::OnWhenPrinting => false,
            Self::Party => false,
        }
    }
}

impl FromStr for ModeFlag {
    type Err = LedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.key() == s)
            .ok_or_else(|| LedError::InvalidFlag(s.to_string()))
    }
}

/// Volatile flags raised by other subsystems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuntimeFlag {
    /// An authentication request is waiting for the user.
    Authenticating,
    /// An API-driven message is on the display.
    Message,
}

impl RuntimeFlag {
    pub const ALL: [RuntimeFlag; 2] = [Self::Authenticating, Self::Message];

    pub fn key(self) -> &'static str {
        match self {
            Self::Authenticating => "authenticating",
            Self::Message => "message",
        }
    }
}

impl FromStr for RuntimeFlag {
    type Err = LedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.key() == s)
            .ok_or_else(|| LedError::InvalidFlag(s.to_string()))
    }
}

// ── Commands ───────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the main lighting zone task.
#[derive(Debug)]
pub enum MainCommand {
    SetHue(f64),
    SetSaturation(f64),
    SetBrightness(f64),
    GetColor(Reply<HsvColor>),
    SetUserBrightness(f64, Reply<Result<(), LedError>>),
    GetUserBrightness(Reply<f64>),
    SetModeFlag(ModeFlag, bool, Reply<Result<(), LedError>>),
    GetModeFlag(ModeFlag, Reply<bool>),
    SetRuntimeFlag(RuntimeFlag, bool),
    GetRuntimeFlag(RuntimeFlag, Reply<bool>),
    Blink { frequency: f64, count: u32 },
    ResetToDefaults(Reply<Result<(), LedError>>),
    ListProperties(Reply<Vec<(String, SettingValue)>>),
    GetProperty(String, Reply<Result<SettingValue, LedError>>),
    SetProperty(String, SettingValue, Reply<Result<(), LedError>>),
}

// ── Controller ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MainLightingController {
    queue: EffectQueue,
    properties: PropertyContainer,
    printer: PrinterSnapshot,
    main_color: HsvColor,
    runtime_flags: BTreeSet<RuntimeFlag>,
    rng: StdRng,
    party_deadline: Option<Instant>,
}

impl MainLightingController {
    /// Register the persisted settings in `properties` (initializing missing
    /// ones), start the fade-in and settle on the effect for `printer`.
    pub fn new(mut properties: PropertyContainer, printer: PrinterSnapshot) -> Result<Self, LedError> {
        for flag in ModeFlag::ALL {
            properties.add_property(flag.key(), flag.default_value().into())?;
        }
        properties.add_property(USER_BRIGHTNESS, DEFAULT_USER_BRIGHTNESS.into())?;

        let mut controller = Self {
            queue: EffectQueue::new(ZoneId::Main),
            properties,
            printer,
            main_color: theme::WHITE,
            runtime_flags: BTreeSet::new(),
            rng: StdRng::from_entropy(),
            party_deadline: None,
        };

        let startup = Effect::fade(controller.color(), STARTUP_FADE_TIME);
        controller.queue.enqueue(startup, Instant::now());
        controller.update();
        Ok(controller)
    }

    /// Replace the party-mode random source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    pub fn printer(&self) -> &PrinterSnapshot {
        &self.printer
    }

    // ── User color ─────────────────────────────────────────────────

    pub fn set_main_color_hue(&mut self, hue: f64) {
        self.main_color.hue = hue;
        self.update();
    }

    pub fn set_main_color_saturation(&mut self, saturation: f64) {
        self.main_color.saturation = saturation;
        self.update();
    }

    pub fn set_main_color_brightness(&mut self, brightness: f64) {
        self.main_color.value = brightness;
        self.update();
    }

    /// The user color as set, without brightness scaling.
    pub fn main_color(&self) -> HsvColor {
        self.main_color
    }

    pub fn blink(&mut self, frequency: f64, count: u32) {
        let effect = Effect::blink(self.color(), frequency, count);
        self.queue.enqueue(effect, Instant::now());
    }

    // ── Flags and settings ─────────────────────────────────────────

    pub fn set_mode_flag(&mut self, flag: ModeFlag, value: bool) -> Result<(), LedError> {
        self.properties.set_property_value(flag.key(), value.into())?;
        self.update();
        Ok(())
    }

    pub fn mode_flag(&self, flag: ModeFlag) -> bool {
        self.properties
            .get_bool(flag.key())
            .unwrap_or(flag.default_value())
    }

    pub fn set_runtime_flag(&mut self, flag: RuntimeFlag, value: bool) {
        if value {
            self.runtime_flags.insert(flag);
        } else {
            self.runtime_flags.remove(&flag);
        }
        self.update();
    }

    pub fn runtime_flag(&self, flag: RuntimeFlag) -> bool {
        self.runtime_flags.contains(&flag)
    }

    /// Persist a new user brightness, clamped to `[0, 100]`.
    pub fn set_user_brightness(&mut self, user_brightness: f64) -> Result<(), LedError> {
        let clamped = if user_brightness.is_nan() {
            0.0
        } else {
            user_brightness.clamp(0.0, 100.0)
        };
        self.properties
            .set_property_value(USER_BRIGHTNESS, clamped.into())?;
        self.update();
        Ok(())
    }

    pub fn user_brightness(&self) -> f64 {
        self.properties
            .get_float(USER_BRIGHTNESS)
            .unwrap_or(DEFAULT_USER_BRIGHTNESS)
    }

    /// Set a persisted property by name. Goes through the same path as the
    /// dedicated setters, so user brightness is clamped here too.
    pub fn set_property(&mut self, key: &str, value: SettingValue) -> Result<(), LedError> {
        if key == USER_BRIGHTNESS {
            let brightness = value.as_float().ok_or(LedError::PropertyType {
                key: key.to_string(),
                expected: "float",
            })?;
            return self.set_user_brightness(brightness);
        }
        self.properties.set_property_value(key, value)?;
        self.update();
        Ok(())
    }

    /// Restore every persisted setting to its default and flush to storage.
    pub fn reset_to_default_values(&mut self) -> Result<(), LedError> {
        for flag in ModeFlag::ALL {
            self.properties
                .set_property_value(flag.key(), flag.default_value().into())?;
        }
        self.properties
            .set_property_value(USER_BRIGHTNESS, DEFAULT_USER_BRIGHTNESS.into())?;
        self.properties.force_save()?;
        self.update();
        Ok(())
    }

    // ── Policy ─────────────────────────────────────────────────────

    /// User color scaled by the user brightness.
    fn color(&self) -> HsvColor {
        self.main_color.scaled(self.user_brightness())
    }

    fn dark_color(&self) -> HsvColor {
        self.color().dimmed(DARK_COLOR_FACTOR)
    }

    /// The steady-state effect for the current inputs, party mode aside.
    pub fn steady_effect(&self) -> Effect {
        let status = |color: HsvColor| Effect::fixed(color.scaled(self.user_brightness()));

        if self.runtime_flag(RuntimeFlag::Authenticating) || self.runtime_flag(RuntimeFlag::Message)
        {
            return Effect::glow(self.color(), self.dark_color(), GLOW_FREQUENCY);
        }

        match (&self.printer.state, &self.printer.job_state) {
            (PrinterState::Printing, JobState::WaitCleanup | JobState::None) => status(theme::PURPLE),
            (PrinterState::Printing, _) => status(theme::CYAN),
            (PrinterState::Maintenance, _) => status(theme::YELLOW),
            (PrinterState::Error, _) => status(theme::RED),
            _ => status(theme::GREEN),
        }
    }

    fn update(&mut self) {
        let now = Instant::now();

        if !self.mode_flag(ModeFlag::Party) {
            self.party_deadline = None;
            let effect = self.steady_effect();
            self.queue.enqueue(effect, now);
            return;
        }

        // The previous party fade ends right at the deadline; drop it so it
        // does not count as pending.
        self.queue.advance(now);
        if self.queue.has_effect_in_queue() {
            self.party_deadline.get_or_insert(now + PARTY_RETRY);
            return;
        }

        let hue = self.rng.gen_range(0.0..360.0);
        let target = HsvColor::new(hue, 100.0, self.user_brightness());
        tracing::debug!(hue, "Party fade");
        self.queue.enqueue(Effect::fade(target, PARTY_FADE_TIME), now);
        self.queue.enqueue(Effect::fixed(target), now);
        self.party_deadline = Some(now + Duration::from_secs_f64(PARTY_FADE_TIME));
    }
}

impl ZoneController for MainLightingController {
    type Command = MainCommand;

    fn queue(&self) -> &EffectQueue {
        &self.queue
    }

    fn queue_mut(&mut self) -> &mut EffectQueue {
        &mut self.queue
    }

    fn on_printer_event(&mut self, event: &PrinterEvent) {
        if self.printer.apply(event) {
            self.update();
        }
    }

    fn handle(&mut self, command: MainCommand) {
        // A dropped reply receiver just means the caller stopped waiting.
        match command {
            MainCommand::SetHue(hue) => self.set_main_color_hue(hue),
            MainCommand::SetSaturation(saturation) => self.set_main_color_saturation(saturation),
            MainCommand::SetBrightness(brightness) => self.set_main_color_brightness(brightness),
            MainCommand::GetColor(reply) => {
                let _ = reply.send(self.main_color());
            }
            MainCommand::SetUserBrightness(value, reply) => {
                let _ = reply.send(self.set_user_brightness(value));
            }
            MainCommand::GetUserBrightness(reply) => {
                let _ = reply.send(self.user_brightness());
            }
            MainCommand::SetModeFlag(flag, value, reply) => {
                let _ = reply.send(self.set_mode_flag(flag, value));
            }
            MainCommand::GetModeFlag(flag, reply) => {
                let _ = reply.send(self.mode_flag(flag));
            }
            MainCommand::SetRuntimeFlag(flag, value) => self.set_runtime_flag(flag, value),
            MainCommand::GetRuntimeFlag(flag, reply) => {
                let _ = reply.send(self.runtime_flag(flag));
            }
            MainCommand::Blink { frequency, count } => self.blink(frequency, count),
            MainCommand::ResetToDefaults(reply) => {
                let _ = reply.send(self.reset_to_default_values());
            }
            MainCommand::ListProperties(reply) => {
                let list = self
                    .properties
                    .iter()
                    .map(|p| (p.key().to_string(), p.value()))
                    .collect();
                let _ = reply.send(list);
            }
            MainCommand::GetProperty(key, reply) => {
                let _ = reply.send(self.properties.get(&key).map(|p| p.value()));
            }
            MainCommand::SetProperty(key, value, reply) => {
                let _ = reply.send(self.set_property(&key, value));
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.party_deadline
    }

    fn on_deadline(&mut self) {
        self.party_deadline = None;
        // Party mode may have been switched off since the deadline was set.
        if self.mode_flag(ModeFlag::Party) {
            self.update();
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
