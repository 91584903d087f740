//! The LED service: zone lifecycle and the remote-callable facade.
//!
//! The service starts out with no zones. Once the printer reports a state
//! other than `booting` it opens the preferences, builds every controller
//! and spawns one task per zone. Until then every facade call degrades
//! gracefully: getters answer `0.0` / `false` and setters do nothing.
//!
//! ```text
//!  printer events ──→ publish() ──→ broadcast ──→ zone tasks
//!  ServiceCall    ──→ dispatch() ─→ mpsc + oneshot ─┘
//! ```
//!
//! ## Rust concepts
//! - An enum (`ZoneSlot`) instead of a nullable controller pointer
//! - `RwLock` for the lifecycle state, never held across an `.await`
//! - Internally tagged serde enums for a typed RPC surface

use crate::color::HsvColor;
use crate::controller::{
    ButtonRingController, HeadSlotController, MainCommand, MainLightingController, ModeFlag,
    RingCommand, RuntimeFlag, ZoneController, run_zone,
};
use crate::error::LedError;
use crate::printer::{PrinterEvent, PrinterSnapshot, PrinterState};
use crate::properties::PropertyContainer;
use crate::settings::{JsonRegistryFile, MemoryStore, SettingValue, SettingsStore};
use crate::sink::HardwareSink;
use crate::{ServiceConfig, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

// ── Zone lifecycle ─────────────────────────────────────────────────

struct ZoneHandle<C> {
    zone: ZoneId,
    commands: mpsc::Sender<C>,
    task: JoinHandle<()>,
}

impl<C> ZoneHandle<C> {
    fn sender(&self) -> (ZoneId, mpsc::Sender<C>) {
        (self.zone, self.commands.clone())
    }

    /// Close the command channel, which ends the zone loop.
    fn close(self) -> (ZoneId, JoinHandle<()>) {
        let ZoneHandle { zone, commands, task } = self;
        drop(commands);
        (zone, task)
    }
}

struct Zones {
    main: ZoneHandle<MainCommand>,
    ring: Option<ZoneHandle<RingCommand>>,
    head_slots: Vec<ZoneHandle<Infallible>>,
}

enum ZoneSlot {
    Uninitialized,
    Ready(Zones),
}

struct Lifecycle {
    printer: PrinterSnapshot,
    zones: ZoneSlot,
}

async fn request<C, T>(
    (zone, sender): (ZoneId, mpsc::Sender<C>),
    make: impl FnOnce(oneshot::Sender<T>) -> C,
) -> Result<T, LedError> {
    let (reply, response) = oneshot::channel();
    sender
        .send(make(reply))
        .await
        .map_err(|_| LedError::ZoneGone(zone))?;
    response.await.map_err(|_| LedError::ZoneGone(zone))
}

async fn notify<C>((zone, sender): (ZoneId, mpsc::Sender<C>), command: C) {
    if sender.send(command).await.is_err() {
        tracing::warn!(%zone, "Zone task is gone, request dropped");
    }
}

/// Answer `default` for a getter whose zone disappeared mid-request.
fn or_default<T>(result: Result<T, LedError>, default: T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        default
    })
}

// ── Service ────────────────────────────────────────────────────────

pub struct LedService {
    config: ServiceConfig,
    sink: Arc<dyn HardwareSink>,
    events: broadcast::Sender<PrinterEvent>,
    lifecycle: RwLock<Lifecycle>,
}

impl LedService {
    /// Create the service. If `printer` is already past booting the zones
    /// start right away, so a missed state event is not fatal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: ServiceConfig,
        sink: Arc<dyn HardwareSink>,
        printer: PrinterSnapshot,
    ) -> Result<Self, LedError> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let service = Self {
            config,
            sink,
            events,
            lifecycle: RwLock::new(Lifecycle {
                printer,
                zones: ZoneSlot::Uninitialized,
            }),
        };
        service.start_if_booted()?;
        Ok(service)
    }

    pub fn is_ready(&self) -> bool {
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        matches!(lifecycle.zones, ZoneSlot::Ready(_))
    }

    /// The service's view of the printer.
    pub fn printer(&self) -> PrinterSnapshot {
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        lifecycle.printer.clone()
    }

    /// Feed a printer property change to the service and every zone.
    pub fn publish(&self, event: PrinterEvent) -> Result<(), LedError> {
        let changed = {
            let mut lifecycle = self.lifecycle.write().unwrap_or_else(PoisonError::into_inner);
            lifecycle.printer.apply(&event)
        };
        if changed {
            self.start_if_booted()?;
        }
        // Nobody is subscribed before the zones start.
        let _ = self.events.send(event);
        Ok(())
    }

    fn start_if_booted(&self) -> Result<(), LedError> {
        let mut lifecycle = self.lifecycle.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(lifecycle.zones, ZoneSlot::Ready(_))
            || lifecycle.printer.state == PrinterState::Booting
        {
            return Ok(());
        }

        let zones = self.start_zones(&lifecycle.printer)?;
        tracing::info!(
            button_ring = zones.ring.is_some(),
            head_slots = zones.head_slots.len(),
            state = ?lifecycle.printer.state,
            "LED service started"
        );
        lifecycle.zones = ZoneSlot::Ready(zones);
        Ok(())
    }

    fn start_zones(&self, printer: &PrinterSnapshot) -> Result<Zones, LedError> {
        let store: Box<dyn SettingsStore> = match &self.config.preferences {
            Some(path) => Box::new(JsonRegistryFile::open(path.clone())?),
            None => Box::new(MemoryStore::new()),
        };
        let mut properties = PropertyContainer::new(store);
        properties.subscribe(|change| {
            tracing::info!(key = %change.key, value = ?change.value, "Setting changed");
        });

        let main = self.spawn_zone(MainLightingController::new(properties, printer.clone())?);
        let ring = self
            .config
            .button_ring
            .then(|| self.spawn_zone(ButtonRingController::new(printer.clone())));
        let head_slots = (0..self.config.head_slots)
            .map(|index| self.spawn_zone(HeadSlotController::new(index, printer.clone())))
            .collect();

        Ok(Zones {
            main,
            ring,
            head_slots,
        })
    }

    fn spawn_zone<C: ZoneController>(&self, controller: C) -> ZoneHandle<C::Command> {
        let zone = controller.zone();
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run_zone(
            controller,
            receiver,
            self.events.subscribe(),
            self.sink.clone(),
            self.config.frame_interval(),
        ));
        ZoneHandle {
            zone,
            commands,
            task,
        }
    }

    /// Stop every zone task and wait for them to finish.
    pub async fn shutdown(self) {
        let lifecycle = self
            .lifecycle
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let ZoneSlot::Ready(zones) = lifecycle.zones else {
            return;
        };

        let mut tasks = vec![zones.main.close()];
        tasks.extend(zones.ring.map(ZoneHandle::close));
        tasks.extend(zones.head_slots.into_iter().map(ZoneHandle::close));

        for (zone, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(%zone, "Zone task failed: {}", e);
            }
        }
        tracing::info!("LED service stopped");
    }

    fn main_zone(&self) -> Option<(ZoneId, mpsc::Sender<MainCommand>)> {
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        match &lifecycle.zones {
            ZoneSlot::Ready(zones) => Some(zones.main.sender()),
            ZoneSlot::Uninitialized => None,
        }
    }

    fn ring_zone(&self) -> Option<(ZoneId, mpsc::Sender<RingCommand>)> {
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        match &lifecycle.zones {
            ZoneSlot::Ready(zones) => zones.ring.as_ref().map(ZoneHandle::sender),
            ZoneSlot::Uninitialized => None,
        }
    }

    // ── Main lighting ──────────────────────────────────────────────

    /// Factory reset. `reset_type` (hard or soft) is logged; both restore
    /// the lighting defaults.
    pub async fn reset_settings(&self, reset_type: &str) -> Result<(), LedError> {
        tracing::info!(reset_type, "Factory reset execution");
        let Some(main) = self.main_zone() else {
            return Ok(());
        };
        request(main, MainCommand::ResetToDefaults).await?
    }

    async fn main_color(&self) -> HsvColor {
        match self.main_zone() {
            Some(main) => or_default(request(main, MainCommand::GetColor).await, HsvColor::default()),
            None => HsvColor::default(),
        }
    }

    pub async fn set_main_lighting_hue(&self, hue: f64) {
        if let Some(main) = self.main_zone() {
            notify(main, MainCommand::SetHue(hue)).await;
        }
    }

    pub async fn get_main_lighting_hue(&self) -> f64 {
        self.main_color().await.hue
    }

    pub async fn set_main_lighting_saturation(&self, saturation: f64) {
        if let Some(main) = self.main_zone() {
            notify(main, MainCommand::SetSaturation(saturation)).await;
        }
    }

    pub async fn get_main_lighting_saturation(&self) -> f64 {
        self.main_color().await.saturation
    }

    pub async fn set_main_lighting_brightness(&self, brightness: f64) {
        if let Some(main) = self.main_zone() {
            notify(main, MainCommand::SetBrightness(brightness)).await;
        }
    }

    pub async fn get_main_lighting_brightness(&self) -> f64 {
        self.main_color().await.value
    }

    pub async fn set_main_lighting_user_brightness(&self, brightness: f64) -> Result<(), LedError> {
        deprecated("set_main_lighting_user_brightness", "user_brightness");
        let Some(main) = self.main_zone() else {
            return Ok(());
        };
        request(main, |reply| MainCommand::SetUserBrightness(brightness, reply)).await?
    }

    pub async fn get_main_lighting_user_brightness(&self) -> f64 {
        deprecated("get_main_lighting_user_brightness", "user_brightness");
        match self.main_zone() {
            Some(main) => or_default(request(main, MainCommand::GetUserBrightness).await, 0.0),
            None => 0.0,
        }
    }

    /// Fails with [`LedError::InvalidFlag`] for an unknown flag, but only
    /// once the zone exists. Before that the call is a no-op.
    pub async fn set_main_lighting_mode_flag(&self, flag: &str, value: bool) -> Result<(), LedError> {
        deprecated("set_main_lighting_mode_flag", flag);
        let Some(main) = self.main_zone() else {
            return Ok(());
        };
        let flag = parse_flag::<ModeFlag>(flag)?;
        request(main, |reply| MainCommand::SetModeFlag(flag, value, reply)).await?
    }

    pub async fn get_main_lighting_mode_flag(&self, flag: &str) -> Result<bool, LedError> {
        deprecated("get_main_lighting_mode_flag", flag);
        let Some(main) = self.main_zone() else {
            return Ok(false);
        };
        let flag = parse_flag::<ModeFlag>(flag)?;
        request(main, |reply| MainCommand::GetModeFlag(flag, reply)).await
    }

    pub async fn set_main_lighting_runtime_flag(&self, flag: &str, value: bool) -> Result<(), LedError> {
        let Some(main) = self.main_zone() else {
            return Ok(());
        };
        let flag = parse_flag::<RuntimeFlag>(flag)?;
        notify(main, MainCommand::SetRuntimeFlag(flag, value)).await;
        Ok(())
    }

    pub async fn get_main_lighting_runtime_flag(&self, flag: &str) -> Result<bool, LedError> {
        let Some(main) = self.main_zone() else {
            return Ok(false);
        };
        let flag = parse_flag::<RuntimeFlag>(flag)?;
        request(main, |reply| MainCommand::GetRuntimeFlag(flag, reply)).await
    }

    pub async fn blink_main_lighting(&self, frequency: f64, count: u32) {
        if let Some(main) = self.main_zone() {
            notify(main, MainCommand::Blink { frequency, count }).await;
        }
    }

    // ── Properties ─────────────────────────────────────────────────

    /// Persisted settings by key. Empty until the zones have started.
    pub async fn list_properties(&self) -> BTreeMap<String, SettingValue> {
        match self.main_zone() {
            Some(main) => or_default(request(main, MainCommand::ListProperties).await, Vec::new())
                .into_iter()
                .collect(),
            None => BTreeMap::new(),
        }
    }

    pub async fn get_property(&self, key: &str) -> Result<SettingValue, LedError> {
        let Some(main) = self.main_zone() else {
            return Err(LedError::PropertyNotFound(key.to_string()));
        };
        let key = key.to_string();
        request(main, |reply| MainCommand::GetProperty(key, reply)).await?
    }

    pub async fn set_property(&self, key: &str, value: SettingValue) -> Result<(), LedError> {
        let Some(main) = self.main_zone() else {
            return Err(LedError::PropertyNotFound(key.to_string()));
        };
        let key = key.to_string();
        request(main, |reply| MainCommand::SetProperty(key, value, reply)).await?
    }

    // ── Button ring ────────────────────────────────────────────────

    async fn ring_color(&self) -> HsvColor {
        match self.ring_zone() {
            Some(ring) => or_default(request(ring, RingCommand::GetColor).await, HsvColor::default()),
            None => HsvColor::default(),
        }
    }

    pub async fn set_ring_lighting_hue(&self, hue: f64) {
        if let Some(ring) = self.ring_zone() {
            notify(ring, RingCommand::SetHue(hue)).await;
        }
    }

    pub async fn get_ring_lighting_hue(&self) -> f64 {
        self.ring_color().await.hue
    }

    pub async fn set_ring_lighting_saturation(&self, saturation: f64) {
        if let Some(ring) = self.ring_zone() {
            notify(ring, RingCommand::SetSaturation(saturation)).await;
        }
    }

    pub async fn get_ring_lighting_saturation(&self) -> f64 {
        self.ring_color().await.saturation
    }

    pub async fn set_ring_lighting_brightness(&self, brightness: f64) {
        if let Some(ring) = self.ring_zone() {
            notify(ring, RingCommand::SetBrightness(brightness)).await;
        }
    }

    pub async fn get_ring_lighting_brightness(&self) -> f64 {
        self.ring_color().await.value
    }

    // ── RPC ────────────────────────────────────────────────────────

    /// Run one typed call against the facade.
    pub async fn dispatch(&self, call: ServiceCall) -> ServiceReply {
        use ServiceCall as C;
        use ServiceReply as R;

        match call {
            C::ResetSettings { reset_type } => self.reset_settings(&reset_type).await.into(),

            C::SetMainLightingHue { hue } => {
                self.set_main_lighting_hue(hue).await;
                R::Done
            }
            C::GetMainLightingHue => R::Number(self.get_main_lighting_hue().await),
            C::SetMainLightingSaturation { saturation } => {
                self.set_main_lighting_saturation(saturation).await;
                R::Done
            }
            C::GetMainLightingSaturation => R::Number(self.get_main_lighting_saturation().await),
            C::SetMainLightingBrightness { brightness } => {
                self.set_main_lighting_brightness(brightness).await;
                R::Done
            }
            C::GetMainLightingBrightness => R::Number(self.get_main_lighting_brightness().await),

            C::SetRingLightingHue { hue } => {
                self.set_ring_lighting_hue(hue).await;
                R::Done
            }
            C::GetRingLightingHue => R::Number(self.get_ring_lighting_hue().await),
            C::SetRingLightingSaturation { saturation } => {
                self.set_ring_lighting_saturation(saturation).await;
                R::Done
            }
            C::GetRingLightingSaturation => R::Number(self.get_ring_lighting_saturation().await),
            C::SetRingLightingBrightness { brightness } => {
                self.set_ring_lighting_brightness(brightness).await;
                R::Done
            }
            C::GetRingLightingBrightness => R::Number(self.get_ring_lighting_brightness().await),

            C::SetMainLightingUserBrightness { brightness } => self
                .set_main_lighting_user_brightness(brightness)
                .await
                .into(),
            C::GetMainLightingUserBrightness => {
                R::Number(self.get_main_lighting_user_brightness().await)
            }
            C::SetMainLightingModeFlag { flag, value } => self
                .set_main_lighting_mode_flag(&flag, value)
                .await
                .into(),
            C::GetMainLightingModeFlag { flag } => {
                self.get_main_lighting_mode_flag(&flag).await.into()
            }
            C::SetMainLightingRuntimeFlag { flag, value } => self
                .set_main_lighting_runtime_flag(&flag, value)
                .await
                .into(),
            C::GetMainLightingRuntimeFlag { flag } => {
                self.get_main_lighting_runtime_flag(&flag).await.into()
            }
            C::BlinkMainLighting { frequency, count } => {
                self.blink_main_lighting(frequency, count).await;
                R::Done
            }

            C::ListProperties => R::Properties(self.list_properties().await),
            C::GetProperty { key } => match self.get_property(&key).await {
                Ok(value) => R::Value(value),
                Err(e) => e.into(),
            },
            C::SetProperty { key, value } => self.set_property(&key, value).await.into(),
        }
    }
}

/// These calls predate the property interface and stay for older clients.
fn deprecated(method: &str, property: &str) {
    tracing::warn!("{} is deprecated, please use the {} property instead", method, property);
}

fn parse_flag<F: std::str::FromStr<Err = LedError>>(name: &str) -> Result<F, LedError> {
    name.parse().inspect_err(|e| tracing::warn!("{}", e))
}

// ── RPC types ──────────────────────────────────────────────────────

/// A remote call, tagged by method name.
///
/// ```json
/// {"method": "set_main_lighting_mode_flag", "flag": "party", "value": true}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ServiceCall {
    ResetSettings { reset_type: String },
    SetMainLightingHue { hue: f64 },
    GetMainLightingHue,
    SetMainLightingSaturation { saturation: f64 },
    GetMainLightingSaturation,
    SetMainLightingBrightness { brightness: f64 },
    GetMainLightingBrightness,
    SetRingLightingHue { hue: f64 },
    GetRingLightingHue,
    SetRingLightingSaturation { saturation: f64 },
    GetRingLightingSaturation,
    SetRingLightingBrightness { brightness: f64 },
    GetRingLightingBrightness,
    SetMainLightingUserBrightness { brightness: f64 },
    GetMainLightingUserBrightness,
    SetMainLightingModeFlag { flag: String, value: bool },
    GetMainLightingModeFlag { flag: String },
    SetMainLightingRuntimeFlag { flag: String, value: bool },
    GetMainLightingRuntimeFlag { flag: String },
    BlinkMainLighting { frequency: f64, count: u32 },
    ListProperties,
    GetProperty { key: String },
    SetProperty { key: String, value: SettingValue },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServiceReply {
    /// Serialized as `null`.
    Done,
    Number(f64),
    Flag(bool),
    Value(SettingValue),
    Properties(BTreeMap<String, SettingValue>),
    Error { error: String },
}

impl From<LedError> for ServiceReply {
    fn from(e: LedError) -> Self {
        Self::Error {
            error: e.to_string(),
        }
    }
}

impl From<Result<(), LedError>> for ServiceReply {
    fn from(result: Result<(), LedError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => e.into(),
        }
    }
}

impl From<Result<bool, LedError>> for ServiceReply {
    fn from(result: Result<bool, LedError>) -> Self {
        match result {
            Ok(flag) => Self::Flag(flag),
            Err(e) => e.into(),
        }
    }
}

/// One line of input: either a printer property change or a call.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Event(PrinterEvent),
    Call(ServiceCall),
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::theme;
    use crate::sink::RecordingSink;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn config() -> ServiceConfig {
        ServiceConfig {
            preferences: None,
            ..ServiceConfig::default()
        }
    }

    fn booting_service(sink: Arc<RecordingSink>) -> LedService {
        LedService::new(config(), sink, PrinterSnapshot::default()).unwrap()
    }

    fn idle() -> PrinterSnapshot {
        PrinterSnapshot {
            state: PrinterState::Idle,
            ..PrinterSnapshot::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_gracefully_while_booting() {
        let service = booting_service(Arc::new(RecordingSink::new()));
        assert!(!service.is_ready());

        service.set_main_lighting_hue(120.0).await;
        assert_eq!(service.get_main_lighting_hue().await, 0.0);
        assert_eq!(service.get_main_lighting_user_brightness().await, 0.0);
        assert_eq!(service.get_ring_lighting_hue().await, 0.0);
        assert!(!service.get_main_lighting_mode_flag("party").await.unwrap());
        // Flag names are not checked before the zone exists.
        service.set_main_lighting_mode_flag("disco", true).await.unwrap();
        service.reset_settings("hard").await.unwrap();
        assert!(service.list_properties().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn starts_when_printer_leaves_booting() {
        let service = booting_service(Arc::new(RecordingSink::new()));

        service.publish(PrinterEvent::new("job_state", "none")).unwrap();
        assert!(!service.is_ready());

        service.publish(PrinterEvent::new("state", "idle")).unwrap();
        assert!(service.is_ready());
        assert_eq!(service.printer().state, PrinterState::Idle);
        assert_eq!(service.get_main_lighting_user_brightness().await, 100.0);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn starts_immediately_when_already_booted() {
        let service =
            LedService::new(config(), Arc::new(RecordingSink::new()), idle()).unwrap();
        assert!(service.is_ready());
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn color_and_flags_round_trip_through_zone_task() {
        let service =
            LedService::new(config(), Arc::new(RecordingSink::new()), idle()).unwrap();

        service.set_main_lighting_hue(200.0).await;
        service.set_main_lighting_saturation(50.0).await;
        service.set_main_lighting_brightness(75.0).await;
        assert_eq!(service.get_main_lighting_hue().await, 200.0);
        assert_eq!(service.get_main_lighting_saturation().await, 50.0);
        assert_eq!(service.get_main_lighting_brightness().await, 75.0);

        service.set_ring_lighting_hue(10.0).await;
        assert_eq!(service.get_ring_lighting_hue().await, 10.0);
        assert_eq!(service.get_ring_lighting_saturation().await, theme::BRAND.saturation);

        service.set_main_lighting_mode_flag("on_when_printing", true).await.unwrap();
        assert!(service.get_main_lighting_mode_flag("on_when_printing").await.unwrap());
        assert!(matches!(
            service.set_main_lighting_mode_flag("disco", true).await,
            Err(LedError::InvalidFlag(_))
        ));

        service.set_main_lighting_runtime_flag("message", true).await.unwrap();
        assert!(service.get_main_lighting_runtime_flag("message").await.unwrap());
        assert!(matches!(
            service.get_main_lighting_runtime_flag("busy").await,
            Err(LedError::InvalidFlag(_))
        ));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn properties_clamp_and_reset() {
        let service =
            LedService::new(config(), Arc::new(RecordingSink::new()), idle()).unwrap();

        service.set_property("user_brightness", 180.0.into()).await.unwrap();
        assert_eq!(
            service.get_property("user_brightness").await.unwrap(),
            SettingValue::Float(100.0)
        );
        service.set_main_lighting_user_brightness(-3.0).await.unwrap();
        assert_eq!(service.get_main_lighting_user_brightness().await, 0.0);

        service.set_property("party", true.into()).await.unwrap();
        service.reset_settings("soft").await.unwrap();

        let properties = service.list_properties().await;
        assert_eq!(properties.get("party"), Some(&SettingValue::Bool(false)));
        assert_eq!(properties.get("user_brightness"), Some(&SettingValue::Float(100.0)));
        assert_eq!(properties.len(), 4);

        assert!(matches!(
            service.get_property("disco").await,
            Err(LedError::PropertyNotFound(_))
        ));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn printer_events_reach_every_zone() {
        let sink = Arc::new(RecordingSink::new());
        let service = LedService::new(config(), sink.clone(), idle()).unwrap();

        service.publish(PrinterEvent::new("state", "error")).unwrap();
        tokio::time::sleep(Duration::from_secs(8)).await;

        let main = sink.last_frame(ZoneId::Main).unwrap();
        assert_eq!(main, crate::sink::Frame::from_hsv(theme::RED));
        assert!(sink.last_frame(ZoneId::ButtonRing).is_some());
        assert!(sink.last_frame(ZoneId::HeadSlot(0)).is_some());
        assert!(sink.last_frame(ZoneId::HeadSlot(1)).is_some());
        assert!(sink.last_frame(ZoneId::HeadSlot(2)).is_none());

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ring_zone_is_optional() {
        let config = ServiceConfig {
            button_ring: false,
            head_slots: 0,
            ..config()
        };
        let sink = Arc::new(RecordingSink::new());
        let service = LedService::new(config, sink.clone(), idle()).unwrap();

        service.set_ring_lighting_hue(90.0).await;
        assert_eq!(service.get_ring_lighting_hue().await, 0.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.last_frame(ZoneId::ButtonRing).is_none());
        assert!(sink.last_frame(ZoneId::Main).is_some());

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn preferences_file_is_created_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main_lighting.json");
        let config = ServiceConfig {
            preferences: Some(path.clone()),
            ..ServiceConfig::default()
        };
        let service = LedService::new(config, Arc::new(RecordingSink::new()), idle()).unwrap();
        service.set_main_lighting_user_brightness(40.0).await.unwrap();
        service.shutdown().await;

        let store = JsonRegistryFile::open(&path).unwrap();
        assert_eq!(store.get_float("user_brightness"), Some(40.0));
        assert_eq!(store.get_bool("glow_when_print_is_finished"), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_maps_calls_to_replies() {
        let service =
            LedService::new(config(), Arc::new(RecordingSink::new()), idle()).unwrap();

        let call: ServiceCall =
            serde_json::from_str(r#"{"method": "set_main_lighting_hue", "hue": 30.0}"#).unwrap();
        assert_eq!(service.dispatch(call).await, ServiceReply::Done);

        let reply = service.dispatch(ServiceCall::GetMainLightingHue).await;
        assert_eq!(reply, ServiceReply::Number(30.0));
        assert_eq!(serde_json::to_string(&reply).unwrap(), "30.0");

        let reply = service
            .dispatch(ServiceCall::SetMainLightingModeFlag {
                flag: "disco".to_string(),
                value: true,
            })
            .await;
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"error":"unknown flag: disco"}"#
        );

        let reply = service
            .dispatch(ServiceCall::GetMainLightingModeFlag {
                flag: "glow_when_print_is_finished".to_string(),
            })
            .await;
        assert_eq!(reply, ServiceReply::Flag(true));
        assert_eq!(serde_json::to_string(&ServiceReply::Done).unwrap(), "null");

        service.shutdown().await;
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_calls_point_to_properties() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let service =
            LedService::new(config(), Arc::new(RecordingSink::new()), idle()).unwrap();

        service.set_main_lighting_hue(10.0).await;
        assert!(!logs.text().contains("deprecated"));

        service.set_main_lighting_user_brightness(50.0).await.unwrap();
        service.get_main_lighting_mode_flag("party").await.unwrap();
        let text = logs.text();
        assert!(text.contains(
            "set_main_lighting_user_brightness is deprecated, please use the user_brightness property instead"
        ));
        assert!(text.contains(
            "get_main_lighting_mode_flag is deprecated, please use the party property instead"
        ));

        service.shutdown().await;
    }

    #[test]
    fn inbound_lines_parse_as_events_or_calls() {
        let line: Inbound = serde_json::from_str(r#"{"property": "state", "value": "idle"}"#).unwrap();
        assert_eq!(line, Inbound::Event(PrinterEvent::new("state", "idle")));

        let line: Inbound =
            serde_json::from_str(r#"{"method": "blink_main_lighting", "frequency": 2.0, "count": 3}"#)
                .unwrap();
        assert_eq!(
            line,
            Inbound::Call(ServiceCall::BlinkMainLighting {
                frequency: 2.0,
                count: 3
            })
        );

        assert!(serde_json::from_str::<Inbound>(r#"{"method": "self_destruct"}"#).is_err());
    }
}
