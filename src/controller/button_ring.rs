//! Button ring lighting.
//!
//! The ring pulses when the printer needs the user and otherwise shows a
//! user-configurable theme color. First match wins:
//!
//! 1. error → glow black ↔ red
//! 2. interaction required → glow black ↔ yellow
//! 3. printing, job waiting for cleanup → glow black ↔ purple
//! 4. printing, job paused → glow black ↔ cyan
//! 5. otherwise → custom theme color

use crate::ZoneId;
use crate::color::{HsvColor, theme};
use crate::controller::{STARTUP_FADE_TIME, ZoneController};
use crate::effect::Effect;
use crate::printer::{JobState, PrinterEvent, PrinterSnapshot};
use crate::scheduler::EffectQueue;
use tokio::sync::oneshot;
use tokio::time::Instant;

const PULSE_FREQUENCY: f64 = 0.5;

#[derive(Debug)]
pub enum RingCommand {
    SetHue(f64),
    SetSaturation(f64),
    SetBrightness(f64),
    GetColor(oneshot::Sender<HsvColor>),
}

#[derive(Debug)]
pub struct ButtonRingController {
    queue: EffectQueue,
    printer: PrinterSnapshot,
    custom_theme: HsvColor,
}

impl ButtonRingController {
    pub fn new(printer: PrinterSnapshot) -> Self {
        let mut controller = Self {
            queue: EffectQueue::new(ZoneId::ButtonRing),
            printer,
            custom_theme: theme::BRAND,
        };
        controller
            .queue
            .enqueue(Effect::fade(theme::BRAND, STARTUP_FADE_TIME), Instant::now());
        controller.update();
        controller
    }

    pub fn custom_theme(&self) -> HsvColor {
        self.custom_theme
    }

    pub fn set_hue(&mut self, hue: f64) {
        self.custom_theme.hue = hue;
        self.update();
    }

    pub fn set_saturation(&mut self, saturation: f64) {
        self.custom_theme.saturation = saturation;
        self.update();
    }

    pub fn set_brightness(&mut self, brightness: f64) {
        self.custom_theme.value = brightness;
        self.update();
    }

    pub fn steady_effect(&self) -> Effect {
        let pulse = |color| Effect::glow(theme::BLACK, color, PULSE_FREQUENCY);

        if self.printer.is_error() {
            return pulse(theme::RED);
        }
        if self.printer.interaction_required {
            return pulse(theme::YELLOW);
        }
        match (self.printer.is_printing(), &self.printer.job_state) {
            (true, JobState::WaitCleanup) => pulse(theme::PURPLE),
            (true, JobState::Paused) => pulse(theme::CYAN),
            _ => Effect::fixed(self.custom_theme),
        }
    }

    fn update(&mut self) {
        let effect = self.steady_effect();
        self.queue.enqueue(effect, Instant::now());
    }
}

impl ZoneController for ButtonRingController {
    type Command = RingCommand;

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

    fn handle(&mut self, command: RingCommand) {
        match command {
            RingCommand::SetHue(hue) => self.set_hue(hue),
            RingCommand::SetSaturation(saturation) => self.set_saturation(saturation),
            RingCommand::SetBrightness(brightness) => self.set_brightness(brightness),
            RingCommand::GetColor(reply) => {
                let _ = reply.send(self.custom_theme);
            }
        }
    }
}
