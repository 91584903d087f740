//! Print head slot indicators.
//!
//! One zone per slot. The slot shows the brand color and pulses red while
//! the printer is in error. There is nothing to configure, so the zone
//! accepts no commands.

use crate::ZoneId;
use crate::color::theme;
use crate::controller::{STARTUP_FADE_TIME, ZoneController};
use crate::effect::Effect;
use crate::printer::{PrinterEvent, PrinterSnapshot};
use crate::scheduler::EffectQueue;
use std::convert::Infallible;
use tokio::time::Instant;

const ERROR_PULSE_FREQUENCY: f64 = 0.5;

#[derive(Debug)]
pub struct HeadSlotController {
    queue: EffectQueue,
    printer: PrinterSnapshot,
}

impl HeadSlotController {
    pub fn new(index: u8, printer: PrinterSnapshot) -> Self {
        let mut controller = Self {
            queue: EffectQueue::new(ZoneId::HeadSlot(index)),
            printer,
        };
        controller
            .queue
            .enqueue(Effect::fade(theme::BRAND, STARTUP_FADE_TIME), Instant::now());
        controller.update();
        controller
    }

    pub fn steady_effect(&self) -> Effect {
        if self.printer.is_error() {
            Effect::glow(theme::BLACK, theme::RED, ERROR_PULSE_FREQUENCY)
        } else {
            Effect::fixed(theme::BRAND)
        }
    }

    fn update(&mut self) {
        let effect = self.steady_effect();
        self.queue.enqueue(effect, Instant::now());
    }
}

impl ZoneController for HeadSlotController {
    type Command = Infallible;

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

    fn handle(&mut self, command: Infallible) {
        match command {}
    }
}
