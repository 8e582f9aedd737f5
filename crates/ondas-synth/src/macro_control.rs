//! Macro control: the simplest modulation source.
//!
//! A macro is a dialable value in [-1, 1] that other units can dock onto -
//! typically wired to a front-panel knob by the surrounding system. Its own
//! value has a dock of its own, so macros can chain.

use ondas_core::Sample;

use crate::dock::ModDock;
use crate::error::{UnitError, check_range};
use crate::rack::ModRack;
use crate::traits::{Modulates, Ticks};

/// A hand-dialed modulation value.
///
/// `modulate` contributes `maximum * value * depth` on top of the incoming
/// sample.
#[derive(Clone, Debug)]
pub struct MacroControl {
    value: f64,
    dock: ModDock,
}

impl MacroControl {
    /// Create a macro at `value`, clamped into [-1, 1].
    pub fn new(value: f64) -> Self {
        Self {
            value: value.clamp(-1.0, 1.0),
            dock: ModDock::new(-1.0, 1.0, value),
        }
    }

    /// Set the macro value, in [-1, 1].
    pub fn set_value(&mut self, value: f64) -> Result<(), UnitError> {
        check_range("macro value", value, -1.0, 1.0)?;
        self.value = value;
        self.dock.set_base_value(value);
        Ok(())
    }

    /// The dialed value (the dock base value while modulated).
    pub fn value(&self) -> f64 {
        if self.dock.in_use() {
            self.dock.base_value()
        } else {
            self.value
        }
    }

    /// The dock over the macro's value.
    pub fn dock(&self) -> &ModDock {
        &self.dock
    }

    /// Mutable access to the dock over the macro's value.
    pub fn dock_mut(&mut self) -> &mut ModDock {
        &mut self.dock
    }
}

impl Default for MacroControl {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Modulates for MacroControl {
    fn modulate(&mut self, sample: Sample, depth: f64, maximum: f64, rack: &ModRack) -> Sample {
        if self.dock.in_use() {
            self.value = self.dock.tick(rack);
        }
        sample + maximum * self.value * depth
    }
}

impl Ticks for MacroControl {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        if self.dock.in_use() {
            self.value = self.dock.tick(rack);
        }
        self.value
    }

    fn update(&mut self) {}
}
