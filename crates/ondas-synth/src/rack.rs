//! The modulation rack: centralized ownership of modulation sources.
//!
//! Every modulation source in a voice graph lives in one [`ModRack`]. Docks
//! refer to sources by [`ModKey`] handle, never by owning reference, so the
//! lifetime of a source is decided in exactly one place and a stale handle
//! degrades to a no-op instead of dangling.
//!
//! Sources are stored behind `RefCell` because modulation is re-entrant: a
//! source being evaluated may itself own docks that reach back into the rack
//! for *other* sources. A genuine cycle - a source that transitively
//! modulates itself - would borrow a cell twice; the rack breaks the cycle
//! by letting the inner call pass its sample through unchanged.

use core::cell::{Ref, RefCell, RefMut};

use slotmap::{SlotMap, new_key_type};

use ondas_core::Sample;

use crate::envelope::Envelope;
use crate::lfo::{Lfo, LfoSequence};
use crate::macro_control::MacroControl;
use crate::traits::{Modulates, Ticks};

new_key_type! {
    /// Handle to a modulation source stored in a [`ModRack`].
    pub struct ModKey;
}

/// A modulation source owned by the rack.
///
/// The tagged union replaces a base-class hierarchy: concrete sources keep
/// their full typed API, and the audio path dispatches with a match instead
/// of a vtable.
#[derive(Debug)]
pub enum ModSource {
    /// A multi-segment envelope.
    Envelope(Envelope),
    /// A low-frequency oscillator.
    Lfo(Lfo),
    /// A looping step sequencer of envelope segments.
    LfoSequence(LfoSequence),
    /// A hand-dialed macro value.
    Macro(MacroControl),
}

impl ModSource {
    /// Borrow as an envelope, if that is what this source is.
    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            ModSource::Envelope(env) => Some(env),
            _ => None,
        }
    }

    /// Mutably borrow as an envelope.
    pub fn as_envelope_mut(&mut self) -> Option<&mut Envelope> {
        match self {
            ModSource::Envelope(env) => Some(env),
            _ => None,
        }
    }

    /// Borrow as an LFO.
    pub fn as_lfo(&self) -> Option<&Lfo> {
        match self {
            ModSource::Lfo(lfo) => Some(lfo),
            _ => None,
        }
    }

    /// Mutably borrow as an LFO.
    pub fn as_lfo_mut(&mut self) -> Option<&mut Lfo> {
        match self {
            ModSource::Lfo(lfo) => Some(lfo),
            _ => None,
        }
    }

    /// Borrow as an LFO sequence.
    pub fn as_lfo_sequence(&self) -> Option<&LfoSequence> {
        match self {
            ModSource::LfoSequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Mutably borrow as an LFO sequence.
    pub fn as_lfo_sequence_mut(&mut self) -> Option<&mut LfoSequence> {
        match self {
            ModSource::LfoSequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Borrow as a macro.
    pub fn as_macro(&self) -> Option<&MacroControl> {
        match self {
            ModSource::Macro(macro_ctl) => Some(macro_ctl),
            _ => None,
        }
    }

    /// Mutably borrow as a macro.
    pub fn as_macro_mut(&mut self) -> Option<&mut MacroControl> {
        match self {
            ModSource::Macro(macro_ctl) => Some(macro_ctl),
            _ => None,
        }
    }
}

impl Modulates for ModSource {
    fn modulate(&mut self, sample: Sample, depth: f64, maximum: f64, rack: &ModRack) -> Sample {
        match self {
            ModSource::Envelope(env) => env.modulate(sample, depth, maximum, rack),
            ModSource::Lfo(lfo) => lfo.modulate(sample, depth, maximum, rack),
            ModSource::LfoSequence(seq) => seq.modulate(sample, depth, maximum, rack),
            ModSource::Macro(macro_ctl) => macro_ctl.modulate(sample, depth, maximum, rack),
        }
    }
}

impl Ticks for ModSource {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        match self {
            ModSource::Envelope(env) => env.tick(rack),
            ModSource::Lfo(lfo) => lfo.tick(rack),
            ModSource::LfoSequence(seq) => seq.tick(rack),
            ModSource::Macro(macro_ctl) => macro_ctl.tick(rack),
        }
    }

    fn update(&mut self) {
        match self {
            ModSource::Envelope(env) => env.update(),
            ModSource::Lfo(lfo) => lfo.update(),
            ModSource::LfoSequence(seq) => seq.update(),
            ModSource::Macro(macro_ctl) => macro_ctl.update(),
        }
    }
}

/// The arena owning every modulation source of a voice graph.
///
/// # Example
///
/// ```rust
/// use ondas_synth::{MacroControl, ModRack, ModSource};
///
/// let mut rack = ModRack::new();
/// let key = rack.insert(ModSource::Macro(MacroControl::new(0.5)));
///
/// // The rack evaluates sources on behalf of docks:
/// let out = rack.modulate(key, 0.0, 1.0, 1.0);
/// assert!((out - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Default)]
pub struct ModRack {
    slots: SlotMap<ModKey, RefCell<ModSource>>,
}

impl ModRack {
    /// Create an empty rack.
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Create a rack with room for `capacity` sources before reallocation.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Move a source into the rack, returning its handle.
    pub fn insert(&mut self, source: ModSource) -> ModKey {
        self.slots.insert(RefCell::new(source))
    }

    /// Remove a source. Docks still holding its handle degrade to
    /// pass-through.
    pub fn remove(&mut self, key: ModKey) -> Option<ModSource> {
        self.slots.remove(key).map(RefCell::into_inner)
    }

    /// Whether `key` addresses a live source.
    pub fn contains(&self, key: ModKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of sources in the rack.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the rack holds no sources.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow a source immutably.
    ///
    /// # Panics
    ///
    /// Panics if the source is currently borrowed mutably; control-surface
    /// access must not overlap an in-flight audio pass.
    pub fn borrow(&self, key: ModKey) -> Option<Ref<'_, ModSource>> {
        self.slots.get(key).map(RefCell::borrow)
    }

    /// Borrow a source mutably.
    ///
    /// # Panics
    ///
    /// Panics if the source is currently borrowed; control-surface access
    /// must not overlap an in-flight audio pass.
    pub fn borrow_mut(&self, key: ModKey) -> Option<RefMut<'_, ModSource>> {
        self.slots.get(key).map(RefCell::borrow_mut)
    }

    /// Evaluate one source's `modulate` on behalf of a dock.
    ///
    /// A missing key or a cyclic borrow both return `sample` unchanged: a
    /// detached source stops modulating, and a source can never (even
    /// transitively) modulate itself into infinite recursion.
    pub fn modulate(&self, key: ModKey, sample: Sample, depth: f64, maximum: f64) -> Sample {
        match self.slots.get(key) {
            Some(cell) => match cell.try_borrow_mut() {
                Ok(mut source) => source.modulate(sample, depth, maximum, self),
                Err(_) => sample,
            },
            None => sample,
        }
    }

    /// Advance every source by one sample.
    ///
    /// Call exactly once per output sample, after all `tick`/`modulate`
    /// reads for that sample have happened across the graph.
    pub fn update_all(&self) {
        for (_key, cell) in &self.slots {
            cell.borrow_mut().update();
        }
    }
}
