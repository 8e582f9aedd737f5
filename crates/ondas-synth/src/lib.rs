//! Ondas Synth - modulation routing and synthesis voice
//!
//! This crate is the sound-generation core of the ondas synthesizer: a
//! per-sample signal graph combining wavetable oscillators, envelope/LFO
//! sequencers, and a generic modulation-routing mechanism.
//!
//! # Core Components
//!
//! ## Modulation Routing
//!
//! - [`ModDock`] - per-parameter routing point with sidechaining
//! - [`ModRack`] / [`ModKey`] / [`ModSource`] - centralized source
//!   ownership, addressed by handle
//! - [`MacroControl`] - the simplest modulation source
//!
//! ```rust
//! use ondas_synth::{MacroControl, ModDock, ModRack, ModSource};
//!
//! let mut rack = ModRack::new();
//! let key = rack.insert(ModSource::Macro(MacroControl::new(0.5)));
//!
//! let mut cutoff = ModDock::new(0.0, 1.0, 0.5);
//! let item = cutoff.attach(key);
//! cutoff.set_depth(item, 0.5).unwrap();
//!
//! let modulated = cutoff.tick(&rack);
//! assert!(modulated > 0.5);
//! ```
//!
//! ## Envelopes & Sequencers
//!
//! - [`EnvelopeSegment`] / [`EnvelopeSegmentSequence`] - curved ramps and
//!   loopable timelines
//! - [`Envelope`] - six named segments with a hidden loop connector
//! - [`Lfo`] / [`LfoSequence`] - oscillator modulators and the looping step
//!   sequencer
//!
//! ## The FM Network
//!
//! - [`Operator`] - a note-tracking oscillator with a mode-dependent level
//! - [`Fm`] - four operators wired by one of twelve fixed algorithms
//! - [`Voice`] - the top-level graph owner driving the two-phase protocol
//!
//! # The tick/update protocol
//!
//! Every unit separates reading from advancing: `tick()` produces the
//! current sample, `update()` moves one sample forward. The whole graph is
//! ticked against the same logical sample before anything updates, so
//! cross-unit modulation never sees a half-advanced graph. [`Voice`] wires
//! this up correctly; drive units by hand only in the same order.
//!
//! # Errors
//!
//! Control-surface setters validate their documented ranges and reject bad
//! values with [`UnitError`] - nothing is silently clamped at the surface.
//! Aggregated modulation results, by contrast, are clamped to their dock
//! boundaries by design.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! ondas-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dock;
pub mod envelope;
pub mod error;
pub mod fm;
pub mod lfo;
pub mod macro_control;
pub mod operator;
pub mod rack;
pub mod segment;
pub mod traits;
pub mod voice;

pub use dock::ModDock;
pub use envelope::{Envelope, EnvelopeStage};
pub use error::UnitError;
pub use fm::{ALGORITHM_COUNT, Fm, OperatorSlot};
pub use lfo::{Lfo, LfoDock, LfoSequence, LfoSequenceDock};
pub use macro_control::MacroControl;
pub use operator::{
    Operator, OperatorLevel, OperatorMode, frequency_to_semitones, note_to_frequency,
};
pub use rack::{ModKey, ModRack, ModSource};
pub use segment::{EnvelopeSegment, EnvelopeSegmentSequence, SegmentDock};
pub use traits::{Modulates, Ticks};
pub use voice::Voice;

// Re-export the core types the synth API surfaces.
pub use ondas_core::{AudioContext, Sample, WaveShape, Wavetable, WavetableBank};
