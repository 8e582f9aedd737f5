//! Fractional-index wavetable oscillator.
//!
//! The oscillator keeps a fractional index into a shared [`Wavetable`] and
//! advances it by `frequency * table_increment` once per sample. Reading
//! (`tick`) and advancing (`update`) are separate so that a whole graph of
//! oscillators can be read against the same logical sample before any of
//! them move forward.

use alloc::sync::Arc;

use crate::Sample;
use crate::context::AudioContext;
use crate::wavetable::Wavetable;

/// A table-lookup oscillator with linear interpolation.
///
/// # Example
///
/// ```rust
/// use ondas_core::{AudioContext, Oscillator, WaveShape, WavetableBank};
///
/// let ctx = AudioContext::new(44100, 4096);
/// let bank = WavetableBank::new(ctx);
///
/// let mut osc = Oscillator::new(ctx, bank.get(WaveShape::Sine), 220.0, 0.0);
/// for _ in 0..64 {
///     let _sample = osc.tick();
///     osc.update();
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Oscillator {
    ctx: AudioContext,
    table: Arc<Wavetable>,
    /// Current fractional table index in `[0, len)`.
    index: f64,
    /// Phase offset in table-index units, derived from degrees.
    index_offset: f64,
    frequency: f64,
    /// Index increment per sample: `frequency * table_increment`.
    increment: f64,
}

impl Oscillator {
    /// Create an oscillator over `table` at `frequency` Hz with a phase
    /// offset in degrees.
    pub fn new(ctx: AudioContext, table: Arc<Wavetable>, frequency: f64, phase_degrees: f64) -> Self {
        let mut osc = Self {
            ctx,
            table,
            index: 0.0,
            index_offset: 0.0,
            frequency: 0.0,
            increment: 0.0,
        };
        osc.set_phase_offset(phase_degrees);
        osc.set_frequency(frequency);
        osc
    }

    /// Swap in a different wavetable; the index position is kept.
    pub fn set_wavetable(&mut self, table: Arc<Wavetable>) {
        self.table = table;
        self.wrap_index();
    }

    /// The wavetable currently in use.
    pub fn wavetable(&self) -> &Arc<Wavetable> {
        &self.table
    }

    /// Set the frequency in Hz.
    ///
    /// Negative frequencies are allowed and run the table backwards; owners
    /// layering offsets on top of a note frequency rely on this.
    pub fn set_frequency(&mut self, hz: f64) {
        self.frequency = hz;
        self.increment = self.ctx.table_increment() * hz;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Set an absolute phase offset in degrees.
    ///
    /// The value is normalized into [0, 360). The previous offset is removed
    /// from the index before the new one is applied, so repeated calls set an
    /// absolute offset rather than accumulating.
    pub fn set_phase_offset(&mut self, degrees: f64) {
        let degrees = rem_euclid(degrees, 360.0);

        self.index -= self.index_offset;
        self.index_offset = self.table.len() as f64 * degrees / 360.0;
        self.index += self.index_offset;

        self.wrap_index();
    }

    /// Current phase offset in degrees, in [0, 360).
    pub fn phase_offset(&self) -> f64 {
        self.index_offset * 360.0 / self.table.len() as f64
    }

    /// Current fractional table index.
    pub fn phase_index(&self) -> f64 {
        self.index
    }

    /// Return the index to the phase offset position.
    pub fn reset(&mut self) {
        self.index = self.index_offset;
    }

    /// Produce the current sample without advancing.
    #[inline]
    pub fn tick(&self) -> Sample {
        self.table.interpolate(self.index)
    }

    /// Advance the index by one sample's increment.
    #[inline]
    pub fn update(&mut self) {
        self.advance_index(self.increment);
    }

    /// Advance with an additional index offset on top of the oscillator's
    /// own increment. Owners that layer frequency offsets or per-sample
    /// frequency modulation onto a base pitch advance through this.
    #[inline]
    pub fn update_with_offset(&mut self, extra: f64) {
        self.advance_index(self.increment + extra);
    }

    #[inline]
    fn advance_index(&mut self, amount: f64) {
        self.index += amount;
        self.wrap_index();
    }

    /// Wrap the index into `[0, len)`, handling overshoot in both
    /// directions (negative increments run the table backwards).
    #[inline]
    fn wrap_index(&mut self) {
        let len = self.table.len() as f64;
        while self.index >= len {
            self.index -= len;
        }
        while self.index < 0.0 {
            self.index += len;
        }
    }
}

/// Euclidean remainder for f64, compatible with no_std. Tiny negative
/// inputs can round `r + b` up to exactly `b`, so the result is folded back
/// into `[0, b)` from both sides.
#[inline]
fn rem_euclid(a: f64, b: f64) -> f64 {
    let r = a - b * libm::floor(a / b);
    if r < 0.0 {
        r + b
    } else if r >= b {
        r - b
    } else {
        r
    }
}
