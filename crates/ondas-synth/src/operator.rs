//! The FM operator: an oscillator specialized for a synthesizer voice.
//!
//! An operator tracks a musical note, a frequency ratio and offset on top of
//! it, and a level whose meaning depends on how the operator is wired: mixed
//! straight into the output it is a plain 0-1 amplitude, but used as a
//! frequency-modulation source it is a 0-10 modulation index that scales
//! with the operator's real frequency (the index beta relates amplitude and
//! frequency as `beta = amplitude / frequency`).

use alloc::sync::Arc;

use ondas_core::{AudioContext, Oscillator, Sample, Wavetable};

use crate::dock::ModDock;
use crate::error::{UnitError, check_range};
use crate::rack::{ModKey, ModRack};

/// How an operator's level is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorMode {
    /// Level is a 0-1 amplitude; the operator is mixed into the output.
    Additive,
    /// Level is a 0-10 modulation index; the operator frequency-modulates
    /// another operator.
    Fm,
}

/// An operator level, carrying its mode-specific meaning explicitly.
///
/// Converting between modes rescales the value: a full additive amplitude
/// of 1 corresponds to a full modulation index of 10.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OperatorLevel {
    /// Amplitude, 0-1.
    Additive(f64),
    /// Modulation index, 0-10.
    FmIndex(f64),
}

impl OperatorLevel {
    /// The raw level value in its mode's units.
    pub fn value(self) -> f64 {
        match self {
            OperatorLevel::Additive(value) | OperatorLevel::FmIndex(value) => value,
        }
    }

    /// The mode this level belongs to.
    pub fn mode(self) -> OperatorMode {
        match self {
            OperatorLevel::Additive(_) => OperatorMode::Additive,
            OperatorLevel::FmIndex(_) => OperatorMode::Fm,
        }
    }

    /// Upper bound of the level range in this mode.
    fn bound(self) -> f64 {
        match self {
            OperatorLevel::Additive(_) => 1.0,
            OperatorLevel::FmIndex(_) => 10.0,
        }
    }

    /// Convert to the other mode, rescaling by the factor of 10 between the
    /// two ranges.
    fn converted(self, mode: OperatorMode) -> Self {
        match (self, mode) {
            (OperatorLevel::Additive(value), OperatorMode::Fm) => {
                OperatorLevel::FmIndex(value * 10.0)
            }
            (OperatorLevel::FmIndex(value), OperatorMode::Additive) => {
                OperatorLevel::Additive(value / 10.0)
            }
            (level, _) => level,
        }
    }
}

/// Convert a MIDI note number to a frequency in Hz (12-TET, A4 = 440).
pub fn note_to_frequency(note: u8) -> f64 {
    440.0 * libm::exp2((f64::from(note) - 69.0) / 12.0)
}

/// The interval between two frequencies in semitones; 0 if either is
/// silent.
pub fn frequency_to_semitones(base: f64, target: f64) -> f64 {
    if base <= 0.0 || target <= 0.0 {
        return 0.0;
    }
    12.0 * libm::log2(target / base)
}

/// A note-tracking wavetable oscillator with a mode-dependent level.
///
/// # Example
///
/// ```rust
/// use ondas_core::{AudioContext, WaveShape, WavetableBank};
/// use ondas_synth::{ModRack, Operator, OperatorMode};
///
/// let ctx = AudioContext::new(44100, 4096);
/// let bank = WavetableBank::new(ctx);
/// let rack = ModRack::new();
///
/// let mut op = Operator::new(ctx, bank.get(WaveShape::Sine), OperatorMode::Additive);
/// op.set_note(69).unwrap();
/// assert!((op.frequency() - 440.0).abs() < 1e-9);
///
/// let _sample = op.tick(&rack);
/// op.update();
/// ```
#[derive(Clone, Debug)]
pub struct Operator {
    ctx: AudioContext,
    osc: Oscillator,
    note: u8,
    note_freq: f64,
    ratio: f64,
    /// Frequency offset in Hz; may be negative.
    freq_offset: f64,
    /// Table-index increment equivalent of `freq_offset`.
    index_offset: f64,
    /// Table-index increment from the current frequency-modulation value.
    mod_offset: f64,
    semitone_offset: f64,
    /// `note_freq * ratio + freq_offset`.
    real_freq: f64,
    level: OperatorLevel,
    /// Effective output amplitude derived from the level and mode.
    amp: f64,
    level_dock: ModDock,
    active: bool,
}

impl Operator {
    /// Create an operator over `table` in the given mode, at full level,
    /// ratio 1, and no offsets. Silent until a note arrives.
    pub fn new(ctx: AudioContext, table: Arc<Wavetable>, mode: OperatorMode) -> Self {
        let level = match mode {
            OperatorMode::Additive => OperatorLevel::Additive(1.0),
            OperatorMode::Fm => OperatorLevel::FmIndex(1.0),
        };

        let mut operator = Self {
            ctx,
            osc: Oscillator::new(ctx, table, 0.0, 0.0),
            note: 0,
            note_freq: 0.0,
            ratio: 1.0,
            freq_offset: 0.0,
            index_offset: 0.0,
            mod_offset: 0.0,
            semitone_offset: 0.0,
            real_freq: 0.0,
            level,
            amp: 0.0,
            level_dock: ModDock::new(0.0, level.bound(), level.value()),
            active: true,
        };
        operator.recalculate_amp();
        operator
    }

    /// Switch the level interpretation, converting the stored level and the
    /// level dock's range along with it.
    pub fn set_mode(&mut self, mode: OperatorMode) {
        if self.level.mode() == mode {
            return;
        }

        self.level = self.level.converted(mode);
        self.level_dock.set_higher_boundary(self.level.bound());
        self.level_dock.set_base_value(self.level.value());
        self.recalculate_amp();
    }

    /// The current level interpretation.
    pub fn mode(&self) -> OperatorMode {
        self.level.mode()
    }

    /// Set the level: 0-1 amplitude in additive mode, 0-10 modulation index
    /// in FM mode.
    pub fn set_level(&mut self, level: f64) -> Result<(), UnitError> {
        check_range("operator level", level, 0.0, self.level.bound())?;

        self.level = match self.level {
            OperatorLevel::Additive(_) => OperatorLevel::Additive(level),
            OperatorLevel::FmIndex(_) => OperatorLevel::FmIndex(level),
        };
        self.level_dock.set_base_value(level);
        self.recalculate_amp();
        Ok(())
    }

    /// The level in its mode's units (the dock base value while modulated).
    pub fn level(&self) -> f64 {
        if self.level_dock.in_use() {
            self.level_dock.base_value()
        } else {
            self.level.value()
        }
    }

    /// Track a note, 0-127. Recomputes the oscillation frequency from the
    /// note frequency, ratio, and offset.
    pub fn set_note(&mut self, note: u8) -> Result<(), UnitError> {
        if note > 127 {
            return Err(UnitError::Note(note));
        }

        self.note = note;
        self.note_freq = note_to_frequency(note);
        self.apply_frequency();
        Ok(())
    }

    /// The tracked note.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Set the frequency ratio over the note frequency, non-negative.
    pub fn set_ratio(&mut self, ratio: f64) -> Result<(), UnitError> {
        if ratio < 0.0 || ratio.is_nan() {
            return Err(UnitError::OutOfRange {
                param: "frequency ratio",
                value: ratio,
                min: 0.0,
                max: f64::INFINITY,
            });
        }

        self.ratio = ratio;
        self.apply_frequency();
        Ok(())
    }

    /// The frequency ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Set a frequency offset in Hz on top of the ratioed note frequency.
    /// Negative offsets are allowed and can run the table backwards.
    pub fn set_frequency_offset(&mut self, hz: f64) {
        self.freq_offset = hz;
        self.apply_offset();
    }

    /// The frequency offset in Hz.
    pub fn frequency_offset(&self) -> f64 {
        self.freq_offset
    }

    /// Set the offset as a musical interval in semitones relative to the
    /// ratioed note frequency.
    pub fn set_semitone_offset(&mut self, semitones: f64) {
        let base = self.note_freq * self.ratio;
        self.freq_offset = base * (libm::exp2(semitones / 12.0) - 1.0);
        self.apply_offset();
    }

    /// The offset expressed in semitones.
    pub fn semitone_offset(&self) -> f64 {
        self.semitone_offset
    }

    /// The operator's real frequency: `note_freq * ratio + offset`.
    pub fn frequency(&self) -> f64 {
        self.real_freq
    }

    /// Feed a frequency-modulation value, in Hz, for the next `update`.
    /// The FM network calls this every sample for modulated carriers.
    pub fn modulate_frequency(&mut self, hz: f64) {
        self.mod_offset = self.ctx.table_increment() * hz;
    }

    /// Drop the note and go silent: zero frequency means a standing index.
    pub fn set_silent(&mut self) {
        self.note = 0;
        self.note_freq = 0.0;
        self.mod_offset = 0.0;
        self.osc.set_frequency(0.0);
        self.osc.reset();
        self.real_freq = self.freq_offset;
        self.semitone_offset = 0.0;
        self.recalculate_amp();
    }

    /// Whether the operator participates in the FM network.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Include or exclude the operator from the FM network.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Set the oscillator's absolute phase offset in degrees.
    pub fn set_phase_offset(&mut self, degrees: f64) {
        self.osc.set_phase_offset(degrees);
    }

    /// Current fractional table index of the underlying oscillator.
    pub fn phase_index(&self) -> f64 {
        self.osc.phase_index()
    }

    /// Swap the oscillator's wavetable.
    pub fn set_wavetable(&mut self, table: Arc<Wavetable>) {
        self.osc.set_wavetable(table);
    }

    /// Produce the current sample: the interpolated table value scaled by
    /// the effective amplitude.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        if self.level_dock.in_use() {
            let level = self.level_dock.tick(rack);
            self.level = match self.level {
                OperatorLevel::Additive(_) => OperatorLevel::Additive(level),
                OperatorLevel::FmIndex(_) => OperatorLevel::FmIndex(level),
            };
            self.recalculate_amp();
        }

        self.osc.tick() * self.amp
    }

    /// Advance by one sample: the note increment plus the offset and
    /// frequency-modulation increments.
    pub fn update(&mut self) {
        self.osc.update_with_offset(self.index_offset + self.mod_offset);
    }

    /// Attach a modulation source to the level dock.
    pub fn attach_level_mod(&mut self, source: ModKey) -> usize {
        self.level_dock.attach(source)
    }

    /// Detach an item from the level dock.
    pub fn detach_level_mod(&mut self, index: usize) -> Result<(), UnitError> {
        self.level_dock.detach(index)
    }

    /// Set an item's depth in the level dock.
    pub fn set_level_mod_depth(&mut self, index: usize, depth: f64) -> Result<(), UnitError> {
        self.level_dock.set_depth(index, depth)
    }

    /// Sidechain two items in the level dock.
    pub fn set_sidechain(&mut self, master: usize, slave: usize) -> Result<(), UnitError> {
        self.level_dock.set_sidechain(master, slave)
    }

    /// Cut a sidechain in the level dock.
    pub fn un_sidechain(&mut self, master: usize, slave: usize) -> Result<(), UnitError> {
        self.level_dock.un_sidechain(master, slave)
    }

    /// Whether two items in the level dock are sidechained.
    pub fn is_sidechain(&self, master: usize, slave: usize) -> Result<bool, UnitError> {
        self.level_dock.is_sidechain(master, slave)
    }

    /// Borrow the level dock.
    pub fn level_dock(&self) -> &ModDock {
        &self.level_dock
    }

    /// Mutably borrow the level dock.
    pub fn level_dock_mut(&mut self) -> &mut ModDock {
        &mut self.level_dock
    }

    /// Recompute everything downstream of the pre-offset frequency.
    fn apply_frequency(&mut self) {
        let freq = self.note_freq * self.ratio;
        self.osc.set_frequency(freq);
        self.real_freq = freq + self.freq_offset;
        self.semitone_offset = frequency_to_semitones(freq, self.real_freq);
        self.recalculate_amp();
    }

    /// Recompute everything downstream of the frequency offset.
    fn apply_offset(&mut self) {
        let freq = self.note_freq * self.ratio;
        self.real_freq = freq + self.freq_offset;
        self.index_offset = self.ctx.table_increment() * self.freq_offset;
        self.semitone_offset = frequency_to_semitones(freq, self.real_freq);
        self.recalculate_amp();
    }

    /// In FM mode the modulation index beta scales with the real frequency
    /// (`amplitude = beta * frequency`); in additive mode the level is the
    /// amplitude.
    fn recalculate_amp(&mut self) {
        self.amp = match self.level {
            OperatorLevel::Additive(value) => value,
            OperatorLevel::FmIndex(value) => value * self.real_freq,
        };
    }
}

impl crate::traits::Ticks for Operator {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        Operator::tick(self, rack)
    }

    fn update(&mut self) {
        Operator::update(self);
    }
}
