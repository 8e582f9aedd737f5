//! Low-frequency oscillators and the LFO step sequencer.
//!
//! An [`Lfo`] is a wavetable oscillator wrapped in the modulation-source
//! contract, with docks over its own frequency, phase, and amplitude so that
//! a modulator can itself be modulated.
//!
//! An [`LfoSequence`] treats a whole segment sequence as a step sequencer:
//! one `rate` in Hz is divided evenly across the segments, the sequence
//! loops forever, and each step owns a rack-resident LFO attached to its
//! level docks so the step itself can wobble.

use alloc::sync::Arc;
use alloc::vec::Vec;

use ondas_core::{AudioContext, Oscillator, Sample, WaveShape, Wavetable, WavetableBank};

use crate::dock::ModDock;
use crate::error::{UnitError, check_range};
use crate::rack::{ModKey, ModRack, ModSource};
use crate::segment::{EnvelopeSegmentSequence, SegmentDock};
use crate::traits::{Modulates, Ticks};

/// The three modulatable parameters of an LFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LfoDock {
    /// Oscillation frequency, 0-100 Hz.
    Frequency = 0,
    /// Phase offset, 0-360 degrees.
    Phase = 1,
    /// Output amplitude, 0-1.
    Amp = 2,
}

/// A low-frequency oscillator usable as a modulation source.
///
/// `modulate` contributes `maximum * osc * depth * amp` on top of the
/// incoming sample, refreshing frequency, phase, and amplitude from their
/// docks first.
#[derive(Clone, Debug)]
pub struct Lfo {
    osc: Oscillator,
    amp: f64,
    docks: [ModDock; 3],
}

impl Lfo {
    /// Create an LFO over `table` with frequency in Hz, amplitude 0-1, and
    /// a phase offset in degrees.
    pub fn new(
        ctx: AudioContext,
        table: Arc<Wavetable>,
        frequency: f64,
        amp: f64,
        phase_degrees: f64,
    ) -> Self {
        let osc = Oscillator::new(ctx, table, frequency, phase_degrees);
        Self {
            amp,
            docks: [
                ModDock::new(0.0, 100.0, frequency),
                ModDock::new(0.0, 360.0, phase_degrees),
                ModDock::new(0.0, 1.0, amp),
            ],
            osc,
        }
    }

    /// Set the frequency, 0-100 Hz.
    pub fn set_frequency(&mut self, hz: f64) -> Result<(), UnitError> {
        check_range("LFO frequency", hz, 0.0, 100.0)?;
        self.osc.set_frequency(hz);
        self.docks[LfoDock::Frequency as usize].set_base_value(hz);
        Ok(())
    }

    /// Write a derived frequency without range validation. Step sequencers
    /// scale their LFOs by segment length, which can legitimately exceed
    /// the hand-dialed range.
    pub(crate) fn set_scaled_frequency(&mut self, hz: f64) {
        self.osc.set_frequency(hz);
        self.docks[LfoDock::Frequency as usize].set_base_value(hz);
    }

    /// The frequency in Hz (the dock base value while modulated).
    pub fn frequency(&self) -> f64 {
        if self.docks[LfoDock::Frequency as usize].in_use() {
            self.docks[LfoDock::Frequency as usize].base_value()
        } else {
            self.osc.frequency()
        }
    }

    /// Set the absolute phase offset in degrees (normalized into [0, 360)).
    pub fn set_phase_offset(&mut self, degrees: f64) {
        self.osc.set_phase_offset(degrees);
        self.docks[LfoDock::Phase as usize].set_base_value(self.osc.phase_offset());
    }

    /// The phase offset in degrees.
    pub fn phase_offset(&self) -> f64 {
        if self.docks[LfoDock::Phase as usize].in_use() {
            self.docks[LfoDock::Phase as usize].base_value()
        } else {
            self.osc.phase_offset()
        }
    }

    /// Set the amplitude, 0-1.
    pub fn set_amp(&mut self, amp: f64) -> Result<(), UnitError> {
        check_range("LFO amplitude", amp, 0.0, 1.0)?;
        self.amp = amp;
        self.docks[LfoDock::Amp as usize].set_base_value(amp);
        Ok(())
    }

    /// The amplitude (the dock base value while modulated).
    pub fn amp(&self) -> f64 {
        if self.docks[LfoDock::Amp as usize].in_use() {
            self.docks[LfoDock::Amp as usize].base_value()
        } else {
            self.amp
        }
    }

    /// Swap the wavetable.
    pub fn set_wavetable(&mut self, table: Arc<Wavetable>) {
        self.osc.set_wavetable(table);
    }

    /// Borrow one of the LFO's docks.
    pub fn dock(&self, which: LfoDock) -> &ModDock {
        &self.docks[which as usize]
    }

    /// Mutably borrow one of the LFO's docks.
    pub fn dock_mut(&mut self, which: LfoDock) -> &mut ModDock {
        &mut self.docks[which as usize]
    }

    /// Attach a modulation source to one of the docks.
    pub fn attach_mod(&mut self, which: LfoDock, source: ModKey) -> usize {
        self.docks[which as usize].attach(source)
    }

    /// Detach an item from one of the docks.
    pub fn detach_mod(&mut self, which: LfoDock, index: usize) -> Result<(), UnitError> {
        self.docks[which as usize].detach(index)
    }

    /// Set an item's depth in one of the docks.
    pub fn set_mod_depth(
        &mut self,
        which: LfoDock,
        index: usize,
        depth: f64,
    ) -> Result<(), UnitError> {
        self.docks[which as usize].set_depth(index, depth)
    }

    /// Sidechain two items in one of the docks.
    pub fn set_sidechain(
        &mut self,
        which: LfoDock,
        master: usize,
        slave: usize,
    ) -> Result<(), UnitError> {
        self.docks[which as usize].set_sidechain(master, slave)
    }

    /// Cut a sidechain in one of the docks.
    pub fn un_sidechain(
        &mut self,
        which: LfoDock,
        master: usize,
        slave: usize,
    ) -> Result<(), UnitError> {
        self.docks[which as usize].un_sidechain(master, slave)
    }

    /// Whether two items in one of the docks are sidechained.
    pub fn is_sidechain(
        &self,
        which: LfoDock,
        master: usize,
        slave: usize,
    ) -> Result<bool, UnitError> {
        self.docks[which as usize].is_sidechain(master, slave)
    }
}

impl Modulates for Lfo {
    fn modulate(&mut self, sample: Sample, depth: f64, maximum: f64, rack: &ModRack) -> Sample {
        if self.docks[LfoDock::Frequency as usize].in_use() {
            let hz = self.docks[LfoDock::Frequency as usize].tick(rack);
            self.osc.set_frequency(hz);
        }
        if self.docks[LfoDock::Phase as usize].in_use() {
            let degrees = self.docks[LfoDock::Phase as usize].tick(rack);
            self.osc.set_phase_offset(degrees);
        }
        if self.docks[LfoDock::Amp as usize].in_use() {
            self.amp = self.docks[LfoDock::Amp as usize].tick(rack);
        }

        sample + maximum * self.osc.tick() * depth * self.amp
    }
}

impl Ticks for Lfo {
    fn tick(&mut self, _rack: &ModRack) -> Sample {
        self.osc.tick() * self.amp
    }

    fn update(&mut self) {
        self.osc.update();
    }
}

/// The two sequence-level modulatable parameters of an [`LfoSequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LfoSequenceDock {
    /// Sequence rate, 0-10 Hz.
    Rate = 0,
    /// Output amplitude, 0-1.
    Amp = 1,
}

/// One step's rack-resident LFO.
#[derive(Clone, Copy, Debug)]
struct StepLfo {
    key: ModKey,
    /// Wobble frequency in cycles per segment; rescaled to Hz whenever the
    /// segment length changes.
    freq: f64,
}

/// A looping step sequencer of envelope segments.
///
/// Segment lengths derive from a single rate: at `rate` Hz over `n`
/// segments, each step lasts `sample_rate / rate / n` samples. Each step's
/// levels sit at 1 with the step's own LFO docked in at item 0, so
/// [`set_mod_depth`](Self::set_mod_depth) dials how much the step wobbles.
///
/// The step LFOs live in the [`ModRack`] and are advanced by
/// [`ModRack::update_all`], not by this sequence's `update`.
#[derive(Debug)]
pub struct LfoSequence {
    ctx: AudioContext,
    seq: EnvelopeSegmentSequence,
    steps: Vec<StepLfo>,
    /// Table handed to newly created step LFOs.
    sine: Arc<Wavetable>,
    rate: f64,
    segment_length: usize,
    amp: f64,
    docks: [ModDock; 2],
}

impl LfoSequence {
    /// Create a sequence of `segment_count` steps at `rate` Hz (strictly
    /// positive, at most 10). The per-step LFOs are inserted into `rack`.
    pub fn new(
        ctx: AudioContext,
        bank: &WavetableBank,
        segment_count: usize,
        rate: f64,
        rack: &mut ModRack,
    ) -> Result<Self, UnitError> {
        assert!(segment_count > 0, "sequence needs at least one segment");
        Self::check_rate(rate)?;

        let mut seq = EnvelopeSegmentSequence::new(segment_count);
        seq.set_loop_start(0)?;
        seq.set_loop_end(segment_count - 1)?;
        seq.set_loop_inf(true);

        let sine = bank.get(WaveShape::Sine);

        let mut steps = Vec::with_capacity(segment_count);
        for index in 0..segment_count {
            let key = rack.insert(ModSource::Lfo(Lfo::new(
                ctx,
                Arc::clone(&sine),
                0.0,
                1.0,
                0.0,
            )));
            seq.attach_mod_segment(index, SegmentDock::StartLevel, key)?;
            seq.attach_mod_segment(index, SegmentDock::EndLevel, key)?;
            seq.set_segment_both_levels(index, 1.0)?;
            steps.push(StepLfo { key, freq: 1.0 });
        }

        let mut sequence = Self {
            ctx,
            seq,
            steps,
            sine,
            rate: 0.0,
            segment_length: 0,
            amp: 1.0,
            docks: [ModDock::new(0.0, 10.0, rate), ModDock::new(0.0, 1.0, 1.0)],
        };
        sequence.set_rate(rate, rack)?;
        Ok(sequence)
    }

    /// Set the sequence rate in Hz, strictly positive and at most 10.
    /// Resizes every segment and rescales every step LFO.
    pub fn set_rate(&mut self, hz: f64, rack: &ModRack) -> Result<(), UnitError> {
        Self::check_rate(hz)?;
        self.rate = hz;
        self.docks[LfoSequenceDock::Rate as usize].set_base_value(hz);
        self.resize_segments(rack);
        Ok(())
    }

    /// The sequence rate in Hz (the dock base value while modulated).
    pub fn rate(&self) -> f64 {
        if self.docks[LfoSequenceDock::Rate as usize].in_use() {
            self.docks[LfoSequenceDock::Rate as usize].base_value()
        } else {
            self.rate
        }
    }

    /// Set the output amplitude, 0-1.
    pub fn set_amp(&mut self, amp: f64) -> Result<(), UnitError> {
        check_range("sequence amplitude", amp, 0.0, 1.0)?;
        self.amp = amp;
        self.docks[LfoSequenceDock::Amp as usize].set_base_value(amp);
        Ok(())
    }

    /// The output amplitude (the dock base value while modulated).
    pub fn amp(&self) -> f64 {
        if self.docks[LfoSequenceDock::Amp as usize].in_use() {
            self.docks[LfoSequenceDock::Amp as usize].base_value()
        } else {
            self.amp
        }
    }

    /// The derived per-segment length in samples.
    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the sequence holds no steps. Never true: construction and
    /// removal both keep at least one.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Set how strongly a step's LFO wobbles its levels, in [-1, 1].
    pub fn set_mod_depth(&mut self, step: usize, depth: f64) -> Result<(), UnitError> {
        self.check_step(step)?;
        self.seq
            .set_mod_depth_segment(step, SegmentDock::StartLevel, 0, depth)?;
        self.seq
            .set_mod_depth_segment(step, SegmentDock::EndLevel, 0, depth)
    }

    /// A step's wobble depth.
    pub fn mod_depth(&self, step: usize) -> Result<f64, UnitError> {
        self.check_step(step)?;
        self.seq.segment(step)?.dock(SegmentDock::EndLevel).depth(0)
    }

    /// Set a step's wobble frequency in cycles per segment.
    pub fn set_mod_freq(&mut self, step: usize, freq: f64, rack: &ModRack) -> Result<(), UnitError> {
        self.check_step(step)?;
        self.steps[step].freq = freq;
        self.rescale_step(step, rack);
        Ok(())
    }

    /// A step's wobble frequency in cycles per segment.
    pub fn mod_freq(&self, step: usize) -> Result<f64, UnitError> {
        self.check_step(step)?;
        Ok(self.steps[step].freq)
    }

    /// Set a step LFO's phase offset in degrees.
    pub fn set_mod_phase_offset(
        &mut self,
        step: usize,
        degrees: f64,
        rack: &ModRack,
    ) -> Result<(), UnitError> {
        self.check_step(step)?;
        if let Some(mut source) = rack.borrow_mut(self.steps[step].key) {
            if let Some(lfo) = source.as_lfo_mut() {
                lfo.set_phase_offset(degrees);
            }
        }
        Ok(())
    }

    /// Swap a step LFO's wavetable.
    pub fn set_mod_wavetable(
        &mut self,
        step: usize,
        table: Arc<Wavetable>,
        rack: &ModRack,
    ) -> Result<(), UnitError> {
        self.check_step(step)?;
        if let Some(mut source) = rack.borrow_mut(self.steps[step].key) {
            if let Some(lfo) = source.as_lfo_mut() {
                lfo.set_wavetable(table);
            }
        }
        Ok(())
    }

    /// Attach a source that modulates a step's wobble depth.
    ///
    /// The source joins the step's end-level dock and sidechains item 0 -
    /// the step's own LFO - so it drives the wobble's depth rather than the
    /// level directly. Returns the new item's index in that dock.
    pub fn attach_depth_mod(&mut self, step: usize, source: ModKey) -> Result<usize, UnitError> {
        self.check_step(step)?;
        let index = self
            .seq
            .attach_mod_segment(step, SegmentDock::EndLevel, source)?;
        self.seq
            .set_sidechain_segment(step, SegmentDock::EndLevel, index, 0)?;
        Ok(index)
    }

    /// Insert a new step before `position`, shifting the loop window and
    /// the playback position along with the segments they point at.
    pub fn insert_segment(&mut self, position: usize, rack: &mut ModRack) -> Result<(), UnitError> {
        if position > self.steps.len() {
            return Err(UnitError::SegmentIndex {
                index: position,
                count: self.steps.len(),
            });
        }

        let spanned_all =
            self.seq.loop_start == 0 && self.seq.loop_end == self.steps.len() - 1;

        if self.seq.loop_end >= position {
            self.seq.loop_end += 1;
        }
        if self.seq.loop_start > position {
            self.seq.loop_start += 1;
        }
        if self.seq.current >= position {
            self.seq.current += 1;
        }

        self.seq
            .segments
            .insert(position, crate::segment::EnvelopeSegment::default());

        let key = rack.insert(ModSource::Lfo(Lfo::new(
            self.ctx,
            Arc::clone(&self.sine),
            0.0,
            1.0,
            0.0,
        )));
        let segment = &mut self.seq.segments[position];
        segment.attach_mod(SegmentDock::StartLevel, key);
        segment.attach_mod(SegmentDock::EndLevel, key);
        segment.set_both_levels(1.0)?;

        self.steps.insert(position, StepLfo { key, freq: 1.0 });

        // A loop window spanning the whole sequence keeps spanning it.
        if spanned_all {
            self.seq.loop_end = self.steps.len() - 1;
        }

        self.resize_segments(rack);
        Ok(())
    }

    /// Append a new step at the end of the sequence.
    pub fn add_segment(&mut self, rack: &mut ModRack) -> Result<(), UnitError> {
        self.insert_segment(self.steps.len(), rack)
    }

    /// Remove a step. The last remaining step cannot be removed.
    pub fn remove_segment(&mut self, step: usize, rack: &mut ModRack) -> Result<(), UnitError> {
        self.check_step(step)?;
        if self.steps.len() == 1 {
            return Err(UnitError::SegmentIndex {
                index: step,
                count: 1,
            });
        }

        rack.remove(self.steps[step].key);
        self.steps.remove(step);
        self.seq.segments.remove(step);

        let last = self.seq.segments.len() - 1;
        if self.seq.loop_end >= step && self.seq.loop_end > 0 {
            self.seq.loop_end -= 1;
        }
        self.seq.loop_end = self.seq.loop_end.min(last);
        if self.seq.loop_start > step {
            self.seq.loop_start -= 1;
        }
        self.seq.loop_start = self.seq.loop_start.min(self.seq.loop_end);

        if self.seq.current > step {
            self.seq.current -= 1;
        }
        if self.seq.current > last {
            self.seq.change_segment(last);
        } else if self.seq.current == step {
            // The removed step's successor now sits at this index.
            let index = self.seq.current;
            self.seq.change_segment(index);
        }

        self.resize_segments(rack);
        Ok(())
    }

    /// Borrow the underlying segment sequence (read-only).
    pub fn sequence(&self) -> &EnvelopeSegmentSequence {
        &self.seq
    }

    /// Borrow one of the sequence-level docks.
    pub fn dock(&self, which: LfoSequenceDock) -> &ModDock {
        &self.docks[which as usize]
    }

    /// Mutably borrow one of the sequence-level docks.
    pub fn dock_mut(&mut self, which: LfoSequenceDock) -> &mut ModDock {
        &mut self.docks[which as usize]
    }

    fn check_rate(hz: f64) -> Result<(), UnitError> {
        if !(hz > 0.0) || hz > 10.0 {
            return Err(UnitError::OutOfRange {
                param: "sequence rate",
                value: hz,
                min: 0.0,
                max: 10.0,
            });
        }
        Ok(())
    }

    fn check_step(&self, step: usize) -> Result<(), UnitError> {
        if step >= self.steps.len() {
            return Err(UnitError::SegmentIndex {
                index: step,
                count: self.steps.len(),
            });
        }
        Ok(())
    }

    /// Divide one period of the sequence rate evenly across the segments
    /// and rescale every step LFO to its new segment length.
    fn resize_segments(&mut self, rack: &ModRack) {
        // A rate dock clamps to [0, 10]; a modulated rate of 0 freezes the
        // sequencer rather than dividing the period by it.
        self.segment_length = if self.rate > 0.0 {
            let period = f64::from(self.ctx.sample_rate()) / self.rate;
            (period / self.steps.len() as f64) as usize
        } else {
            0
        };

        for index in 0..self.steps.len() {
            self.seq.segments[index].set_length(self.segment_length);
            self.rescale_step(index, rack);
        }
    }

    /// Convert a step's cycles-per-segment into Hz for its LFO.
    fn rescale_step(&self, step: usize, rack: &ModRack) {
        let hz = if self.segment_length == 0 {
            0.0
        } else {
            self.steps[step].freq * f64::from(self.ctx.sample_rate()) / self.segment_length as f64
        };

        if let Some(mut source) = rack.borrow_mut(self.steps[step].key) {
            if let Some(lfo) = source.as_lfo_mut() {
                lfo.set_scaled_frequency(hz);
            }
        }
    }
}

impl Modulates for LfoSequence {
    fn modulate(&mut self, sample: Sample, depth: f64, _maximum: f64, rack: &ModRack) -> Sample {
        if self.docks[LfoSequenceDock::Rate as usize].in_use() {
            self.rate = self.docks[LfoSequenceDock::Rate as usize].tick(rack);
            self.resize_segments(rack);
        }
        if self.docks[LfoSequenceDock::Amp as usize].in_use() {
            self.amp = self.docks[LfoSequenceDock::Amp as usize].tick(rack);
        }

        // Step sequencers scale their input rather than offsetting it.
        sample * self.seq.tick(rack) * depth * self.amp
    }
}

impl Ticks for LfoSequence {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        self.seq.tick(rack)
    }

    fn update(&mut self) {
        self.seq.update();
    }
}
