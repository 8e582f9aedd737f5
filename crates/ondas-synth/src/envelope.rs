//! The audible amplitude/pitch contour envelope.
//!
//! Six named segments - delay, attack, A, B, C, release - plus one hidden
//! connector segment used to bridge loop boundaries whose levels differ.
//! Looping between the loop start and loop end would otherwise jump
//! discontinuously; the connector ramps from the loop-end level back to the
//! loop-start level over 1/40th of a second. When the two levels already
//! match, the connector is skipped entirely.

use ondas_core::{AudioContext, Sample};

use crate::dock::ModDock;
use crate::error::{UnitError, check_range};
use crate::rack::{ModKey, ModRack};
use crate::segment::{EnvelopeSegmentSequence, SegmentDock};
use crate::traits::{Modulates, Ticks};

/// The six user-facing envelope segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvelopeStage {
    /// Flat lead-in before the attack.
    Delay = 0,
    /// Initial ramp after note-on.
    Attack = 1,
    /// First free-form segment.
    A = 2,
    /// Second free-form segment.
    B = 3,
    /// Third free-form segment; sustains here when sustain is enabled.
    C = 4,
    /// Final ramp after note-off.
    Release = 5,
}

/// Index of the hidden loop-connector segment.
const CONNECTOR: usize = 6;

/// Total segment count including the connector.
const SEGMENT_COUNT: usize = 7;

/// A six-stage envelope with looping and a hidden loop connector.
///
/// # Example
///
/// ```rust
/// use ondas_core::AudioContext;
/// use ondas_synth::{Envelope, EnvelopeStage, ModRack};
///
/// let ctx = AudioContext::new(44100, 4096);
/// let rack = ModRack::new();
///
/// let mut env = Envelope::new(ctx, true);
/// env.set_segment_level(EnvelopeStage::Attack, 0.8).unwrap();
/// env.set_segment_length(EnvelopeStage::Attack, 500).unwrap();
///
/// for _ in 0..500 {
///     let _level = env.tick(&rack);
///     env.update();
/// }
/// env.note_off();
/// ```
#[derive(Debug)]
pub struct Envelope {
    seq: EnvelopeSegmentSequence,
    amp: f64,
    amp_dock: ModDock,
    sustain_enabled: bool,
    last_tick: Sample,
}

impl Envelope {
    /// Create an envelope. With `sustain_enabled`, reaching the end of
    /// segment C holds the last value until [`note_off`](Self::note_off).
    pub fn new(ctx: AudioContext, sustain_enabled: bool) -> Self {
        let mut seq = EnvelopeSegmentSequence::new(SEGMENT_COUNT);

        // Long enough to be inaudible as a step, short enough not to smear
        // the loop: 1/40th of a second.
        let connector_length = (f64::from(ctx.sample_rate()) / 40.0) as usize;
        seq.segments[CONNECTOR].set_length(connector_length);

        Self {
            seq,
            amp: 1.0,
            amp_dock: ModDock::new(0.0, 1.0, 1.0),
            sustain_enabled,
            last_tick: 0.0,
        }
    }

    /// Read the current envelope value.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        let current = self.seq.current;

        if self.seq.current_sample >= self.seq.segments[current].length() {
            if current == EnvelopeStage::Release as usize {
                return 0.0;
            } else if current == CONNECTOR {
                // Connector finished: re-enter the loop proper.
                self.change_segment(self.seq.loop_start);
            } else if current == self.seq.loop_end
                && (self.seq.loop_inf || self.seq.loop_count < self.seq.loop_max)
            {
                self.seq.loop_count += 1;
                self.reset_loop();
            } else if current == EnvelopeStage::C as usize && self.sustain_enabled {
                // A completed ramp has landed on its end level exactly.
                if self.seq.segments[current].length() > 0 {
                    self.last_tick = self.seq.segments[current].end_level();
                }
                return self.last_tick;
            } else {
                let next = current + 1;
                if self.seq.segments[current].length() > 0 {
                    self.last_tick = self.seq.segments[current].end_level();
                }
                self.change_segment(next);
                // A zero-length successor has nothing to ramp yet.
                if self.seq.segments[next].length() == 0 {
                    return self.last_tick;
                }
            }
        }

        self.last_tick = self.seq.segments[self.seq.current].tick(rack);
        self.last_tick
    }

    /// Advance the envelope by one sample.
    pub fn update(&mut self) {
        self.seq.update();
    }

    /// Jump to the release segment, seeding its start level from the last
    /// ticked value so an abrupt note-off never clicks.
    pub fn note_off(&mut self) {
        if self.seq.current != EnvelopeStage::Release as usize {
            self.change_segment(EnvelopeStage::Release as usize);
        }
    }

    /// Rewind to the delay segment.
    pub fn reset(&mut self) {
        self.seq.reset();
        self.last_tick = 0.0;
    }

    /// Set the overall amplitude, 0-1.
    pub fn set_amp(&mut self, amp: f64) -> Result<(), UnitError> {
        check_range("envelope amplitude", amp, 0.0, 1.0)?;
        self.amp = amp;
        self.amp_dock.set_base_value(amp);
        Ok(())
    }

    /// The overall amplitude (the dock base value while modulated).
    pub fn amp(&self) -> f64 {
        if self.amp_dock.in_use() {
            self.amp_dock.base_value()
        } else {
            self.amp
        }
    }

    /// Whether segment C sustains indefinitely.
    pub fn sustain_enabled(&self) -> bool {
        self.sustain_enabled
    }

    /// Enable or disable sustaining at segment C.
    pub fn set_sustain_enabled(&mut self, enabled: bool) {
        self.sustain_enabled = enabled;
    }

    /// Set a segment's curve rate. The delay segment is flat and has no
    /// rate to set.
    pub fn set_segment_rate(&mut self, stage: EnvelopeStage, rate: f64) -> Result<(), UnitError> {
        if stage == EnvelopeStage::Delay {
            return Err(UnitError::SegmentIndex {
                index: stage as usize,
                count: SEGMENT_COUNT,
            });
        }
        self.seq.set_segment_rate(stage as usize, rate)
    }

    /// A segment's curve rate.
    pub fn segment_rate(&self, stage: EnvelopeStage) -> f64 {
        self.seq.segments[stage as usize].rate()
    }

    /// Set a segment's level: the segment's end level and the next
    /// segment's start level, keeping the contour continuous. The release
    /// segment's end level is fixed at silence and cannot be set.
    pub fn set_segment_level(&mut self, stage: EnvelopeStage, level: f64) -> Result<(), UnitError> {
        if stage == EnvelopeStage::Release {
            return Err(UnitError::SegmentIndex {
                index: stage as usize,
                count: SEGMENT_COUNT,
            });
        }

        // The delay segment is a flat hold, so its start level follows.
        if stage == EnvelopeStage::Delay {
            self.seq.segments[EnvelopeStage::Delay as usize].set_start_level(level)?;
        }

        self.seq.set_linked_level(stage as usize, level)
    }

    /// A segment's level (its end level).
    pub fn segment_level(&self, stage: EnvelopeStage) -> f64 {
        self.seq.segments[stage as usize].end_level()
    }

    /// Set a segment's length in samples.
    pub fn set_segment_length(
        &mut self,
        stage: EnvelopeStage,
        samples: usize,
    ) -> Result<(), UnitError> {
        self.seq.set_segment_length(stage as usize, samples)
    }

    /// A segment's length in samples.
    pub fn segment_length(&self, stage: EnvelopeStage) -> usize {
        self.seq.segments[stage as usize].length()
    }

    /// Set the first segment of the loop window. Only delay through C can
    /// loop; the release and connector segments never do.
    pub fn set_loop_start(&mut self, stage: EnvelopeStage) -> Result<(), UnitError> {
        if stage >= EnvelopeStage::Release {
            return Err(UnitError::SegmentIndex {
                index: stage as usize,
                count: SEGMENT_COUNT,
            });
        }

        self.seq.loop_start = stage as usize;

        // The connector ramps back to where the loop re-enters.
        let level = self.seq.segments[stage as usize].start_level();
        self.seq.segments[CONNECTOR].seed_end_level(level);

        if self.seq.loop_start > self.seq.loop_end {
            self.seq.loop_end = self.seq.loop_start;
        }
        Ok(())
    }

    /// Set the last segment of the loop window, inclusive.
    pub fn set_loop_end(&mut self, stage: EnvelopeStage) -> Result<(), UnitError> {
        if stage >= EnvelopeStage::Release {
            return Err(UnitError::SegmentIndex {
                index: stage as usize,
                count: SEGMENT_COUNT,
            });
        }

        self.seq.loop_end = stage as usize;

        // The connector starts from where the loop leaves off.
        let level = self.seq.segments[stage as usize].end_level();
        self.seq.segments[CONNECTOR].seed_start_level(level);

        if self.seq.loop_end < self.seq.loop_start {
            self.seq.loop_start = self.seq.loop_end;
        }
        Ok(())
    }

    /// Set the number of loop traversals; above 64 loops forever.
    pub fn set_loop_max(&mut self, count: usize) {
        self.seq.set_loop_max(count);
    }

    /// Enable or disable infinite looping.
    pub fn set_loop_inf(&mut self, state: bool) {
        self.seq.set_loop_inf(state);
    }

    /// Index of the segment currently playing (6 is the hidden connector).
    pub fn current_segment(&self) -> usize {
        self.seq.current
    }

    /// Attach a modulation source to the amplitude dock.
    pub fn attach_amp_mod(&mut self, source: ModKey) -> usize {
        self.amp_dock.attach(source)
    }

    /// Detach an item from the amplitude dock.
    pub fn detach_amp_mod(&mut self, index: usize) -> Result<(), UnitError> {
        self.amp_dock.detach(index)
    }

    /// Set an item's depth in the amplitude dock.
    pub fn set_amp_mod_depth(&mut self, index: usize, depth: f64) -> Result<(), UnitError> {
        self.amp_dock.set_depth(index, depth)
    }

    /// Attach a modulation source to a segment's dock.
    pub fn attach_mod_segment(
        &mut self,
        stage: EnvelopeStage,
        which: SegmentDock,
        source: ModKey,
    ) -> Result<usize, UnitError> {
        self.seq.attach_mod_segment(stage as usize, which, source)
    }

    /// Detach an item from a segment's dock.
    pub fn detach_mod_segment(
        &mut self,
        stage: EnvelopeStage,
        which: SegmentDock,
        item: usize,
    ) -> Result<(), UnitError> {
        self.seq.detach_mod_segment(stage as usize, which, item)
    }

    /// Set an item's depth in a segment's dock.
    pub fn set_mod_depth_segment(
        &mut self,
        stage: EnvelopeStage,
        which: SegmentDock,
        item: usize,
        depth: f64,
    ) -> Result<(), UnitError> {
        self.seq.set_mod_depth_segment(stage as usize, which, item, depth)
    }

    /// Attach a source to a stage's *level*: its end-level dock and the next
    /// stage's start-level dock, mirroring [`set_segment_level`]'s linking.
    ///
    /// [`set_segment_level`]: Self::set_segment_level
    pub fn attach_level_mod(
        &mut self,
        stage: EnvelopeStage,
        source: ModKey,
    ) -> Result<usize, UnitError> {
        if stage == EnvelopeStage::Release {
            return Err(UnitError::SegmentIndex {
                index: stage as usize,
                count: SEGMENT_COUNT,
            });
        }

        let index = self
            .seq
            .attach_mod_segment(stage as usize, SegmentDock::EndLevel, source)?;
        self.seq
            .attach_mod_segment(stage as usize + 1, SegmentDock::StartLevel, source)?;
        Ok(index)
    }

    /// Borrow the underlying segment sequence (read-only).
    pub fn sequence(&self) -> &EnvelopeSegmentSequence {
        &self.seq
    }

    fn change_segment(&mut self, index: usize) {
        self.seq.change_segment(index);

        // Note-off can arrive anywhere in the contour; the release ramp
        // starts from whatever value was last produced.
        if index == EnvelopeStage::Release as usize {
            self.seq.segments[index].seed_start_level(self.last_tick);
        }
    }

    fn reset_loop(&mut self) {
        for segment in &mut self.seq.segments[self.seq.loop_start..=self.seq.loop_end] {
            segment.reset();
        }

        let loop_start = self.seq.loop_start;
        let start_level = self.seq.segments[loop_start].start_level();
        let end_level = self.seq.segments[self.seq.loop_end].end_level();

        if end_level == start_level {
            // Level-continuous loop: no connector needed.
            self.change_segment(loop_start);
        } else {
            self.change_segment(CONNECTOR);
            self.seq.segments[CONNECTOR].reset();
        }
    }
}

impl Ticks for Envelope {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        Envelope::tick(self, rack)
    }

    fn update(&mut self) {
        Envelope::update(self);
    }
}

impl Modulates for Envelope {
    fn modulate(&mut self, sample: Sample, depth: f64, maximum: f64, rack: &ModRack) -> Sample {
        if self.amp_dock.in_use() {
            self.amp = self.amp_dock.tick(rack);
        }
        let contour = self.tick(rack);
        sample + maximum * contour * depth * self.amp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AudioContext {
        AudioContext::new(44100, 4096)
    }

    fn attack_envelope() -> Envelope {
        let mut env = Envelope::new(ctx(), true);
        env.set_segment_level(EnvelopeStage::Attack, 0.8).unwrap();
        env.set_segment_length(EnvelopeStage::Attack, 500).unwrap();
        env.set_segment_rate(EnvelopeStage::Attack, 1.0).unwrap();
        env
    }

    #[test]
    fn test_attack_rises_to_level() {
        let rack = ModRack::new();
        let mut env = attack_envelope();

        let mut previous = -1.0;
        for _ in 0..500 {
            let value = env.tick(&rack);
            assert!(value >= previous, "attack must be non-decreasing");
            assert!(value <= 0.8 + 1e-9);
            previous = value;
            env.update();
        }

        assert!((env.tick(&rack) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_sustain_holds_after_contour() {
        let rack = ModRack::new();
        let mut env = attack_envelope();

        // Run well past the attack; A, B, C are zero-length so the envelope
        // walks to C and sustains the last value there.
        for _ in 0..1000 {
            env.tick(&rack);
            env.update();
        }

        for _ in 0..100 {
            assert!((env.tick(&rack) - 0.8).abs() < 1e-9);
            env.update();
        }
    }

    #[test]
    fn test_without_sustain_walks_to_release() {
        let rack = ModRack::new();
        let mut env = attack_envelope();
        env.set_sustain_enabled(false);

        for _ in 0..2000 {
            env.tick(&rack);
            env.update();
        }

        // Release has zero length by default: envelope is silent.
        assert_eq!(env.tick(&rack), 0.0);
    }

    #[test]
    fn test_note_off_seeds_release_from_last_tick() {
        let rack = ModRack::new();
        let mut env = attack_envelope();
        env.set_segment_length(EnvelopeStage::Release, 100).unwrap();

        // Interrupt mid-attack.
        for _ in 0..250 {
            env.tick(&rack);
            env.update();
        }
        let before = env.tick(&rack);

        env.note_off();

        // First release sample continues from the interrupted level.
        let after = env.tick(&rack);
        assert!(
            (after - before).abs() < 1e-9,
            "release must start at {before}, got {after}"
        );

        // And decays towards zero.
        let mut last = after;
        for _ in 0..100 {
            env.update();
            last = env.tick(&rack);
        }
        assert!(last < 0.01, "release should approach silence, got {last}");
    }

    #[test]
    fn test_release_exhausted_is_silent() {
        let rack = ModRack::new();
        let mut env = attack_envelope();
        env.set_segment_length(EnvelopeStage::Release, 10).unwrap();

        for _ in 0..600 {
            env.tick(&rack);
            env.update();
        }
        env.note_off();
        for _ in 0..20 {
            env.tick(&rack);
            env.update();
        }

        assert_eq!(env.tick(&rack), 0.0);
    }

    #[test]
    fn test_loop_with_equal_levels_skips_connector() {
        let rack = ModRack::new();
        let mut env = Envelope::new(ctx(), true);

        // A and B ramp 0.5 -> 0.5: loop boundaries are level-continuous.
        env.set_segment_level(EnvelopeStage::Attack, 0.5).unwrap();
        env.set_segment_length(EnvelopeStage::Attack, 10).unwrap();
        env.set_segment_level(EnvelopeStage::A, 0.5).unwrap();
        env.set_segment_length(EnvelopeStage::A, 10).unwrap();
        env.set_segment_level(EnvelopeStage::B, 0.5).unwrap();
        env.set_segment_length(EnvelopeStage::B, 10).unwrap();

        env.set_loop_start(EnvelopeStage::A).unwrap();
        env.set_loop_end(EnvelopeStage::B).unwrap();
        env.set_loop_inf(true);

        for _ in 0..500 {
            env.tick(&rack);
            assert_ne!(
                env.current_segment(),
                CONNECTOR,
                "connector must never play when loop levels match"
            );
            env.update();
        }
    }

    #[test]
    fn test_loop_with_unequal_levels_uses_connector() {
        let rack = ModRack::new();
        let mut env = Envelope::new(ctx(), true);

        // Loop window A..B ramps from 0.2 up to 0.9; boundaries differ.
        env.set_segment_level(EnvelopeStage::Attack, 0.2).unwrap();
        env.set_segment_length(EnvelopeStage::Attack, 10).unwrap();
        env.set_segment_level(EnvelopeStage::A, 0.6).unwrap();
        env.set_segment_length(EnvelopeStage::A, 10).unwrap();
        env.set_segment_level(EnvelopeStage::B, 0.9).unwrap();
        env.set_segment_length(EnvelopeStage::B, 10).unwrap();

        env.set_loop_start(EnvelopeStage::A).unwrap();
        env.set_loop_end(EnvelopeStage::B).unwrap();
        env.set_loop_inf(true);

        let mut connector_played = false;
        for _ in 0..5000 {
            env.tick(&rack);
            if env.current_segment() == CONNECTOR {
                connector_played = true;
            }
            env.update();
        }
        assert!(connector_played, "unequal loop levels require the connector");
    }

    #[test]
    fn test_loop_bounds_reject_release() {
        let mut env = Envelope::new(ctx(), true);
        assert!(env.set_loop_start(EnvelopeStage::Release).is_err());
        assert!(env.set_loop_end(EnvelopeStage::Release).is_err());
        assert!(env.set_loop_end(EnvelopeStage::C).is_ok());
    }

    #[test]
    fn test_level_setters_validate_and_link() {
        let mut env = Envelope::new(ctx(), true);

        assert!(env.set_segment_level(EnvelopeStage::Attack, 1.1).is_err());
        assert!(env.set_segment_level(EnvelopeStage::Release, 0.5).is_err());

        env.set_segment_level(EnvelopeStage::Attack, 0.7).unwrap();
        assert_eq!(env.segment_level(EnvelopeStage::Attack), 0.7);
        // The next stage's start level follows.
        assert_eq!(env.sequence().segment(EnvelopeStage::A as usize).unwrap().start_level(), 0.7);
    }

    #[test]
    fn test_delay_stage_is_flat() {
        let mut env = Envelope::new(ctx(), true);
        env.set_segment_level(EnvelopeStage::Delay, 0.3).unwrap();

        let delay = env.sequence().segment(EnvelopeStage::Delay as usize).unwrap();
        assert_eq!(delay.start_level(), 0.3);
        assert_eq!(delay.end_level(), 0.3);
    }

    #[test]
    fn test_delay_rate_rejected() {
        let mut env = Envelope::new(ctx(), true);
        assert!(env.set_segment_rate(EnvelopeStage::Delay, 1.0).is_err());
    }

    #[test]
    fn test_amp_scales_modulate() {
        let rack = ModRack::new();
        let mut env = attack_envelope();
        env.set_amp(0.5).unwrap();

        // Run the attack to completion; contour sits at 0.8.
        for _ in 0..1000 {
            env.tick(&rack);
            env.update();
        }

        // sample + maximum * contour * depth * amp
        let out = env.modulate(0.0, 1.0, 1.0, &rack);
        assert!((out - 0.8 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_restarts_contour() {
        let rack = ModRack::new();
        let mut env = attack_envelope();

        for _ in 0..1000 {
            env.tick(&rack);
            env.update();
        }
        env.reset();

        assert_eq!(env.current_segment(), EnvelopeStage::Delay as usize);
        let first = env.tick(&rack);
        assert!(first < 0.01, "contour must restart near zero, got {first}");
    }
}
