//! Envelope segments and segment sequences.
//!
//! An [`EnvelopeSegment`] is a single time-bounded ramp between two levels,
//! curved by a rate exponent. An [`EnvelopeSegmentSequence`] chains segments
//! into a timeline with an optional loop window. Both follow the two-phase
//! protocol: `tick` reads the current value, `update` advances by one sample.

use alloc::vec::Vec;

use ondas_core::Sample;

use crate::dock::ModDock;
use crate::error::{UnitError, check_range};
use crate::rack::{ModKey, ModRack};

/// The three modulatable parameters of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentDock {
    /// Curve shape exponent, 0-10.
    Rate = 0,
    /// Level at progress 0, 0-1.
    StartLevel = 1,
    /// Level at progress 1, 0-1.
    EndLevel = 2,
}

/// A single value ramp over a fixed number of samples.
///
/// The output follows `range * progress^rate + start_level` with
/// `range = end_level - start_level`. A rate of 1 is linear; rates below 1
/// bow the curve logarithmically, rates above 1 exponentially. Once progress
/// reaches 1 (or if the length is 0), the segment holds its end level until
/// [`reset`](EnvelopeSegment::reset).
#[derive(Clone, Debug)]
pub struct EnvelopeSegment {
    rate: f64,
    start_level: f64,
    end_level: f64,
    /// Cached `end_level - start_level`.
    range: f64,
    /// Fraction of the length elapsed, in [0, 1).
    progress: f64,
    /// Per-sample progress increment; 0 for zero-length segments.
    increment: f64,
    /// Length in samples.
    length: usize,
    docks: [ModDock; 3],
}

impl EnvelopeSegment {
    /// Create a segment. Levels outside [0, 1] and rates outside [0, 10]
    /// are the setters' concern; the constructor is only used with literal
    /// defaults.
    pub fn new(start_level: f64, end_level: f64, length: usize, rate: f64) -> Self {
        let mut segment = Self {
            rate,
            start_level,
            end_level,
            range: end_level - start_level,
            progress: 0.0,
            increment: 0.0,
            length,
            docks: [
                ModDock::new(0.0, 10.0, rate),
                ModDock::new(0.0, 1.0, start_level),
                ModDock::new(0.0, 1.0, end_level),
            ],
        };
        segment.recalculate_increment();
        segment
    }

    /// Read the current value.
    ///
    /// Refreshes rate and levels from their docks first when any of them is
    /// in use (one combined pass so the range is recomputed once). Returns
    /// the end level forever once the segment has run its course.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        if self.progress >= 1.0 || self.length == 0 {
            return self.end_level;
        }

        let rate_in_use = self.docks[SegmentDock::Rate as usize].in_use();
        let start_in_use = self.docks[SegmentDock::StartLevel as usize].in_use();
        let end_in_use = self.docks[SegmentDock::EndLevel as usize].in_use();

        if rate_in_use || start_in_use || end_in_use {
            if rate_in_use {
                self.rate = self.docks[SegmentDock::Rate as usize].tick(rack);
            }
            if start_in_use {
                self.start_level = self.docks[SegmentDock::StartLevel as usize].tick(rack);
            }
            if end_in_use {
                self.end_level = self.docks[SegmentDock::EndLevel as usize].tick(rack);
            }
            self.range = self.end_level - self.start_level;
        }

        self.range * libm::pow(self.progress, self.rate) + self.start_level
    }

    /// Advance progress by one sample. Call exactly once per produced
    /// sample, after `tick`.
    pub fn update(&mut self) {
        self.progress += self.increment;
    }

    /// Rewind to progress 0.
    pub fn reset(&mut self) {
        self.progress = 0.0;
    }

    /// Set the length in samples and rescale the progress increment.
    pub fn set_length(&mut self, samples: usize) {
        self.length = samples;
        self.recalculate_increment();
    }

    /// Length in samples.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Set the curve rate, 0-10.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), UnitError> {
        check_range("rate", rate, 0.0, 10.0)?;
        self.rate = rate;
        self.docks[SegmentDock::Rate as usize].set_base_value(rate);
        Ok(())
    }

    /// The curve rate (the dock base value while modulated).
    pub fn rate(&self) -> f64 {
        if self.docks[SegmentDock::Rate as usize].in_use() {
            self.docks[SegmentDock::Rate as usize].base_value()
        } else {
            self.rate
        }
    }

    /// Set the start level, 0-1.
    pub fn set_start_level(&mut self, level: f64) -> Result<(), UnitError> {
        check_range("start level", level, 0.0, 1.0)?;
        self.seed_start_level(level);
        Ok(())
    }

    /// The start level (the dock base value while modulated).
    pub fn start_level(&self) -> f64 {
        if self.docks[SegmentDock::StartLevel as usize].in_use() {
            self.docks[SegmentDock::StartLevel as usize].base_value()
        } else {
            self.start_level
        }
    }

    /// Set the end level, 0-1.
    pub fn set_end_level(&mut self, level: f64) -> Result<(), UnitError> {
        check_range("end level", level, 0.0, 1.0)?;
        self.seed_end_level(level);
        Ok(())
    }

    /// The end level (the dock base value while modulated).
    pub fn end_level(&self) -> f64 {
        if self.docks[SegmentDock::EndLevel as usize].in_use() {
            self.docks[SegmentDock::EndLevel as usize].base_value()
        } else {
            self.end_level
        }
    }

    /// Set both levels at once - a flat (sustain-like) segment.
    pub fn set_both_levels(&mut self, level: f64) -> Result<(), UnitError> {
        self.set_start_level(level)?;
        self.set_end_level(level)
    }

    /// Write the start level without range validation. Used internally to
    /// seed levels from already-produced samples, which are in [0, 1] by
    /// construction.
    pub(crate) fn seed_start_level(&mut self, level: f64) {
        self.start_level = level;
        self.docks[SegmentDock::StartLevel as usize].set_base_value(level);
        self.range = self.end_level - self.start_level;
    }

    /// Write the end level without range validation.
    pub(crate) fn seed_end_level(&mut self, level: f64) {
        self.end_level = level;
        self.docks[SegmentDock::EndLevel as usize].set_base_value(level);
        self.range = self.end_level - self.start_level;
    }

    /// Borrow one of the segment's docks.
    pub fn dock(&self, which: SegmentDock) -> &ModDock {
        &self.docks[which as usize]
    }

    /// Mutably borrow one of the segment's docks.
    pub fn dock_mut(&mut self, which: SegmentDock) -> &mut ModDock {
        &mut self.docks[which as usize]
    }

    /// Attach a modulation source to one of the docks, returning its item
    /// index.
    pub fn attach_mod(&mut self, which: SegmentDock, source: ModKey) -> usize {
        self.docks[which as usize].attach(source)
    }

    /// Detach an item from one of the docks.
    pub fn detach_mod(&mut self, which: SegmentDock, index: usize) -> Result<(), UnitError> {
        self.docks[which as usize].detach(index)
    }

    /// Set an item's depth in one of the docks.
    pub fn set_mod_depth(
        &mut self,
        which: SegmentDock,
        index: usize,
        depth: f64,
    ) -> Result<(), UnitError> {
        self.docks[which as usize].set_depth(index, depth)
    }

    fn recalculate_increment(&mut self) {
        self.increment = if self.length > 0 {
            1.0 / self.length as f64
        } else {
            0.0
        };
    }
}

impl Default for EnvelopeSegment {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0, 1.0)
    }
}

/// An ordered sequence of segments forming a loopable timeline.
///
/// The sequence delegates `tick` to its current segment and advances to the
/// next one when the current segment's sample count is exhausted. If the
/// finished segment is the loop end and loops remain, every segment in the
/// loop window is reset and playback jumps back to the loop start. Past the
/// final segment the sequence holds that segment's terminal value forever.
#[derive(Clone, Debug)]
pub struct EnvelopeSegmentSequence {
    pub(crate) segments: Vec<EnvelopeSegment>,
    pub(crate) current: usize,
    pub(crate) current_sample: usize,
    /// First segment of the loop window.
    pub(crate) loop_start: usize,
    /// Last segment of the loop window, inclusive.
    pub(crate) loop_end: usize,
    pub(crate) loop_count: usize,
    pub(crate) loop_max: usize,
    pub(crate) loop_inf: bool,
}

impl EnvelopeSegmentSequence {
    /// Create a sequence of `count` default (zero-length) segments.
    pub fn new(count: usize) -> Self {
        let mut segments = Vec::with_capacity(count);
        segments.resize_with(count, EnvelopeSegment::default);
        Self {
            segments,
            current: 0,
            current_sample: 0,
            loop_start: 0,
            loop_end: 0,
            loop_count: 0,
            loop_max: 0,
            loop_inf: false,
        }
    }

    /// Read the current value, advancing across segment boundaries and loop
    /// resets as needed.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        if self.current_sample >= self.segments[self.current].length() {
            let next = self.current + 1;

            if next == self.loop_end + 1 && (self.loop_inf || self.loop_count < self.loop_max) {
                self.reset_loop();
            } else if next < self.segments.len() {
                self.change_segment(next);
            }
            // Otherwise: hold the final segment's terminal value.
        }

        self.segments[self.current].tick(rack)
    }

    /// Advance the timeline by one sample.
    pub fn update(&mut self) {
        self.current_sample += 1;
        self.segments[self.current].update();
    }

    /// Rewind every segment and return to the first one.
    pub fn reset(&mut self) {
        for segment in &mut self.segments {
            segment.reset();
        }
        self.loop_count = 0;
        self.change_segment(0);
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the sequence holds no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the segment currently playing.
    pub fn current_segment(&self) -> usize {
        self.current
    }

    /// Borrow a segment.
    pub fn segment(&self, index: usize) -> Result<&EnvelopeSegment, UnitError> {
        self.check_segment(index)?;
        Ok(&self.segments[index])
    }

    /// Mutably borrow a segment.
    pub fn segment_mut(&mut self, index: usize) -> Result<&mut EnvelopeSegment, UnitError> {
        self.check_segment(index)?;
        Ok(&mut self.segments[index])
    }

    /// Set a segment's curve rate.
    pub fn set_segment_rate(&mut self, index: usize, rate: f64) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_rate(rate)
    }

    /// Set a segment's start level.
    pub fn set_segment_start_level(&mut self, index: usize, level: f64) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_start_level(level)
    }

    /// Set a segment's end level.
    pub fn set_segment_end_level(&mut self, index: usize, level: f64) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_end_level(level)
    }

    /// Set both of a segment's levels.
    pub fn set_segment_both_levels(&mut self, index: usize, level: f64) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_both_levels(level)
    }

    /// Set a segment's length in samples.
    pub fn set_segment_length(&mut self, index: usize, samples: usize) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_length(samples);
        Ok(())
    }

    /// Set a segment's end level and the next segment's start level, keeping
    /// adjacent segments level-continuous. The final segment has no
    /// successor and only its own end level is written.
    pub fn set_linked_level(&mut self, index: usize, level: f64) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_end_level(level)?;
        if index + 1 < self.segments.len() {
            self.segments[index + 1].set_start_level(level)?;
        }
        Ok(())
    }

    /// Set the first segment of the loop window. Drags the loop end along
    /// if the window would invert.
    pub fn set_loop_start(&mut self, index: usize) -> Result<(), UnitError> {
        self.check_segment(index)?;
        self.loop_start = index;
        if self.loop_start > self.loop_end {
            self.loop_end = self.loop_start;
        }
        Ok(())
    }

    /// First segment of the loop window.
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Set the last segment of the loop window, inclusive. Drags the loop
    /// start along if the window would invert.
    pub fn set_loop_end(&mut self, index: usize) -> Result<(), UnitError> {
        self.check_segment(index)?;
        self.loop_end = index;
        if self.loop_end < self.loop_start {
            self.loop_start = self.loop_end;
        }
        Ok(())
    }

    /// Last segment of the loop window, inclusive.
    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    /// Set the number of times to traverse the loop window. Values above 64
    /// enable infinite looping instead.
    pub fn set_loop_max(&mut self, count: usize) {
        if count > 64 {
            self.loop_inf = true;
        } else {
            self.loop_inf = false;
            self.loop_max = count;
        }
    }

    /// Maximum number of loop traversals.
    pub fn loop_max(&self) -> usize {
        self.loop_max
    }

    /// Enable or disable infinite looping.
    pub fn set_loop_inf(&mut self, state: bool) {
        self.loop_inf = state;
    }

    /// Whether the loop window repeats forever.
    pub fn loop_inf(&self) -> bool {
        self.loop_inf
    }

    /// Attach a modulation source to one of a segment's docks.
    pub fn attach_mod_segment(
        &mut self,
        index: usize,
        which: SegmentDock,
        source: ModKey,
    ) -> Result<usize, UnitError> {
        Ok(self.segment_mut(index)?.attach_mod(which, source))
    }

    /// Detach an item from one of a segment's docks.
    pub fn detach_mod_segment(
        &mut self,
        index: usize,
        which: SegmentDock,
        item: usize,
    ) -> Result<(), UnitError> {
        self.segment_mut(index)?.detach_mod(which, item)
    }

    /// Set an item's depth in one of a segment's docks.
    pub fn set_mod_depth_segment(
        &mut self,
        index: usize,
        which: SegmentDock,
        item: usize,
        depth: f64,
    ) -> Result<(), UnitError> {
        self.segment_mut(index)?.set_mod_depth(which, item, depth)
    }

    /// Sidechain two items in one of a segment's docks.
    pub fn set_sidechain_segment(
        &mut self,
        index: usize,
        which: SegmentDock,
        master: usize,
        slave: usize,
    ) -> Result<(), UnitError> {
        self.segment_mut(index)?.dock_mut(which).set_sidechain(master, slave)
    }

    /// Cut a sidechain in one of a segment's docks.
    pub fn un_sidechain_segment(
        &mut self,
        index: usize,
        which: SegmentDock,
        master: usize,
        slave: usize,
    ) -> Result<(), UnitError> {
        self.segment_mut(index)?.dock_mut(which).un_sidechain(master, slave)
    }

    /// Whether two items in one of a segment's docks are sidechained.
    pub fn is_sidechain_segment(
        &self,
        index: usize,
        which: SegmentDock,
        master: usize,
        slave: usize,
    ) -> Result<bool, UnitError> {
        self.segment(index)?.dock(which).is_sidechain(master, slave)
    }

    pub(crate) fn change_segment(&mut self, index: usize) {
        self.current = index;
        self.current_sample = 0;
    }

    pub(crate) fn reset_loop(&mut self) {
        for segment in &mut self.segments[self.loop_start..=self.loop_end] {
            segment.reset();
        }
        self.change_segment(self.loop_start);
        self.loop_count += 1;
    }

    fn check_segment(&self, index: usize) -> Result<(), UnitError> {
        if index >= self.segments.len() {
            return Err(UnitError::SegmentIndex {
                index,
                count: self.segments.len(),
            });
        }
        Ok(())
    }
}

impl crate::traits::Ticks for EnvelopeSegment {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        EnvelopeSegment::tick(self, rack)
    }

    fn update(&mut self) {
        EnvelopeSegment::update(self);
    }
}

impl crate::traits::Ticks for EnvelopeSegmentSequence {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        EnvelopeSegmentSequence::tick(self, rack)
    }

    fn update(&mut self) {
        EnvelopeSegmentSequence::update(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_control::MacroControl;
    use crate::rack::ModSource;

    fn run(segment: &mut EnvelopeSegment, rack: &ModRack, samples: usize) -> Vec<Sample> {
        (0..samples)
            .map(|_| {
                let value = segment.tick(rack);
                segment.update();
                value
            })
            .collect()
    }

    #[test]
    fn test_linear_ramp() {
        let rack = ModRack::new();
        let mut segment = EnvelopeSegment::new(0.0, 1.0, 100, 1.0);

        let values = run(&mut segment, &rack, 100);
        assert_eq!(values[0], 0.0);
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0], "linear ramp must rise monotonically");
        }
        // At progress 99/100 the ramp reads 0.99
        assert!((values[99] - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_hold() {
        let rack = ModRack::new();
        let mut segment = EnvelopeSegment::new(0.0, 0.8, 100, 1.0);

        for _ in 0..100 {
            segment.tick(&rack);
            segment.update();
        }
        // Ticks 100..150 return exactly the end level
        for _ in 100..150 {
            assert_eq!(segment.tick(&rack), 0.8);
            segment.update();
        }
    }

    #[test]
    fn test_zero_length_returns_end_level() {
        let rack = ModRack::new();
        let mut segment = EnvelopeSegment::new(0.2, 0.9, 0, 1.0);

        assert_eq!(segment.tick(&rack), 0.9);
        segment.update();
        assert_eq!(segment.tick(&rack), 0.9);
    }

    #[test]
    fn test_tick_idempotent_between_updates() {
        let rack = ModRack::new();
        let mut segment = EnvelopeSegment::new(0.0, 1.0, 50, 2.0);

        for _ in 0..10 {
            segment.update();
        }
        let a = segment.tick(&rack);
        let b = segment.tick(&rack);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rate_curves() {
        let rack = ModRack::new();
        // Exponential (rate > 1) stays below the linear ramp mid-segment
        let mut exponential = EnvelopeSegment::new(0.0, 1.0, 100, 2.0);
        // Logarithmic (rate < 1) stays above it
        let mut logarithmic = EnvelopeSegment::new(0.0, 1.0, 100, 0.5);

        for _ in 0..50 {
            exponential.update();
            logarithmic.update();
        }

        let exp_mid = exponential.tick(&rack);
        let log_mid = logarithmic.tick(&rack);
        assert!(exp_mid < 0.5, "rate 2 at midpoint: {exp_mid}");
        assert!(log_mid > 0.5, "rate 0.5 at midpoint: {log_mid}");
    }

    #[test]
    fn test_reset_restarts_ramp() {
        let rack = ModRack::new();
        let mut segment = EnvelopeSegment::new(0.0, 1.0, 10, 1.0);

        for _ in 0..20 {
            segment.tick(&rack);
            segment.update();
        }
        assert_eq!(segment.tick(&rack), 1.0);

        segment.reset();
        assert_eq!(segment.tick(&rack), 0.0);
    }

    #[test]
    fn test_setters_validate() {
        let mut segment = EnvelopeSegment::default();
        assert!(segment.set_rate(10.0).is_ok());
        assert!(segment.set_rate(10.5).is_err());
        assert!(segment.set_start_level(-0.1).is_err());
        assert!(segment.set_end_level(1.1).is_err());
    }

    #[test]
    fn test_dock_writes_through_setters() {
        let mut segment = EnvelopeSegment::default();
        segment.set_rate(3.0).unwrap();
        assert_eq!(segment.dock(SegmentDock::Rate).base_value(), 3.0);

        segment.set_end_level(0.7).unwrap();
        assert_eq!(segment.dock(SegmentDock::EndLevel).base_value(), 0.7);
    }

    #[test]
    fn test_level_docks_modulate_output() {
        let mut rack = ModRack::new();
        let boost = rack.insert(ModSource::Macro(MacroControl::new(1.0)));

        let mut segment = EnvelopeSegment::new(0.0, 0.5, 100, 1.0);
        segment.attach_mod(SegmentDock::EndLevel, boost);

        // End level dock: base 0.5, macro pushes to 0.5 + 1*1*1 -> clamped 1.0
        for _ in 0..50 {
            segment.update();
        }
        let mid = segment.tick(&rack);
        assert!((mid - 0.5).abs() < 1e-9, "midpoint of a 0..1 ramp, got {mid}");
    }

    #[test]
    fn test_sequence_advances_through_segments() {
        let rack = ModRack::new();
        let mut seq = EnvelopeSegmentSequence::new(3);

        for i in 0..3 {
            seq.set_segment_length(i, 10).unwrap();
            seq.set_segment_both_levels(i, (i + 1) as f64 * 0.25).unwrap();
        }

        let mut levels = Vec::new();
        for _ in 0..30 {
            levels.push(seq.tick(&rack));
            seq.update();
        }

        assert!((levels[0] - 0.25).abs() < 1e-12);
        assert!((levels[10] - 0.5).abs() < 1e-12);
        assert!((levels[20] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_sequence_holds_terminal_value() {
        let rack = ModRack::new();
        let mut seq = EnvelopeSegmentSequence::new(2);
        seq.set_segment_length(0, 5).unwrap();
        seq.set_segment_length(1, 5).unwrap();
        seq.set_segment_end_level(1, 0.6).unwrap();

        for _ in 0..50 {
            seq.tick(&rack);
            seq.update();
        }
        assert_eq!(seq.tick(&rack), 0.6);
        assert_eq!(seq.current_segment(), 1);
    }

    #[test]
    fn test_sequence_loops_finite_count() {
        let rack = ModRack::new();
        let mut seq = EnvelopeSegmentSequence::new(3);
        for i in 0..3 {
            seq.set_segment_length(i, 4).unwrap();
        }
        seq.set_loop_start(0).unwrap();
        seq.set_loop_end(1).unwrap();
        seq.set_loop_max(2);

        // Segments 0-1 loop twice (4+4 samples each pass, 3 passes total
        // including the first), then segment 2 plays.
        let mut visited = Vec::new();
        for _ in 0..40 {
            seq.tick(&rack);
            visited.push(seq.current_segment());
            seq.update();
        }

        assert!(visited.iter().any(|&s| s == 2));
        // Three passes over segment 0: samples 0..4, 8..12, 16..20
        assert_eq!(visited.iter().filter(|&&s| s == 0).count(), 12);
    }

    #[test]
    fn test_sequence_loops_infinitely() {
        let rack = ModRack::new();
        let mut seq = EnvelopeSegmentSequence::new(2);
        seq.set_segment_length(0, 3).unwrap();
        seq.set_segment_length(1, 3).unwrap();
        seq.set_loop_start(0).unwrap();
        seq.set_loop_end(1).unwrap();
        seq.set_loop_inf(true);

        for _ in 0..100 {
            seq.tick(&rack);
            seq.update();
        }
        // Still cycling through the window
        assert!(seq.current_segment() <= 1);
    }

    #[test]
    fn test_loop_max_above_64_means_infinite() {
        let mut seq = EnvelopeSegmentSequence::new(2);
        seq.set_loop_max(65);
        assert!(seq.loop_inf());

        seq.set_loop_max(64);
        assert!(!seq.loop_inf());
        assert_eq!(seq.loop_max(), 64);
    }

    #[test]
    fn test_linked_level_bridges_segments() {
        let mut seq = EnvelopeSegmentSequence::new(3);
        seq.set_linked_level(0, 0.4).unwrap();

        assert_eq!(seq.segment(0).unwrap().end_level(), 0.4);
        assert_eq!(seq.segment(1).unwrap().start_level(), 0.4);

        // Last segment: no successor to link
        seq.set_linked_level(2, 0.9).unwrap();
        assert_eq!(seq.segment(2).unwrap().end_level(), 0.9);
    }

    #[test]
    fn test_loop_window_never_inverts() {
        let mut seq = EnvelopeSegmentSequence::new(4);
        seq.set_loop_end(3).unwrap();
        seq.set_loop_start(2).unwrap();
        assert_eq!((seq.loop_start(), seq.loop_end()), (2, 3));

        seq.set_loop_end(1).unwrap();
        assert_eq!((seq.loop_start(), seq.loop_end()), (1, 1));

        seq.set_loop_start(3).unwrap();
        assert_eq!((seq.loop_start(), seq.loop_end()), (3, 3));
    }

    #[test]
    fn test_segment_index_validated() {
        let mut seq = EnvelopeSegmentSequence::new(2);
        assert_eq!(
            seq.set_segment_rate(2, 1.0),
            Err(UnitError::SegmentIndex { index: 2, count: 2 })
        );
        assert!(seq.set_loop_start(5).is_err());
    }

    #[test]
    fn test_reset_rewinds_everything() {
        let rack = ModRack::new();
        let mut seq = EnvelopeSegmentSequence::new(2);
        seq.set_segment_length(0, 5).unwrap();
        seq.set_segment_length(1, 5).unwrap();

        for _ in 0..8 {
            seq.tick(&rack);
            seq.update();
        }
        assert_eq!(seq.current_segment(), 1);

        seq.reset();
        assert_eq!(seq.current_segment(), 0);
        seq.tick(&rack);
        assert_eq!(seq.current_segment(), 0);
    }
}
