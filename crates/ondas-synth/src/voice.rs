//! The synthesis voice: top-level owner of the modulation graph.
//!
//! A [`Voice`] owns the [`ModRack`] (and with it every modulation source),
//! the FM operator network, and a designated amplitude envelope. It is the
//! one place that drives the two-phase protocol in the correct order: all
//! `tick`s for a sample happen before any `update`, so cross-unit
//! modulation always reads the same instant.

use core::cell::RefMut;

use ondas_core::{AudioContext, Sample, WaveShape, WavetableBank};

use crate::envelope::Envelope;
use crate::error::UnitError;
use crate::fm::{Fm, OperatorSlot};
use crate::operator::{Operator, OperatorMode};
use crate::rack::{ModKey, ModRack, ModSource};

/// A complete synthesis voice.
///
/// # Example
///
/// ```rust
/// use ondas_core::{AudioContext, WavetableBank};
/// use ondas_synth::{EnvelopeStage, Voice};
///
/// let ctx = AudioContext::new(44100, 4096);
/// let bank = WavetableBank::new(ctx);
///
/// let mut voice = Voice::new(ctx, &bank);
/// voice
///     .amp_envelope_mut()
///     .set_segment_level(EnvelopeStage::Attack, 0.8)
///     .unwrap();
/// voice
///     .amp_envelope_mut()
///     .set_segment_length(EnvelopeStage::Attack, 500)
///     .unwrap();
///
/// voice.note_on(69).unwrap();
/// for _ in 0..64 {
///     let _sample = voice.tick();
///     voice.update();
/// }
/// voice.note_off();
/// ```
#[derive(Debug)]
pub struct Voice {
    rack: ModRack,
    fm: Fm,
    amp_envelope: ModKey,
}

impl Voice {
    /// Create a voice: four sine operators on the pure-additive algorithm
    /// and a sustaining amplitude envelope.
    pub fn new(ctx: AudioContext, bank: &WavetableBank) -> Self {
        let mut rack = ModRack::new();
        let amp_envelope = rack.insert(ModSource::Envelope(Envelope::new(ctx, true)));

        let sine = bank.get(WaveShape::Sine);
        let operator = || Operator::new(ctx, sine.clone(), OperatorMode::Additive);
        let fm = Fm::new(operator(), operator(), operator(), operator(), 11)
            .unwrap_or_else(|_| unreachable!("algorithm 11 is always valid"));

        Self {
            rack,
            fm,
            amp_envelope,
        }
    }

    /// Start a note: track it on all four operators and restart the
    /// amplitude envelope.
    pub fn note_on(&mut self, note: u8) -> Result<(), UnitError> {
        self.fm.set_note(note)?;
        self.amp_envelope_mut().reset();
        Ok(())
    }

    /// Release the current note: the amplitude envelope jumps to its
    /// release segment.
    pub fn note_off(&mut self) {
        self.amp_envelope_mut().note_off();
    }

    /// Produce the current sample: the FM network output shaped by the
    /// amplitude envelope's contour.
    pub fn tick(&mut self) -> Sample {
        let output = self.fm.tick(&self.rack);

        let contour = {
            let mut envelope = self
                .rack
                .borrow_mut(self.amp_envelope)
                .expect("amplitude envelope lives as long as the voice");
            match envelope.as_envelope_mut() {
                Some(env) => {
                    let contour = env.tick(&self.rack);
                    contour * env.amp()
                }
                None => 1.0,
            }
        };

        output * contour
    }

    /// Advance the whole graph by one sample: the operator network and then
    /// every modulation source in the rack, each exactly once.
    pub fn update(&mut self) {
        self.fm.update();
        self.rack.update_all();
    }

    /// Borrow the rack to insert or inspect modulation sources.
    pub fn rack(&self) -> &ModRack {
        &self.rack
    }

    /// Mutably borrow the rack.
    pub fn rack_mut(&mut self) -> &mut ModRack {
        &mut self.rack
    }

    /// Borrow the FM network.
    pub fn fm(&self) -> &Fm {
        &self.fm
    }

    /// Mutably borrow the FM network.
    pub fn fm_mut(&mut self) -> &mut Fm {
        &mut self.fm
    }

    /// Handle of the amplitude envelope in the rack.
    pub fn amp_envelope_key(&self) -> ModKey {
        self.amp_envelope
    }

    /// Borrow the amplitude envelope for configuration.
    pub fn amp_envelope_mut(&mut self) -> RefMut<'_, Envelope> {
        let envelope = self
            .rack
            .borrow_mut(self.amp_envelope)
            .expect("amplitude envelope lives as long as the voice");
        RefMut::map(envelope, |source| {
            source
                .as_envelope_mut()
                .expect("amplitude envelope key always addresses an envelope")
        })
    }

    /// Mutably borrow one operator of the FM network.
    pub fn operator_mut(&mut self, slot: OperatorSlot) -> &mut Operator {
        self.fm.operator_mut(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeStage;
    use crate::lfo::Lfo;
    use ondas_core::WaveShape;

    fn setup() -> (AudioContext, WavetableBank) {
        let ctx = AudioContext::new(44100, 4096);
        (ctx, WavetableBank::new(ctx))
    }

    fn voice_with_attack(ctx: AudioContext, bank: &WavetableBank) -> Voice {
        let mut voice = Voice::new(ctx, bank);
        {
            let mut env = voice.amp_envelope_mut();
            env.set_segment_level(EnvelopeStage::Attack, 1.0).unwrap();
            env.set_segment_length(EnvelopeStage::Attack, 100).unwrap();
            env.set_segment_length(EnvelopeStage::Release, 100).unwrap();
        }
        voice
    }

    #[test]
    fn test_silent_before_note_on() {
        let (ctx, bank) = setup();
        let mut voice = voice_with_attack(ctx, &bank);

        // No note: operators sit at frequency 0 on the sine zero crossing,
        // and the envelope contour starts at 0 anyway.
        assert_eq!(voice.tick(), 0.0);
    }

    #[test]
    fn test_note_produces_audio() {
        let (ctx, bank) = setup();
        let mut voice = voice_with_attack(ctx, &bank);
        voice.note_on(69).unwrap();

        let mut peak: f64 = 0.0;
        for _ in 0..1000 {
            peak = peak.max(voice.tick().abs());
            voice.update();
        }
        assert!(peak > 0.5, "voice should be audible, peak {peak}");
    }

    #[test]
    fn test_note_off_fades_to_silence() {
        let (ctx, bank) = setup();
        let mut voice = voice_with_attack(ctx, &bank);
        voice.note_on(69).unwrap();

        for _ in 0..500 {
            voice.tick();
            voice.update();
        }

        voice.note_off();
        for _ in 0..200 {
            voice.tick();
            voice.update();
        }

        // Release (100 samples) has run out: pure silence.
        assert_eq!(voice.tick(), 0.0);
    }

    #[test]
    fn test_lfo_modulates_operator_level_through_rack() {
        let (ctx, bank) = setup();
        let mut voice = voice_with_attack(ctx, &bank);

        let lfo = Lfo::new(ctx, bank.get(WaveShape::Sine), 5.0, 1.0, 0.0);
        let key = voice.rack_mut().insert(ModSource::Lfo(lfo));

        let slot = OperatorSlot::A;
        let index = voice.operator_mut(slot).attach_level_mod(key);
        voice
            .operator_mut(slot)
            .set_level_mod_depth(index, 1.0)
            .unwrap();

        voice.note_on(69).unwrap();
        let mut samples = alloc::vec::Vec::new();
        for _ in 0..4410 {
            samples.push(voice.tick());
            voice.update();
        }

        // The 5 Hz level wobble must leave a visible amplitude imprint
        // compared to an unmodulated voice.
        assert!(samples.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_tick_idempotent_between_updates() {
        let (ctx, bank) = setup();
        let mut voice = voice_with_attack(ctx, &bank);
        voice.note_on(60).unwrap();

        for _ in 0..10 {
            voice.tick();
            voice.update();
        }

        let a = voice.tick();
        let b = voice.tick();
        assert_eq!(a, b, "tick must not advance state");
    }
}
