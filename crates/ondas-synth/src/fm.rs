//! The fixed-topology FM operator network.
//!
//! Four operators A-D are wired together by one of twelve fixed algorithms,
//! each a nesting of two primitives: `modulate` feeds a value into a
//! carrier's frequency and ticks it, `add` ticks a unit and mixes it in.
//! Algorithm 0 is the full serial stack `D(C(B(A)))`; algorithm 11 is the
//! pure additive mix `A + B + C + D`.
//!
//! Selecting an algorithm also decides each operator's level semantics:
//! operators used purely as modulation sources run in FM-index mode, those
//! mixed into the output run in additive mode.

use ondas_core::Sample;

use crate::error::UnitError;
use crate::operator::{Operator, OperatorMode};
use crate::rack::ModRack;

/// The four operator slots of the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorSlot {
    /// Root of every topology.
    A = 0,
    /// Second operator.
    B = 1,
    /// Third operator.
    C = 2,
    /// Fourth operator.
    D = 3,
}

/// Number of FM algorithms.
pub const ALGORITHM_COUNT: u8 = 12;

/// A four-operator FM network with a selected algorithm.
///
/// # Example
///
/// ```rust
/// use ondas_core::{AudioContext, WaveShape, WavetableBank};
/// use ondas_synth::{Fm, ModRack, Operator, OperatorMode, OperatorSlot};
///
/// let ctx = AudioContext::new(44100, 4096);
/// let bank = WavetableBank::new(ctx);
/// let rack = ModRack::new();
///
/// let table = bank.get(WaveShape::Sine);
/// let op = || Operator::new(ctx, table.clone(), OperatorMode::Additive);
/// let mut fm = Fm::new(op(), op(), op(), op(), 0).unwrap();
///
/// for slot in [OperatorSlot::A, OperatorSlot::B, OperatorSlot::C, OperatorSlot::D] {
///     fm.operator_mut(slot).set_note(69).unwrap();
/// }
///
/// let _sample = fm.tick(&rack);
/// fm.update();
/// ```
#[derive(Clone, Debug)]
pub struct Fm {
    operators: [Operator; 4],
    algorithm: u8,
}

impl Fm {
    /// Create a network over four operators with an initial algorithm.
    pub fn new(
        a: Operator,
        b: Operator,
        c: Operator,
        d: Operator,
        algorithm: u8,
    ) -> Result<Self, UnitError> {
        let mut fm = Self {
            operators: [a, b, c, d],
            algorithm: 0,
        };
        fm.set_algorithm(algorithm)?;
        Ok(fm)
    }

    /// Select an algorithm, 0-11, and re-derive every operator's mode.
    pub fn set_algorithm(&mut self, algorithm: u8) -> Result<(), UnitError> {
        if algorithm >= ALGORITHM_COUNT {
            return Err(UnitError::Algorithm(algorithm));
        }

        self.algorithm = algorithm;

        use OperatorMode::{Additive, Fm as FmMode};
        let modes = match algorithm {
            0 | 1 | 2 | 3 | 6 => [FmMode, FmMode, FmMode, Additive],
            4 | 5 | 7 => [FmMode, FmMode, Additive, Additive],
            8 | 9 | 10 => [FmMode, Additive, Additive, Additive],
            _ => [Additive, Additive, Additive, Additive],
        };

        for (operator, mode) in self.operators.iter_mut().zip(modes) {
            operator.set_mode(mode);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("fm algorithm: {algorithm}");

        Ok(())
    }

    /// The selected algorithm.
    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// Borrow an operator.
    pub fn operator(&self, slot: OperatorSlot) -> &Operator {
        &self.operators[slot as usize]
    }

    /// Mutably borrow an operator.
    pub fn operator_mut(&mut self, slot: OperatorSlot) -> &mut Operator {
        &mut self.operators[slot as usize]
    }

    /// Track a note on all four operators.
    pub fn set_note(&mut self, note: u8) -> Result<(), UnitError> {
        for operator in &mut self.operators {
            operator.set_note(note)?;
        }
        Ok(())
    }

    /// Evaluate the selected topology for the current sample.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        const A: usize = OperatorSlot::A as usize;
        const B: usize = OperatorSlot::B as usize;
        const C: usize = OperatorSlot::C as usize;
        const D: usize = OperatorSlot::D as usize;

        let a = self.tick_if_active(A, rack);

        match self.algorithm {
            0 => {
                let b = self.modulate(B, a, rack);
                let c = self.modulate(C, b, rack);
                self.modulate(D, c, rack)
            }
            1 => {
                let b = self.add(B, a, rack);
                let c = self.modulate(C, b, rack);
                self.modulate(D, c, rack)
            }
            2 => {
                let b = self.modulate(B, a, rack);
                let c = self.add(C, b, rack);
                self.modulate(D, c, rack)
            }
            3 => {
                let bc = self.modulate(B, a, rack) + self.modulate(C, a, rack);
                self.modulate(D, bc, rack)
            }
            4 => {
                let b = self.modulate(B, a, rack);
                self.modulate(D, b, rack) + self.modulate(C, b, rack)
            }
            5 => {
                let b = self.modulate(B, a, rack);
                let c = self.modulate(C, b, rack);
                self.add(D, c, rack)
            }
            6 => {
                let b = self.tick_if_active(B, rack);
                let c = self.add(C, a + b, rack);
                self.modulate(D, c, rack)
            }
            7 => {
                let b = self.tick_if_active(B, rack);
                self.modulate(C, a, rack) + self.modulate(D, b, rack)
            }
            8 => {
                self.modulate(D, a, rack) + self.modulate(C, a, rack) + self.modulate(B, a, rack)
            }
            9 => {
                let b = self.modulate(B, a, rack);
                let c = self.add(C, b, rack);
                self.add(D, c, rack)
            }
            10 => {
                let bc = self.modulate(C, a, rack) + self.modulate(B, a, rack);
                self.add(D, bc, rack)
            }
            _ => {
                let b = self.add(B, a, rack);
                let c = self.add(C, b, rack);
                self.add(D, c, rack)
            }
        }
    }

    /// Advance all four operators by one sample.
    pub fn update(&mut self) {
        for operator in &mut self.operators {
            operator.update();
        }
    }

    fn tick_if_active(&mut self, index: usize, rack: &ModRack) -> Sample {
        if self.operators[index].is_active() {
            self.operators[index].tick(rack)
        } else {
            0.0
        }
    }

    /// Feed `value` into the carrier's frequency and tick it. An inactive
    /// carrier is skipped entirely and contributes 0.
    fn modulate(&mut self, carrier: usize, value: Sample, rack: &ModRack) -> Sample {
        if !self.operators[carrier].is_active() {
            return 0.0;
        }
        self.operators[carrier].modulate_frequency(value);
        self.operators[carrier].tick(rack)
    }

    /// Tick a unit and mix `value` in. An inactive unit contributes 0.
    fn add(&mut self, unit: usize, value: Sample, rack: &ModRack) -> Sample {
        if !self.operators[unit].is_active() {
            return 0.0;
        }
        self.operators[unit].tick(rack) + value
    }
}

impl crate::traits::Ticks for Fm {
    fn tick(&mut self, rack: &ModRack) -> Sample {
        Fm::tick(self, rack)
    }

    fn update(&mut self) {
        Fm::update(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec;
    use ondas_core::{AudioContext, Wavetable};

    fn ctx() -> AudioContext {
        AudioContext::new(44100, 64)
    }

    /// An operator that always outputs `value`: a constant wavetable in
    /// additive mode at full level.
    fn constant_operator(value: f64) -> Operator {
        let table = Arc::new(Wavetable::from_samples("constant", vec![value; 64]));
        Operator::new(ctx(), table, OperatorMode::Additive)
    }

    fn constant_fm(algorithm: u8) -> Fm {
        Fm::new(
            constant_operator(0.1),
            constant_operator(0.2),
            constant_operator(0.3),
            constant_operator(0.4),
            algorithm,
        )
        .unwrap()
    }

    #[test]
    fn test_algorithm_validation() {
        let mut fm = constant_fm(0);
        assert!(fm.set_algorithm(11).is_ok());
        assert_eq!(fm.set_algorithm(12), Err(UnitError::Algorithm(12)));
        // Selection unchanged after a rejected set
        assert_eq!(fm.algorithm(), 11);
    }

    #[test]
    fn test_algorithm_modes() {
        let mut fm = constant_fm(0);
        assert_eq!(fm.operator(OperatorSlot::A).mode(), OperatorMode::Fm);
        assert_eq!(fm.operator(OperatorSlot::B).mode(), OperatorMode::Fm);
        assert_eq!(fm.operator(OperatorSlot::C).mode(), OperatorMode::Fm);
        assert_eq!(fm.operator(OperatorSlot::D).mode(), OperatorMode::Additive);

        fm.set_algorithm(8).unwrap();
        assert_eq!(fm.operator(OperatorSlot::A).mode(), OperatorMode::Fm);
        assert_eq!(fm.operator(OperatorSlot::B).mode(), OperatorMode::Additive);

        fm.set_algorithm(11).unwrap();
        for slot in [
            OperatorSlot::A,
            OperatorSlot::B,
            OperatorSlot::C,
            OperatorSlot::D,
        ] {
            assert_eq!(fm.operator(slot).mode(), OperatorMode::Additive);
        }
    }

    #[test]
    fn test_algorithm_11_pure_additive() {
        let rack = ModRack::new();
        let mut fm = constant_fm(11);

        // c_A + c_B + c_C + c_D
        let out = fm.tick(&rack);
        assert!((out - 1.0).abs() < 1e-9, "expected 0.1+0.2+0.3+0.4, got {out}");
    }

    #[test]
    fn test_algorithm_11_inactive_operator_contributes_zero() {
        let rack = ModRack::new();
        let mut fm = constant_fm(11);
        fm.operator_mut(OperatorSlot::C).set_active(false);

        let out = fm.tick(&rack);
        assert!((out - 0.7).abs() < 1e-9, "expected 0.1+0.2+0.4, got {out}");
    }

    #[test]
    fn test_algorithm_9_mixes_modulated_chain() {
        let rack = ModRack::new();
        let mut fm = constant_fm(9);

        // Algorithm 9 is D + (C + B(A)). A runs in FM mode with no note, so
        // its amplitude (index * real frequency) is 0 and B's frequency is
        // unmodulated; B, C, D mix additively: 0.2 + 0.3 + 0.4.
        let out = fm.tick(&rack);
        assert!((out - 0.9).abs() < 1e-9, "expected 0.9, got {out}");
    }

    #[test]
    fn test_serial_chain_skips_inactive_carrier() {
        let rack = ModRack::new();
        let mut fm = constant_fm(0);

        // With D inactive the whole serial stack collapses to 0.
        fm.operator_mut(OperatorSlot::D).set_active(false);
        assert_eq!(fm.tick(&rack), 0.0);
    }

    #[test]
    fn test_modulate_feeds_carrier_frequency() {
        let ctx = AudioContext::new(44100, 4096);
        // A constant modulator driving a sine carrier shifts the carrier's
        // phase advance by a fixed amount every sample.
        let bank = ondas_core::WavetableBank::new(ctx);
        let sine = bank.get(ondas_core::WaveShape::Sine);

        let modulator = {
            let table = Arc::new(Wavetable::from_samples("constant", vec![1.0; 4096]));
            let mut op = Operator::new(ctx, table, OperatorMode::Fm);
            op.set_note(69).unwrap(); // real_freq 440 -> amp = level * 440
            op.set_level(1.0).unwrap();
            op
        };
        let carrier = Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive);

        let mut fm = Fm::new(
            modulator,
            carrier,
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
            0,
        )
        .unwrap();
        // Only A -> B matters; silence C and D's modulation by making them
        // pass-through additive mixers.
        fm.set_algorithm(9).unwrap();

        let rack = ModRack::new();
        fm.tick(&rack);
        fm.update();

        // B's phase advanced by tableIncrement * (A's output) even though
        // B itself tracks no note.
        let index = fm.operator(OperatorSlot::B).phase_index();
        assert!(index > 0.0, "carrier phase must move under FM, got {index}");
    }

    #[test]
    fn test_update_advances_all_operators() {
        let ctx = AudioContext::new(44100, 4096);
        let bank = ondas_core::WavetableBank::new(ctx);
        let sine = bank.get(ondas_core::WaveShape::Sine);

        let mut operators = [
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
            Operator::new(ctx, Arc::clone(&sine), OperatorMode::Additive),
        ];
        for op in &mut operators {
            op.set_note(69).unwrap();
        }
        let [a, b, c, d] = operators;
        let mut fm = Fm::new(a, b, c, d, 11).unwrap();

        let rack = ModRack::new();
        let first = fm.tick(&rack);
        fm.update();
        let second = fm.tick(&rack);

        assert_ne!(first, second, "all operators should have advanced");
    }
}
