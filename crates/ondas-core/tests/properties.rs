//! Property-based tests for ondas-core invariants.

use std::sync::Arc;

use ondas_core::{AudioContext, Oscillator, Partial, Wavetable};
use proptest::prelude::*;

const LEN: usize = 1024;

fn ctx() -> AudioContext {
    AudioContext::new(44100, LEN)
}

fn sine() -> Arc<Wavetable> {
    Arc::new(Wavetable::additive(
        "sine",
        &[Partial::new(1, 1.0)],
        LEN,
        1.0,
        false,
        None,
    ))
}

proptest! {
    /// Linear interpolation never escapes the bounds of the two samples
    /// it interpolates between.
    #[test]
    fn interpolation_bounded_by_neighbors(index in 0.0f64..1024.0) {
        let table = sine();

        // Keep strictly below the logical length
        let index = index.min(1023.999);
        let base = index as usize;
        let a = table.at(base);
        let b = table.at(base + 1);
        let value = table.interpolate(index);

        prop_assert!(value >= a.min(b) - 1e-12);
        prop_assert!(value <= a.max(b) + 1e-12);
    }

    /// The oscillator index stays inside [0, table_length) for any
    /// frequency, positive or negative, over many samples.
    #[test]
    fn oscillator_index_stays_in_range(freq in -20000.0f64..20000.0) {
        let mut osc = Oscillator::new(ctx(), sine(), freq, 0.0);

        for _ in 0..500 {
            osc.update();
            let index = osc.phase_index();
            prop_assert!((0.0..1024.0).contains(&index), "index {} escaped", index);
        }
    }

    /// Phase offsets normalize into [0, 360) for any input angle.
    #[test]
    fn phase_offset_normalized(degrees in -100_000.0f64..100_000.0) {
        let mut osc = Oscillator::new(ctx(), sine(), 440.0, 0.0);

        osc.set_phase_offset(degrees);
        let offset = osc.phase_offset();
        prop_assert!((0.0..360.0).contains(&offset), "offset {} escaped", offset);
    }

    /// Additively generated tables always carry a wrap sample equal to
    /// their first sample.
    #[test]
    fn additive_tables_wrap(partial_count in 1u16..32, len in 16usize..512) {
        let partials: Vec<Partial> = (1..=partial_count)
            .map(|n| Partial::new(n, 1.0 / f64::from(n)))
            .collect();
        let table = Wavetable::additive("t", &partials, len, 1.0, true, None);

        prop_assert_eq!(table.len(), len);
        prop_assert_eq!(table.at(len), table.at(0));
    }
}
