//! Modulation demo: docks, sidechaining, and the envelope contour.
//!
//! Run with: cargo run -p ondas-synth --example modulation_demo

use ondas_synth::{
    AudioContext, Envelope, EnvelopeStage, Lfo, MacroControl, ModDock, ModRack, ModSource,
    WaveShape, WavetableBank,
};

fn main() {
    let ctx = AudioContext::new(44100, 4096);
    let bank = WavetableBank::new(ctx);

    // --- A dock over a filter-cutoff-like parameter ---
    println!("=== ModDock over a 0..1 parameter, base 0.5 ===\n");

    let mut rack = ModRack::new();
    let lfo = rack.insert(ModSource::Lfo(Lfo::new(
        ctx,
        bank.get(WaveShape::Sine),
        2.0,
        1.0,
        0.0,
    )));

    let mut dock = ModDock::new(0.0, 1.0, 0.5);
    let lfo_item = dock.attach(lfo);
    dock.set_depth(lfo_item, 0.4).unwrap();

    println!("Sample | Dock output");
    println!("-------+------------");
    for i in 0..10 {
        let out = dock.tick(&rack);
        rack.update_all();
        // Skip ahead so the 2 Hz wobble is visible in ten rows
        for _ in 0..2204 {
            rack.update_all();
        }
        println!("{:>6} | {:>10.4}", i * 2205, out);
    }

    // --- Sidechaining: a macro rides the LFO's depth ---
    println!("\n=== Sidechain: macro drives the LFO's depth ===\n");

    let macro_key = rack.insert(ModSource::Macro(MacroControl::new(1.0)));
    let macro_item = dock.attach(macro_key);
    dock.set_sidechain(macro_item, lfo_item).unwrap();

    for value in [1.0, 0.5, 0.0, -0.5, -1.0] {
        rack.borrow_mut(macro_key)
            .unwrap()
            .as_macro_mut()
            .unwrap()
            .set_value(value)
            .unwrap();
        println!("macro {value:>5.2} -> dock {:>7.4}", dock.tick(&rack));
    }

    // --- The envelope contour ---
    println!("\n=== Envelope: 50 ms attack to 0.8, release on note-off ===\n");

    let rack = ModRack::new();
    let mut env = Envelope::new(ctx, true);
    env.set_segment_level(EnvelopeStage::Attack, 0.8).unwrap();
    env.set_segment_length(EnvelopeStage::Attack, ctx.ms_to_samples(50.0))
        .unwrap();
    env.set_segment_length(EnvelopeStage::Release, ctx.ms_to_samples(50.0))
        .unwrap();

    print!("attack  ");
    for _ in 0..8 {
        for _ in 0..ctx.ms_to_samples(50.0) / 8 {
            env.tick(&rack);
            env.update();
        }
        print!("{:.3} ", env.tick(&rack));
    }

    env.note_off();
    print!("\nrelease ");
    for _ in 0..8 {
        for _ in 0..ctx.ms_to_samples(50.0) / 8 {
            env.tick(&rack);
            env.update();
        }
        print!("{:.3} ", env.tick(&rack));
    }
    println!();
}
