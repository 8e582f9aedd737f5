//! Ondas Core - wavetable primitives for the ondas synthesis engine
//!
//! This crate provides the table-lookup foundation that the synthesis crate
//! builds on: the process-wide audio context, wavetable generation (additive
//! and closed-form), the shared wavetable bank, and the fractional-index
//! lookup oscillator.
//!
//! # Core Components
//!
//! ## Audio Context
//!
//! All units read their timing constants from one immutable [`AudioContext`]
//! created before anything else and passed into every constructor:
//!
//! ```rust
//! use ondas_core::AudioContext;
//!
//! let ctx = AudioContext::new(44100, 4096);
//! assert!((ctx.table_increment() - 4096.0 / 44100.0).abs() < 1e-12);
//! ```
//!
//! ## Wavetables
//!
//! A [`Wavetable`] holds one waveform period plus a wrap sample for
//! interpolation (`table[len] == table[0]`). Tables are immutable after
//! generation and shared via `Arc`:
//!
//! - [`Wavetable::additive`] - sum of sinusoidal partials, with optional
//!   Lanczos sigma smoothing and bit-depth quantization
//! - [`WavetableBank`] - the startup-generated standard set, served by
//!   [`WaveShape`] id
//!
//! ## Oscillator
//!
//! [`Oscillator`] advances a fractional index through a shared table and
//! produces linearly interpolated samples:
//!
//! ```rust
//! use ondas_core::{AudioContext, Oscillator, WaveShape, WavetableBank};
//!
//! let ctx = AudioContext::new(44100, 4096);
//! let bank = WavetableBank::new(ctx);
//!
//! let mut osc = Oscillator::new(ctx, bank.get(WaveShape::Sine), 440.0, 0.0);
//! let sample = osc.tick();
//! osc.update();
//! ```
//!
//! # Two-phase protocol
//!
//! Every generator in ondas separates reading from advancing: `tick()`
//! produces the current sample without moving time forward, `update()`
//! advances state by exactly one sample. Callers tick every unit of a graph
//! against the same logical sample before updating any of them.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! ondas-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod context;
pub mod oscillator;
pub mod wavetable;

pub use context::AudioContext;
pub use oscillator::Oscillator;
pub use wavetable::{Partial, WaveShape, Wavetable, WavetableBank};

/// The sample type used throughout ondas.
///
/// Double precision keeps long-running accumulators (oscillator indices,
/// envelope progress) stable over minutes of audio.
pub type Sample = f64;
