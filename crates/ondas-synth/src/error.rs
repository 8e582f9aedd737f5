//! Control-surface errors.
//!
//! Every validating setter in this crate rejects bad input synchronously and
//! returns one of these variants; nothing is clamped at the control surface
//! and nothing is retried. The audio-path aggregation results, by contrast,
//! are clamped to dock boundaries by design and never produce errors.

use thiserror::Error;

/// Errors raised by unit control surfaces.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum UnitError {
    /// A direct parameter setter received a value outside its documented
    /// range.
    #[error("{param} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Name of the rejected parameter.
        param: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound of the documented range.
        min: f64,
        /// Upper bound of the documented range.
        max: f64,
    },

    /// A modulation-item index did not address a live item in its dock.
    #[error("modulation item index {index} out of range ({count} attached)")]
    ItemIndex {
        /// The rejected index.
        index: usize,
        /// Number of items currently attached.
        count: usize,
    },

    /// A segment index did not address a live segment in its sequence.
    #[error("segment index {index} out of range ({count} segments)")]
    SegmentIndex {
        /// The rejected index.
        index: usize,
        /// Number of segments in the sequence.
        count: usize,
    },

    /// A sidechain was requested between an item and itself.
    #[error("an item cannot sidechain its own depth (index {index})")]
    SelfSidechain {
        /// The offending index.
        index: usize,
    },

    /// A sidechain removal was requested for a relationship that does not
    /// exist.
    #[error("item {master} is not sidechaining item {slave}")]
    NotSidechained {
        /// The supposed master index.
        master: usize,
        /// The supposed slave index.
        slave: usize,
    },

    /// An FM algorithm id outside 0-11.
    #[error("FM algorithm id must be between 0 and 11, got {0}")]
    Algorithm(u8),

    /// A note number outside 0-127.
    #[error("note must be between 0 and 127, got {0}")]
    Note(u8),
}

/// Validate `value` against an inclusive range, naming the parameter in the
/// error.
pub(crate) fn check_range(
    param: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), UnitError> {
    if value < min || value > max || value.is_nan() {
        return Err(UnitError::OutOfRange {
            param,
            value,
            min,
            max,
        });
    }
    Ok(())
}
