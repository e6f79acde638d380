//! Per-command payload parsers (component C5): pure functions from a
//! reply's data bytes to a typed result. None of these touch engine state;
//! the dispatcher (C4) decides which parser to call and what to do with
//! the result.

/// A reply's data bytes were shorter than the shape its command requires.
/// The dispatcher treats this the same as a framing error: log and drop,
/// never surfaced to a caller (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadTooShort;

pub mod buffered;
pub mod config;
pub mod inventory;
pub mod mask;
pub mod tagop;

pub use buffered::{parse_buffered_record, parse_inventory_summary};
pub use config::{
    parse_frequency_region_reply, parse_output_power, parse_output_power_8p, parse_temperature,
};
pub use inventory::{parse_6b_sighting, parse_antenna_missing, parse_tag_sighting};
pub use mask::parse_tag_mask_record;
pub use tagop::{parse_read_record, parse_tag_op_record};
