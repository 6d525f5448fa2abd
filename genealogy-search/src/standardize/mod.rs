//! Standardization of free-text dates and places.

pub mod batcher;
pub mod date;
pub mod place;

pub use batcher::{BatchLoader, Batcher, BatcherConfig};
pub use date::{display_date, parse_std_date, standardize_date, StdDate};
pub use place::PlaceStandardizer;
