//! Tiled columnar attribute storage for tessera.
//!
//! This crate focuses on:
//! - Domains: countable element sets split into tiles for memory-bounded processing.
//! - Typed attributes aligned 1:1 with a domain, with undefined-value sentinels per type.
//! - Bit-packed storage for 1, 2 and 4 bit values, decoded through a shared LRU of tiles.
//! - The result lifecycle: an exclusive writer that commits into an immutable attribute.

#![forbid(unsafe_code)]

mod any;
mod attribute;
mod bitpacking;
mod cache;
mod domain;
mod element;
mod error;
mod stats;

pub use crate::any::AnyAttribute;
pub use crate::attribute::{Attribute, AttributeWriter, StoredTile, TileRead, ValuesUnit};
pub use crate::bitpacking::PackedBits;
pub use crate::cache::{AttributeId, CacheStats, TileCache, TileCacheConfig};
pub use crate::domain::{Domain, TileRange};
pub use crate::element::{
    text, Bits, Bool, Element, Point, ScalarElement, ScalarKind, Text, ValueKind, ValueRange,
};
pub use crate::error::{ColumnarError, ColumnarResult};
pub use crate::stats::AttributeStats;
