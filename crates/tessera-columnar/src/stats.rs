#![forbid(unsafe_code)]

use crate::attribute::Attribute;
use crate::element::{Element, ValueRange};

/// Summary of an attribute's stored values, computed once on first use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeStats {
    pub defined_count: u64,
    pub undefined_count: u64,
    /// Smallest and largest ordinal of the defined values of a countable attribute.
    pub min_ordinal: Option<i64>,
    pub max_ordinal: Option<i64>,
    /// Defined values with no ordinal (`u64` above `i64::MAX`).
    pub unordinal_count: u64,
}

impl AttributeStats {
    pub(crate) fn compute<T: Element>(attr: &Attribute<T>) -> Self {
        let mut stats = Self::default();
        for t in 0..attr.tile_count() {
            let Ok(tile) = attr.read_tile(t) else {
                continue;
            };
            for v in tile.iter() {
                if !v.is_defined() {
                    stats.undefined_count += 1;
                    continue;
                }
                stats.defined_count += 1;
                match v.to_ordinal() {
                    Some(o) => {
                        stats.min_ordinal = Some(stats.min_ordinal.map_or(o, |m| m.min(o)));
                        stats.max_ordinal = Some(stats.max_ordinal.map_or(o, |m| m.max(o)));
                    }
                    None if T::KIND.is_countable() => stats.unordinal_count += 1,
                    None => {}
                }
            }
        }
        stats
    }

    /// Range spanned by the defined ordinals, empty when there are none.
    pub fn ordinal_span(&self) -> Option<ValueRange> {
        match (self.min_ordinal, self.max_ordinal) {
            (Some(lo), Some(hi)) => Some(ValueRange::new(lo, hi.checked_add(1)?)),
            _ => None,
        }
    }

    /// Whether every defined value has an ordinal inside `range`.
    pub fn fits_in(&self, range: &ValueRange) -> bool {
        if self.unordinal_count > 0 {
            return false;
        }
        match self.ordinal_span() {
            Some(span) => range.contains_range(&span),
            None => self.defined_count == 0,
        }
    }
}
