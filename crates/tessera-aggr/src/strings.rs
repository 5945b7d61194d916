#![forbid(unsafe_code)]

//! String list aggregates (`asList`, `asItemList`, `asExprList`).
//!
//! Lists are built in two passes. The first pass formats every item into a
//! [`LengthSink`] to learn how many bytes each tile contributes to each group.
//! From those lengths every (group, tile) pair gets its own region of a single
//! output buffer, laid out group by group, tiles in order. The second pass
//! formats the items again, straight into their regions; regions are disjoint,
//! so tiles write in parallel.

use crate::config::AggrOptions;
use crate::error::{AggrError, AggrResult};
use crate::index_getter::Groups;
use crate::parallel::{run_ordered, try_for_each_tile};
use ahash::AHashMap;
use std::fmt::{self, Write};
use std::sync::Arc;
use tessera_columnar::{Attribute, Element, Text};

/// How list items are written and separated.
pub trait ItemFormat<T>: Sync {
    fn separator(&self) -> &str;

    fn write_item<W: Write>(&self, value: &T, out: &mut W) -> fmt::Result;
}

/// String items as-is, joined by a separator.
#[derive(Debug, Clone)]
pub struct RawText {
    separator: Arc<str>,
}

impl RawText {
    pub fn new(separator: impl Into<Arc<str>>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl ItemFormat<Text> for RawText {
    fn separator(&self) -> &str {
        &self.separator
    }

    fn write_item<W: Write>(&self, value: &Text, out: &mut W) -> fmt::Result {
        out.write_str(value.as_deref().unwrap_or_default())
    }
}

/// Values written as expressions (strings quoted), joined by `;`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Expressions;

impl<T: Element> ItemFormat<T> for Expressions {
    fn separator(&self) -> &str {
        ";"
    }

    fn write_item<W: Write>(&self, value: &T, out: &mut W) -> fmt::Result {
        value.write_expr(out)
    }
}

/// Counts bytes instead of storing them.
#[derive(Debug, Default)]
struct LengthSink {
    bytes: usize,
}

impl Write for LengthSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.bytes += s.len();
        Ok(())
    }
}

/// Writes into a fixed, pre-sized region; running past its end is an error.
struct SliceSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Write for SliceSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
        let dst = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

fn item_len<T, F: ItemFormat<T>>(format: &F, value: &T) -> usize {
    let mut sink = LengthSink::default();
    // A length sink never fails.
    let _ = format.write_item(value, &mut sink);
    sink.bytes
}

/// Bytes and non-empty items one tile contributes to one group.
#[derive(Debug, Default, Clone, Copy)]
struct Contribution {
    bytes: usize,
    items: usize,
}

/// Where one tile writes one group's items.
struct RegionPlan {
    group: usize,
    /// The group already has text from earlier tiles.
    lead: bool,
    len: usize,
}

struct Region<'a> {
    lead: bool,
    sink: SliceSink<'a>,
}

/// Joins the defined, non-empty items of each group in domain order. Every
/// group yields a string; an empty group yields `""`.
pub fn string_list<T, F>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    format: &F,
    options: &AggrOptions,
) -> AggrResult<Vec<Text>>
where
    T: Element,
    F: ItemFormat<T>,
{
    let tiles = values.tile_count();
    let separator = format.separator();

    // Pass 1: lengths per (tile, group).
    let mut measured: Vec<AHashMap<usize, Contribution>> = Vec::with_capacity(tiles);
    run_ordered(
        options,
        tiles,
        &mut measured,
        |t| {
            let tile = values.read_tile(t)?;
            let getter = groups.getter(operator, t)?;
            let mut local: AHashMap<usize, Contribution> = AHashMap::new();
            for (i, x) in tile.iter().enumerate() {
                if !x.is_defined() {
                    continue;
                }
                let Some(g) = getter.get(i) else {
                    continue;
                };
                let n = item_len(format, x);
                if n > 0 {
                    let c = local.entry(g).or_default();
                    c.bytes += n;
                    c.items += 1;
                }
            }
            Ok(local)
        },
        |measured, local| measured.push(local),
    )?;

    // Layout: group by group, tiles in order within a group.
    let too_long = || AggrError::capacity(operator, "total list length", usize::MAX as u64);
    let mut group_len = vec![0usize; groups.count()];
    let mut plans: Vec<Vec<RegionPlan>> = Vec::with_capacity(tiles);
    for contributions in &measured {
        let mut by_group: Vec<(usize, Contribution)> =
            contributions.iter().map(|(&g, &c)| (g, c)).collect();
        by_group.sort_unstable_by_key(|(g, _)| *g);
        let mut tile_plans = Vec::with_capacity(by_group.len());
        for (g, c) in by_group {
            let lead = group_len[g] > 0;
            let separators = c.items - 1 + usize::from(lead);
            let len = separators
                .checked_mul(separator.len())
                .and_then(|s| s.checked_add(c.bytes))
                .ok_or_else(too_long)?;
            group_len[g] = group_len[g].checked_add(len).ok_or_else(too_long)?;
            tile_plans.push(RegionPlan { group: g, lead, len });
        }
        plans.push(tile_plans);
    }
    let total = group_len
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .ok_or_else(too_long)?;

    let mut buffer = vec![0u8; total];
    {
        let mut order: Vec<(usize, usize, usize)> = plans
            .iter()
            .enumerate()
            .flat_map(|(t, ps)| ps.iter().enumerate().map(move |(k, p)| (p.group, t, k)))
            .collect();
        order.sort_unstable();

        let mut buckets: Vec<AHashMap<usize, Region<'_>>> =
            (0..tiles).map(|_| AHashMap::new()).collect();
        let mut rest: &mut [u8] = &mut buffer;
        for (g, t, k) in order {
            let plan = &plans[t][k];
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(plan.len);
            rest = tail;
            buckets[t].insert(
                g,
                Region {
                    lead: plan.lead,
                    sink: SliceSink { buf: head, pos: 0 },
                },
            );
        }

        // Pass 2: write every region.
        let changed = || AggrError::precondition(operator, "item text changed between passes");
        try_for_each_tile(options, buckets, |t, mut regions| {
            if regions.is_empty() {
                return Ok(());
            }
            let tile = values.read_tile(t)?;
            let getter = groups.getter(operator, t)?;
            for (i, x) in tile.iter().enumerate() {
                if !x.is_defined() {
                    continue;
                }
                let Some(region) = getter.get(i).and_then(|g| regions.get_mut(&g)) else {
                    continue;
                };
                if item_len(format, x) == 0 {
                    continue;
                }
                if region.lead || region.sink.pos > 0 {
                    region.sink.write_str(separator).map_err(|_| changed())?;
                }
                format.write_item(x, &mut region.sink).map_err(|_| changed())?;
            }
            if regions.values().any(|r| r.sink.pos != r.sink.buf.len()) {
                return Err(changed());
            }
            Ok(())
        })?;
    }

    let mut start = 0;
    Ok(group_len
        .iter()
        .map(|&len| {
            let bytes = &buffer[start..start + len];
            start += len;
            let s: Arc<str> = match std::str::from_utf8(bytes) {
                Ok(s) => Arc::from(s),
                Err(_) => Arc::from(String::from_utf8_lossy(bytes).as_ref()),
            };
            Some(s)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_getter::Partition;
    use pretty_assertions::assert_eq;
    use tessera_columnar::{text, AnyAttribute, Domain, TileCache, ValuesUnit};

    fn both() -> [AggrOptions; 2] {
        [
            AggrOptions::sequential(),
            AggrOptions {
                min_parallel_tiles: 1,
                ..AggrOptions::default()
            },
        ]
    }

    #[test]
    fn separators_only_between_non_empty_items() {
        let cache = Arc::new(TileCache::default());
        let words: Vec<Text> = vec![text(""), text("a"), None, text(""), text("b"), text("c")];
        let values = Attribute::from_values(&cache, Arc::new(Domain::tiled(6, 2)), words).unwrap();
        for options in both() {
            let joined =
                string_list("asList", &values, Groups::Total, &RawText::new(", "), &options).unwrap();
            assert_eq!(joined, vec![text("a, b, c")]);
        }
    }

    #[test]
    fn groups_span_tiles_and_empty_groups_are_empty() {
        let cache = Arc::new(TileCache::default());
        let domain = Arc::new(Domain::tiled(5, 2));
        let words: Vec<Text> = ["x", "y", "z", "w", "v"].iter().map(|s| text(s)).collect();
        let values = Attribute::from_values(&cache, domain.clone(), words).unwrap();
        let keys: AnyAttribute = Attribute::from_values(&cache, domain.clone(), vec![0u8, 2, 0, 2, 0])
            .unwrap()
            .with_values_unit(ValuesUnit::Domain(Arc::new(Domain::new(3))))
            .into();
        let partition = Partition::new("asItemList", 1, &keys, &domain).unwrap();
        for options in both() {
            let joined = string_list(
                "asItemList",
                &values,
                Groups::Partial(&partition),
                &RawText::new(","),
                &options,
            )
            .unwrap();
            assert_eq!(joined, vec![text("x,z,v"), text(""), text("y,w")]);
        }
    }

    #[test]
    fn expression_lists_quote_strings_and_format_numbers() {
        let cache = Arc::new(TileCache::default());
        let words: Vec<Text> = vec![text("say \"hi\""), text("")];
        let values = Attribute::from_values(&cache, Arc::new(Domain::new(2)), words).unwrap();
        let options = AggrOptions::sequential();
        let joined = string_list("asExprList", &values, Groups::Total, &Expressions, &options).unwrap();
        assert_eq!(joined, vec![text(r#""say \"hi\"";"""#)]);

        let numbers = Attribute::from_values(&cache, Arc::new(Domain::tiled(3, 1)), vec![1i32, i32::MIN, -4])
            .unwrap();
        let joined = string_list("asExprList", &numbers, Groups::Total, &Expressions, &options).unwrap();
        assert_eq!(joined, vec![text("1;-4")]);
    }
}
