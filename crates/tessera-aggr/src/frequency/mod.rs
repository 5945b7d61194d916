#![forbid(unsafe_code)]

//! Frequency aggregates: modus, unique counts and entropy.
//!
//! Every aggregate here is a [`Reduce`] over the value counts of one group.
//! Counting itself is shared and runs with the strategy picked by
//! [`select_strategy`]: a dense counter table addressed by (group, ordinal),
//! or an ordered map per group. Both hand a group's counts to the reducer in
//! ascending value order and both skip values outside the countable range, so
//! the two strategies give identical results.

mod reducers;
mod selector;
mod weights;

pub use reducers::{AverageEntropy, CountOutput, Entropy, Modus, ModusCount, Reduce, Tally, UniqueCount};
pub use selector::{select_strategy, Strategy, MAX_TABLE_CELLS};
pub use weights::{Unweighted, WeightSource, Weighted};

use crate::config::AggrOptions;
use crate::error::AggrResult;
use crate::index_getter::Groups;
use crate::parallel::{is_parallel, run_ordered};
use ahash::AHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tessera_columnar::{Attribute, Element, ValueRange};

/// Orders elements by [`Element::cmp_value`] so they can key a map.
#[derive(Debug, Clone)]
struct ByValue<T>(T);

impl<T: Element> PartialEq for ByValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.cmp_value(&other.0) == Ordering::Equal
    }
}

impl<T: Element> Eq for ByValue<T> {}

impl<T: Element> PartialOrd for ByValue<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Element> Ord for ByValue<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_value(&other.0)
    }
}

/// Counts `values` per group (weighted by `weights`) and reduces each group.
pub fn frequency<T, W, R>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    weights: &W,
    reducer: &R,
    options: &AggrOptions,
) -> AggrResult<Vec<R::Output>>
where
    T: Element,
    W: WeightSource,
    R: Reduce<T, W::Tally>,
{
    let range = values.countable_range();
    let strategy = select_strategy(
        operator,
        values.len(),
        range,
        T::KIND,
        groups.count(),
        options.strategy,
    )?;
    let zero = W::Tally::default();

    match strategy {
        Strategy::Table { range } => {
            let counts = table_counts(operator, values, groups, weights, range, options)?;
            let v = range.len();
            (0..groups.count())
                .map(|g| {
                    let cells = &counts[g * v..(g + 1) * v];
                    reducer.reduce(
                        cells
                            .iter()
                            .enumerate()
                            .filter(|(_, c)| **c > zero)
                            .filter_map(|(k, &c)| Some((T::from_ordinal(range.value_at(k)?)?, c))),
                    )
                })
                .collect()
        }
        Strategy::Set => {
            let maps = set_counts(operator, values, groups, weights, range, options)?;
            maps.into_iter()
                .map(|map| {
                    reducer.reduce(
                        map.into_iter()
                            .filter(|(_, c)| *c > zero)
                            .map(|(k, c)| (k.0, c)),
                    )
                })
                .collect()
        }
    }
}

/// Calls `f(group, element, weight)` for every counted element of tile `t`.
fn for_each_counted<T, W>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    weights: &W,
    t: usize,
    mut f: impl FnMut(usize, &T, W::Tally),
) -> AggrResult<()>
where
    T: Element,
    W: WeightSource,
{
    let tile = values.read_tile(t)?;
    let getter = groups.getter(operator, t)?;
    let weight_tile = weights.tile(t)?;
    for (i, x) in tile.iter().enumerate() {
        if !x.is_defined() {
            continue;
        }
        let Some(g) = getter.get(i) else {
            continue;
        };
        let Some(w) = W::weight(&weight_tile, i) else {
            continue;
        };
        f(g, x, w);
    }
    Ok(())
}

fn table_counts<T, W>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    weights: &W,
    range: ValueRange,
    options: &AggrOptions,
) -> AggrResult<Vec<W::Tally>>
where
    T: Element,
    W: WeightSource,
{
    let v = range.len();
    let cell = |g: usize, x: &T| Some(g * v + range.ordinal(x.to_ordinal()?)?);
    let mut counts = vec![W::Tally::default(); v * groups.count()];
    let tiles = values.tile_count();

    if is_parallel(options, tiles) {
        run_ordered(
            options,
            tiles,
            &mut counts,
            |t| {
                let mut local: AHashMap<usize, W::Tally> = AHashMap::new();
                for_each_counted(operator, values, groups, weights, t, |g, x, w| {
                    if let Some(c) = cell(g, x) {
                        *local.entry(c).or_default() += w;
                    }
                })?;
                Ok(local)
            },
            |counts, local| {
                for (c, w) in local {
                    counts[c] += w;
                }
            },
        )?;
    } else {
        for t in 0..tiles {
            for_each_counted(operator, values, groups, weights, t, |g, x, w| {
                if let Some(c) = cell(g, x) {
                    counts[c] += w;
                }
            })?;
        }
    }
    Ok(counts)
}

type GroupMap<T, C> = BTreeMap<ByValue<T>, C>;

fn set_counts<T, W>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    weights: &W,
    range: Option<ValueRange>,
    options: &AggrOptions,
) -> AggrResult<Vec<GroupMap<T, W::Tally>>>
where
    T: Element,
    W: WeightSource,
{
    let counted = |x: &T| match range {
        Some(r) => x.to_ordinal().is_some_and(|o| r.contains(o)),
        None => true,
    };
    let mut maps: Vec<GroupMap<T, W::Tally>> = (0..groups.count()).map(|_| BTreeMap::new()).collect();
    let tiles = values.tile_count();

    if is_parallel(options, tiles) {
        run_ordered(
            options,
            tiles,
            &mut maps,
            |t| {
                let mut local: AHashMap<usize, GroupMap<T, W::Tally>> = AHashMap::new();
                for_each_counted(operator, values, groups, weights, t, |g, x, w| {
                    if counted(x) {
                        *local
                            .entry(g)
                            .or_default()
                            .entry(ByValue(x.clone()))
                            .or_default() += w;
                    }
                })?;
                Ok(local)
            },
            |maps, local| {
                for (g, map) in local {
                    for (k, w) in map {
                        *maps[g].entry(k).or_default() += w;
                    }
                }
            },
        )?;
    } else {
        for t in 0..tiles {
            for_each_counted(operator, values, groups, weights, t, |g, x, w| {
                if counted(x) {
                    *maps[g].entry(ByValue(x.clone())).or_default() += w;
                }
            })?;
        }
    }
    Ok(maps)
}
