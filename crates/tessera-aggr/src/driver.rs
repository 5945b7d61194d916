#![forbid(unsafe_code)]

//! Drives an [`Aggregate`] over the tiles of an attribute.
//!
//! Total aggregation gives each tile a private state and merges the states in
//! tile order. Partial aggregation shares one state per group; in parallel each
//! tile first collects its contributions per group and then commits them in
//! tile order, so order-dependent aggregates (first, last) see tiles as if
//! they were visited sequentially.

use crate::config::AggrOptions;
use crate::error::AggrResult;
use crate::index_getter::{Groups, Partition};
use crate::parallel::{is_parallel, run_ordered};
use crate::protocol::Aggregate;
use ahash::AHashMap;
use tessera_columnar::{Attribute, Element};

pub fn aggregate_total<T, A>(
    values: &Attribute<T>,
    agg: &A,
    options: &AggrOptions,
) -> AggrResult<A::Output>
where
    T: Element,
    A: Aggregate<T>,
{
    let has_undefined = values.may_have_undefined();
    let tiles = values.tile_count();
    let mut state = agg.init();

    if is_parallel(options, tiles) {
        run_ordered(
            options,
            tiles,
            &mut state,
            |t| {
                let tile = values.read_tile(t)?;
                let mut local = agg.init();
                agg.accumulate_tile(&mut local, &tile, has_undefined);
                Ok(local)
            },
            |state, local| agg.merge(state, local),
        )?;
    } else {
        for t in 0..tiles {
            let tile = values.read_tile(t)?;
            agg.accumulate_tile(&mut state, &tile, has_undefined);
        }
    }

    agg.finish(state)
}

pub fn aggregate_partial<T, A>(
    operator: &str,
    values: &Attribute<T>,
    partition: &Partition,
    agg: &A,
    options: &AggrOptions,
) -> AggrResult<Vec<A::Output>>
where
    T: Element,
    A: Aggregate<T>,
{
    let has_undefined = values.may_have_undefined();
    let tiles = values.tile_count();
    let mut states: Vec<A::State> = (0..partition.group_count()).map(|_| agg.init()).collect();

    if is_parallel(options, tiles) {
        run_ordered(
            options,
            tiles,
            &mut states,
            |t| {
                let tile = values.read_tile(t)?;
                let groups = partition.getter(operator, t)?;
                let mut local: AHashMap<usize, A::State> = AHashMap::new();
                for (i, v) in tile.iter().enumerate() {
                    if has_undefined && !v.is_defined() {
                        continue;
                    }
                    if let Some(g) = groups.get(i) {
                        agg.accumulate(local.entry(g).or_insert_with(|| agg.init()), v);
                    }
                }
                Ok(local)
            },
            |states, local| {
                for (g, state) in local {
                    agg.merge(&mut states[g], state);
                }
            },
        )?;
    } else {
        for t in 0..tiles {
            let tile = values.read_tile(t)?;
            let groups = partition.getter(operator, t)?;
            agg.accumulate_groups(&mut states, &tile, &*groups, has_undefined);
        }
    }

    states.into_iter().map(|s| agg.finish(s)).collect()
}

/// One output per group: a single value for [`Groups::Total`].
pub fn aggregate<T, A>(
    operator: &str,
    values: &Attribute<T>,
    groups: Groups<'_>,
    agg: &A,
    options: &AggrOptions,
) -> AggrResult<Vec<A::Output>>
where
    T: Element,
    A: Aggregate<T>,
{
    match groups {
        Groups::Total => Ok(vec![aggregate_total(values, agg, options)?]),
        Groups::Partial(p) => aggregate_partial(operator, values, p, agg, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::{Count, First, Last, Sum};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tessera_columnar::{AnyAttribute, Domain, TileCache, ValuesUnit};

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
    fn total_sum_over_many_tiles() {
        let cache = Arc::new(TileCache::default());
        let values: Vec<i32> = (1..=100).collect();
        let attr = Attribute::from_values(&cache, Arc::new(Domain::tiled(100, 7)), values).unwrap();
        for options in both() {
            assert_eq!(aggregate_total(&attr, &Sum::new(), &options).unwrap(), 5050);
            assert_eq!(aggregate_total(&attr, &Count::new(), &options).unwrap(), 100);
        }
    }

    #[test]
    fn partial_first_and_last_follow_domain_order() {
        let cache = Arc::new(TileCache::default());
        let domain = Arc::new(Domain::tiled(12, 3));
        let values: Vec<u16> = (0..12).collect();
        let keys: Vec<u8> = (0..12).map(|i| (i % 2) as u8).collect();
        let attr = Attribute::from_values(&cache, domain.clone(), values).unwrap();
        let groups = Arc::new(Domain::new(2));
        let keys: AnyAttribute = Attribute::from_values(&cache, domain.clone(), keys)
            .unwrap()
            .with_values_unit(ValuesUnit::Domain(groups))
            .into();
        let partition = Partition::new("first", 1, &keys, &domain).unwrap();

        for options in both() {
            let first = aggregate_partial("first", &attr, &partition, &First::new(), &options).unwrap();
            let last = aggregate_partial("last", &attr, &partition, &Last::new(), &options).unwrap();
            assert_eq!(first, vec![0, 1]);
            assert_eq!(last, vec![10, 11]);
        }
    }
}
