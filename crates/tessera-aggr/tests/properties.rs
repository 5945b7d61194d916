#![cfg(not(target_arch = "wasm32"))]

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_aggr::aggregates::{All, Any, Count, First, Last, Max, Mean, Min, Sum, Variance};
use tessera_aggr::frequency::{frequency, Entropy, Modus, ModusCount, UniqueCount, Unweighted};
use tessera_aggr::index::{make_index, make_subindex};
use tessera_aggr::{aggregate, AggrOptions, Groups, Partition, StrategyOverride};
use tessera_columnar::{AnyAttribute, Attribute, Bool, Domain, TileCache, ValueRange, ValuesUnit};

const GROUPS: usize = 4;
const UNDEFINED: i16 = i16::MIN;

fn options() -> [AggrOptions; 2] {
    [
        AggrOptions::sequential(),
        AggrOptions {
            min_parallel_tiles: 1,
            ..AggrOptions::default()
        },
    ]
}

/// Values in -5..=5 (some undefined) with a group key each.
fn rows() -> impl Strategy<Value = Vec<(i16, u8)>> {
    let value = prop_oneof![1 => Just(UNDEFINED), 6 => -5i16..=5];
    proptest::collection::vec((value, 0u8..GROUPS as u8), 0..80)
}

struct Table {
    values: Attribute<i16>,
    partition: Partition,
}

fn build(rows: &[(i16, u8)], tile_size: usize) -> Table {
    let cache = Arc::new(TileCache::default());
    let domain = Arc::new(Domain::tiled(rows.len(), tile_size));
    let values = Attribute::from_values(&cache, domain.clone(), rows.iter().map(|r| r.0).collect())
        .unwrap()
        .with_values_unit(ValuesUnit::Range(ValueRange::new(-5, 6)));
    let keys = AnyAttribute::new(
        Attribute::from_values(&cache, domain.clone(), rows.iter().map(|r| r.1).collect())
            .unwrap()
            .with_values_unit(ValuesUnit::Domain(Arc::new(Domain::new(GROUPS)))),
    );
    let partition = Partition::new("test", 1, &keys, &domain).unwrap();
    Table { values, partition }
}

/// Defined values per group, in domain order.
fn by_group(rows: &[(i16, u8)]) -> Vec<Vec<i16>> {
    let mut groups = vec![Vec::new(); GROUPS];
    for &(v, g) in rows {
        if v != UNDEFINED {
            groups[g as usize].push(v);
        }
    }
    groups
}

fn or_undefined(v: Option<i16>) -> i16 {
    v.unwrap_or(UNDEFINED)
}

fn close(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn partial_aggregates_do_not_depend_on_tiling(rows in rows(), tile_size in 1usize..=17) {
        let table = build(&rows, tile_size);
        let groups = by_group(&rows);
        let p = Groups::Partial(&table.partition);

        let counts: Vec<u32> = groups.iter().map(|g| g.len() as u32).collect();
        let sums: Vec<i16> = groups.iter().map(|g| g.iter().sum()).collect();
        let firsts: Vec<i16> = groups.iter().map(|g| or_undefined(g.first().copied())).collect();
        let lasts: Vec<i16> = groups.iter().map(|g| or_undefined(g.last().copied())).collect();
        let mins: Vec<i16> = groups.iter().map(|g| or_undefined(g.iter().min().copied())).collect();
        let maxs: Vec<i16> = groups.iter().map(|g| or_undefined(g.iter().max().copied())).collect();

        for opts in options() {
            prop_assert_eq!(&aggregate("count", &table.values, p, &Count::new(), &opts).unwrap(), &counts);
            prop_assert_eq!(&aggregate("sum", &table.values, p, &Sum::new(), &opts).unwrap(), &sums);
            prop_assert_eq!(&aggregate("first", &table.values, p, &First::new(), &opts).unwrap(), &firsts);
            prop_assert_eq!(&aggregate("last", &table.values, p, &Last::new(), &opts).unwrap(), &lasts);
            prop_assert_eq!(&aggregate("min", &table.values, p, &Min::new(), &opts).unwrap(), &mins);
            prop_assert_eq!(&aggregate("max", &table.values, p, &Max::new(), &opts).unwrap(), &maxs);
        }
    }

    #[test]
    fn table_and_set_counting_agree(rows in rows(), tile_size in 1usize..=17) {
        let table = build(&rows, tile_size);
        let p = Groups::Partial(&table.partition);
        let run = |strategy: StrategyOverride, parallel: bool| {
            let opts = AggrOptions {
                parallel,
                min_parallel_tiles: 1,
                strategy,
            };
            (
                frequency("modus", &table.values, p, &Unweighted, &Modus, &opts).unwrap(),
                frequency("modus_count", &table.values, p, &Unweighted, &ModusCount, &opts).unwrap(),
                frequency("entropy", &table.values, p, &Unweighted, &Entropy, &opts).unwrap(),
            )
        };
        let reference = run(StrategyOverride::Table, false);
        prop_assert_eq!(&run(StrategyOverride::Set, false), &reference);
        prop_assert_eq!(&run(StrategyOverride::Table, true), &reference);
        prop_assert_eq!(&run(StrategyOverride::Set, true), &reference);
        prop_assert_eq!(&run(StrategyOverride::Auto, true), &reference);

        // The modus is the smallest of the most frequent values.
        for (g, values) in by_group(&rows).iter().enumerate() {
            let mut tally: BTreeMap<i16, u32> = BTreeMap::new();
            for &v in values {
                *tally.entry(v).or_default() += 1;
            }
            let top = tally.values().copied().max().unwrap_or(0);
            let modus = tally.iter().find(|&(_, &c)| c == top).map(|(&v, _)| v);
            prop_assert_eq!(reference.0[g], or_undefined(modus));
            prop_assert_eq!(reference.1[g], top);
        }
    }

    #[test]
    fn unique_count_is_the_number_of_distinct_values(rows in rows(), tile_size in 1usize..=17) {
        let table = build(&rows, tile_size);
        let expected: Vec<u16> = by_group(&rows)
            .iter()
            .map(|g| g.iter().collect::<BTreeSet<_>>().len() as u16)
            .collect();
        for opts in options() {
            let got = frequency(
                "unique_count_uint16",
                &table.values,
                Groups::Partial(&table.partition),
                &Unweighted,
                &UniqueCount::<u16>::new(),
                &opts,
            )
            .unwrap();
            prop_assert_eq!(got, expected.clone());
        }
    }

    #[test]
    fn index_is_a_stable_sorting_permutation(rows in rows(), tile_size in 1usize..=17) {
        let values: Vec<i16> = rows.iter().map(|r| r.0).collect();
        let tiles = rows.len().div_ceil(tile_size);
        for opts in options() {
            let index = make_index(&values, tiles, &opts);
            let mut seen = index.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..values.len() as u32).collect::<Vec<_>>());

            // Undefined values sort last; ties keep domain order.
            let key = |p: u32| {
                let v = values[p as usize];
                (v == UNDEFINED, v, p)
            };
            for pair in index.windows(2) {
                prop_assert!(key(pair[0]) < key(pair[1]));
            }
        }
    }

    #[test]
    fn total_aggregates_do_not_depend_on_tiling(
        rows in rows(),
        tile_size in 1usize..=17,
        flags in proptest::collection::vec(any::<bool>(), 0..80),
    ) {
        let cache = Arc::new(TileCache::default());
        let values: Vec<i16> = rows.iter().map(|r| r.0).collect();
        let whole = Attribute::from_values(&cache, Arc::new(Domain::new(values.len())), values.clone()).unwrap();
        let tiled = Attribute::from_values(&cache, Arc::new(Domain::tiled(values.len(), tile_size)), values).unwrap();
        let flags: Vec<Bool> = flags.into_iter().map(Bool::from).collect();
        let whole_flags = Attribute::from_values(&cache, Arc::new(Domain::new(flags.len())), flags.clone()).unwrap();
        let tiled_flags = Attribute::from_values(&cache, Arc::new(Domain::tiled(flags.len(), tile_size)), flags).unwrap();

        let seq = AggrOptions::sequential();
        for opts in options() {
            let t = Groups::Total;
            prop_assert_eq!(
                aggregate("count", &tiled, t, &Count::new(), &opts).unwrap(),
                aggregate("count", &whole, t, &Count::new(), &seq).unwrap()
            );
            prop_assert_eq!(
                aggregate("sum", &tiled, t, &Sum::new(), &opts).unwrap(),
                aggregate("sum", &whole, t, &Sum::new(), &seq).unwrap()
            );
            prop_assert_eq!(
                aggregate("min", &tiled, t, &Min::new(), &opts).unwrap(),
                aggregate("min", &whole, t, &Min::new(), &seq).unwrap()
            );
            prop_assert_eq!(
                aggregate("max", &tiled, t, &Max::new(), &opts).unwrap(),
                aggregate("max", &whole, t, &Max::new(), &seq).unwrap()
            );
            let mean = aggregate("mean", &tiled, t, &Mean::new(), &opts).unwrap();
            let mean_ref = aggregate("mean", &whole, t, &Mean::new(), &seq).unwrap();
            prop_assert!(close(mean[0], mean_ref[0]), "{} vs {}", mean[0], mean_ref[0]);
            let var = aggregate("var", &tiled, t, &Variance, &opts).unwrap();
            let var_ref = aggregate("var", &whole, t, &Variance, &seq).unwrap();
            prop_assert!(close(var[0], var_ref[0]), "{} vs {}", var[0], var_ref[0]);
            prop_assert_eq!(
                aggregate("any", &tiled_flags, t, &Any, &opts).unwrap(),
                aggregate("any", &whole_flags, t, &Any, &seq).unwrap()
            );
            prop_assert_eq!(
                aggregate("all", &tiled_flags, t, &All, &opts).unwrap(),
                aggregate("all", &whole_flags, t, &All, &seq).unwrap()
            );
        }
    }

    #[test]
    fn subindex_equals_one_sort_by_both_keys(
        pairs in proptest::collection::vec((0u8..3, prop_oneof![1 => Just(UNDEFINED), 6 => -5i16..=5]), 0..80),
    ) {
        let primary: Vec<u8> = pairs.iter().map(|p| p.0).collect();
        let secondary: Vec<i16> = pairs.iter().map(|p| p.1).collect();
        let index = make_index(&primary, 1, &AggrOptions::sequential());
        let order: Vec<u32> = index.iter().map(|&p| primary[p as usize] as u32).collect();
        let sub = make_subindex("subindex", &index, &order, &secondary).unwrap();

        let mut expected: Vec<u32> = (0..pairs.len() as u32).collect();
        expected.sort_by_key(|&p| {
            let (a, b) = pairs[p as usize];
            (a, b == UNDEFINED, b)
        });
        prop_assert_eq!(sub, expected);
    }
}
