#![forbid(unsafe_code)]

//! Sort-rank indices.
//!
//! An index is a permutation of element positions that visits the source
//! values in non-decreasing order. Sorting is stable and undefined values sort
//! after every defined value, keeping their domain order among themselves.

use crate::config::AggrOptions;
use crate::error::{AggrError, AggrResult};
use crate::parallel::stable_sort_by;
use std::cmp::Ordering;
use tessera_columnar::{Element, ValueKind, ValueRange};

/// Positions are written as `u32`, whose maximum is the undefined sentinel.
pub fn check_position_capacity(operator: &str, n: usize) -> AggrResult<()> {
    if n as u64 >= u32::MAX as u64 {
        return Err(AggrError::capacity(
            operator,
            format!("domain of {n} elements"),
            u32::MAX as u64 - 1,
        ));
    }
    Ok(())
}

/// Ascending order over defined values, undefined values last.
pub fn undefined_last<T: Element>(a: &T, b: &T) -> Ordering {
    match (a.is_defined(), b.is_defined()) {
        (true, true) => a.cmp_value(b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Stable sort-rank array of `values`. `tiles` is the tile count of the
/// values' domain and decides whether the sort runs on the pool.
pub fn make_index<T: Element>(values: &[T], tiles: usize, options: &AggrOptions) -> Vec<u32> {
    if let ValueKind::Bits(n) = T::KIND {
        return counting_index(values, 1usize << n);
    }
    let mut index: Vec<u32> = (0..values.len() as u32).collect();
    stable_sort_by(options, tiles, &mut index, |&a, &b| {
        undefined_last(&values[a as usize], &values[b as usize])
    });
    index
}

/// Counting sort for values with few patterns, all defined.
fn counting_index<T: Element>(values: &[T], patterns: usize) -> Vec<u32> {
    let mut starts = vec![0usize; patterns + 1];
    for v in values {
        starts[v.raw_ordinal() as usize + 1] += 1;
    }
    for k in 1..starts.len() {
        starts[k] += starts[k - 1];
    }
    let mut index = vec![0u32; values.len()];
    for (i, v) in values.iter().enumerate() {
        let slot = &mut starts[v.raw_ordinal() as usize];
        index[*slot] = i as u32;
        *slot += 1;
    }
    index
}

/// Refines `index` within each run of equal adjacent `prev_order` entries by a
/// stable sort on `values`. `prev_order[k]` is the key of the element at sorted
/// position `k`; singletons are left in place.
pub fn make_subindex<T: Element>(
    operator: &str,
    index: &[u32],
    prev_order: &[u32],
    values: &[T],
) -> AggrResult<Vec<u32>> {
    let n = values.len();
    if index.len() != n || prev_order.len() != n {
        return Err(AggrError::precondition(
            operator,
            "index, order and values must have equal length",
        ));
    }
    if let Some(bad) = index.iter().find(|&&p| p as usize >= n) {
        return Err(AggrError::precondition(
            operator,
            format!("index entry {bad} is not a position below {n}"),
        ));
    }

    let mut result = index.to_vec();
    let mut start = 0;
    while start < n {
        let key = prev_order[start];
        let end = prev_order[start..]
            .iter()
            .position(|&k| k != key)
            .map_or(n, |len| start + len);
        if end - start > 1 {
            result[start..end].sort_by(|&a, &b| undefined_last(&values[a as usize], &values[b as usize]));
        }
        start = end;
    }
    Ok(result)
}

/// Zero-based position of each value in `range`; undefined and out-of-range
/// values map to `u32::MAX`.
pub fn ordinals<T: Element>(values: &[T], range: ValueRange) -> Vec<u32> {
    values
        .iter()
        .map(|v| {
            v.to_ordinal()
                .and_then(|o| range.ordinal(o))
                .and_then(|k| u32::try_from(k).ok())
                .filter(|&k| k != u32::MAX)
                .unwrap_or(u32::MAX)
        })
        .collect()
}
