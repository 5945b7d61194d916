#![forbid(unsafe_code)]

//! Lookups through an index attribute and the `collect_by_*` family.

use crate::config::AggrOptions;
use crate::error::{AggrError, AggrResult};
use crate::index_getter::create_index_getter;
use crate::parallel::run_ordered;
use std::sync::Arc;
use tessera_columnar::{AnyAttribute, Attribute, Bool, Domain, Element, ValueRange, ValuesUnit};

/// Checks that `index` (argument `argument`) can address the elements of
/// `target`: a countable attribute whose values unit, when it is a domain, is
/// `target` itself.
pub fn check_index(
    operator: &str,
    argument: usize,
    index: &AnyAttribute,
    target: &Arc<Domain>,
) -> AggrResult<()> {
    if !index.kind().is_countable() {
        return Err(AggrError::type_mismatch(
            operator,
            argument,
            "an integer index",
            index.kind(),
        ));
    }
    if let ValuesUnit::Domain(d) = index.values_unit() {
        if !Domain::unify(d, target) {
            return Err(AggrError::domain_mismatch(operator, argument));
        }
    }
    Ok(())
}

/// `lookup(index: E->T, values: T->V): E->V`.
///
/// The inner loop is picked per index attribute: no checks when every index
/// value is known to be a valid position, a definedness check when only
/// undefined values can occur, and a full range check otherwise. Bit indices
/// over a target of at least `2^N` elements need no check. Positions that do
/// not address an element yield undefined.
pub fn lookup_best<T: Element>(
    operator: &str,
    index: &AnyAttribute,
    values: &Attribute<T>,
    options: &AggrOptions,
) -> AggrResult<Vec<T>> {
    let source = values.to_vec()?;
    let positions = ValueRange::zero_based(source.len());
    let tiles = index.domain().tile_count();

    let mut out: Vec<T> = Vec::with_capacity(index.len());
    run_ordered(
        options,
        tiles,
        &mut out,
        |t| {
            let getter = create_index_getter(operator, index, t, positions)?;
            let len = index.domain().tile(t)?.len;
            Ok((0..len)
                .map(|i| getter.get(i).map_or_else(T::undefined, |p| source[p].clone()))
                .collect::<Vec<T>>())
        },
        |out, tile| out.extend(tile),
    )?;
    Ok(out)
}

/// `collect_by_cond(subset, cond: D->Bool, values: D->V): S->V`: the values
/// whose condition holds, in domain order. There must be exactly one per
/// element of `subset`.
pub fn collect_by_cond<T: Element>(
    operator: &str,
    subset: &Domain,
    cond: &Attribute<Bool>,
    values: &Attribute<T>,
) -> AggrResult<Vec<T>> {
    if !Domain::unify(cond.domain(), values.domain()) {
        return Err(AggrError::domain_mismatch(operator, 2));
    }
    let mut out = Vec::with_capacity(subset.len());
    for t in 0..values.tile_count() {
        let c = cond.read_tile(t)?;
        let v = values.read_tile(t)?;
        out.extend(
            c.iter()
                .zip(v.iter())
                .filter(|(c, _)| c.is_true())
                .map(|(_, v)| v.clone()),
        );
    }
    if out.len() != subset.len() {
        return Err(AggrError::precondition(
            operator,
            format!(
                "{} conditions hold but the subset has {} elements",
                out.len(),
                subset.len()
            ),
        ));
    }
    Ok(out)
}
