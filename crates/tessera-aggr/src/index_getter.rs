#![forbid(unsafe_code)]

//! Per-tile mapping from element position to group id.
//!
//! A getter is built once per (partition, tile) and only borrows the
//! partition's tile. Which variant is built depends on what the partition is
//! known to contain: values that may fall outside the group range need a range
//! check, undefined values need a definedness check, and neither needs no
//! check at all.

use crate::error::{AggrError, AggrResult};
use std::sync::Arc;
use tessera_columnar::{
    dispatch_countable, AnyAttribute, Attribute, Bits, Domain, Element, TileRead, ValueRange,
    ValuesUnit,
};

pub trait IndexGetter: Send + Sync {
    /// Group of element `i` of the tile; `None` excludes the element.
    fn get(&self, i: usize) -> Option<usize>;
}

/// Every element belongs to group 0.
pub struct SingleGroup;

impl IndexGetter for SingleGroup {
    fn get(&self, _i: usize) -> Option<usize> {
        Some(0)
    }
}

/// Values are defined and already zero-based group ids.
struct ZeroGetter<T> {
    tile: TileRead<T>,
}

impl<T: Element> IndexGetter for ZeroGetter<T> {
    fn get(&self, i: usize) -> Option<usize> {
        Some(self.tile[i].raw_ordinal() as usize)
    }
}

/// Values are defined and in range, offset by `first`.
struct OffsetGetter<T> {
    tile: TileRead<T>,
    first: i64,
}

impl<T: Element> IndexGetter for OffsetGetter<T> {
    fn get(&self, i: usize) -> Option<usize> {
        Some((self.tile[i].raw_ordinal() - self.first) as usize)
    }
}

/// Defined values are in range; undefined ones are skipped.
struct DefinedGetter<T> {
    tile: TileRead<T>,
    first: i64,
}

impl<T: Element> IndexGetter for DefinedGetter<T> {
    fn get(&self, i: usize) -> Option<usize> {
        let v = &self.tile[i];
        v.is_defined()
            .then(|| (v.raw_ordinal() - self.first) as usize)
    }
}

/// Nothing is known; both definedness and range are checked.
struct CheckedGetter<T> {
    tile: TileRead<T>,
    range: ValueRange,
}

impl<T: Element> IndexGetter for CheckedGetter<T> {
    fn get(&self, i: usize) -> Option<usize> {
        self.tile[i].to_ordinal().and_then(|o| self.range.ordinal(o))
    }
}

/// Bit values are always defined and below `2^N`; with at least that many
/// groups no check is needed.
struct BitsGetter<const N: u8> {
    tile: TileRead<Bits<N>>,
}

impl<const N: u8> IndexGetter for BitsGetter<N> {
    fn get(&self, i: usize) -> Option<usize> {
        Some(self.tile[i].get() as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GetterKind {
    Zero,
    Offset,
    Defined,
    Checked,
}

fn choose_kind<T: Element>(partition: &Attribute<T>, groups: &ValueRange) -> GetterKind {
    let in_range = partition.stats().fits_in(groups);
    match (in_range, partition.may_have_undefined()) {
        (true, false) if groups.first == 0 => GetterKind::Zero,
        (true, false) => GetterKind::Offset,
        (true, true) => GetterKind::Defined,
        (false, _) => GetterKind::Checked,
    }
}

fn typed_getter<T: Element>(
    partition: &Attribute<T>,
    tile: usize,
    groups: ValueRange,
) -> AggrResult<Box<dyn IndexGetter>> {
    let data = partition.read_tile(tile)?;
    Ok(match choose_kind(partition, &groups) {
        GetterKind::Zero => Box::new(ZeroGetter { tile: data }),
        GetterKind::Offset => Box::new(OffsetGetter {
            tile: data,
            first: groups.first,
        }),
        GetterKind::Defined => Box::new(DefinedGetter {
            tile: data,
            first: groups.first,
        }),
        GetterKind::Checked => Box::new(CheckedGetter {
            tile: data,
            range: groups,
        }),
    })
}

fn bits_getter<const N: u8>(
    partition: &Attribute<Bits<N>>,
    tile: usize,
    groups: ValueRange,
) -> AggrResult<Box<dyn IndexGetter>>
where
    Bits<N>: Element,
{
    if groups.first == 0 && groups.len() >= (1usize << N) {
        return Ok(Box::new(BitsGetter {
            tile: partition.read_tile(tile)?,
        }));
    }
    typed_getter(partition, tile, groups)
}

/// Builds the getter for `tile` of `partition`, dispatching over its value type.
pub fn create_index_getter(
    operator: &str,
    partition: &AnyAttribute,
    tile: usize,
    groups: ValueRange,
) -> AggrResult<Box<dyn IndexGetter>> {
    match partition {
        AnyAttribute::UInt1(p) => bits_getter(p, tile, groups),
        AnyAttribute::UInt2(p) => bits_getter(p, tile, groups),
        AnyAttribute::UInt4(p) => bits_getter(p, tile, groups),
        other => dispatch_countable!(
            other,
            p => typed_getter(p, tile, groups),
            other => Err(AggrError::type_mismatch(operator, 1, "an integer partition", other.kind()))
        ),
    }
}

/// Group ids are written as `u32` by the index operators.
pub const MAX_GROUPS: u64 = u32::MAX as u64;

/// A checked partition argument: the group-id source of a partial aggregation.
#[derive(Debug, Clone)]
pub struct Partition {
    attribute: AnyAttribute,
    groups: ValueRange,
    domain: Arc<Domain>,
}

impl Partition {
    /// Validates `attribute` as partition (argument `argument`) of values on
    /// `values_domain`.
    ///
    /// The groups are the partition's values unit: a domain, a declared range,
    /// or for bit values all `2^N` patterns.
    pub fn new(
        operator: &str,
        argument: usize,
        attribute: &AnyAttribute,
        values_domain: &Arc<Domain>,
    ) -> AggrResult<Self> {
        if !attribute.kind().is_countable() {
            return Err(AggrError::type_mismatch(
                operator,
                argument,
                "an integer partition",
                attribute.kind(),
            ));
        }
        if !Domain::unify(attribute.domain(), values_domain) {
            return Err(AggrError::domain_mismatch(operator, argument));
        }
        let (groups, domain) = match attribute.values_unit() {
            ValuesUnit::Domain(d) => (ValueRange::zero_based(d.len()), d.clone()),
            ValuesUnit::Range(r) => (*r, Arc::new(Domain::new(r.len()))),
            ValuesUnit::Unbounded => {
                let natural = dispatch_countable!(
                    attribute,
                    p => p.countable_range(),
                    _other => None
                );
                match (attribute.kind(), natural) {
                    (tessera_columnar::ValueKind::Bits(_), Some(r)) => {
                        (r, Arc::new(Domain::new(r.len())))
                    }
                    _ => {
                        return Err(AggrError::PartitionNotCountable {
                            operator: operator.to_string(),
                        })
                    }
                }
            }
        };
        if groups.len() as u64 > MAX_GROUPS {
            return Err(AggrError::capacity(
                operator,
                format!("group count {}", groups.len()),
                MAX_GROUPS,
            ));
        }
        Ok(Self {
            attribute: attribute.clone(),
            groups,
            domain,
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The domain partial results are defined on.
    pub fn groups_domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn attribute(&self) -> &AnyAttribute {
        &self.attribute
    }

    pub fn getter(&self, operator: &str, tile: usize) -> AggrResult<Box<dyn IndexGetter>> {
        create_index_getter(operator, &self.attribute, tile, self.groups)
    }
}

/// Group source for either protocol: one group, or a partition.
#[derive(Debug, Clone, Copy)]
pub enum Groups<'a> {
    Total,
    Partial(&'a Partition),
}

impl Groups<'_> {
    pub fn count(&self) -> usize {
        match self {
            Groups::Total => 1,
            Groups::Partial(p) => p.group_count(),
        }
    }

    pub fn getter(&self, operator: &str, tile: usize) -> AggrResult<Box<dyn IndexGetter>> {
        match self {
            Groups::Total => Ok(Box::new(SingleGroup)),
            Groups::Partial(p) => p.getter(operator, tile),
        }
    }

    /// Domain results are written on.
    pub fn result_domain(&self) -> Arc<Domain> {
        match self {
            Groups::Total => Arc::new(Domain::unit()),
            Groups::Partial(p) => p.groups_domain().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_columnar::TileCache;

    fn attr<T: Element>(values: Vec<T>, unit: ValuesUnit) -> Attribute<T> {
        let cache = Arc::new(TileCache::default());
        let n = values.len();
        Attribute::from_values(&cache, Arc::new(Domain::tiled(n, 4)), values)
            .unwrap()
            .with_values_unit(unit)
    }

    fn ids(getter: &dyn IndexGetter, n: usize) -> Vec<Option<usize>> {
        (0..n).map(|i| getter.get(i)).collect()
    }

    #[test]
    fn clean_partition_uses_the_unchecked_getter() {
        let p = attr(vec![0u32, 1, 2, 1], ValuesUnit::Range(ValueRange::new(0, 3)));
        assert_eq!(choose_kind(&p, &ValueRange::new(0, 3)), GetterKind::Zero);
        let g = typed_getter(&p, 0, ValueRange::new(0, 3)).unwrap();
        assert_eq!(ids(&*g, 4), vec![Some(0), Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn offset_range_shifts_ids() {
        let p = attr(vec![10i16, 12, 11], ValuesUnit::Range(ValueRange::new(10, 13)));
        assert_eq!(choose_kind(&p, &ValueRange::new(10, 13)), GetterKind::Offset);
        let g = typed_getter(&p, 0, ValueRange::new(10, 13)).unwrap();
        assert_eq!(ids(&*g, 3), vec![Some(0), Some(2), Some(1)]);
    }

    #[test]
    fn undefined_values_are_excluded() {
        let p = attr(vec![1u8, u8::MAX, 0], ValuesUnit::Range(ValueRange::new(0, 2)));
        assert_eq!(choose_kind(&p, &ValueRange::new(0, 2)), GetterKind::Defined);
        let g = typed_getter(&p, 0, ValueRange::new(0, 2)).unwrap();
        assert_eq!(ids(&*g, 3), vec![Some(1), None, Some(0)]);
    }

    #[test]
    fn out_of_range_values_are_excluded() {
        let p = attr(vec![0i32, 7, -1, 2], ValuesUnit::Range(ValueRange::new(0, 3)));
        assert_eq!(choose_kind(&p, &ValueRange::new(0, 3)), GetterKind::Checked);
        let g = typed_getter(&p, 0, ValueRange::new(0, 3)).unwrap();
        assert_eq!(ids(&*g, 4), vec![Some(0), None, None, Some(2)]);
    }

    #[test]
    fn unsigned_values_beyond_any_ordinal_are_excluded() {
        let p = attr(vec![0u64, 1, 1 << 63], ValuesUnit::Range(ValueRange::new(0, 2)));
        assert_eq!(choose_kind(&p, &ValueRange::new(0, 2)), GetterKind::Checked);
        let g = typed_getter(&p, 0, ValueRange::new(0, 2)).unwrap();
        assert_eq!(ids(&*g, 3), vec![Some(0), Some(1), None]);
    }

    #[test]
    fn partial_sum_skips_elements_without_a_group() {
        let cache = Arc::new(TileCache::default());
        let domain = Arc::new(Domain::new(3));
        let keys: AnyAttribute = Attribute::from_values(&cache, domain.clone(), vec![0u64, 1, 1 << 63])
            .unwrap()
            .with_values_unit(ValuesUnit::Domain(Arc::new(Domain::new(2))))
            .into();
        let values = Attribute::from_values(&cache, domain.clone(), vec![5i32, 6, 7]).unwrap();
        let partition = Partition::new("sum", 1, &keys, &domain).unwrap();
        let sums = crate::aggregate_partial(
            "sum",
            &values,
            &partition,
            &crate::aggregates::Sum::new(),
            &crate::AggrOptions::sequential(),
        )
        .unwrap();
        assert_eq!(sums, vec![5, 6]);
    }

    #[test]
    fn partition_must_share_the_values_domain() {
        let p: AnyAttribute = attr(vec![0u32, 1], ValuesUnit::Range(ValueRange::new(0, 2))).into();
        let other = Arc::new(Domain::new(3));
        let err = Partition::new("sum", 1, &p, &other).unwrap_err();
        assert_eq!(err, AggrError::domain_mismatch("sum", 1));
    }

    #[test]
    fn unbounded_integer_partition_is_rejected() {
        let p: AnyAttribute = attr(vec![0u32, 1], ValuesUnit::Unbounded).into();
        let domain = p.domain().clone();
        let err = Partition::new("count", 1, &p, &domain).unwrap_err();
        assert!(matches!(err, AggrError::PartitionNotCountable { .. }));
    }

    #[test]
    fn bit_partition_spans_every_pattern() {
        let p: AnyAttribute =
            attr(vec![Bits::<2>::truncating(3), Bits::truncating(1)], ValuesUnit::Unbounded).into();
        let domain = p.domain().clone();
        let partition = Partition::new("count", 1, &p, &domain).unwrap();
        assert_eq!(partition.group_count(), 4);
        let g = partition.getter("count", 0).unwrap();
        assert_eq!(ids(&*g, 2), vec![Some(3), Some(1)]);
    }

    #[test]
    fn oversized_group_range_is_a_capacity_error() {
        let p: AnyAttribute =
            attr(vec![0i64], ValuesUnit::Range(ValueRange::new(0, 1 << 40))).into();
        let domain = p.domain().clone();
        let err = Partition::new("sum", 1, &p, &domain).unwrap_err();
        assert!(matches!(err, AggrError::Capacity { .. }));
        assert!(!err.is_precondition());
    }

    #[test]
    fn float_partition_is_a_type_error() {
        let p: AnyAttribute = attr(vec![0.0f64], ValuesUnit::Unbounded).into();
        let domain = p.domain().clone();
        let err = Partition::new("count", 1, &p, &domain).unwrap_err();
        assert!(matches!(err, AggrError::TypeMismatch { argument: 1, .. }));
    }
}
