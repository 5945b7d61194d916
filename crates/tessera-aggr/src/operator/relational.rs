#![forbid(unsafe_code)]

use super::{
    attribute_arg, domain_arg, Argument, CalcContext, Operator, OperatorSpec, ResultHolder,
    ResultMeta,
};
use crate::aggregates::Count;
use crate::driver::aggregate_partial;
use crate::error::{AggrError, AggrResult};
use crate::index::{check_position_capacity, make_index, make_subindex, ordinals};
use crate::index_getter::Partition;
use crate::lookup::{check_index, collect_by_cond, lookup_best};
use tessera_columnar::{
    dispatch_any, dispatch_countable, AnyAttribute, Domain, ScalarKind, ValueKind, ValuesUnit,
};

const UINT32: ValueKind = ValueKind::Scalar(ScalarKind::UInt32);

fn spec(name: &'static str, args: usize) -> OperatorSpec {
    OperatorSpec {
        name,
        min_args: args,
        max_args: args,
    }
}

/// `index(values)` and `direct_index(values)`: the stable sort-rank array of
/// the values. An index's values are positions in the values' domain; a direct
/// index is a plain `u32` attribute.
#[derive(Debug, Clone)]
pub struct IndexOperator {
    spec: OperatorSpec,
    direct: bool,
}

impl IndexOperator {
    pub fn new(name: &'static str, direct: bool) -> Self {
        Self {
            spec: spec(name, 1),
            direct,
        }
    }
}

impl Operator for IndexOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let values = attribute_arg(op, args, 0)?;
        check_position_capacity(op, values.len())?;
        let domain = values.domain().clone();
        let unit = if self.direct {
            ValuesUnit::Unbounded
        } else {
            ValuesUnit::Domain(domain.clone())
        };
        result.declare(
            op,
            ResultMeta {
                domain: domain.clone(),
                kind: UINT32,
                values: unit,
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        let index = dispatch_any!(values, a => make_index(&a.to_vec()?, a.tile_count(), &ctx.options));
        result.commit(op, &ctx.cache, index)
    }
}

/// `subindex(index, order, values)`: refines `index` within runs of equal
/// `order` by `values`. All three share one domain.
#[derive(Debug, Clone)]
pub struct SubIndexOperator {
    spec: OperatorSpec,
}

impl SubIndexOperator {
    pub fn new(name: &'static str) -> Self {
        Self { spec: spec(name, 3) }
    }
}

fn u32_arg<'a>(
    operator: &str,
    args: &'a [Argument],
    i: usize,
) -> AggrResult<&'a std::sync::Arc<tessera_columnar::Attribute<u32>>> {
    let attr = attribute_arg(operator, args, i)?;
    match attr {
        AnyAttribute::UInt32(a) => Ok(a),
        other => Err(AggrError::type_mismatch(operator, i, "a uint32 attribute", other.kind())),
    }
}

impl Operator for SubIndexOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let index = u32_arg(op, args, 0)?;
        let order = u32_arg(op, args, 1)?;
        let values = attribute_arg(op, args, 2)?;
        let domain = index.domain().clone();
        if !Domain::unify(order.domain(), &domain) {
            return Err(AggrError::domain_mismatch(op, 1));
        }
        if !Domain::unify(values.domain(), &domain) {
            return Err(AggrError::domain_mismatch(op, 2));
        }
        if let ValuesUnit::Domain(d) = index.values_unit() {
            if !Domain::unify(d, &domain) {
                return Err(AggrError::domain_mismatch(op, 0));
            }
        }
        result.declare(
            op,
            ResultMeta {
                domain: domain.clone(),
                kind: UINT32,
                values: ValuesUnit::Domain(domain),
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        let index = index.to_vec()?;
        let order = order.to_vec()?;
        let sub = dispatch_any!(values, a => make_subindex(op, &index, &order, &a.to_vec()?)?);
        result.commit(op, &ctx.cache, sub)
    }
}

/// `ordinal(values)`: each countable value's position in its range.
#[derive(Debug, Clone)]
pub struct OrdinalOperator {
    spec: OperatorSpec,
}

impl OrdinalOperator {
    pub fn new(name: &'static str) -> Self {
        Self { spec: spec(name, 1) }
    }
}

impl Operator for OrdinalOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let values = attribute_arg(op, args, 0)?;
        let range = dispatch_countable!(
            values,
            a => a.countable_range(),
            other => return Err(AggrError::type_mismatch(op, 0, "an integer attribute", other.kind()))
        )
        .ok_or_else(|| AggrError::UnboundedValues {
            operator: op.to_string(),
        })?;
        result.declare(
            op,
            ResultMeta {
                domain: values.domain().clone(),
                kind: UINT32,
                values: ValuesUnit::Unbounded,
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        let out = dispatch_countable!(
            values,
            a => ordinals(&a.to_vec()?, range),
            other => return Err(AggrError::type_mismatch(op, 0, "an integer attribute", other.kind()))
        );
        result.commit(op, &ctx.cache, out)
    }
}

/// `lookup(index, values)`, also registered as `collect_by_org_rel`.
#[derive(Debug, Clone)]
pub struct LookupOperator {
    spec: OperatorSpec,
}

impl LookupOperator {
    pub fn new(name: &'static str) -> Self {
        Self { spec: spec(name, 2) }
    }
}

impl Operator for LookupOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let index = attribute_arg(op, args, 0)?;
        let values = attribute_arg(op, args, 1)?;
        check_index(op, 0, index, values.domain())?;
        result.declare(
            op,
            ResultMeta {
                domain: index.domain().clone(),
                kind: values.kind(),
                values: values.values_unit().clone(),
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        dispatch_any!(values, a => {
            let out = lookup_best(op, index, a, &ctx.options)?;
            result.commit(op, &ctx.cache, out)
        })
    }
}

/// `collect_by_cond(subset, cond, values)`.
#[derive(Debug, Clone)]
pub struct CollectByCondOperator {
    spec: OperatorSpec,
}

impl CollectByCondOperator {
    pub fn new(name: &'static str) -> Self {
        Self { spec: spec(name, 3) }
    }
}

impl Operator for CollectByCondOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let subset = domain_arg(op, args, 0)?;
        let cond = match attribute_arg(op, args, 1)? {
            AnyAttribute::UInt1(c) => c,
            other => return Err(AggrError::type_mismatch(op, 1, "a bool attribute", other.kind())),
        };
        let values = attribute_arg(op, args, 2)?;
        if !Domain::unify(cond.domain(), values.domain()) {
            return Err(AggrError::domain_mismatch(op, 2));
        }
        result.declare(
            op,
            ResultMeta {
                domain: subset.clone(),
                kind: values.kind(),
                values: values.values_unit().clone(),
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        dispatch_any!(values, a => {
            let out = collect_by_cond(op, subset, cond, a)?;
            result.commit(op, &ctx.cache, out)
        })
    }
}

/// `pcount(partition)`: the number of elements in each group.
#[derive(Debug, Clone)]
pub struct PCountOperator {
    spec: OperatorSpec,
}

impl PCountOperator {
    pub fn new(name: &'static str) -> Self {
        Self { spec: spec(name, 1) }
    }
}

impl Operator for PCountOperator {
    fn spec(&self) -> &OperatorSpec {
        &self.spec
    }

    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let attr = attribute_arg(op, args, 0)?;
        let partition = Partition::new(op, 0, attr, attr.domain())?;
        result.declare(
            op,
            ResultMeta {
                domain: partition.groups_domain().clone(),
                kind: UINT32,
                values: ValuesUnit::Unbounded,
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        let counts = dispatch_countable!(
            attr,
            a => aggregate_partial(op, a, &partition, &Count::named(op), &ctx.options)?,
            other => return Err(AggrError::type_mismatch(op, 0, "an integer partition", other.kind()))
        );
        result.commit(op, &ctx.cache, counts)
    }
}
