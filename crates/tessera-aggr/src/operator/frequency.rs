#![forbid(unsafe_code)]

use super::{
    attribute_arg, groups_of, partition_arg, Argument, CalcContext, Operator, OperatorSpec,
    ResultHolder, ResultMeta,
};
use crate::config::StrategyOverride;
use crate::error::{AggrError, AggrResult};
use crate::frequency::{
    frequency, AverageEntropy, CountOutput, Entropy, Modus, ModusCount, Reduce, UniqueCount,
    Unweighted, WeightSource, Weighted,
};
use crate::index_getter::Groups;
use tessera_columnar::{
    dispatch_any, AnyAttribute, Attribute, Element, ScalarKind, ValueKind, ValuesUnit,
};

/// A forced table needs a countable range; checked before the result is declared.
fn check_forced_table(op: &str, ctx: &CalcContext, values: &AnyAttribute) -> AggrResult<()> {
    if ctx.options.strategy != StrategyOverride::Table {
        return Ok(());
    }
    if dispatch_any!(values, a => a.countable_range()).is_none() {
        return Err(AggrError::UnboundedValues {
            operator: op.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqFunc {
    Modus,
    ModusCount,
    /// Distinct values, written at the given width in bits (8, 16, 32 or 64).
    UniqueCount(u8),
    Entropy,
    AverageEntropy,
}

/// `f(values)` or `f(values, partition)` for the frequency aggregates.
#[derive(Debug, Clone)]
pub struct FrequencyOperator {
    spec: OperatorSpec,
    func: FreqFunc,
}

impl FrequencyOperator {
    pub fn new(name: &'static str, func: FreqFunc) -> Self {
        Self {
            spec: OperatorSpec {
                name,
                min_args: 1,
                max_args: 2,
            },
            func,
        }
    }

    fn output(&self, values: &AnyAttribute) -> (ValueKind, ValuesUnit) {
        let scalar = |s| (ValueKind::Scalar(s), ValuesUnit::Unbounded);
        match self.func {
            FreqFunc::Modus => (values.kind(), values.values_unit().clone()),
            FreqFunc::ModusCount => scalar(ScalarKind::UInt32),
            FreqFunc::UniqueCount(8) => scalar(ScalarKind::UInt8),
            FreqFunc::UniqueCount(16) => scalar(ScalarKind::UInt16),
            FreqFunc::UniqueCount(64) => scalar(ScalarKind::UInt64),
            FreqFunc::UniqueCount(_) => scalar(ScalarKind::UInt32),
            FreqFunc::Entropy | FreqFunc::AverageEntropy => scalar(ScalarKind::Float64),
        }
    }

    fn calculate<T: Element>(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        values: &Attribute<T>,
        groups: Groups<'_>,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        match self.func {
            FreqFunc::Modus => count_and_reduce(op, ctx, result, values, groups, &Unweighted, &Modus),
            FreqFunc::ModusCount => {
                count_and_reduce(op, ctx, result, values, groups, &Unweighted, &ModusCount)
            }
            FreqFunc::UniqueCount(8) => unique::<T, u8>(op, ctx, result, values, groups),
            FreqFunc::UniqueCount(16) => unique::<T, u16>(op, ctx, result, values, groups),
            FreqFunc::UniqueCount(64) => unique::<T, u64>(op, ctx, result, values, groups),
            FreqFunc::UniqueCount(_) => unique::<T, u32>(op, ctx, result, values, groups),
            FreqFunc::Entropy => count_and_reduce(op, ctx, result, values, groups, &Unweighted, &Entropy),
            FreqFunc::AverageEntropy => {
                count_and_reduce(op, ctx, result, values, groups, &Unweighted, &AverageEntropy)
            }
        }
    }
}

fn count_and_reduce<T, W, R>(
    operator: &str,
    ctx: &CalcContext,
    result: &mut ResultHolder,
    values: &Attribute<T>,
    groups: Groups<'_>,
    weights: &W,
    reducer: &R,
) -> AggrResult<()>
where
    T: Element,
    W: WeightSource,
    R: Reduce<T, W::Tally>,
{
    let out = frequency(operator, values, groups, weights, reducer, &ctx.options)?;
    result.commit(operator, &ctx.cache, out)
}

fn unique<T: Element, O: CountOutput>(
    operator: &str,
    ctx: &CalcContext,
    result: &mut ResultHolder,
    values: &Attribute<T>,
    groups: Groups<'_>,
) -> AggrResult<()> {
    count_and_reduce(
        operator,
        ctx,
        result,
        values,
        groups,
        &Unweighted,
        &UniqueCount::<O>::new(),
    )
}

impl Operator for FrequencyOperator {
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
        let partition = partition_arg(op, args, 1, values)?;
        let groups = groups_of(&partition);
        check_forced_table(op, ctx, values)?;
        let (kind, unit) = self.output(values);
        result.declare(
            op,
            ResultMeta {
                domain: groups.result_domain(),
                kind,
                values: unit,
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        dispatch_any!(values, a => self.calculate(ctx, result, a, groups))
    }
}

/// `modus_weighted(values, weights)` or `modus_weighted(values, weights, partition)`:
/// the value with the largest total weight.
#[derive(Debug, Clone)]
pub struct WeightedModusOperator {
    spec: OperatorSpec,
}

impl WeightedModusOperator {
    pub fn new(name: &'static str) -> Self {
        Self {
            spec: OperatorSpec {
                name,
                min_args: 2,
                max_args: 3,
            },
        }
    }
}

impl Operator for WeightedModusOperator {
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
        let weights = Weighted::new(op, 1, attribute_arg(op, args, 1)?, values.domain())?;
        let partition = partition_arg(op, args, 2, values)?;
        let groups = groups_of(&partition);
        check_forced_table(op, ctx, values)?;
        result.declare(
            op,
            ResultMeta {
                domain: groups.result_domain(),
                kind: values.kind(),
                values: values.values_unit().clone(),
            },
        )?;
        if !must_calc {
            return Ok(());
        }
        dispatch_any!(values, a => count_and_reduce(op, ctx, result, a, groups, &weights, &Modus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_count_width_follows_the_operator() {
        let cache = std::sync::Arc::new(tessera_columnar::TileCache::default());
        let values: AnyAttribute = Attribute::from_values(
            &cache,
            std::sync::Arc::new(tessera_columnar::Domain::new(3)),
            vec![1i8, 2, 2],
        )
        .unwrap()
        .into();
        let op = FrequencyOperator::new("unique_count_uint16", FreqFunc::UniqueCount(16));
        assert_eq!(op.output(&values).0, ValueKind::Scalar(ScalarKind::UInt16));
        let modus = FrequencyOperator::new("modus", FreqFunc::Modus);
        assert_eq!(modus.output(&values).0, ValueKind::Scalar(ScalarKind::Int8));
    }
}
