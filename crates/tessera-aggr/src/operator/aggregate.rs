#![forbid(unsafe_code)]

use super::{
    attribute_arg, groups_of, partition_arg, Argument, CalcContext, Operator, OperatorSpec,
    ResultHolder, ResultMeta,
};
use crate::aggregates::{All, Any, Count, First, Last, Max, Mean, Min, StdDev, Sum, Variance};
use crate::driver::aggregate;
use crate::error::{AggrError, AggrResult};
use crate::index_getter::Groups;
use crate::protocol::Aggregate;
use tessera_columnar::{
    dispatch_any, dispatch_numeric, dispatch_scalar, AnyAttribute, Attribute, Element, ScalarKind,
    ValueKind, ValuesUnit,
};

/// The fixed-state aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggrFunc {
    Count,
    Sum,
    Min,
    Max,
    First,
    Last,
    Mean,
    Variance,
    StdDev,
    Any,
    All,
}

/// `f(values)` over all elements, or `f(values, partition)` per group.
#[derive(Debug, Clone)]
pub struct AggregateOperator {
    spec: OperatorSpec,
    func: AggrFunc,
}

impl AggregateOperator {
    pub fn new(name: &'static str, func: AggrFunc) -> Self {
        Self {
            spec: OperatorSpec {
                name,
                min_args: 1,
                max_args: 2,
            },
            func,
        }
    }

    pub fn func(&self) -> AggrFunc {
        self.func
    }

    fn output(&self, values: &AnyAttribute) -> AggrResult<(ValueKind, ValuesUnit)> {
        let kind = values.kind();
        let f64_kind = ValueKind::Scalar(ScalarKind::Float64);
        let out = match (self.func, kind) {
            (AggrFunc::Count, _) => (ValueKind::Scalar(ScalarKind::UInt32), ValuesUnit::Unbounded),
            (AggrFunc::Sum, ValueKind::Scalar(_) | ValueKind::Point(_)) => {
                (kind, ValuesUnit::Unbounded)
            }
            (AggrFunc::Min | AggrFunc::Max | AggrFunc::First | AggrFunc::Last, _) => {
                (kind, values.values_unit().clone())
            }
            (AggrFunc::Mean, ValueKind::Scalar(_)) => (f64_kind, ValuesUnit::Unbounded),
            (AggrFunc::Mean, ValueKind::Point(_)) => {
                (ValueKind::Point(ScalarKind::Float64), ValuesUnit::Unbounded)
            }
            (AggrFunc::Variance | AggrFunc::StdDev, ValueKind::Scalar(_)) => {
                (f64_kind, ValuesUnit::Unbounded)
            }
            (AggrFunc::Any | AggrFunc::All, ValueKind::Bits(1)) => (kind, ValuesUnit::Unbounded),
            (func, _) => {
                let expected = match func {
                    AggrFunc::Sum | AggrFunc::Mean => "a numeric or point attribute",
                    AggrFunc::Any | AggrFunc::All => "a bool attribute",
                    _ => "a numeric attribute",
                };
                return Err(AggrError::type_mismatch(self.spec.name, 0, expected, kind));
            }
        };
        Ok(out)
    }

    fn calculate(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        values: &AnyAttribute,
        groups: Groups<'_>,
    ) -> AggrResult<()> {
        let op = self.spec.name;
        let wrong_kind = |other: &AnyAttribute| {
            AggrError::type_mismatch(op, 0, "a supported attribute", other.kind())
        };
        match self.func {
            AggrFunc::Count => dispatch_any!(values, a => run(op, ctx, result, a, groups, &Count::named(op))),
            AggrFunc::Sum => dispatch_numeric!(
                values,
                a => run(op, ctx, result, a, groups, &Sum::new()),
                other => Err(wrong_kind(other))
            ),
            AggrFunc::Mean => dispatch_numeric!(
                values,
                a => run(op, ctx, result, a, groups, &Mean::new()),
                other => Err(wrong_kind(other))
            ),
            AggrFunc::Min => dispatch_any!(values, a => run(op, ctx, result, a, groups, &Min::new())),
            AggrFunc::Max => dispatch_any!(values, a => run(op, ctx, result, a, groups, &Max::new())),
            AggrFunc::First => {
                dispatch_any!(values, a => run(op, ctx, result, a, groups, &First::new()))
            }
            AggrFunc::Last => dispatch_any!(values, a => run(op, ctx, result, a, groups, &Last::new())),
            AggrFunc::Variance => dispatch_scalar!(
                values,
                a => run(op, ctx, result, a, groups, &Variance),
                other => Err(wrong_kind(other))
            ),
            AggrFunc::StdDev => dispatch_scalar!(
                values,
                a => run(op, ctx, result, a, groups, &StdDev),
                other => Err(wrong_kind(other))
            ),
            AggrFunc::Any => match values {
                AnyAttribute::UInt1(a) => run(op, ctx, result, a, groups, &Any),
                other => Err(wrong_kind(other)),
            },
            AggrFunc::All => match values {
                AnyAttribute::UInt1(a) => run(op, ctx, result, a, groups, &All),
                other => Err(wrong_kind(other)),
            },
        }
    }
}

fn run<T: Element, A: Aggregate<T>>(
    operator: &str,
    ctx: &CalcContext,
    result: &mut ResultHolder,
    values: &Attribute<T>,
    groups: Groups<'_>,
    agg: &A,
) -> AggrResult<()> {
    let out = aggregate(operator, values, groups, agg, &ctx.options)?;
    result.commit(operator, &ctx.cache, out)
}

impl Operator for AggregateOperator {
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
        let (kind, unit) = self.output(values)?;
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
        self.calculate(ctx, result, values, groups)
    }
}
