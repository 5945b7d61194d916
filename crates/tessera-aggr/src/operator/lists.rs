#![forbid(unsafe_code)]

use super::{
    attribute_arg, groups_of, partition_arg, text_arg, Argument, CalcContext, Operator,
    OperatorSpec, ResultHolder, ResultMeta,
};
use crate::error::{AggrError, AggrResult};
use crate::strings::{string_list, Expressions, ItemFormat, RawText};
use tessera_columnar::{dispatch_any, AnyAttribute, Attribute, Element, ValueKind, ValuesUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// `asList(values, separator[, partition])`, string values.
    AsList,
    /// `asItemList(values[, partition])`, string values joined by `,`.
    AsItemList,
    /// `asExprList(values[, partition])`, any values as expressions joined by `;`.
    AsExprList,
}

#[derive(Debug, Clone)]
pub struct ListOperator {
    spec: OperatorSpec,
    style: ListStyle,
}

impl ListOperator {
    pub fn new(name: &'static str, style: ListStyle) -> Self {
        let min_args = if style == ListStyle::AsList { 2 } else { 1 };
        Self {
            spec: OperatorSpec {
                name,
                min_args,
                max_args: min_args + 1,
            },
            style,
        }
    }
}

fn join<T: Element, F: ItemFormat<T>>(
    operator: &str,
    ctx: &CalcContext,
    result: &mut ResultHolder,
    values: &Attribute<T>,
    groups: crate::index_getter::Groups<'_>,
    format: &F,
) -> AggrResult<()> {
    let out = string_list(operator, values, groups, format, &ctx.options)?;
    result.commit(operator, &ctx.cache, out)
}

impl Operator for ListOperator {
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
        let raw = match self.style {
            ListStyle::AsList => Some(RawText::new(text_arg(op, args, 1)?.clone())),
            ListStyle::AsItemList => Some(RawText::new(",")),
            ListStyle::AsExprList => None,
        };
        if raw.is_some() && values.kind() != ValueKind::String {
            return Err(AggrError::type_mismatch(op, 0, "a string attribute", values.kind()));
        }
        let partition = partition_arg(op, args, self.spec.min_args, values)?;
        let groups = groups_of(&partition);
        result.declare(
            op,
            ResultMeta {
                domain: groups.result_domain(),
                kind: ValueKind::String,
                values: ValuesUnit::Unbounded,
            },
        )?;
        if !must_calc {
            return Ok(());
        }

        match (raw, values) {
            (Some(format), AnyAttribute::String(a)) => join(op, ctx, result, a, groups, &format),
            (Some(_), other) => Err(AggrError::type_mismatch(op, 0, "a string attribute", other.kind())),
            (None, values) => dispatch_any!(values, a => join(op, ctx, result, a, groups, &Expressions)),
        }
    }
}
