#![forbid(unsafe_code)]

use super::{
    AggrFunc, AggregateOperator, Argument, CalcContext, CollectByCondOperator, FreqFunc,
    FrequencyOperator, IndexOperator, ListOperator, ListStyle, LookupOperator, Operator,
    OrdinalOperator, PCountOperator, ResultHolder, SubIndexOperator, WeightedModusOperator,
};
use crate::error::{AggrError, AggrResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Operators by case-insensitive name.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.operators.values().map(|op| op.name()).collect();
        names.sort_unstable();
        f.debug_struct("OperatorRegistry").field("operators", &names).finish()
    }
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        for (name, func) in [
            ("count", AggrFunc::Count),
            ("sum", AggrFunc::Sum),
            ("min", AggrFunc::Min),
            ("max", AggrFunc::Max),
            ("first", AggrFunc::First),
            ("last", AggrFunc::Last),
            ("mean", AggrFunc::Mean),
            ("var", AggrFunc::Variance),
            ("variance", AggrFunc::Variance),
            ("std", AggrFunc::StdDev),
            ("any", AggrFunc::Any),
            ("all", AggrFunc::All),
        ] {
            registry.register(AggregateOperator::new(name, func));
        }

        for (name, func) in [
            ("modus", FreqFunc::Modus),
            ("modus_count", FreqFunc::ModusCount),
            ("unique_count_uint8", FreqFunc::UniqueCount(8)),
            ("unique_count_uint16", FreqFunc::UniqueCount(16)),
            ("unique_count_uint32", FreqFunc::UniqueCount(32)),
            ("unique_count_uint64", FreqFunc::UniqueCount(64)),
            ("entropy", FreqFunc::Entropy),
            ("average_entropy", FreqFunc::AverageEntropy),
        ] {
            registry.register(FrequencyOperator::new(name, func));
        }
        registry.register(WeightedModusOperator::new("modus_weighted"));

        registry.register(ListOperator::new("asList", ListStyle::AsList));
        registry.register(ListOperator::new("asItemList", ListStyle::AsItemList));
        registry.register(ListOperator::new("asExprList", ListStyle::AsExprList));

        registry.register(IndexOperator::new("index", false));
        registry.register(IndexOperator::new("direct_index", true));
        registry.register(SubIndexOperator::new("subindex"));
        registry.register(OrdinalOperator::new("ordinal"));
        registry.register(LookupOperator::new("lookup"));
        registry.register(LookupOperator::new("collect_by_org_rel"));
        registry.register(CollectByCondOperator::new("collect_by_cond"));
        registry.register(PCountOperator::new("pcount"));

        registry
    }

    /// Adds `operator`, replacing any operator of the same name.
    pub fn register(&mut self, operator: impl Operator + 'static) {
        let key = operator.name().to_ascii_uppercase();
        if let Some(old) = self.operators.insert(key, Arc::new(operator)) {
            log::debug!("operator registry: replaced {}", old.name());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.operators.get(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Resolves `name`, checks the argument count and runs the operator's
    /// [`Operator::create_result`].
    pub fn create_result(
        &self,
        ctx: &CalcContext,
        name: &str,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()> {
        let operator = self
            .get(name)
            .ok_or_else(|| AggrError::UnknownOperator(name.to_string()))?;
        let spec = operator.spec();
        if args.len() < spec.min_args || args.len() > spec.max_args {
            let expected = if spec.min_args == spec.max_args {
                spec.min_args.to_string()
            } else {
                format!("{} to {}", spec.min_args, spec.max_args)
            };
            return Err(AggrError::Arity {
                operator: spec.name.to_string(),
                expected,
                actual: args.len(),
            });
        }
        log::trace!(
            "{}: {} argument(s), must_calc={must_calc}",
            spec.name,
            args.len()
        );
        operator.create_result(ctx, result, args, must_calc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let registry = OperatorRegistry::with_builtins();
        assert_eq!(registry.get("MODUS").map(|op| op.name()), Some("modus"));
        assert_eq!(registry.get("aslist").map(|op| op.name()), Some("asList"));
        assert!(registry.get("median").is_none());
    }

    #[test]
    fn every_builtin_is_present() {
        let registry = OperatorRegistry::with_builtins();
        for name in [
            "count", "sum", "min", "max", "first", "last", "mean", "var", "std", "any", "all",
            "modus", "modus_count", "modus_weighted", "unique_count_uint8", "unique_count_uint64",
            "entropy", "average_entropy", "asList", "asItemList", "asExprList", "index",
            "direct_index", "subindex", "ordinal", "lookup", "collect_by_org_rel",
            "collect_by_cond", "pcount",
        ] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn unknown_and_arity_errors() {
        let registry = OperatorRegistry::with_builtins();
        let ctx = CalcContext::default();
        let mut result = ResultHolder::new();

        let err = registry
            .create_result(&ctx, "nope", &mut result, &[], true)
            .unwrap_err();
        assert!(matches!(err, AggrError::UnknownOperator(name) if name == "nope"));

        let err = registry
            .create_result(&ctx, "sum", &mut result, &[], true)
            .unwrap_err();
        match err {
            AggrError::Arity {
                expected, actual, ..
            } => {
                assert_eq!(expected, "1 to 2");
                assert_eq!(actual, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(result.meta().is_none());
    }
}
