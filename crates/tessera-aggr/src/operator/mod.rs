#![forbid(unsafe_code)]

//! The operator surface consumed by a calculation graph.
//!
//! Every operator follows the same two-phase contract. `create_result` first
//! checks its arguments and declares the result's domain, kind and values unit
//! on the [`ResultHolder`]; this is cheap and touches no data. Only with
//! `must_calc` set does it then read the arguments, compute, and commit the
//! result attribute. A call either commits a complete result or leaves the
//! holder without data.

mod aggregate;
mod frequency;
mod lists;
mod registry;
mod relational;

pub use aggregate::{AggrFunc, AggregateOperator};
pub use frequency::{FreqFunc, FrequencyOperator, WeightedModusOperator};
pub use lists::{ListOperator, ListStyle};
pub use registry::OperatorRegistry;
pub use relational::{
    CollectByCondOperator, IndexOperator, LookupOperator, OrdinalOperator, PCountOperator,
    SubIndexOperator,
};

use crate::config::AggrOptions;
use crate::error::{AggrError, AggrResult};
use crate::index_getter::{Groups, Partition};
use std::sync::Arc;
use tessera_columnar::{
    AnyAttribute, AttributeWriter, Domain, Element, TileCache, ValueKind, ValuesUnit,
};

/// A resolved operator argument.
#[derive(Debug, Clone)]
pub enum Argument {
    Attribute(AnyAttribute),
    Domain(Arc<Domain>),
    Text(Arc<str>),
}

impl Argument {
    fn describe(&self) -> String {
        match self {
            Argument::Attribute(a) => format!("a {} attribute", a.kind()),
            Argument::Domain(_) => "a domain".to_string(),
            Argument::Text(_) => "text".to_string(),
        }
    }
}

impl From<AnyAttribute> for Argument {
    fn from(attr: AnyAttribute) -> Self {
        Argument::Attribute(attr)
    }
}

impl From<Arc<Domain>> for Argument {
    fn from(domain: Arc<Domain>) -> Self {
        Argument::Domain(domain)
    }
}

impl From<&str> for Argument {
    fn from(text: &str) -> Self {
        Argument::Text(Arc::from(text))
    }
}

pub(crate) fn attribute_arg<'a>(
    operator: &str,
    args: &'a [Argument],
    i: usize,
) -> AggrResult<&'a AnyAttribute> {
    match args.get(i) {
        Some(Argument::Attribute(a)) => Ok(a),
        Some(other) => Err(AggrError::type_mismatch(operator, i, "an attribute", other.describe())),
        None => Err(AggrError::type_mismatch(operator, i, "an attribute", "nothing")),
    }
}

pub(crate) fn domain_arg<'a>(
    operator: &str,
    args: &'a [Argument],
    i: usize,
) -> AggrResult<&'a Arc<Domain>> {
    match args.get(i) {
        Some(Argument::Domain(d)) => Ok(d),
        Some(other) => Err(AggrError::type_mismatch(operator, i, "a domain", other.describe())),
        None => Err(AggrError::type_mismatch(operator, i, "a domain", "nothing")),
    }
}

pub(crate) fn text_arg<'a>(operator: &str, args: &'a [Argument], i: usize) -> AggrResult<&'a Arc<str>> {
    match args.get(i) {
        Some(Argument::Text(s)) => Ok(s),
        Some(other) => Err(AggrError::type_mismatch(operator, i, "text", other.describe())),
        None => Err(AggrError::type_mismatch(operator, i, "text", "nothing")),
    }
}

/// The optional partition argument at position `i`, checked against the
/// values' domain.
pub(crate) fn partition_arg(
    operator: &str,
    args: &[Argument],
    i: usize,
    values: &AnyAttribute,
) -> AggrResult<Option<Partition>> {
    if args.len() <= i {
        return Ok(None);
    }
    let attr = attribute_arg(operator, args, i)?;
    Partition::new(operator, i, attr, values.domain()).map(Some)
}

pub(crate) fn groups_of(partition: &Option<Partition>) -> Groups<'_> {
    match partition {
        Some(p) => Groups::Partial(p),
        None => Groups::Total,
    }
}

/// Shape of a result, known before any data is read.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMeta {
    pub domain: Arc<Domain>,
    pub kind: ValueKind,
    pub values: ValuesUnit,
}

/// Placeholder for one operator result: its shape once declared, its data once
/// calculated.
#[derive(Debug, Default)]
pub struct ResultHolder {
    meta: Option<ResultMeta>,
    data: Option<AnyAttribute>,
}

impl ResultHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(&self) -> Option<&ResultMeta> {
        self.meta.as_ref()
    }

    pub fn is_calculated(&self) -> bool {
        self.data.is_some()
    }

    /// The committed result.
    pub fn data(&self, operator: &str) -> AggrResult<&AnyAttribute> {
        self.data.as_ref().ok_or_else(|| AggrError::NotCalculated {
            operator: operator.to_string(),
        })
    }

    /// Records the result shape, or checks it against an existing one.
    pub(crate) fn declare(&mut self, operator: &str, meta: ResultMeta) -> AggrResult<()> {
        match &self.meta {
            None => {
                self.meta = Some(meta);
                Ok(())
            }
            Some(existing)
                if existing.kind == meta.kind && Domain::unify(&existing.domain, &meta.domain) =>
            {
                Ok(())
            }
            Some(existing) => Err(AggrError::precondition(
                operator,
                format!(
                    "existing result is {} over {} elements, not {} over {}",
                    existing.kind,
                    existing.domain.len(),
                    meta.kind,
                    meta.domain.len()
                ),
            )),
        }
    }

    /// Writes `values` (domain order) as the result and commits it.
    pub(crate) fn commit<T: Element>(
        &mut self,
        operator: &str,
        cache: &Arc<TileCache>,
        values: Vec<T>,
    ) -> AggrResult<()> {
        let meta = self.meta.as_ref().ok_or_else(|| {
            AggrError::precondition(operator, "result committed before it was declared")
        })?;
        if meta.kind != T::KIND {
            return Err(AggrError::type_mismatch(operator, 0, meta.kind.to_string(), T::KIND));
        }
        let mut writer = AttributeWriter::<T>::new(cache, meta.domain.clone(), meta.values.clone());
        writer.write_all(values)?;
        self.data = Some(writer.commit()?.into());
        Ok(())
    }
}

/// What an operator calculates with.
#[derive(Debug, Clone)]
pub struct CalcContext {
    pub options: AggrOptions,
    /// Cache shared by the result attributes this context creates.
    pub cache: Arc<TileCache>,
}

impl CalcContext {
    pub fn new(cache: Arc<TileCache>) -> Self {
        Self {
            options: AggrOptions::default(),
            cache,
        }
    }

    pub fn with_options(mut self, options: AggrOptions) -> Self {
        self.options = options;
        self
    }
}

impl Default for CalcContext {
    fn default() -> Self {
        Self::new(Arc::new(TileCache::default()))
    }
}

/// Static description of an operator: its name and accepted argument counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
}

pub trait Operator: Send + Sync {
    fn spec(&self) -> &OperatorSpec;

    fn name(&self) -> &str {
        self.spec().name
    }

    /// Declares the result on `result` and, with `must_calc`, calculates and
    /// commits it. Arity has been checked by the registry.
    fn create_result(
        &self,
        ctx: &CalcContext,
        result: &mut ResultHolder,
        args: &[Argument],
        must_calc: bool,
    ) -> AggrResult<()>;
}
