//! Tile-parallel aggregation, frequency and indexing operators over
//! `tessera-columnar` attributes.
//!
//! This crate focuses on:
//! - An accumulator protocol shared by total (one result) and partial (one
//!   result per partition group) aggregation.
//! - Frequency aggregates with a table or ordered-set counting strategy.
//! - Sort-rank indices, lookups through index attributes and string lists.
//! - A two-phase operator surface: declare the result shape, then calculate.

#![forbid(unsafe_code)]

pub mod aggregates;
mod config;
pub mod driver;
mod error;
pub mod frequency;
pub mod index;
pub mod index_getter;
pub mod lookup;
pub mod operator;
mod parallel;
pub mod protocol;
pub mod strings;

pub use crate::config::{AggrOptions, StrategyOverride};
pub use crate::driver::{aggregate, aggregate_partial, aggregate_total};
pub use crate::error::{AggrError, AggrResult};
pub use crate::index_getter::{create_index_getter, Groups, IndexGetter, Partition};
pub use crate::operator::{
    Argument, CalcContext, Operator, OperatorRegistry, OperatorSpec, ResultHolder, ResultMeta,
};
pub use crate::protocol::{Accumulate, Aggregate, Finish, Init};
