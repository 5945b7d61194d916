#![forbid(unsafe_code)]

//! The accumulator protocol shared by total and partial aggregation.
//!
//! An aggregate is three small capabilities: [`Init`] creates an empty state,
//! [`Accumulate`] folds values (one tile at a time) into it, and [`Finish`]
//! turns the state into an output value. The same aggregate drives both
//! protocols: total aggregation uses one state, partial aggregation one state
//! per group.

use crate::error::AggrResult;
use crate::index_getter::IndexGetter;
use tessera_columnar::Element;

pub trait Init {
    type State: Send;

    fn init(&self) -> Self::State;
}

pub trait Accumulate<T: Element>: Init {
    /// Folds one defined value into `state`.
    fn accumulate(&self, state: &mut Self::State, value: &T);

    /// Combines `later`, built from tiles after those already in `into`.
    fn merge(&self, into: &mut Self::State, later: Self::State);

    /// Folds one tile. With `has_undefined` false the caller guarantees every
    /// value is defined.
    fn accumulate_tile(&self, state: &mut Self::State, values: &[T], has_undefined: bool) {
        if has_undefined {
            for v in values.iter().filter(|v| v.is_defined()) {
                self.accumulate(state, v);
            }
        } else {
            for v in values {
                self.accumulate(state, v);
            }
        }
    }

    /// Folds one tile into the states addressed by `groups`; elements without a
    /// group are skipped.
    fn accumulate_groups(
        &self,
        states: &mut [Self::State],
        values: &[T],
        groups: &dyn IndexGetter,
        has_undefined: bool,
    ) {
        for (i, v) in values.iter().enumerate() {
            if has_undefined && !v.is_defined() {
                continue;
            }
            if let Some(g) = groups.get(i) {
                self.accumulate(&mut states[g], v);
            }
        }
    }
}

pub trait Finish: Init {
    type Output: Element;

    fn finish(&self, state: Self::State) -> AggrResult<Self::Output>;
}

/// An aggregate usable by the tile driver for values of type `T`.
pub trait Aggregate<T: Element>: Accumulate<T> + Finish + Sync {}

impl<T: Element, A: Accumulate<T> + Finish + Sync> Aggregate<T> for A {}
