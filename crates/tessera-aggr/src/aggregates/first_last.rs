#![forbid(unsafe_code)]

//! Order-dependent aggregates. Both rely on the driver merging tile states in
//! tile order.

use crate::error::AggrResult;
use crate::protocol::{Accumulate, Finish, Init};
use std::marker::PhantomData;
use tessera_columnar::Element;

/// The first defined value in domain order.
pub struct First<T>(PhantomData<fn() -> T>);

impl<T> First<T> {
    pub fn new() -> Self {
        First(PhantomData)
    }
}

impl<T> Default for First<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Init for First<T> {
    type State = Option<T>;

    fn init(&self) -> Option<T> {
        None
    }
}

impl<T: Element> Accumulate<T> for First<T> {
    fn accumulate(&self, state: &mut Option<T>, value: &T) {
        if state.is_none() {
            *state = Some(value.clone());
        }
    }

    fn merge(&self, into: &mut Option<T>, later: Option<T>) {
        if into.is_none() {
            *into = later;
        }
    }

    fn accumulate_tile(&self, state: &mut Option<T>, values: &[T], _has_undefined: bool) {
        if state.is_none() {
            *state = values.iter().find(|v| v.is_defined()).cloned();
        }
    }
}

impl<T: Element> Finish for First<T> {
    type Output = T;

    fn finish(&self, state: Option<T>) -> AggrResult<T> {
        Ok(state.unwrap_or_else(T::undefined))
    }
}

/// The last defined value in domain order.
pub struct Last<T>(PhantomData<fn() -> T>);

impl<T> Last<T> {
    pub fn new() -> Self {
        Last(PhantomData)
    }
}

impl<T> Default for Last<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Init for Last<T> {
    type State = Option<T>;

    fn init(&self) -> Option<T> {
        None
    }
}

impl<T: Element> Accumulate<T> for Last<T> {
    fn accumulate(&self, state: &mut Option<T>, value: &T) {
        *state = Some(value.clone());
    }

    fn merge(&self, into: &mut Option<T>, later: Option<T>) {
        if later.is_some() {
            *into = later;
        }
    }

    fn accumulate_tile(&self, state: &mut Option<T>, values: &[T], _has_undefined: bool) {
        if let Some(v) = values.iter().rev().find(|v| v.is_defined()) {
            *state = Some(v.clone());
        }
    }
}

impl<T: Element> Finish for Last<T> {
    type Output = T;

    fn finish(&self, state: Option<T>) -> AggrResult<T> {
        Ok(state.unwrap_or_else(T::undefined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_are_scanned_in_order() {
        let (first, last) = (First::new(), Last::new());
        let (mut f, mut l) = (first.init(), last.init());
        for tile in [&[i16::MIN, 4, 5][..], &[6, i16::MIN][..], &[i16::MIN][..]] {
            first.accumulate_tile(&mut f, tile, true);
            last.accumulate_tile(&mut l, tile, true);
        }
        assert_eq!(first.finish(f).unwrap(), 4);
        assert_eq!(last.finish(l).unwrap(), 6);
    }

    #[test]
    fn merge_keeps_the_earlier_first_and_the_later_last() {
        let (first, last) = (First::<u32>::new(), Last::<u32>::new());
        let mut f = Some(1);
        first.merge(&mut f, Some(2));
        assert_eq!(f, Some(1));
        let mut l = Some(1);
        last.merge(&mut l, None);
        assert_eq!(l, Some(1));
        last.merge(&mut l, Some(2));
        assert_eq!(l, Some(2));
    }

    #[test]
    fn all_undefined_is_undefined() {
        let first = First::<f64>::new();
        let mut state = first.init();
        first.accumulate_tile(&mut state, &[f64::NAN, f64::NAN], true);
        assert!(first.finish(state).unwrap().is_nan());
    }
}
