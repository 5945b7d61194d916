#![forbid(unsafe_code)]

use crate::error::AggrResult;
use crate::protocol::{Accumulate, Finish, Init};
use tessera_columnar::Bool;

/// True when some value is true; false for an empty group.
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

/// True when no value is false; true for an empty group.
#[derive(Debug, Clone, Copy, Default)]
pub struct All;

impl Init for Any {
    type State = bool;

    fn init(&self) -> bool {
        false
    }
}

impl Accumulate<Bool> for Any {
    fn accumulate(&self, state: &mut bool, value: &Bool) {
        *state |= value.is_true();
    }

    fn merge(&self, into: &mut bool, later: bool) {
        *into |= later;
    }

    fn accumulate_tile(&self, state: &mut bool, values: &[Bool], _has_undefined: bool) {
        *state = *state || values.iter().any(|v| v.is_true());
    }
}

impl Finish for Any {
    type Output = Bool;

    fn finish(&self, state: bool) -> AggrResult<Bool> {
        Ok(state.into())
    }
}

impl Init for All {
    type State = bool;

    fn init(&self) -> bool {
        true
    }
}

impl Accumulate<Bool> for All {
    fn accumulate(&self, state: &mut bool, value: &Bool) {
        *state &= value.is_true();
    }

    fn merge(&self, into: &mut bool, later: bool) {
        *into &= later;
    }

    fn accumulate_tile(&self, state: &mut bool, values: &[Bool], _has_undefined: bool) {
        *state = *state && values.iter().all(|v| v.is_true());
    }
}

impl Finish for All {
    type Output = Bool;

    fn finish(&self, state: bool) -> AggrResult<Bool> {
        Ok(state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_decide_empty_groups() {
        assert_eq!(Any.finish(Any.init()).unwrap(), Bool::FALSE);
        assert_eq!(All.finish(All.init()).unwrap(), Bool::TRUE);
    }

    #[test]
    fn mixed_tile() {
        let tile = [Bool::FALSE, Bool::TRUE, Bool::FALSE];
        let (mut any, mut all) = (Any.init(), All.init());
        Any.accumulate_tile(&mut any, &tile, false);
        All.accumulate_tile(&mut all, &tile, false);
        assert!(any);
        assert!(!all);
    }
}
