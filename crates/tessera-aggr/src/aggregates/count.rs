#![forbid(unsafe_code)]

use crate::error::{AggrError, AggrResult};
use crate::protocol::{Accumulate, Finish, Init};
use tessera_columnar::Element;

/// Narrows a count to the `u32` output type; `u32::MAX` is the undefined
/// sentinel, so the largest representable count is one below it.
pub fn checked_count(operator: &str, count: u64) -> AggrResult<u32> {
    u32::try_from(count)
        .ok()
        .filter(|&c| c != u32::MAX)
        .ok_or_else(|| AggrError::capacity(operator, format!("count {count}"), u32::MAX as u64 - 1))
}

/// Number of defined values.
#[derive(Debug, Clone, Copy)]
pub struct Count {
    operator: &'static str,
}

impl Count {
    pub fn new() -> Self {
        Self::named("count")
    }

    /// Reports capacity errors under `operator`.
    pub fn named(operator: &'static str) -> Self {
        Self { operator }
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::new()
    }
}

impl Init for Count {
    type State = u64;

    fn init(&self) -> u64 {
        0
    }
}

impl<T: Element> Accumulate<T> for Count {
    fn accumulate(&self, state: &mut u64, _value: &T) {
        *state += 1;
    }

    fn merge(&self, into: &mut u64, later: u64) {
        *into += later;
    }

    fn accumulate_tile(&self, state: &mut u64, values: &[T], has_undefined: bool) {
        *state += if has_undefined {
            values.iter().filter(|v| v.is_defined()).count()
        } else {
            values.len()
        } as u64;
    }
}

impl Finish for Count {
    type Output = u32;

    fn finish(&self, state: u64) -> AggrResult<u32> {
        checked_count(self.operator, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_values_are_not_counted() {
        let count = Count::new();
        let mut state = count.init();
        Accumulate::<i32>::accumulate_tile(&count, &mut state, &[1, i32::MIN, 3], true);
        assert_eq!(count.finish(state).unwrap(), 2);
    }

    #[test]
    fn overflow_names_the_calling_operator() {
        let err = Count::named("pcount").finish(u32::MAX as u64).unwrap_err();
        assert!(matches!(err, AggrError::Capacity { ref operator, .. } if operator == "pcount"));
    }

    #[test]
    fn the_sentinel_itself_is_out_of_range() {
        assert_eq!(checked_count("count", u32::MAX as u64 - 1).unwrap(), u32::MAX - 1);
        let err = checked_count("count", u32::MAX as u64).unwrap_err();
        assert!(matches!(err, AggrError::Capacity { .. }));
    }
}
