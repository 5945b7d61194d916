#![forbid(unsafe_code)]

use crate::error::AggrResult;
use crate::protocol::{Accumulate, Finish, Init};
use tessera_columnar::ScalarElement;

/// Compensated floating point sum.
#[derive(Debug, Default, Clone, Copy)]
pub struct KahanSum {
    sum: f64,
    c: f64,
}

impl KahanSum {
    pub fn add(&mut self, x: f64) {
        let y = x - self.c;
        let t = self.sum + y;
        self.c = (t - self.sum) - y;
        self.sum = t;
    }

    /// Folds in a sum built over a disjoint set of values.
    pub fn merge(&mut self, other: KahanSum) {
        self.add(other.sum);
        self.add(-other.c);
    }

    pub fn value(self) -> f64 {
        self.sum
    }
}

/// Count, sum and sum of squares of the defined values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Moments {
    n: u64,
    x: KahanSum,
    xx: KahanSum,
}

impl Moments {
    fn push(&mut self, x: f64) {
        self.n += 1;
        self.x.add(x);
        self.xx.add(x * x);
    }

    fn merge(&mut self, other: Moments) {
        self.n += other.n;
        self.x.merge(other.x);
        self.xx.merge(other.xx);
    }

    /// Population variance `E[x²] - E[x]²`, clamped at zero; NaN when empty.
    pub fn variance(&self) -> f64 {
        if self.n == 0 {
            return f64::NAN;
        }
        let n = self.n as f64;
        let mean = self.x.value() / n;
        (self.xx.value() / n - mean * mean).max(0.0)
    }
}

macro_rules! moment_aggregate {
    ($(#[$doc:meta])* $name:ident, |$m:ident| $finish:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Init for $name {
            type State = Moments;

            fn init(&self) -> Moments {
                Moments::default()
            }
        }

        impl<T: ScalarElement> Accumulate<T> for $name {
            fn accumulate(&self, state: &mut Moments, value: &T) {
                state.push(value.to_f64());
            }

            fn merge(&self, into: &mut Moments, later: Moments) {
                into.merge(later);
            }
        }

        impl Finish for $name {
            type Output = f64;

            fn finish(&self, $m: Moments) -> AggrResult<f64> {
                Ok($finish)
            }
        }
    };
}

moment_aggregate!(
    /// Population variance of the defined values.
    Variance,
    |m| m.variance()
);

moment_aggregate!(
    /// Population standard deviation of the defined values.
    StdDev,
    |m| m.variance().sqrt()
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_of_known_values() {
        let mut state = Variance.init();
        Accumulate::<i32>::accumulate_tile(&Variance, &mut state, &[2, 4, 4, 4, 5, 5, 7, 9], false);
        assert_eq!(Variance.finish(state).unwrap(), 4.0);
        assert_eq!(StdDev.finish(state).unwrap(), 2.0);
    }

    #[test]
    fn constant_values_never_go_negative() {
        let mut state = Variance.init();
        Accumulate::<f64>::accumulate_tile(&Variance, &mut state, &[0.1; 1000], false);
        assert!(Variance.finish(state).unwrap() >= 0.0);
    }

    #[test]
    fn empty_is_undefined() {
        assert!(StdDev.finish(StdDev.init()).unwrap().is_nan());
    }

    #[test]
    fn merging_split_sums_matches_one_pass() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64 * 0.5).collect();
        let mut whole = Moments::default();
        values.iter().for_each(|&v| whole.push(v));
        let mut left = Moments::default();
        let mut right = Moments::default();
        values[..37].iter().for_each(|&v| left.push(v));
        values[37..].iter().for_each(|&v| right.push(v));
        left.merge(right);
        assert_eq!(left.n, whole.n);
        assert!((left.variance() - whole.variance()).abs() < 1e-9);
    }
}
