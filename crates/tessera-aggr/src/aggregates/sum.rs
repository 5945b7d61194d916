#![forbid(unsafe_code)]

use crate::error::AggrResult;
use crate::protocol::{Accumulate, Finish, Init};
use std::marker::PhantomData;
use tessera_columnar::{Element, Point};

/// Values that can be summed in a wider accumulator.
///
/// Integers accumulate in `i128` (saturating), floats in `f64`. Points sum per
/// coordinate.
pub trait Summable: Element + Copy {
    type Acc: Copy + Send + Default + std::fmt::Debug;
    type MeanOutput: Element;

    fn widen(self) -> Self::Acc;

    fn add(acc: Self::Acc, other: Self::Acc) -> Self::Acc;

    /// Converts back to the value type; a sum that does not fit is undefined.
    fn narrow(acc: Self::Acc) -> Self;

    fn mean(acc: Self::Acc, count: u64) -> Self::MeanOutput;
}

macro_rules! impl_summable_int {
    ($($t:ty),*) => {$(
        impl Summable for $t {
            type Acc = i128;
            type MeanOutput = f64;

            fn widen(self) -> i128 {
                self as i128
            }

            fn add(acc: i128, other: i128) -> i128 {
                acc.saturating_add(other)
            }

            fn narrow(acc: i128) -> Self {
                <$t>::try_from(acc)
                    .ok()
                    .filter(|v| v.is_defined())
                    .unwrap_or_else(<$t>::undefined)
            }

            fn mean(acc: i128, count: u64) -> f64 {
                acc as f64 / count as f64
            }
        }

        impl Summable for Point<$t> {
            type Acc = Point<i128>;
            type MeanOutput = Point<f64>;

            fn widen(self) -> Point<i128> {
                Point::new(self.row as i128, self.col as i128)
            }

            fn add(acc: Point<i128>, other: Point<i128>) -> Point<i128> {
                Point::new(acc.row.saturating_add(other.row), acc.col.saturating_add(other.col))
            }

            fn narrow(acc: Point<i128>) -> Self {
                let p = Point::new(<$t>::narrow(acc.row), <$t>::narrow(acc.col));
                if p.is_defined() { p } else { Self::undefined() }
            }

            fn mean(acc: Point<i128>, count: u64) -> Point<f64> {
                Point::new(<$t>::mean(acc.row, count), <$t>::mean(acc.col, count))
            }
        }
    )*};
}

macro_rules! impl_summable_float {
    ($($t:ty),*) => {$(
        impl Summable for $t {
            type Acc = f64;
            type MeanOutput = f64;

            fn widen(self) -> f64 {
                self as f64
            }

            fn add(acc: f64, other: f64) -> f64 {
                acc + other
            }

            fn narrow(acc: f64) -> Self {
                let v = acc as $t;
                if v.is_finite() { v } else { <$t>::undefined() }
            }

            fn mean(acc: f64, count: u64) -> f64 {
                acc / count as f64
            }
        }

        impl Summable for Point<$t> {
            type Acc = Point<f64>;
            type MeanOutput = Point<f64>;

            fn widen(self) -> Point<f64> {
                Point::new(self.row as f64, self.col as f64)
            }

            fn add(acc: Point<f64>, other: Point<f64>) -> Point<f64> {
                Point::new(acc.row + other.row, acc.col + other.col)
            }

            fn narrow(acc: Point<f64>) -> Self {
                let p = Point::new(<$t>::narrow(acc.row), <$t>::narrow(acc.col));
                if p.is_defined() { p } else { Self::undefined() }
            }

            fn mean(acc: Point<f64>, count: u64) -> Point<f64> {
                Point::new(acc.row / count as f64, acc.col / count as f64)
            }
        }
    )*};
}

impl_summable_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_summable_float!(f32, f64);

/// Sum of defined values, in the value type. An empty group sums to zero.
pub struct Sum<T>(PhantomData<fn() -> T>);

impl<T> Sum<T> {
    pub fn new() -> Self {
        Sum(PhantomData)
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Summable> Init for Sum<T> {
    type State = T::Acc;

    fn init(&self) -> T::Acc {
        T::Acc::default()
    }
}

impl<T: Summable> Accumulate<T> for Sum<T> {
    fn accumulate(&self, state: &mut T::Acc, value: &T) {
        *state = T::add(*state, value.widen());
    }

    fn merge(&self, into: &mut T::Acc, later: T::Acc) {
        *into = T::add(*into, later);
    }
}

impl<T: Summable> Finish for Sum<T> {
    type Output = T;

    fn finish(&self, state: T::Acc) -> AggrResult<T> {
        Ok(T::narrow(state))
    }
}

/// Arithmetic mean of defined values; undefined for an empty group.
pub struct Mean<T>(PhantomData<fn() -> T>);

impl<T> Mean<T> {
    pub fn new() -> Self {
        Mean(PhantomData)
    }
}

impl<T> Default for Mean<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Summable> Init for Mean<T> {
    type State = (u64, T::Acc);

    fn init(&self) -> Self::State {
        (0, T::Acc::default())
    }
}

impl<T: Summable> Accumulate<T> for Mean<T> {
    fn accumulate(&self, state: &mut Self::State, value: &T) {
        state.0 += 1;
        state.1 = T::add(state.1, value.widen());
    }

    fn merge(&self, into: &mut Self::State, later: Self::State) {
        into.0 += later.0;
        into.1 = T::add(into.1, later.1);
    }
}

impl<T: Summable> Finish for Mean<T> {
    type Output = T::MeanOutput;

    fn finish(&self, (count, acc): Self::State) -> AggrResult<T::MeanOutput> {
        if count == 0 {
            return Ok(T::MeanOutput::undefined());
        }
        Ok(T::mean(acc, count))
    }
}
