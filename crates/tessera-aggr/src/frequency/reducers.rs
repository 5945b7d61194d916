#![forbid(unsafe_code)]

use crate::aggregates::checked_count;
use crate::error::{AggrError, AggrResult};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::AddAssign;
use tessera_columnar::Element;

/// The count type of a frequency table: `u64` occurrences or `f64` weights.
pub trait Tally: Copy + Default + PartialOrd + AddAssign + Send + Sync + Debug + 'static {
    fn to_f64(self) -> f64;
}

impl Tally for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Tally for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

/// Turns the positive counts of one group, in ascending value order, into an
/// output value.
pub trait Reduce<T, C>: Sync {
    type Output: Element;

    fn reduce(&self, counts: impl Iterator<Item = (T, C)>) -> AggrResult<Self::Output>;
}

/// The most frequent value. Ties go to the smallest value; an empty group is
/// undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modus;

impl<T: Element, C: Tally> Reduce<T, C> for Modus {
    type Output = T;

    fn reduce(&self, counts: impl Iterator<Item = (T, C)>) -> AggrResult<T> {
        let mut best: Option<(T, C)> = None;
        for (value, count) in counts {
            if best.as_ref().map_or(true, |(_, b)| count > *b) {
                best = Some((value, count));
            }
        }
        Ok(best.map_or_else(T::undefined, |(value, _)| value))
    }
}

/// How often the modus occurs; 0 for an empty group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModusCount;

impl<T> Reduce<T, u64> for ModusCount {
    type Output = u32;

    fn reduce(&self, counts: impl Iterator<Item = (T, u64)>) -> AggrResult<u32> {
        checked_count("modus_count", counts.map(|(_, c)| c).max().unwrap_or(0))
    }
}

/// Output widths of the distinct-value counts. The type's maximum is its
/// undefined sentinel and never a valid count.
pub trait CountOutput: Element + Copy {
    const OPERATOR: &'static str;

    fn from_count(count: u64) -> Option<Self>;

    fn limit() -> u64;
}

macro_rules! count_output {
    ($($t:ty => $name:literal),*) => {$(
        impl CountOutput for $t {
            const OPERATOR: &'static str = $name;

            fn from_count(count: u64) -> Option<Self> {
                <$t>::try_from(count).ok().filter(|&c| c != <$t>::MAX)
            }

            fn limit() -> u64 {
                <$t>::MAX as u64 - 1
            }
        }
    )*};
}

count_output!(
    u8 => "unique_count_uint8",
    u16 => "unique_count_uint16",
    u32 => "unique_count_uint32",
    u64 => "unique_count_uint64"
);

/// Number of distinct defined values, in output width `O`.
pub struct UniqueCount<O>(PhantomData<fn() -> O>);

impl<O> UniqueCount<O> {
    pub fn new() -> Self {
        UniqueCount(PhantomData)
    }
}

impl<O> Default for UniqueCount<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, O: CountOutput> Reduce<T, C> for UniqueCount<O> {
    type Output = O;

    fn reduce(&self, counts: impl Iterator<Item = (T, C)>) -> AggrResult<O> {
        let n = counts.count() as u64;
        O::from_count(n).ok_or_else(|| {
            AggrError::capacity(O::OPERATOR, format!("{n} distinct values"), O::limit())
        })
    }
}

/// Total information content `(T·ln T − Σ c·ln c) / ln 2` in bits, where T is
/// the group's element count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entropy;

/// Information content per element, `(ln T − Σ c·ln c / T) / ln 2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageEntropy;

fn totals<T, C: Tally>(counts: impl Iterator<Item = (T, C)>) -> (f64, f64) {
    counts.fold((0.0, 0.0), |(total, clnc), (_, c)| {
        let c = c.to_f64();
        (total + c, clnc + c * c.ln())
    })
}

impl<T, C: Tally> Reduce<T, C> for Entropy {
    type Output = f64;

    fn reduce(&self, counts: impl Iterator<Item = (T, C)>) -> AggrResult<f64> {
        let (total, clnc) = totals(counts);
        if total <= 0.0 {
            return Ok(0.0);
        }
        Ok((total * total.ln() - clnc) / std::f64::consts::LN_2)
    }
}

impl<T, C: Tally> Reduce<T, C> for AverageEntropy {
    type Output = f64;

    fn reduce(&self, counts: impl Iterator<Item = (T, C)>) -> AggrResult<f64> {
        let (total, clnc) = totals(counts);
        if total <= 0.0 {
            return Ok(0.0);
        }
        Ok((total.ln() - clnc / total) / std::f64::consts::LN_2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(cs: &[u64]) -> impl Iterator<Item = (i32, u64)> + '_ {
        cs.iter().enumerate().map(|(i, &c)| (i as i32, c))
    }

    #[test]
    fn modus_prefers_the_first_strict_maximum() {
        assert_eq!(Modus.reduce(counts(&[1, 3, 3, 2])).unwrap(), 1);
        assert_eq!(Reduce::<i32, u64>::reduce(&Modus, std::iter::empty()).unwrap(), i32::MIN);
    }

    #[test]
    fn two_equally_likely_values_carry_one_bit_each() {
        assert!((Entropy.reduce(counts(&[1, 1])).unwrap() - 2.0).abs() < 1e-12);
        assert!((AverageEntropy.reduce(counts(&[1, 1])).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(AverageEntropy.reduce(counts(&[4])).unwrap(), 0.0);
        assert_eq!(Entropy.reduce(counts(&[])).unwrap(), 0.0);
    }

    #[test]
    fn unique_count_overflowing_its_width_is_a_capacity_error() {
        let many = vec![1u64; 255];
        let err = UniqueCount::<u8>::new().reduce(counts(&many)).unwrap_err();
        assert!(matches!(err, AggrError::Capacity { .. }));
        assert_eq!(UniqueCount::<u8>::new().reduce(counts(&many[..254])).unwrap(), 254);
    }
}
