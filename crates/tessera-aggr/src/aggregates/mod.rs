#![forbid(unsafe_code)]

//! Accumulators for the fixed-state aggregates.
//!
//! Frequency aggregates (modus, unique counts, entropy) keep a table or a map
//! per group and live in [`crate::frequency`].

mod count;
mod extremum;
mod first_last;
mod moments;
mod quantor;
mod sum;

pub use count::{checked_count, Count};
pub use extremum::{Max, Min};
pub use first_last::{First, Last};
pub use moments::{KahanSum, Moments, StdDev, Variance};
pub use quantor::{All, Any};
pub use sum::{Mean, Sum, Summable};
