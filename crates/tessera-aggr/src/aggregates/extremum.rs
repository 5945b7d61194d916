#![forbid(unsafe_code)]

use crate::error::AggrResult;
use crate::protocol::{Accumulate, Finish, Init};
use std::cmp::Ordering;
use std::marker::PhantomData;
use tessera_columnar::Element;

macro_rules! extremum {
    ($(#[$doc:meta])* $name:ident, $replace_when:path) => {
        $(#[$doc])*
        pub struct $name<T>(PhantomData<fn() -> T>);

        impl<T> $name<T> {
            pub fn new() -> Self {
                $name(PhantomData)
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T: Element> Init for $name<T> {
            type State = Option<T>;

            fn init(&self) -> Option<T> {
                None
            }
        }

        impl<T: Element> Accumulate<T> for $name<T> {
            fn accumulate(&self, state: &mut Option<T>, value: &T) {
                let replace = match &*state {
                    Some(current) => value.cmp_value(current) == $replace_when,
                    None => true,
                };
                if replace {
                    *state = Some(value.clone());
                }
            }

            fn merge(&self, into: &mut Option<T>, later: Option<T>) {
                if let Some(v) = later {
                    self.accumulate(into, &v);
                }
            }
        }

        impl<T: Element> Finish for $name<T> {
            type Output = T;

            fn finish(&self, state: Option<T>) -> AggrResult<T> {
                Ok(state.unwrap_or_else(T::undefined))
            }
        }
    };
}

extremum!(
    /// Smallest defined value; undefined for an empty group.
    Min,
    Ordering::Less
);

extremum!(
    /// Largest defined value; undefined for an empty group.
    Max,
    Ordering::Greater
);
