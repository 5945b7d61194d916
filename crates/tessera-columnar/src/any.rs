#![forbid(unsafe_code)]

use crate::attribute::{Attribute, ValuesUnit};
use crate::domain::Domain;
use crate::element::{Bits, Element, Point, Text, ValueKind};
use std::sync::Arc;

/// An attribute of any supported value type.
///
/// Algorithms are generic over [`Element`]; this enum is the closed set they
/// get monomorphized for. Use the `dispatch_*` macros to recover the typed
/// attribute.
#[derive(Clone, Debug)]
pub enum AnyAttribute {
    UInt1(Arc<Attribute<Bits<1>>>),
    UInt2(Arc<Attribute<Bits<2>>>),
    UInt4(Arc<Attribute<Bits<4>>>),
    Int8(Arc<Attribute<i8>>),
    Int16(Arc<Attribute<i16>>),
    Int32(Arc<Attribute<i32>>),
    Int64(Arc<Attribute<i64>>),
    UInt8(Arc<Attribute<u8>>),
    UInt16(Arc<Attribute<u16>>),
    UInt32(Arc<Attribute<u32>>),
    UInt64(Arc<Attribute<u64>>),
    Float32(Arc<Attribute<f32>>),
    Float64(Arc<Attribute<f64>>),
    PointInt8(Arc<Attribute<Point<i8>>>),
    PointInt16(Arc<Attribute<Point<i16>>>),
    PointInt32(Arc<Attribute<Point<i32>>>),
    PointInt64(Arc<Attribute<Point<i64>>>),
    PointUInt8(Arc<Attribute<Point<u8>>>),
    PointUInt16(Arc<Attribute<Point<u16>>>),
    PointUInt32(Arc<Attribute<Point<u32>>>),
    PointUInt64(Arc<Attribute<Point<u64>>>),
    PointFloat32(Arc<Attribute<Point<f32>>>),
    PointFloat64(Arc<Attribute<Point<f64>>>),
    String(Arc<Attribute<Text>>),
}

/// Runs `$body` with `$attr` bound to the typed attribute, whatever its kind.
#[macro_export]
macro_rules! dispatch_any {
    ($value:expr, $attr:ident => $body:expr) => {
        match $value {
            $crate::AnyAttribute::UInt1($attr) => $body,
            $crate::AnyAttribute::UInt2($attr) => $body,
            $crate::AnyAttribute::UInt4($attr) => $body,
            $crate::AnyAttribute::Int8($attr) => $body,
            $crate::AnyAttribute::Int16($attr) => $body,
            $crate::AnyAttribute::Int32($attr) => $body,
            $crate::AnyAttribute::Int64($attr) => $body,
            $crate::AnyAttribute::UInt8($attr) => $body,
            $crate::AnyAttribute::UInt16($attr) => $body,
            $crate::AnyAttribute::UInt32($attr) => $body,
            $crate::AnyAttribute::UInt64($attr) => $body,
            $crate::AnyAttribute::Float32($attr) => $body,
            $crate::AnyAttribute::Float64($attr) => $body,
            $crate::AnyAttribute::PointInt8($attr) => $body,
            $crate::AnyAttribute::PointInt16($attr) => $body,
            $crate::AnyAttribute::PointInt32($attr) => $body,
            $crate::AnyAttribute::PointInt64($attr) => $body,
            $crate::AnyAttribute::PointUInt8($attr) => $body,
            $crate::AnyAttribute::PointUInt16($attr) => $body,
            $crate::AnyAttribute::PointUInt32($attr) => $body,
            $crate::AnyAttribute::PointUInt64($attr) => $body,
            $crate::AnyAttribute::PointFloat32($attr) => $body,
            $crate::AnyAttribute::PointFloat64($attr) => $body,
            $crate::AnyAttribute::String($attr) => $body,
        }
    };
}

/// Like [`dispatch_any!`] for integer and bit kinds; anything else goes to
/// the fallback arm.
#[macro_export]
macro_rules! dispatch_countable {
    ($value:expr, $attr:ident => $body:expr, $other:ident => $fallback:expr) => {
        match $value {
            $crate::AnyAttribute::UInt1($attr) => $body,
            $crate::AnyAttribute::UInt2($attr) => $body,
            $crate::AnyAttribute::UInt4($attr) => $body,
            $crate::AnyAttribute::Int8($attr) => $body,
            $crate::AnyAttribute::Int16($attr) => $body,
            $crate::AnyAttribute::Int32($attr) => $body,
            $crate::AnyAttribute::Int64($attr) => $body,
            $crate::AnyAttribute::UInt8($attr) => $body,
            $crate::AnyAttribute::UInt16($attr) => $body,
            $crate::AnyAttribute::UInt32($attr) => $body,
            $crate::AnyAttribute::UInt64($attr) => $body,
            $other => $fallback,
        }
    };
}

/// Integer and floating point kinds.
#[macro_export]
macro_rules! dispatch_scalar {
    ($value:expr, $attr:ident => $body:expr, $other:ident => $fallback:expr) => {
        match $value {
            $crate::AnyAttribute::Int8($attr) => $body,
            $crate::AnyAttribute::Int16($attr) => $body,
            $crate::AnyAttribute::Int32($attr) => $body,
            $crate::AnyAttribute::Int64($attr) => $body,
            $crate::AnyAttribute::UInt8($attr) => $body,
            $crate::AnyAttribute::UInt16($attr) => $body,
            $crate::AnyAttribute::UInt32($attr) => $body,
            $crate::AnyAttribute::UInt64($attr) => $body,
            $crate::AnyAttribute::Float32($attr) => $body,
            $crate::AnyAttribute::Float64($attr) => $body,
            $other => $fallback,
        }
    };
}

/// Scalar kinds plus points over them.
#[macro_export]
macro_rules! dispatch_numeric {
    ($value:expr, $attr:ident => $body:expr, $other:ident => $fallback:expr) => {
        match $value {
            $crate::AnyAttribute::Int8($attr) => $body,
            $crate::AnyAttribute::Int16($attr) => $body,
            $crate::AnyAttribute::Int32($attr) => $body,
            $crate::AnyAttribute::Int64($attr) => $body,
            $crate::AnyAttribute::UInt8($attr) => $body,
            $crate::AnyAttribute::UInt16($attr) => $body,
            $crate::AnyAttribute::UInt32($attr) => $body,
            $crate::AnyAttribute::UInt64($attr) => $body,
            $crate::AnyAttribute::Float32($attr) => $body,
            $crate::AnyAttribute::Float64($attr) => $body,
            $crate::AnyAttribute::PointInt8($attr) => $body,
            $crate::AnyAttribute::PointInt16($attr) => $body,
            $crate::AnyAttribute::PointInt32($attr) => $body,
            $crate::AnyAttribute::PointInt64($attr) => $body,
            $crate::AnyAttribute::PointUInt8($attr) => $body,
            $crate::AnyAttribute::PointUInt16($attr) => $body,
            $crate::AnyAttribute::PointUInt32($attr) => $body,
            $crate::AnyAttribute::PointUInt64($attr) => $body,
            $crate::AnyAttribute::PointFloat32($attr) => $body,
            $crate::AnyAttribute::PointFloat64($attr) => $body,
            $other => $fallback,
        }
    };
}

impl AnyAttribute {
    pub fn new<T: Element>(attr: Attribute<T>) -> Self {
        T::into_any(Arc::new(attr))
    }

    pub fn downcast<T: Element>(&self) -> Option<&Arc<Attribute<T>>> {
        T::from_any(self)
    }

    pub fn kind(&self) -> ValueKind {
        fn kind_of<T: Element>(_: &Attribute<T>) -> ValueKind {
            T::KIND
        }
        dispatch_any!(self, a => kind_of(a))
    }

    pub fn domain(&self) -> &Arc<Domain> {
        dispatch_any!(self, a => a.domain())
    }

    pub fn values_unit(&self) -> &ValuesUnit {
        dispatch_any!(self, a => a.values_unit())
    }

    pub fn len(&self) -> usize {
        dispatch_any!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn may_have_undefined(&self) -> bool {
        dispatch_any!(self, a => a.may_have_undefined())
    }
}

impl<T: Element> From<Attribute<T>> for AnyAttribute {
    fn from(attr: Attribute<T>) -> Self {
        AnyAttribute::new(attr)
    }
}
