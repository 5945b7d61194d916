#![forbid(unsafe_code)]

use crate::any::AnyAttribute;
use crate::attribute::{Attribute, StoredTile};
use crate::bitpacking::PackedBits;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Numeric storage kinds that can stand alone or form the coordinates of a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt8 => "uint8",
            ScalarKind::UInt16 => "uint16",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Float64 => "float64",
        }
    }
}

/// The closed set of value types an attribute can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Unsigned values packed at 1, 2 or 4 bits per element.
    Bits(u8),
    Scalar(ScalarKind),
    Point(ScalarKind),
    String,
}

impl ValueKind {
    /// Integer and bit kinds, whose values map onto a contiguous ordinal range.
    pub fn is_countable(self) -> bool {
        match self {
            ValueKind::Bits(_) => true,
            ValueKind::Scalar(s) => !matches!(s, ScalarKind::Float32 | ScalarKind::Float64),
            ValueKind::Point(_) | ValueKind::String => false,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bits(1) => f.write_str("bool"),
            ValueKind::Bits(n) => write!(f, "uint{n}"),
            ValueKind::Scalar(s) => f.write_str(s.name()),
            ValueKind::Point(s) => write!(f, "point<{}>", s.name()),
            ValueKind::String => f.write_str("string"),
        }
    }
}

/// Half-open range `first..end` of ordinals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueRange {
    pub first: i64,
    pub end: i64,
}

impl ValueRange {
    pub fn new(first: i64, end: i64) -> Self {
        Self { first, end }
    }

    /// Range `0..count`, as spanned by a domain of `count` elements.
    pub fn zero_based(count: usize) -> Self {
        Self {
            first: 0,
            end: i64::try_from(count).unwrap_or(i64::MAX),
        }
    }

    pub fn len(&self) -> usize {
        if self.end <= self.first {
            return 0;
        }
        usize::try_from(self.end.abs_diff(self.first)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.first
    }

    pub fn contains(&self, v: i64) -> bool {
        self.first <= v && v < self.end
    }

    pub fn contains_range(&self, other: &ValueRange) -> bool {
        other.is_empty() || (self.first <= other.first && other.end <= self.end)
    }

    /// Zero-based position of `v` inside the range.
    pub fn ordinal(&self, v: i64) -> Option<usize> {
        if !self.contains(v) {
            return None;
        }
        usize::try_from(v.abs_diff(self.first)).ok()
    }

    pub fn value_at(&self, ordinal: usize) -> Option<i64> {
        let v = self.first.checked_add(i64::try_from(ordinal).ok()?)?;
        self.contains(v).then_some(v)
    }
}

/// A value type that attributes can store.
///
/// Every concrete type is implemented once below; algorithms are written
/// generically over this trait and selected at runtime through
/// [`AnyAttribute`].
pub trait Element: Clone + Send + Sync + fmt::Debug + 'static {
    const KIND: ValueKind;
    const COUNTABLE: bool = false;

    fn undefined() -> Self;

    fn is_defined(&self) -> bool;

    /// Total order over defined values.
    fn cmp_value(&self, other: &Self) -> Ordering;

    fn to_ordinal(&self) -> Option<i64> {
        None
    }

    fn from_ordinal(_ordinal: i64) -> Option<Self> {
        None
    }

    /// Ordinal of a value already known to be defined and countable; no checks.
    fn raw_ordinal(&self) -> i64 {
        self.to_ordinal().unwrap_or(i64::MIN)
    }

    /// Ordinals every defined value of the type falls in, when the type is
    /// countable and the cardinality fits in an `i64` range.
    fn natural_range() -> Option<ValueRange> {
        None
    }

    /// Writes the value the way it would appear in an expression.
    fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result;

    fn encode_tile(values: Vec<Self>) -> StoredTile<Self> {
        StoredTile::Plain(Arc::new(values))
    }

    fn decode_packed(_packed: &PackedBits) -> Option<Vec<Self>> {
        None
    }

    fn into_any(attr: Arc<Attribute<Self>>) -> AnyAttribute;

    fn from_any(any: &AnyAttribute) -> Option<&Arc<Attribute<Self>>>;
}

/// Numeric element types usable as stand-alone values or point coordinates.
pub trait ScalarElement: Element + Copy + PartialOrd {
    const SCALAR: ScalarKind;

    fn to_f64(self) -> f64;
}

macro_rules! impl_any_conversions {
    ($variant:ident) => {
        fn into_any(attr: Arc<Attribute<Self>>) -> AnyAttribute {
            AnyAttribute::$variant(attr)
        }

        fn from_any(any: &AnyAttribute) -> Option<&Arc<Attribute<Self>>> {
            match any {
                AnyAttribute::$variant(attr) => Some(attr),
                _ => None,
            }
        }
    };
}

macro_rules! impl_signed {
    ($t:ty, $kind:ident) => {
        impl Element for $t {
            const KIND: ValueKind = ValueKind::Scalar(ScalarKind::$kind);
            const COUNTABLE: bool = true;

            fn undefined() -> Self {
                <$t>::MIN
            }

            fn is_defined(&self) -> bool {
                *self != <$t>::MIN
            }

            fn cmp_value(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn to_ordinal(&self) -> Option<i64> {
                if self.is_defined() {
                    i64::try_from(*self).ok()
                } else {
                    None
                }
            }

            fn from_ordinal(ordinal: i64) -> Option<Self> {
                <$t>::try_from(ordinal).ok().filter(|v| v.is_defined())
            }

            fn raw_ordinal(&self) -> i64 {
                *self as i64
            }

            fn natural_range() -> Option<ValueRange> {
                let lo = i64::try_from(<$t>::MIN).ok()?;
                let hi = i64::try_from(<$t>::MAX).ok()?;
                Some(ValueRange::new(lo + 1, hi.checked_add(1)?))
            }

            fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                write!(out, "{self}")
            }

            impl_any_conversions!($kind);
        }

        impl ScalarElement for $t {
            const SCALAR: ScalarKind = ScalarKind::$kind;

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

macro_rules! impl_unsigned {
    ($t:ty, $kind:ident) => {
        impl Element for $t {
            const KIND: ValueKind = ValueKind::Scalar(ScalarKind::$kind);
            const COUNTABLE: bool = true;

            fn undefined() -> Self {
                <$t>::MAX
            }

            fn is_defined(&self) -> bool {
                *self != <$t>::MAX
            }

            fn cmp_value(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn to_ordinal(&self) -> Option<i64> {
                if self.is_defined() {
                    i64::try_from(*self).ok()
                } else {
                    None
                }
            }

            fn from_ordinal(ordinal: i64) -> Option<Self> {
                <$t>::try_from(ordinal).ok().filter(|v| v.is_defined())
            }

            fn raw_ordinal(&self) -> i64 {
                *self as i64
            }

            fn natural_range() -> Option<ValueRange> {
                // MAX is the undefined sentinel and stays outside the range.
                let hi = i64::try_from(<$t>::MAX).ok()?;
                Some(ValueRange::new(0, hi))
            }

            fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                write!(out, "{self}")
            }

            impl_any_conversions!($kind);
        }

        impl ScalarElement for $t {
            const SCALAR: ScalarKind = ScalarKind::$kind;

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

macro_rules! impl_float {
    ($t:ty, $kind:ident) => {
        impl Element for $t {
            const KIND: ValueKind = ValueKind::Scalar(ScalarKind::$kind);

            fn undefined() -> Self {
                <$t>::NAN
            }

            fn is_defined(&self) -> bool {
                !self.is_nan()
            }

            fn cmp_value(&self, other: &Self) -> Ordering {
                OrderedFloat(*self).cmp(&OrderedFloat(*other))
            }

            fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                write!(out, "{self}")
            }

            impl_any_conversions!($kind);
        }

        impl ScalarElement for $t {
            const SCALAR: ScalarKind = ScalarKind::$kind;

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_signed!(i8, Int8);
impl_signed!(i16, Int16);
impl_signed!(i32, Int32);
impl_signed!(i64, Int64);
impl_unsigned!(u8, UInt8);
impl_unsigned!(u16, UInt16);
impl_unsigned!(u32, UInt32);
impl_unsigned!(u64, UInt64);
impl_float!(f32, Float32);
impl_float!(f64, Float64);

/// An unsigned value of `N` bits (`N` in 1, 2, 4), stored bit-packed.
///
/// Bit values have no undefined sentinel: every representable value is defined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bits<const N: u8>(u8);

pub type Bool = Bits<1>;

impl<const N: u8> Bits<N> {
    pub const MAX: u8 = ((1u16 << N) - 1) as u8;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Keeps the low `N` bits of `value`.
    pub fn truncating(value: u8) -> Self {
        Self(value & Self::MAX)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Bits<1> {
    pub const FALSE: Bool = Bits(0);
    pub const TRUE: Bool = Bits(1);

    pub fn is_true(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Bits(u8::from(value))
    }
}

macro_rules! impl_bits {
    ($n:literal, $kind:ident) => {
        impl Element for Bits<$n> {
            const KIND: ValueKind = ValueKind::Bits($n);
            const COUNTABLE: bool = true;

            fn undefined() -> Self {
                // There is no spare bit pattern; zero stands in where a filler is needed.
                Bits(0)
            }

            fn is_defined(&self) -> bool {
                true
            }

            fn cmp_value(&self, other: &Self) -> Ordering {
                self.0.cmp(&other.0)
            }

            fn to_ordinal(&self) -> Option<i64> {
                Some(i64::from(self.0))
            }

            fn from_ordinal(ordinal: i64) -> Option<Self> {
                u8::try_from(ordinal).ok().and_then(Self::new)
            }

            fn raw_ordinal(&self) -> i64 {
                i64::from(self.0)
            }

            fn natural_range() -> Option<ValueRange> {
                Some(ValueRange::new(0, 1 << $n))
            }

            fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                if $n == 1 {
                    out.write_str(if self.0 != 0 { "true" } else { "false" })
                } else {
                    write!(out, "{}", self.0)
                }
            }

            fn encode_tile(values: Vec<Self>) -> StoredTile<Self> {
                StoredTile::Packed(PackedBits::pack($n, values.into_iter().map(|b| b.0)))
            }

            fn decode_packed(packed: &PackedBits) -> Option<Vec<Self>> {
                if packed.width() != $n {
                    return None;
                }
                Some(packed.iter().map(Self::truncating).collect())
            }

            impl_any_conversions!($kind);
        }
    };
}

impl_bits!(1, UInt1);
impl_bits!(2, UInt2);
impl_bits!(4, UInt4);

/// A 2-tuple of scalar coordinates. Points order by row, then column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point<T> {
    pub row: T,
    pub col: T,
}

impl<T> Point<T> {
    pub fn new(row: T, col: T) -> Self {
        Self { row, col }
    }
}

macro_rules! impl_point {
    ($t:ty, $variant:ident) => {
        impl Element for Point<$t> {
            const KIND: ValueKind = ValueKind::Point(<$t as ScalarElement>::SCALAR);

            fn undefined() -> Self {
                Point::new(<$t>::undefined(), <$t>::undefined())
            }

            fn is_defined(&self) -> bool {
                self.row.is_defined() && self.col.is_defined()
            }

            fn cmp_value(&self, other: &Self) -> Ordering {
                self.row
                    .cmp_value(&other.row)
                    .then_with(|| self.col.cmp_value(&other.col))
            }

            fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                out.write_str("point(")?;
                self.row.write_expr(out)?;
                out.write_str(", ")?;
                self.col.write_expr(out)?;
                out.write_str(")")
            }

            impl_any_conversions!($variant);
        }
    };
}

impl_point!(i8, PointInt8);
impl_point!(i16, PointInt16);
impl_point!(i32, PointInt32);
impl_point!(i64, PointInt64);
impl_point!(u8, PointUInt8);
impl_point!(u16, PointUInt16);
impl_point!(u32, PointUInt32);
impl_point!(u64, PointUInt64);
impl_point!(f32, PointFloat32);
impl_point!(f64, PointFloat64);

/// A variable-length string value; `None` is undefined.
pub type Text = Option<Arc<str>>;

pub fn text(s: &str) -> Text {
    Some(Arc::from(s))
}

impl Element for Text {
    const KIND: ValueKind = ValueKind::String;

    fn undefined() -> Self {
        None
    }

    fn is_defined(&self) -> bool {
        self.is_some()
    }

    fn cmp_value(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn write_expr<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let Some(s) = self else {
            return out.write_str("null");
        };
        out.write_char('"')?;
        for ch in s.chars() {
            if matches!(ch, '"' | '\\') {
                out.write_char('\\')?;
            }
            out.write_char(ch)?;
        }
        out.write_char('"')
    }

    impl_any_conversions!(String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_sentinels_are_undefined() {
        assert!(!i32::MIN.is_defined());
        assert!((i32::MIN + 1).is_defined());
        assert!(!u8::MAX.is_defined());
        assert!(0u8.is_defined());
        assert!(!f64::NAN.is_defined());
        assert!(!Point::new(1i16, i16::MIN).is_defined());
        assert!(!Text::undefined().is_defined());
    }

    #[test]
    fn natural_ranges_exclude_the_sentinel() {
        assert_eq!(u8::natural_range(), Some(ValueRange::new(0, 255)));
        assert_eq!(i8::natural_range(), Some(ValueRange::new(-127, 128)));
        assert_eq!(Bits::<2>::natural_range(), Some(ValueRange::new(0, 4)));
        assert_eq!(u64::natural_range(), None);
        assert_eq!(i64::natural_range(), None);
        assert_eq!(f32::natural_range(), None);
    }

    #[test]
    fn ordinals_round_trip_for_countable_kinds() {
        assert_eq!((-5i16).to_ordinal(), Some(-5));
        assert_eq!(i16::from_ordinal(-5), Some(-5));
        assert_eq!(u8::from_ordinal(255), None);
        assert_eq!(Bits::<4>::from_ordinal(15), Bits::<4>::new(15));
        assert_eq!(Bits::<4>::from_ordinal(16), None);
    }

    #[test]
    fn float_order_is_total() {
        assert_eq!(1.5f64.cmp_value(&-2.0), Ordering::Greater);
        assert_eq!(0.0f32.cmp_value(&0.0), Ordering::Equal);
    }

    #[test]
    fn expressions_quote_strings() {
        let mut out = String::new();
        text("a\"b").write_expr(&mut out).unwrap();
        assert_eq!(out, "\"a\\\"b\"");

        let mut out = String::new();
        Point::new(1i32, 2).write_expr(&mut out).unwrap();
        assert_eq!(out, "point(1, 2)");

        let mut out = String::new();
        Bool::TRUE.write_expr(&mut out).unwrap();
        assert_eq!(out, "true");
    }

    #[test]
    fn value_range_positions() {
        let r = ValueRange::new(-2, 3);
        assert_eq!(r.len(), 5);
        assert_eq!(r.ordinal(-2), Some(0));
        assert_eq!(r.ordinal(3), None);
        assert_eq!(r.value_at(4), Some(2));
        assert!(r.contains_range(&ValueRange::new(0, 3)));
        assert!(!r.contains_range(&ValueRange::new(0, 4)));
    }
}
