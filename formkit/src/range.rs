use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Numeric types a [`Range`] can hold.
pub trait Bounded: Copy + PartialOrd + fmt::Debug + fmt::Display + Default {
    const LOWEST: Self;
    const HIGHEST: Self;
}

macro_rules! impl_bounded {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Bounded for $ty {
                const LOWEST: Self = <$ty>::MIN;
                const HIGHEST: Self = <$ty>::MAX;
            }
        )*
    };
}

impl_bounded!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// A value that always stays inside `[min, max]`.
///
/// Bounds are fixed at construction. [`Range::new`] is the only constructor
/// that validates them; `Default` spans the full range of `T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RangeRepr<T>",
    bound(deserialize = "T: Bounded + Deserialize<'de>")
)]
pub struct Range<T> {
    value: T,
    min: T,
    max: T,
}

#[derive(Deserialize)]
struct RangeRepr<T> {
    value: T,
    min: T,
    max: T,
}

impl<T: Bounded> TryFrom<RangeRepr<T>> for Range<T> {
    type Error = String;

    fn try_from(repr: RangeRepr<T>) -> Result<Self, Self::Error> {
        Range::new(repr.value, repr.min, repr.max).ok_or_else(|| {
            format!(
                "value {} outside of [{}, {}]",
                repr.value, repr.min, repr.max
            )
        })
    }
}

impl<T: Bounded> Range<T> {
    /// Returns `None` when `value` is not inside `[min, max]`.
    pub fn new(value: T, min: T, max: T) -> Option<Self> {
        if min <= value && value <= max {
            Some(Self { value, min, max })
        } else {
            None
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn min_max(&self) -> (T, T) {
        (self.min, self.max)
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// Writes `value` if it is in bounds. On `false` the old value is kept.
    pub fn set_value(&mut self, value: T) -> bool {
        if self.contains(value) {
            self.value = value;
            true
        } else {
            false
        }
    }
}

impl<T: Bounded> Default for Range<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            min: T::LOWEST,
            max: T::HIGHEST,
        }
    }
}

impl<T> Deref for Range<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

/// A bounded number of any supported width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "range", rename_all = "lowercase")]
pub enum Number {
    I8(Range<i8>),
    I16(Range<i16>),
    I32(Range<i32>),
    I64(Range<i64>),
    U8(Range<u8>),
    U16(Range<u16>),
    U32(Range<u32>),
    U64(Range<u64>),
    F32(Range<f32>),
    F64(Range<f64>),
}

macro_rules! number_dispatch {
    ($self:expr, $range:ident => $body:expr) => {
        match $self {
            Number::I8($range) => $body,
            Number::I16($range) => $body,
            Number::I32($range) => $body,
            Number::I64($range) => $body,
            Number::U8($range) => $body,
            Number::U16($range) => $body,
            Number::U32($range) => $body,
            Number::U64($range) => $body,
            Number::F32($range) => $body,
            Number::F64($range) => $body,
        }
    };
}

macro_rules! number_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Range<$ty>> for Number {
                fn from(range: Range<$ty>) -> Self {
                    Number::$variant(range)
                }
            }
        )*
    };
}

number_from!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl Number {
    pub fn is_integer(&self) -> bool {
        !matches!(self, Number::F32(_) | Number::F64(_))
    }

    /// Lossy view of the current value, for widgets that only speak `f64`.
    pub fn as_f64(&self) -> f64 {
        number_dispatch!(self, range => range.value() as f64)
    }

    pub fn min_max_f64(&self) -> (f64, f64) {
        number_dispatch!(self, range => {
            let (min, max) = range.min_max();
            (min as f64, max as f64)
        })
    }

    /// Step a spin control should use: 1 for integers, 0.1 for floats.
    pub fn step(&self) -> f64 {
        if self.is_integer() { 1.0 } else { 0.1 }
    }

    /// Parses `text` at this number's own width and writes it if in bounds.
    pub fn set_from_str(&mut self, text: &str) -> bool {
        let text = text.trim();
        number_dispatch!(self, range => match text.parse() {
            Ok(value) => range.set_value(value),
            Err(_) => false,
        })
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        number_dispatch!(self, range => fmt::Display::fmt(range, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_writes_are_accepted() {
        let mut range = Range::new(5_i32, 0, 10).expect("valid range");
        assert!(range.set_value(0));
        assert_eq!(range.value(), 0);
        assert!(range.set_value(10));
        assert_eq!(*range, 10);
    }

    #[test]
    fn out_of_range_writes_keep_old_value() {
        let mut range = Range::new(5_u8, 1, 9).expect("valid range");
        assert!(!range.set_value(0));
        assert!(!range.set_value(10));
        assert_eq!(range.value(), 5);
        assert_eq!(range.min_max(), (1, 9));
    }

    #[test]
    fn construction_rejects_value_outside_bounds() {
        assert!(Range::new(11_i64, 0, 10).is_none());
        assert!(Range::new(-0.5_f64, 0.0, 1.0).is_none());
        assert!(Range::new(f64::NAN, 0.0, 1.0).is_none());
    }

    #[test]
    fn default_spans_full_width() {
        let range = Range::<i16>::default();
        assert_eq!(range.min_max(), (i16::MIN, i16::MAX));
        assert_eq!(range.value(), 0);
    }

    #[test]
    fn nan_is_never_in_bounds() {
        let mut range = Range::<f32>::default();
        assert!(!range.set_value(f32::NAN));
        assert_eq!(range.value(), 0.0);
    }

    #[test]
    fn number_parses_at_its_own_width() {
        let mut number = Number::from(Range::new(0_u8, 0, 200).expect("valid range"));
        assert!(number.set_from_str(" 200 "));
        assert_eq!(number.as_f64(), 200.0);
        assert!(!number.set_from_str("201"));
        assert!(!number.set_from_str("1.5"));
        assert!(!number.set_from_str("-1"));
        assert_eq!(number.to_string(), "200");
    }

    #[test]
    fn large_integers_keep_precision() {
        let mut number = Number::from(Range::<i64>::default());
        assert!(number.set_from_str("9007199254740993"));
        assert_eq!(number.to_string(), "9007199254740993");
    }

    #[test]
    fn float_numbers_report_fractional_step() {
        let number = Number::from(Range::new(0.5_f32, 0.0, 1.0).expect("valid range"));
        assert!(!number.is_integer());
        assert_eq!(number.step(), 0.1);
        assert_eq!(number.min_max_f64(), (0.0, 1.0));
    }

    #[test]
    fn deserialize_rejects_out_of_range_payload() {
        let err = serde_json::from_str::<Range<i32>>(r#"{"value":12,"min":0,"max":10}"#)
            .expect_err("out of range payload");
        assert!(err.to_string().contains("outside"));

        let ok: Range<i32> =
            serde_json::from_str(r#"{"value":3,"min":0,"max":10}"#).expect("valid payload");
        assert_eq!(ok.value(), 3);
    }
}
