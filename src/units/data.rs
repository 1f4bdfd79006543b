use std::fmt;
use std::result::Result;
use std::str::FromStr;
use std::fmt::{Display, Formatter};
use num::{CheckedMul, NumCast, PrimInt, ToPrimitive};
use thiserror::Error;

/// A type which represents a byte size input by a user.
///
/// Sizes parse from a whole number with an optional binary suffix: `k`, `m`,
/// `g` or `t` (either case), so `64k` is 65536.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DataSize<I> {
    inner: I
}

#[derive(Error, Debug, PartialEq)]
pub enum DataSizeError {
    #[error("no size given")]
    Empty,

    #[error("{0:?} is not a valid size")]
    Invalid(String),

    #[error("{0:?} is too large")]
    Overflow(String),
}

impl<I> DataSize<I> {
    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I> From<I> for DataSize<I> {
    fn from(outer: I) -> DataSize<I> {
        DataSize {
            inner: outer
        }
    }
}

impl<I> FromStr for DataSize<I> where I: PrimInt {
    type Err = DataSizeError;

    fn from_str(s: &str) -> Result<DataSize<I>, Self::Err> {
        let (digits, shift) = match s.chars().last().map(|c| c.to_ascii_lowercase()) {
            None => return Err(DataSizeError::Empty),
            Some('t') => (&s[..s.len() - 1], 40),
            Some('g') => (&s[..s.len() - 1], 30),
            Some('m') => (&s[..s.len() - 1], 20),
            Some('k') => (&s[..s.len() - 1], 10),
            Some(_) => (s, 0),
        };

        let count = I::from_str_radix(digits, 10).map_err(|_| DataSizeError::Invalid(s.to_string()))?;
        let factor : I = NumCast::from(1u64 << shift).ok_or_else(|| DataSizeError::Overflow(s.to_string()))?;

        match CheckedMul::checked_mul(&count, &factor) {
            Some(inner) => Ok(DataSize { inner: inner }),
            None => Err(DataSizeError::Overflow(s.to_string())),
        }
    }
}

impl<I> Display for DataSize<I> where I: ToPrimitive {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let innerf64 = self.inner.to_f64().ok_or(fmt::Error::default())?;
        let mag = innerf64.log(2.0);

        if mag >= 40.0 {
            write!(f, "{:.2}TB", innerf64 / (1024.0 * 1024.0 * 1024.0 * 1024.0))
        } else if mag >= 30.0 {
            write!(f, "{:.2}GB", innerf64 / (1024.0 * 1024.0 * 1024.0))
        } else if mag >= 20.0 {
            write!(f, "{:.2}MB", innerf64 / (1024.0 * 1024.0))
        } else if mag >= 10.0 {
            write!(f, "{:.2}KB", innerf64 / 1024.0)
        } else {
            write!(f, "{:.2}B", innerf64)
        }
    }
}
