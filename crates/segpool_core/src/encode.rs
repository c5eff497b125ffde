//! # Encoders
//!
//! Byte representations for values that straddle a segment boundary.
//!
//! The writer encodes fixed-width integers itself when they land inside a
//! single segment. When a value would cross into the next segment, the
//! caller decides the representation by passing an [`Encoder`]. Strings
//! always go through one, since the writer assumes no text encoding.

use crate::error::PoolResult;

/// Encodes a `T` into bytes.
///
/// Implemented for every `Fn(&T, &mut Vec<u8>) -> PoolResult<()>`, so a
/// closure can be passed wherever an encoder is expected. Implementations
/// append to `out` and must not read what is already there.
pub trait Encoder<T: ?Sized> {
    /// Appends the encoding of `value` to `out`.
    ///
    /// # Errors
    ///
    /// Implementation defined; conventionally [`crate::PoolError::Encoding`].
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> PoolResult<()>;
}

impl<T, F> Encoder<T> for F
where
    T: ?Sized,
    F: Fn(&T, &mut Vec<u8>) -> PoolResult<()>,
{
    #[inline]
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> PoolResult<()> {
        self(value, out)
    }
}

/// Little-endian encoding for fixed-width integers.
///
/// Produces the same bytes as the single-segment fast path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LittleEndian;

macro_rules! impl_little_endian {
    ($($ty:ty),*) => {
        $(
            impl Encoder<$ty> for LittleEndian {
                #[inline]
                fn encode(&self, value: &$ty, out: &mut Vec<u8>) -> PoolResult<()> {
                    out.extend_from_slice(&value.to_le_bytes());
                    Ok(())
                }
            }
        )*
    };
}

impl_little_endian!(u16, i16, u32, i32, u64, i64);

/// UTF-8 encoding for strings: the raw bytes of the `str`, no length prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Utf8;

impl Encoder<str> for Utf8 {
    #[inline]
    fn encode(&self, value: &str, out: &mut Vec<u8>) -> PoolResult<()> {
        out.extend_from_slice(value.as_bytes());
        Ok(())
    }
}
