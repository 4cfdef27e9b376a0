//! Deterministic binary codec used for storage values, ABIs, events and
//! the VM object wire format.
//!
//! # Binary Format
//!
//! - Fixed-width integers: little-endian
//! - `bool`: one byte, `0` or `1`
//! - Lengths: variable-length integer (see [`write_varint`])
//! - `Vec<T>` / `String` / `BigInt`: varint length, then the payload
//! - `BigInt`: two's-complement little-endian bytes
//! - `Option<T>`: one tag byte (`0` = none, `1` = some), then the value
//! - `[u8; N]`: raw bytes, no prefix
//!
//! Storage keys are built by concatenating prefixes with encoded values,
//! so this layout is part of the persisted state format.

use nexus_derive::Error;
use num_bigint::BigInt;

/// Destination for encoded bytes.
pub trait EncodeSink {
    fn write(&mut self, bytes: &[u8]);
}

/// Counts bytes without storing them, used to size buffers up front.
#[derive(Default)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

pub trait Encode {
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Encodes into a buffer allocated at the exact final size.
    fn to_bytes(&self) -> Vec<u8> {
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);
        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        out
    }
}

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid value")]
    InvalidValue,
    #[error("length prefix overflows the input")]
    LengthOverflow,
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

pub trait Decode: Sized {
    /// Decodes one value and advances `input` past it.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value that must span all of `data`.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;
        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }
        Ok(value)
    }
}

fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

fn read_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    buf.copy_from_slice(read_bytes(input, N)?);
    Ok(buf)
}

/// Writes a variable-length unsigned integer.
///
/// Values below `0xFD` take one byte; larger values are a marker byte
/// (`0xFD`, `0xFE`, `0xFF`) followed by a little-endian `u16`, `u32` or `u64`.
pub fn write_varint<S: EncodeSink>(out: &mut S, value: u64) {
    if value < 0xFD {
        out.write(&[value as u8]);
    } else if value <= u16::MAX as u64 {
        out.write(&[0xFD]);
        out.write(&(value as u16).to_le_bytes());
    } else if value <= u32::MAX as u64 {
        out.write(&[0xFE]);
        out.write(&(value as u32).to_le_bytes());
    } else {
        out.write(&[0xFF]);
        out.write(&value.to_le_bytes());
    }
}

/// Reads a value written by [`write_varint`].
pub fn read_varint(input: &mut &[u8]) -> Result<u64, DecodeError> {
    let marker = read_bytes(input, 1)?[0];
    Ok(match marker {
        0xFD => u16::from_le_bytes(read_array(input)?) as u64,
        0xFE => u32::from_le_bytes(read_array(input)?) as u64,
        0xFF => u64::from_le_bytes(read_array(input)?),
        small => small as u64,
    })
}

/// Reads a varint length and checks it against the remaining input.
fn read_len(input: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = usize::try_from(read_varint(input)?).map_err(|_| DecodeError::LengthOverflow)?;
    if len > input.len() {
        return Err(DecodeError::LengthOverflow);
    }
    Ok(len)
}

impl Encode for u8 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(read_bytes(input, 1)?[0])
    }
}

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match read_bytes(input, 1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

macro_rules! impl_le_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    Ok(<$t>::from_le_bytes(read_array(input)?))
                }
            }
        )*
    };
}

impl_le_int!(u16, u32, u64, i16, i32, i64);

impl<const N: usize> Encode for [u8; N] {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        read_array(input)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        write_varint(out, self.len() as u64);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        // Every element occupies at least one byte, so the remaining input
        // bounds the element count.
        let len = read_len(input)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(input)?);
        }
        Ok(items)
    }
}

impl Encode for str {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        write_varint(out, self.len() as u64);
        out.write(self.as_bytes());
    }
}

impl Encode for String {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.as_str().encode(out);
    }
}

impl Decode for String {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = read_len(input)?;
        let bytes = read_bytes(input, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidValue)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        match self {
            None => out.write(&[0]),
            Some(value) => {
                out.write(&[1]);
                value.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(input)?)),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (**self).encode(out);
    }
}

impl Encode for BigInt {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        let bytes = self.to_signed_bytes_le();
        write_varint(out, bytes.len() as u64);
        out.write(&bytes);
    }
}

impl Decode for BigInt {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = read_len(input)?;
        Ok(BigInt::from_signed_bytes_le(read_bytes(input, len)?))
    }
}

/// Writes raw bytes with a varint length prefix.
pub fn write_byte_array<S: EncodeSink>(out: &mut S, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.write(bytes);
}

/// Reads bytes written by [`write_byte_array`].
pub fn read_byte_array(input: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    let len = read_len(input)?;
    Ok(read_bytes(input, len)?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        let cases: [(u64, usize); 7] = [
            (0, 1),
            (0xFC, 1),
            (0xFD, 3),
            (0xFFFF, 3),
            (0x1_0000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
        ];
        for (value, width) in cases {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            assert_eq!(out.len(), width, "width of {value:#x}");
            let mut input = out.as_slice();
            assert_eq!(read_varint(&mut input).unwrap(), value);
            assert!(input.is_empty());
        }
    }

    #[test]
    fn string_layout_is_length_prefixed() {
        assert_eq!("abc".to_string().to_bytes(), vec![3, b'a', b'b', b'c']);
    }

    #[test]
    fn bigint_uses_signed_little_endian() {
        assert_eq!(BigInt::from(-1).to_bytes(), vec![1, 0xFF]);
        assert_eq!(BigInt::from(256).to_bytes(), vec![2, 0x00, 0x01]);
        assert_eq!(<BigInt as Decode>::from_bytes(&[2, 0x00, 0x01]).unwrap(), BigInt::from(256));
    }

    #[test]
    fn bool_rejects_other_bytes() {
        assert_eq!(bool::from_bytes(&[2]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn from_bytes_rejects_trailing_data() {
        assert_eq!(u8::from_bytes(&[1, 2]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn length_larger_than_input_is_rejected() {
        assert_eq!(String::from_bytes(&[5, b'a']), Err(DecodeError::LengthOverflow));
        assert_eq!(Vec::<u8>::from_bytes(&[0xFD, 0xFF, 0xFF]), Err(DecodeError::LengthOverflow));
    }

    #[test]
    fn option_tag() {
        assert_eq!(Some(7u8).to_bytes(), vec![1, 7]);
        assert_eq!(None::<u8>.to_bytes(), vec![0]);
        assert_eq!(Option::<u8>::from_bytes(&[3]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn truncated_integer_is_eof() {
        assert_eq!(u32::from_bytes(&[1, 2]), Err(DecodeError::UnexpectedEof));
    }
}
