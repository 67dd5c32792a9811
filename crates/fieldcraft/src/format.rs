//! Compact binary format descriptors.
//!
//! A format string is an optional byte-order prefix followed by a type code:
//!
//! | prefix      | byte order            |
//! |-------------|-----------------------|
//! | none, `!`, `>` | big endian (network) |
//! | `<`         | little endian         |
//! | `@`, `=`    | native                |
//!
//! Type codes: `B`/`b` (u8/i8), `H`/`h` (u16/i16), `I`/`i` and `L`/`l`
//! (u32/i32), `Q`/`q` (u64/i64), `f` (f32), `d` (f64) and `Ns` (N raw bytes,
//! `s` alone meaning one byte).

use crate::{
    errors::{CompileError, ValueError},
    value::Value,
};

/// Byte order of a multi-byte scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
    Native,
}

impl ByteOrder {
    fn is_little(self) -> bool {
        match self {
            ByteOrder::Big => false,
            ByteOrder::Little => true,
            ByteOrder::Native => cfg!(target_endian = "little"),
        }
    }
}

/// Element kind of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Bytes(usize),
}

impl TypeCode {
    /// Encoded width in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            TypeCode::U8 | TypeCode::I8 => 1,
            TypeCode::U16 | TypeCode::I16 => 2,
            TypeCode::U32 | TypeCode::I32 | TypeCode::F32 => 4,
            TypeCode::U64 | TypeCode::I64 | TypeCode::F64 => 8,
            TypeCode::Bytes(n) => n,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            TypeCode::I8 | TypeCode::I16 | TypeCode::I32 | TypeCode::I64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, TypeCode::F32 | TypeCode::F64)
    }

    pub const fn is_integer(self) -> bool {
        !self.is_float() && !matches!(self, TypeCode::Bytes(_))
    }
}

/// Parsed `{byte order, type code, byte size}` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub byte_order: ByteOrder,
    pub type_code: TypeCode,
    pub byte_size: usize,
}

impl FormatDescriptor {
    pub const fn new(byte_order: ByteOrder, type_code: TypeCode) -> Self {
        FormatDescriptor {
            byte_order,
            type_code,
            byte_size: type_code.byte_size(),
        }
    }

    /// Big-endian shorthand.
    pub const fn big(type_code: TypeCode) -> Self {
        Self::new(ByteOrder::Big, type_code)
    }

    /// Little-endian shorthand.
    pub const fn little(type_code: TypeCode) -> Self {
        Self::new(ByteOrder::Little, type_code)
    }

    /// Parses a format string such as `"!H"`, `"<I"` or `"6s"`.
    pub fn parse(spec: &str) -> Result<Self, CompileError> {
        let invalid = || CompileError::InvalidFormatSpec(spec.to_string());

        let mut rest = spec;
        let byte_order = match rest.chars().next() {
            Some('!') | Some('>') => {
                rest = &rest[1..];
                ByteOrder::Big
            }
            Some('<') => {
                rest = &rest[1..];
                ByteOrder::Little
            }
            Some('@') | Some('=') => {
                rest = &rest[1..];
                ByteOrder::Native
            }
            _ => ByteOrder::Big,
        };

        let code = rest.chars().last().ok_or_else(invalid)?;
        let count = &rest[..rest.len() - code.len_utf8()];
        let count = if count.is_empty() {
            None
        } else {
            Some(count.parse::<usize>().map_err(|_| invalid())?)
        };

        let type_code = match (code, count) {
            ('s', n) => TypeCode::Bytes(n.unwrap_or(1)),
            (_, Some(_)) => return Err(invalid()),
            ('B', None) => TypeCode::U8,
            ('b', None) => TypeCode::I8,
            ('H', None) => TypeCode::U16,
            ('h', None) => TypeCode::I16,
            ('I', None) | ('L', None) => TypeCode::U32,
            ('i', None) | ('l', None) => TypeCode::I32,
            ('Q', None) => TypeCode::U64,
            ('q', None) => TypeCode::I64,
            ('f', None) => TypeCode::F32,
            ('d', None) => TypeCode::F64,
            _ => return Err(invalid()),
        };

        Ok(Self::new(byte_order, type_code))
    }

    pub fn bits(&self) -> usize {
        self.byte_size * 8
    }

    /// Smallest and largest integer this format can hold.
    pub fn int_range(&self) -> (i128, i128) {
        let bits = self.bits() as u32;
        if self.type_code.is_signed() {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Appends the packed form of a machine value to `out`.
    pub fn pack(&self, value: &Value, out: &mut Vec<u8>) -> Result<(), ValueError> {
        match self.type_code {
            TypeCode::Bytes(n) => {
                let bytes = value.as_bytes().ok_or_else(|| value.shape_error("bytes"))?;
                let start = out.len();
                out.extend(bytes.iter().take(n));
                out.resize(start + n, 0);
            }
            TypeCode::F32 => {
                let v = value.as_f64().ok_or_else(|| value.shape_error("number"))? as f32;
                self.put(out, &v.to_be_bytes(), &v.to_le_bytes());
            }
            TypeCode::F64 => {
                let v = value.as_f64().ok_or_else(|| value.shape_error("number"))?;
                self.put(out, &v.to_be_bytes(), &v.to_le_bytes());
            }
            _ => {
                let v = value.as_i128().ok_or_else(|| value.shape_error("integer"))?;
                let (min, max) = self.int_range();
                if v < min || v > max {
                    return Err(ValueError::OutOfRange {
                        value: v.to_string(),
                        bits: self.bits(),
                    });
                }
                // Two's complement in the low bytes covers both signednesses.
                let be = (v as u64).to_be_bytes();
                let be = &be[8 - self.byte_size..];
                let le: Vec<u8> = be.iter().rev().copied().collect();
                self.put(out, be, &le);
            }
        }

        Ok(())
    }

    fn put(&self, out: &mut Vec<u8>, be: &[u8], le: &[u8]) {
        if self.byte_order.is_little() {
            out.extend_from_slice(le);
        } else {
            out.extend_from_slice(be);
        }
    }

    /// Unpacks exactly [`Self::byte_size`] bytes into a machine value.
    pub fn unpack(&self, bytes: &[u8]) -> Value {
        if let TypeCode::Bytes(_) = self.type_code {
            return Value::Bytes(bytes.to_vec());
        }

        let mut raw = [0u8; 8];
        if self.byte_order.is_little() {
            for (i, b) in bytes.iter().enumerate() {
                raw[7 - i] = *b;
            }
        } else {
            raw[8 - bytes.len()..].copy_from_slice(bytes);
        }
        let unsigned = u64::from_be_bytes(raw);

        match self.type_code {
            TypeCode::F32 => Value::Float(f32::from_bits(unsigned as u32) as f64),
            TypeCode::F64 => Value::Float(f64::from_bits(unsigned)),
            code if code.is_signed() => {
                let shift = 64 - self.bits();
                Value::Int(((unsigned << shift) as i64) >> shift)
            }
            _ => Value::UInt(unsigned),
        }
    }
}
