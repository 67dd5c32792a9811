//! Sub-byte fields packed MSB-first through the shared bit carry.
//!
//! Consecutive bit fields continue inside the byte the previous one left
//! unfinished. [`crate::schema::Schema::compile`] rejects schemas whose bit runs
//! do not end on a byte boundary.

use std::collections::BTreeMap;

use crate::{
    bits::{WireReader, WireWriter, low_mask, network_swap, sign_extend},
    errors::{CompileError, ReadError, ValueError, WriteError},
    field::{Context, Detached, Field, field_basics},
    random::RandomValue,
    scalar::hex_repr,
    value::Value,
};

/// Nominal byte size of a bit field, `width / 8` rounded half to even.
pub(crate) fn nominal_size(width: usize) -> usize {
    let (whole, rest) = (width / 8, width % 8);
    if rest > 4 || (rest == 4 && whole % 2 == 1) {
        whole + 1
    } else {
        whole
    }
}

/// Fixed-width unsigned (or two's complement) integer of 1 to 64 bits.
#[derive(Debug, Clone)]
pub struct BitField {
    name: String,
    default: Value,
    width: usize,
    reversed: bool,
    signed: bool,
    hex: bool,
}

impl BitField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        width: usize,
    ) -> Result<Self, CompileError> {
        let name = name.into();
        if width == 0 || width > 64 {
            return Err(CompileError::InvalidFieldSize(name));
        }
        let mut field = BitField {
            name,
            default: Value::Absent,
            width,
            reversed: false,
            signed: false,
            hex: false,
        };
        field.default = field.normalize_default(default.into());
        Ok(field)
    }

    /// Swaps 16 and 32 bit values between host and network order on the way in
    /// and out. Other widths are unaffected.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Reads the field as two's complement.
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self.default = self.normalize_default(self.default.clone());
        self
    }

    /// Renders the value as hex.
    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn normalize_default(&self, default: Value) -> Value {
        self.normalize(default.clone()).unwrap_or(default)
    }

    fn range(&self) -> (i128, i128) {
        let bits = self.width as u32;
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    pub(crate) fn normalize(&self, value: Value) -> Result<Value, ValueError> {
        if value.is_absent() {
            return Ok(value);
        }
        let n = value.as_i128().ok_or_else(|| value.shape_error("integer"))?;
        let (min, max) = self.range();
        if n < min || n > max {
            return Err(ValueError::OutOfRange {
                value: n.to_string(),
                bits: self.width,
            });
        }
        Ok(if self.signed {
            Value::Int(n as i64)
        } else {
            Value::UInt(n as u64)
        })
    }

    /// Writes a machine integer into the carry.
    pub(crate) fn write(&self, w: &mut WireWriter, machine: &Value) -> Result<(), WriteError> {
        let raw = match machine {
            Value::Absent => 0,
            v => v.as_i128().ok_or_else(|| v.shape_error("integer"))? as u64,
        };
        let raw = if self.reversed {
            network_swap(raw, self.width)
        } else {
            raw
        };
        w.write_bits(raw & low_mask(self.width), self.width);
        Ok(())
    }

    /// Reads a machine integer from the carry.
    pub(crate) fn read(&self, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let mut raw = r.read_bits(self.width)?;
        if self.reversed {
            raw = network_swap(raw, self.width);
        }
        Ok(if self.signed {
            Value::Int(sign_extend(raw, self.width))
        } else {
            Value::UInt(raw)
        })
    }

    pub(crate) fn random(&self) -> RandomValue {
        let (min, max) = self.range();
        if self.signed {
            RandomValue::Signed {
                min: min as i64,
                max: max as i64,
            }
        } else {
            RandomValue::Unsigned { max: max as u64 }
        }
    }
}

impl Field for BitField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(nominal_size(self.width))
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        self.normalize(value)
    }

    fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
        if self.hex {
            hex_repr(value)
        } else {
            self.to_human(ctx, value).to_string()
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.write(w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        Ok(self.from_machine(ctx, self.read(r)?))
    }

    fn random_value(&self) -> RandomValue {
        self.random()
    }

    fn bit_width(&self) -> Option<usize> {
        Some(self.width)
    }
}

/// Names of single-bit flags, keyed by the bit's mask. A name under mask `0`
/// names the all-clear value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagNames(BTreeMap<u64, String>);

impl FlagNames {
    /// Names bit `i` after the `i`-th entry.
    pub fn from_list<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        FlagNames(
            names
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i < 64)
                .map(|(i, name)| (1u64 << i, name.into()))
                .collect(),
        )
    }

    pub fn from_masks<S: Into<String>>(pairs: impl IntoIterator<Item = (u64, S)>) -> Self {
        FlagNames(pairs.into_iter().map(|(m, n)| (m, n.into())).collect())
    }

    pub fn name_of(&self, mask: u64) -> Option<&str> {
        self.0.get(&mask).map(String::as_str)
    }

    pub fn mask_of(&self, name: &str) -> Option<u64> {
        self.0
            .iter()
            .find_map(|(mask, n)| (n == name).then_some(*mask))
    }
}

/// Bit field rendered as a `+`-joined set of flag names.
#[derive(Debug, Clone)]
pub struct FlagsField {
    bits: BitField,
    names: FlagNames,
}

impl FlagsField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        width: usize,
        names: FlagNames,
    ) -> Result<Self, CompileError> {
        let mut field = FlagsField {
            bits: BitField::new(name, Value::Absent, width)?,
            names,
        };
        let default = default.into();
        field.bits.default = field.to_internal(&Detached, default.clone()).unwrap_or(default);
        Ok(field)
    }

    pub fn names(&self) -> &FlagNames {
        &self.names
    }

    /// Parses `"A+C"`; tokens may also be numeric masks.
    fn parse_flags(&self, text: &str) -> Result<u64, ValueError> {
        text.split('+')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .try_fold(0u64, |acc, token| {
                let mask = match self.names.mask_of(token) {
                    Some(mask) => mask,
                    None => Value::from(token)
                        .as_u64()
                        .ok_or_else(|| ValueError::UnknownSymbol(token.to_string()))?,
                };
                Ok(acc | mask)
            })
    }
}

impl Field for FlagsField {
    fn name(&self) -> &str {
        self.bits.name()
    }

    fn default_value(&self) -> Value {
        self.bits.default_value()
    }

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.bits.size(ctx, value)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Text(s) if Value::from(s.as_str()).as_i128().is_none() => {
                self.bits.to_internal(ctx, Value::UInt(self.parse_flags(&s)?))
            }
            other => self.bits.to_internal(ctx, other),
        }
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        if let Value::List(_) = value {
            return value.to_string();
        }
        let Some(x) = value.as_u64() else {
            return value.to_string();
        };
        let digits = self.bits.width / 4;
        if x == 0 {
            return match self.names.name_of(0) {
                Some(name) => name.to_string(),
                None => format!("0x{:0digits$x}", 0),
            };
        }
        (0..self.bits.width.min(64))
            .map(|i| 1u64 << i)
            .filter(|bit| x & bit != 0)
            .map(|bit| match self.names.name_of(bit) {
                Some(name) => name.to_string(),
                None => format!("0x{bit:0digits$x}"),
            })
            .collect::<Vec<_>>()
            .join("+")
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.bits.encode(ctx, w, value)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        self.bits.decode(ctx, r)
    }

    fn random_value(&self) -> RandomValue {
        self.bits.random_value()
    }

    fn bit_width(&self) -> Option<usize> {
        self.bits.bit_width()
    }
}

/// Bit field holding `(integer_part << frac_bits) | fraction`.
#[derive(Debug, Clone)]
pub struct FixedPointField {
    bits: BitField,
    frac_bits: usize,
}

impl FixedPointField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        width: usize,
    ) -> Result<Self, CompileError> {
        Self::with_frac_bits(name, default, width, 16)
    }

    pub fn with_frac_bits(
        name: impl Into<String>,
        default: impl Into<Value>,
        width: usize,
        frac_bits: usize,
    ) -> Result<Self, CompileError> {
        let bits = BitField::new(name, Value::Absent, width)?;
        if frac_bits >= width {
            return Err(CompileError::InvalidFieldSize(bits.name));
        }
        let mut field = FixedPointField { bits, frac_bits };
        let default = default.into();
        field.bits.default = field.to_internal(&Detached, default.clone()).unwrap_or(default);
        Ok(field)
    }
}

impl Field for FixedPointField {
    fn name(&self) -> &str {
        self.bits.name()
    }

    fn default_value(&self) -> Value {
        self.bits.default_value()
    }

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.bits.size(ctx, value)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Float(x) => {
                let int_part = x.trunc();
                let fraction = ((x - int_part) * (1u64 << self.frac_bits) as f64) as i128;
                let fixed = ((int_part as i128) << self.frac_bits) | fraction;
                self.bits.to_internal(ctx, Value::UInt(fixed as u64))
            }
            other => self.bits.to_internal(ctx, other),
        }
    }

    fn to_human(&self, _ctx: &dyn Context, value: &Value) -> Value {
        match value.as_u64() {
            Some(raw) => {
                let int_part = raw >> self.frac_bits;
                let fraction = raw & low_mask(self.frac_bits);
                Value::Float(int_part as f64 + fraction as f64 / (1u64 << self.frac_bits) as f64)
            }
            None => value.clone(),
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.bits.encode(ctx, w, value)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        self.bits.decode(ctx, r)
    }

    fn random_value(&self) -> RandomValue {
        self.bits.random_value()
    }

    fn bit_width(&self) -> Option<usize> {
        self.bits.bit_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_run(fields: &[(&BitField, u64)]) -> Vec<u8> {
        let mut w = WireWriter::new();
        for (field, value) in fields {
            field.encode(&Detached, &mut w, &Value::UInt(*value)).unwrap();
        }
        w.into_bytes().unwrap()
    }

    #[test]
    fn test_width_validation() {
        assert_eq!(
            BitField::new("x", 0u8, 0).unwrap_err(),
            CompileError::InvalidFieldSize("x".to_string())
        );
        assert!(BitField::new("x", 0u8, 65).is_err());
        assert!(BitField::new("x", 0u8, 64).is_ok());
    }

    #[test]
    fn test_nominal_size_rounds_half_to_even() {
        assert_eq!(nominal_size(1), 0);
        assert_eq!(nominal_size(4), 0);
        assert_eq!(nominal_size(5), 1);
        assert_eq!(nominal_size(12), 2);
        assert_eq!(nominal_size(16), 2);
        assert_eq!(nominal_size(20), 2);
    }

    #[test]
    fn test_bit_run_packs_msb_first() {
        let version = BitField::new("version", 0u8, 4).unwrap();
        let ihl = BitField::new("ihl", 0u8, 4).unwrap();
        assert_eq!(encode_run(&[(&version, 4), (&ihl, 5)]), vec![0x45]);

        let flags = BitField::new("flags", 0u8, 3).unwrap();
        let frag = BitField::new("frag", 0u16, 13).unwrap();
        let bytes = encode_run(&[(&flags, 0b010), (&frag, 0x1234)]);
        assert_eq!(bytes, vec![0x52, 0x34]);

        let mut r = WireReader::new(&bytes);
        assert_eq!(flags.decode(&Detached, &mut r).unwrap(), Value::UInt(0b010));
        assert_eq!(frag.decode(&Detached, &mut r).unwrap(), Value::UInt(0x1234));
        assert!(r.is_empty());
    }

    #[test]
    fn test_reversed_sixteen_bits() {
        let field = BitField::new("r", 0u16, 16).unwrap().reversed();
        let bytes = field.encode_standalone(&Value::UInt(0x1234)).unwrap();
        let expected = network_swap(0x1234, 16) as u16;
        assert_eq!(bytes, expected.to_be_bytes().to_vec());
        assert_eq!(field.decode_standalone(&bytes).unwrap().1, Value::UInt(0x1234));
    }

    #[test]
    fn test_signed() {
        let field = BitField::new("s", 0, 4).unwrap().signed();
        let other = BitField::new("pad", 0u8, 4).unwrap();
        let mut w = WireWriter::new();
        field.encode(&Detached, &mut w, &Value::Int(-3)).unwrap();
        other.encode(&Detached, &mut w, &Value::UInt(0)).unwrap();
        let bytes = w.into_bytes().unwrap();
        assert_eq!(bytes, vec![0xd0]);
        let mut r = WireReader::new(&bytes);
        assert_eq!(field.decode(&Detached, &mut r).unwrap(), Value::Int(-3));
        assert!(field.to_internal(&Detached, Value::Int(8)).is_err());
    }

    #[test]
    fn test_hex_repr() {
        let field = BitField::new("x", 10u8, 8).unwrap().hex();
        assert_eq!(field.to_repr(&Detached, &field.default_value()), "0xa");
    }

    #[test]
    fn test_flags_repr() {
        let names = FlagNames::from_masks([(1, "A"), (2, "B"), (4, "C"), (8, "D")]);
        let field = FlagsField::new("f", 0u8, 4, names).unwrap();
        assert_eq!(field.to_repr(&Detached, &Value::UInt(5)), "A+C");
        assert_eq!(field.to_repr(&Detached, &Value::UInt(0)), "0x0");

        let named_zero = FlagsField::new(
            "g",
            0u8,
            8,
            FlagNames::from_masks([(0, "NONE"), (1, "A")]),
        )
        .unwrap();
        assert_eq!(named_zero.to_repr(&Detached, &Value::UInt(0)), "NONE");
        assert_eq!(named_zero.to_repr(&Detached, &Value::UInt(3)), "A+0x02");
    }

    #[test]
    fn test_flags_parse() {
        let field =
            FlagsField::new("f", "SYN+ACK", 8, FlagNames::from_list(["FIN", "SYN", "RST", "PSH", "ACK"]))
                .unwrap();
        assert_eq!(field.default_value(), Value::UInt(0b10010));
        assert_eq!(
            field.to_internal(&Detached, Value::from("FIN+0x80")).unwrap(),
            Value::UInt(0x81)
        );
        assert_eq!(
            field.to_internal(&Detached, Value::from("XYZ")).unwrap_err(),
            ValueError::UnknownSymbol("XYZ".to_string())
        );
        assert_eq!(field.to_internal(&Detached, Value::from("3")).unwrap(), Value::UInt(3));
    }

    #[test]
    fn test_fixed_point() {
        let field = FixedPointField::new("fp", 1.5, 32).unwrap();
        assert_eq!(field.default_value(), Value::UInt(0x0001_8000));
        assert_eq!(
            field.to_human(&Detached, &field.default_value()),
            Value::Float(1.5)
        );
        let bytes = field.encode_standalone(&field.default_value()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x80, 0x00]);
        assert!(FixedPointField::with_frac_bits("fp", 0u8, 8, 8).is_err());
    }
}
