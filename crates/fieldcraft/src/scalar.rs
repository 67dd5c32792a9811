//! Fixed-width scalar fields: integers, floats, addresses and timestamps.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};

use crate::{
    bits::{WireReader, WireWriter},
    errors::{CompileError, ReadError, ValueError, WriteError},
    field::{Context, Detached, Field, field_basics},
    format::{FormatDescriptor, TypeCode},
    random::RandomValue,
    value::Value,
};

/// Seconds between 1601-01-01 and 1970-01-01.
pub const NT_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;
/// NT time ticks per second (100 ns resolution).
pub const NT_TICKS_PER_SEC: i64 = 10_000_000;

pub(crate) fn pack_format(
    format: &FormatDescriptor,
    w: &mut WireWriter,
    machine: &Value,
) -> Result<(), WriteError> {
    format.pack(machine, w.aligned_buf()?)?;
    Ok(())
}

pub(crate) fn unpack_format(
    format: &FormatDescriptor,
    r: &mut WireReader<'_>,
) -> Result<Value, ReadError> {
    let bytes = r.take(format.byte_size)?;
    Ok(format.unpack(bytes))
}

/// Brings a number into the representation that decoding the same format yields.
pub(crate) fn normalize_number(
    format: &FormatDescriptor,
    value: Value,
) -> Result<Value, ValueError> {
    match (format.type_code, value) {
        (_, Value::Absent) => Ok(Value::Absent),
        (TypeCode::Bytes(_), v) => match v {
            Value::Bytes(_) => Ok(v),
            Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(other.shape_error("bytes")),
        },
        (TypeCode::F32, v) => {
            let f = v.as_f64().ok_or_else(|| v.shape_error("number"))?;
            Ok(Value::Float(f as f32 as f64))
        }
        (TypeCode::F64, v) => {
            let f = v.as_f64().ok_or_else(|| v.shape_error("number"))?;
            Ok(Value::Float(f))
        }
        (code, v) => {
            let n = v.as_i128().ok_or_else(|| v.shape_error("integer"))?;
            let (min, max) = format.int_range();
            if n < min || n > max {
                return Err(ValueError::OutOfRange {
                    value: n.to_string(),
                    bits: format.bits(),
                });
            }
            if code.is_signed() {
                Ok(Value::Int(n as i64))
            } else {
                Ok(Value::UInt(n as u64))
            }
        }
    }
}

/// `None` packs as zero.
pub(crate) fn machine_number(value: &Value) -> Value {
    match value {
        Value::Absent => Value::UInt(0),
        v => v.clone(),
    }
}

pub(crate) fn format_random(format: &FormatDescriptor) -> RandomValue {
    match format.type_code {
        TypeCode::Bytes(n) => RandomValue::Bytes {
            min_len: n,
            max_len: n,
        },
        TypeCode::F32 => RandomValue::Float32,
        TypeCode::F64 => RandomValue::Float64,
        code if code.is_signed() => {
            let (min, max) = format.int_range();
            RandomValue::Signed {
                min: min as i64,
                max: max as i64,
            }
        }
        _ => RandomValue::Unsigned {
            max: format.int_range().1 as u64,
        },
    }
}

/// `0x`-prefixed hex rendering; absent renders as zero.
pub(crate) fn hex_repr(value: &Value) -> String {
    match value {
        Value::Absent => "0x0".to_string(),
        Value::UInt(v) => format!("{v:#x}"),
        Value::Int(v) if *v < 0 => format!("-{:#x}", v.unsigned_abs()),
        Value::Int(v) => format!("{v:#x}"),
        other => other.to_string(),
    }
}

/// Default values are normalized once; a default that does not convert is kept
/// verbatim and reported when it is encoded.
pub(crate) fn normalized_default(field: &dyn Field, default: Value) -> Value {
    field.to_internal(&Detached, default.clone()).unwrap_or(default)
}

/// Integer or floating point scalar packed with a [`FormatDescriptor`].
#[derive(Debug, Clone)]
pub struct NumField {
    name: String,
    default: Value,
    format: FormatDescriptor,
    hex: bool,
}

macro_rules! num_constructors {
    ($($(#[$doc:meta])* $fn_name:ident => $ctor:ident($code:ident);)*) => {$(
        $(#[$doc])*
        pub fn $fn_name(name: impl Into<String>, default: impl Into<Value>) -> Self {
            Self::new(name, default, FormatDescriptor::$ctor(TypeCode::$code))
        }
    )*};
}

impl NumField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        format: FormatDescriptor,
    ) -> Self {
        let mut field = NumField {
            name: name.into(),
            default: Value::Absent,
            format,
            hex: false,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    /// Builds a field from a format string such as `"<H"`.
    pub fn with_format(
        name: impl Into<String>,
        default: impl Into<Value>,
        spec: &str,
    ) -> Result<Self, CompileError> {
        Ok(Self::new(name, default, FormatDescriptor::parse(spec)?))
    }

    num_constructors! {
        /// Unsigned 8-bit.
        byte => big(U8);
        /// Big-endian unsigned 16-bit.
        short => big(U16);
        le_short => little(U16);
        /// Big-endian unsigned 32-bit.
        int => big(U32);
        signed_int => big(I32);
        le_int => little(U32);
        le_signed_int => little(I32);
        /// Big-endian unsigned 64-bit.
        long => big(U64);
        le_long => little(U64);
        float => big(F32);
        double => big(F64);
    }

    /// Renders the value as hex.
    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }
}

impl Field for NumField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(self.format.byte_size)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        normalize_number(&self.format, value)
    }

    fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
        if self.hex {
            hex_repr(value)
        } else {
            self.to_human(ctx, value).to_string()
        }
    }

    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        Ok(machine_number(value))
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        pack_format(&self.format, w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        Ok(self.from_machine(ctx, unpack_format(&self.format, r)?))
    }

    fn random_value(&self) -> RandomValue {
        format_random(&self.format)
    }
}

/// Unsigned 24-bit big-endian integer, rendered as hex.
#[derive(Debug, Clone)]
pub struct ThreeBytesField {
    name: String,
    default: Value,
}

impl ThreeBytesField {
    const MAX: u64 = 0xff_ffff;

    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = ThreeBytesField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }
}

impl Field for ThreeBytesField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(3)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        if value.is_absent() {
            return Ok(value);
        }
        let n = value.as_u64().ok_or_else(|| value.shape_error("integer"))?;
        if n > Self::MAX {
            return Err(ValueError::OutOfRange {
                value: n.to_string(),
                bits: 24,
            });
        }
        Ok(Value::UInt(n))
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        hex_repr(value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        let mut packed = Vec::with_capacity(4);
        FormatDescriptor::big(TypeCode::U32).pack(&machine_number(value), &mut packed)?;
        if packed[0] != 0 {
            return Err(ValueError::OutOfRange {
                value: value.to_string(),
                bits: 24,
            }
            .into());
        }
        w.write_bytes(&packed[1..])
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let bytes = r.take(3)?;
        let mut raw = [0u8; 4];
        raw[1..].copy_from_slice(bytes);
        Ok(Value::UInt(u32::from_be_bytes(raw) as u64))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Unsigned { max: Self::MAX }
    }
}

pub(crate) fn mac_to_text(octets: &[u8]) -> String {
    octets
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn mac_from_text(text: &str) -> Option<[u8; 6]> {
    let mut octets = [0u8; 6];
    let mut parts = text.split([':', '-']);
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(octets)
}

/// Six-byte hardware address. Internally the colon-separated lowercase text.
#[derive(Debug, Clone)]
pub struct MacField {
    name: String,
    default: Value,
}

impl MacField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = MacField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }
}

impl Field for MacField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(6)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Absent => Ok(Value::Absent),
            Value::Bytes(b) if b.len() == 6 => Ok(Value::Text(mac_to_text(&b))),
            Value::Text(s) => mac_from_text(&s)
                .map(|octets| Value::Text(mac_to_text(&octets)))
                .ok_or(ValueError::InvalidValueShape {
                    expected: "MAC address",
                    found: "text",
                }),
            other => Err(other.shape_error("MAC address")),
        }
    }

    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Absent => Ok(Value::Bytes(vec![0; 6])),
            Value::Text(s) => mac_from_text(s)
                .map(|octets| Value::Bytes(octets.to_vec()))
                .ok_or_else(|| value.shape_error("MAC address").into()),
            other => Err(other.shape_error("MAC address").into()),
        }
    }

    fn from_machine(&self, _ctx: &dyn Context, value: Value) -> Value {
        match value {
            Value::Bytes(b) => Value::Text(mac_to_text(&b)),
            other => other,
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        match self.to_machine(ctx, value)? {
            Value::Bytes(b) => w.write_bytes(&b),
            other => Err(other.shape_error("bytes").into()),
        }
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let bytes = r.take(6)?;
        Ok(self.from_machine(ctx, Value::Bytes(bytes.to_vec())))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Mac
    }
}

/// Parses `a.b.c.d/prefix`.
fn parse_network(text: &str) -> Option<(Ipv4Addr, u32)> {
    let (addr, prefix) = text.split_once('/')?;
    let addr: Ipv4Addr = addr.trim().parse().ok()?;
    let prefix: u32 = prefix.trim().parse().ok()?;
    (prefix <= 32).then_some((addr, prefix))
}

/// IPv4 address. Internally the dotted-quad text; network specifiers such as
/// `"10.0.0.0/8"` are kept as given and encode as their base address.
#[derive(Debug, Clone)]
pub struct IpField {
    name: String,
    default: Value,
}

impl IpField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = IpField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    fn to_address(value: &Value) -> Result<Ipv4Addr, ValueError> {
        match value {
            Value::Absent => Ok(Ipv4Addr::UNSPECIFIED),
            Value::Text(s) => {
                if let Ok(addr) = s.parse::<Ipv4Addr>() {
                    return Ok(addr);
                }
                let (addr, prefix) = parse_network(s).ok_or(ValueError::InvalidValueShape {
                    expected: "IPv4 address",
                    found: "text",
                })?;
                let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
                Ok(Ipv4Addr::from(u32::from(addr) & mask))
            }
            other => Err(other.shape_error("IPv4 address")),
        }
    }
}

impl Field for IpField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(4)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Absent => Ok(Value::Absent),
            Value::Text(s) => {
                if let Ok(addr) = s.trim().parse::<Ipv4Addr>() {
                    Ok(Value::Text(addr.to_string()))
                } else if let Some((addr, prefix)) = parse_network(&s) {
                    tracing::debug!(field = %self.name, network = %s, "keeping network specifier");
                    Ok(Value::Text(format!("{addr}/{prefix}")))
                } else {
                    Err(ValueError::InvalidValueShape {
                        expected: "IPv4 address",
                        found: "text",
                    })
                }
            }
            Value::Bytes(b) if b.len() == 4 => Ok(Value::Text(
                Ipv4Addr::new(b[0], b[1], b[2], b[3]).to_string(),
            )),
            Value::UInt(n) if n <= u32::MAX as u64 => {
                Ok(Value::Text(Ipv4Addr::from(n as u32).to_string()))
            }
            Value::List(items) => items
                .into_iter()
                .map(|item| self.to_internal(ctx, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(other.shape_error("IPv4 address")),
        }
    }

    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        Ok(Value::Bytes(Self::to_address(value)?.octets().to_vec()))
    }

    fn from_machine(&self, _ctx: &dyn Context, value: Value) -> Value {
        match value {
            Value::Bytes(b) if b.len() == 4 => {
                Value::Text(Ipv4Addr::new(b[0], b[1], b[2], b[3]).to_string())
            }
            other => other,
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        match self.to_machine(ctx, value)? {
            Value::Bytes(b) => w.write_bytes(&b),
            other => Err(other.shape_error("bytes").into()),
        }
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let bytes = r.take(4)?;
        Ok(self.from_machine(ctx, Value::Bytes(bytes.to_vec())))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Ipv4
    }
}

/// Windows NT timestamp: little-endian 64-bit count since 1601-01-01 UTC.
///
/// A [`Value::Time`] is packed as
/// `(unix_seconds + 11644473600) * 10_000_000 + microseconds`; raw tick counts
/// pass through unchanged. Decoding yields the raw tick count.
#[derive(Debug, Clone)]
pub struct NtTimeField {
    name: String,
    default: Value,
}

impl NtTimeField {
    const FORMAT: FormatDescriptor = FormatDescriptor::little(TypeCode::U64);

    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = NtTimeField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    pub fn ticks_from_time(time: &DateTime<Utc>) -> i128 {
        (time.timestamp() as i128 + NT_EPOCH_OFFSET_SECS as i128) * NT_TICKS_PER_SEC as i128
            + time.timestamp_subsec_micros() as i128
    }

    /// Inverse of [`Self::ticks_from_time`]; the sub-second part is read back as
    /// microseconds, saturating at 999 999. `None` when the tick count lies
    /// outside the calendar range.
    pub fn time_from_ticks(ticks: u64) -> Option<DateTime<Utc>> {
        let per_sec = NT_TICKS_PER_SEC as u64;
        let secs = i64::try_from(ticks / per_sec)
            .ok()?
            .checked_sub(NT_EPOCH_OFFSET_SECS)?;
        let micros = u32::try_from((ticks % per_sec).min(999_999)).ok()?;
        DateTime::from_timestamp(secs, micros.checked_mul(1_000)?)
    }
}

impl Field for NtTimeField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(8)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|t| Value::Time(t.with_timezone(&Utc)))
                .or_else(|_| normalize_number(&Self::FORMAT, Value::Text(s))),
            Value::Time(_) | Value::Absent => Ok(value),
            other => normalize_number(&Self::FORMAT, other),
        }
    }

    fn to_human(&self, _ctx: &dyn Context, value: &Value) -> Value {
        match value {
            Value::UInt(ticks) => {
                Self::time_from_ticks(*ticks).map_or(value.clone(), Value::Time)
            }
            other => other.clone(),
        }
    }

    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Time(t) => {
                let ticks = Self::ticks_from_time(t);
                u64::try_from(ticks).map(Value::UInt).map_err(|_| {
                    ValueError::OutOfRange {
                        value: ticks.to_string(),
                        bits: 64,
                    }
                    .into()
                })
            }
            other => Ok(machine_number(other)),
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        pack_format(&Self::FORMAT, w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        unpack_format(&Self::FORMAT, r)
    }

    fn random_value(&self) -> RandomValue {
        format_random(&Self::FORMAT)
    }
}

/// 16-bit fixed point with 8 fractional bits: machine value `trunc(256 * x)`.
#[derive(Debug, Clone)]
pub struct BcdFloatField {
    name: String,
    default: Value,
}

impl BcdFloatField {
    const FORMAT: FormatDescriptor = FormatDescriptor::big(TypeCode::U16);

    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = BcdFloatField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }
}

impl Field for BcdFloatField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(Self::FORMAT.byte_size)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        if value.is_absent() {
            return Ok(value);
        }
        let x = value.as_f64().ok_or_else(|| value.shape_error("number"))?;
        // Snap to the representable grid so decode(encode(x)) == x.
        Ok(Value::Float((x * 256.0).trunc() / 256.0))
    }

    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Absent => Ok(Value::UInt(0)),
            v => {
                let x = v.as_f64().ok_or_else(|| v.shape_error("number"))?;
                Ok(Value::Int((x * 256.0) as i64))
            }
        }
    }

    fn from_machine(&self, _ctx: &dyn Context, value: Value) -> Value {
        value
            .as_f64()
            .map_or(value, |raw| Value::Float(raw / 256.0))
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        pack_format(&Self::FORMAT, w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        Ok(self.from_machine(ctx, unpack_format(&Self::FORMAT, r)?))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Unsigned { max: 255 }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone};

    use super::*;

    #[test]
    fn test_short_big_and_little_endian() {
        let be = NumField::short("a", 0x0102u16);
        let le = NumField::le_short("b", 0x0102u16);
        assert_eq!(be.encode_standalone(&be.default_value()).unwrap(), vec![1, 2]);
        assert_eq!(le.encode_standalone(&le.default_value()).unwrap(), vec![2, 1]);
        assert_eq!(
            le.decode_standalone(&[2, 1, 9]).unwrap(),
            (&[9u8][..], Value::UInt(0x0102))
        );
    }

    #[test]
    fn test_absent_encodes_as_zero() {
        let f = NumField::int("n", Value::Absent);
        assert_eq!(f.encode_standalone(&Value::Absent).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_signed_and_out_of_range() {
        let f = NumField::le_signed_int("s", -5);
        assert_eq!(f.default_value(), Value::Int(-5));
        let bytes = f.encode_standalone(&Value::Int(-5)).unwrap();
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, Value::Int(-5));

        let byte = NumField::byte("b", 0u8);
        assert!(matches!(
            byte.to_internal(&Detached, Value::UInt(300)),
            Err(ValueError::OutOfRange { bits: 8, .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        let f = NumField::long("l", 0u64);
        assert_eq!(
            f.decode_standalone(&[1, 2, 3]).unwrap_err(),
            ReadError::TruncatedInput {
                needed: 8,
                available: 3
            }
        );
    }

    #[test]
    fn test_to_internal_is_idempotent() {
        let f = NumField::float("f", 0.0);
        let once = f.to_internal(&Detached, Value::Float(0.1)).unwrap();
        let twice = f.to_internal(&Detached, once.clone()).unwrap();
        assert_eq!(once, twice);
        let bytes = f.encode_standalone(&once).unwrap();
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, once);
    }

    #[test]
    fn test_hex_repr() {
        let f = NumField::short("x", 255u16).hex();
        assert_eq!(f.to_repr(&Detached, &f.default_value()), "0xff");
        assert_eq!(f.to_repr(&Detached, &Value::Absent), "0x0");
        let plain = NumField::short("y", 255u16);
        assert_eq!(plain.to_repr(&Detached, &plain.default_value()), "255");
    }

    #[test]
    fn test_three_bytes() {
        let f = ThreeBytesField::new("t", 0x010203u32);
        let bytes = f.encode_standalone(&f.default_value()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, Value::UInt(0x010203));
        assert_eq!(f.to_repr(&Detached, &Value::UInt(0x010203)), "0x10203");
        assert!(f.to_internal(&Detached, Value::UInt(0x0100_0000)).is_err());
    }

    #[test]
    fn test_mac() {
        let f = MacField::new("mac", "00:1A:2b:3c:4d:5e");
        assert_eq!(f.default_value(), Value::from("00:1a:2b:3c:4d:5e"));
        let bytes = f.encode_standalone(&f.default_value()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, f.default_value());
        assert_eq!(f.encode_standalone(&Value::Absent).unwrap(), vec![0; 6]);
        assert!(f.to_internal(&Detached, Value::from("00:11")).is_err());
    }

    #[test]
    fn test_ip() {
        let f = IpField::new("ip", "192.168.1.10");
        let bytes = f.encode_standalone(&f.default_value()).unwrap();
        assert_eq!(bytes, vec![192, 168, 1, 10]);
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, Value::from("192.168.1.10"));
    }

    #[test]
    fn test_ip_network_specifier_and_invalid() {
        let f = IpField::new("ip", Value::Absent);
        let net = f.to_internal(&Detached, Value::from("10.1.2.3/8")).unwrap();
        assert_eq!(net, Value::from("10.1.2.3/8"));
        assert_eq!(f.encode_standalone(&net).unwrap(), vec![10, 0, 0, 0]);
        assert!(f.to_internal(&Detached, Value::from("not-an-ip")).is_err());

        let list = f
            .to_internal(&Detached, Value::List(vec!["1.2.3.4".into(), "5.6.7.8".into()]))
            .unwrap();
        assert_eq!(list.as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_nt_time() {
        let f = NtTimeField::new("t", Value::Absent);
        let time = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        let bytes = f.encode_standalone(&Value::Time(time)).unwrap();
        let expected: u64 = (1 + 11_644_473_600) * 10_000_000;
        assert_eq!(bytes, expected.to_le_bytes().to_vec());

        let (_, raw) = f.decode_standalone(&bytes).unwrap();
        assert_eq!(raw, Value::UInt(expected));
        assert_eq!(f.to_human(&Detached, &raw), Value::Time(time));
    }

    #[test]
    fn test_nt_time_extreme_tick_counts() {
        let f = NtTimeField::new("t", Value::Absent);
        let (_, raw) = f.decode_standalone(&[0xff; 8]).unwrap();
        assert_eq!(raw, Value::UInt(u64::MAX));
        let Value::Time(time) = f.to_human(&Detached, &raw) else {
            panic!("expected a timestamp");
        };
        assert!(time.year() > 50_000);
        assert_eq!(time.timestamp_subsec_micros(), 999_999);
        assert!(!f.to_repr(&Detached, &raw).is_empty());

        let high = u64::from_le_bytes([1, 0, 0, 0, 0, 0, 0, 0x80]);
        let time = NtTimeField::time_from_ticks(high).unwrap();
        assert_eq!(time.timestamp_subsec_micros(), 999_999);
    }

    #[test]
    fn test_bcd_float() {
        let f = BcdFloatField::new("b", 1.5);
        let bytes = f.encode_standalone(&f.default_value()).unwrap();
        assert_eq!(bytes, vec![0x01, 0x80]);
        assert_eq!(f.decode_standalone(&bytes).unwrap().1, Value::Float(1.5));
    }
}
