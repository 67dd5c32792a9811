//! Byte-string fields. Internal values are [`Value::Bytes`].
//!
//! Terminator scans never fail: when the terminator is missing, the whole
//! remaining input becomes the value.

use crate::{
    bits::{WireReader, WireWriter},
    errors::{ReadError, ValueError, WriteError},
    field::{Context, Field, LengthFrom, field_basics},
    random::{MAX_RANDOM_LEN, RandomValue},
    scalar::normalized_default,
    value::{Value, bytes_repr},
};

/// Converts any accepted input to bytes. Text must be ASCII; numbers are
/// rendered in decimal.
pub(crate) fn to_byte_string(value: Value) -> Result<Value, ValueError> {
    match value {
        Value::Absent | Value::Bytes(_) => Ok(value),
        Value::Text(s) if s.is_ascii() => Ok(Value::Bytes(s.into_bytes())),
        Value::Text(_) => Err(ValueError::InvalidValueShape {
            expected: "ASCII text",
            found: "non-ASCII text",
        }),
        v @ (Value::UInt(_) | Value::Int(_) | Value::Float(_)) => {
            Ok(Value::Bytes(v.to_string().into_bytes()))
        }
        other => Err(other.shape_error("bytes")),
    }
}

fn bytes_of(value: &Value) -> Result<&[u8], WriteError> {
    match value {
        Value::Absent => Ok(&[]),
        Value::Bytes(b) => Ok(b),
        other => Err(other.shape_error("bytes").into()),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Raw byte string taking the rest of the input, minus an optional trailing
/// window of `remain` bytes.
#[derive(Debug, Clone)]
pub struct StrField {
    name: String,
    default: Value,
    remain: usize,
}

impl StrField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = StrField {
            name: name.into(),
            default: Value::Absent,
            remain: 0,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    /// Leaves the last `remain` bytes of the input for the following fields.
    pub fn with_remain(mut self, remain: usize) -> Self {
        self.remain = remain;
        self
    }
}

impl Field for StrField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(bytes_of(value)?.len())
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        to_byte_string(value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        w.write_bytes(bytes_of(value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let available = r.remaining()?.len();
        let bytes = r.take(available.saturating_sub(self.remain))?;
        Ok(Value::Bytes(bytes.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Bytes {
            min_len: 0,
            max_len: MAX_RANDOM_LEN,
        }
    }
}

/// Byte string of a length given by a literal or by the context. A negative
/// length means the value's own length on encode.
#[derive(Debug, Clone)]
pub struct StrFixedLenField {
    name: String,
    default: Value,
    length: LengthFrom,
}

impl StrFixedLenField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        length: impl Into<LengthFrom>,
    ) -> Self {
        let mut field = StrFixedLenField {
            name: name.into(),
            default: Value::Absent,
            length: length.into(),
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    fn wire_len(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        let l = self.length.resolve(ctx)?;
        if l < 0 {
            Ok(bytes_of(value)?.len())
        } else {
            Ok(l as usize)
        }
    }
}

impl Field for StrFixedLenField {
    field_basics!();

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.wire_len(ctx, value)
    }

    /// The content, so a length field may govern this field.
    fn len_of(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(bytes_of(value)?.len())
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        to_byte_string(value)
    }

    /// Shown without trailing NUL padding.
    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        match value {
            Value::Bytes(b) => {
                let end = b.iter().rposition(|c| *c != 0).map_or(0, |i| i + 1);
                bytes_repr(&b[..end])
            }
            other => other.to_string(),
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        let l = self.wire_len(ctx, value)?;
        let mut bytes = bytes_of(value)?.to_vec();
        bytes.resize(l, 0);
        w.write_bytes(&bytes)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let l = self.length.resolve_len(ctx)?;
        Ok(Value::Bytes(r.take(l)?.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        match self.length {
            LengthFrom::Fixed(n) if n >= 0 => RandomValue::Bytes {
                min_len: n as usize,
                max_len: n as usize,
            },
            _ => RandomValue::Bytes {
                min_len: 0,
                max_len: 200,
            },
        }
    }

    fn references(&self) -> Vec<&str> {
        self.length.reference().into_iter().collect()
    }
}

/// Byte string whose decode length comes from the context. Encoding writes the
/// whole value.
#[derive(Debug, Clone)]
pub struct StrLenField {
    name: String,
    default: Value,
    length: LengthFrom,
}

impl StrLenField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        length: impl Into<LengthFrom>,
    ) -> Self {
        let mut field = StrLenField {
            name: name.into(),
            default: Value::Absent,
            length: length.into(),
        };
        field.default = normalized_default(&field, default.into());
        field
    }
}

impl Field for StrLenField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(bytes_of(value)?.len())
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        to_byte_string(value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        w.write_bytes(bytes_of(value)?)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let l = self.length.resolve_len(ctx)?;
        Ok(Value::Bytes(r.take(l)?.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Bytes {
            min_len: 0,
            max_len: MAX_RANDOM_LEN,
        }
    }

    fn references(&self) -> Vec<&str> {
        self.length.reference().into_iter().collect()
    }
}

/// NetBIOS first-level encoded name: one space byte, then every name byte as
/// two characters `'A' + nibble`, the name padded with spaces to `length / 2`
/// characters.
#[derive(Debug, Clone)]
pub struct NetBiosNameField {
    name: String,
    default: Value,
    length: usize,
}

impl NetBiosNameField {
    pub const DEFAULT_LENGTH: usize = 32;

    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_length(name, default, Self::DEFAULT_LENGTH)
    }

    /// `length` is the number of mangled characters after the leading space.
    pub fn with_length(name: impl Into<String>, default: impl Into<Value>, length: usize) -> Self {
        let mut field = NetBiosNameField {
            name: name.into(),
            default: Value::Absent,
            length,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    fn name_chars(&self) -> usize {
        self.length / 2
    }

    pub fn mangle(&self, name: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.length);
        out.push(b' ');
        let padded = name.iter().copied().chain(std::iter::repeat(b' '));
        for c in padded.take(self.name_chars()) {
            out.push(b'A' + (c >> 4));
            out.push(b'A' + (c & 0x0f));
        }
        out
    }

    pub fn unmangle(raw: &[u8]) -> Vec<u8> {
        let trimmed = trim_bytes(raw, |c| c == 0 || c == b' ');
        let mut name: Vec<u8> = trimmed
            .chunks_exact(2)
            .map(|pair| ((pair[0].wrapping_sub(1) & 0x0f) << 4) | (pair[1].wrapping_sub(1) & 0x0f))
            .collect();
        while name.last() == Some(&b' ') {
            name.pop();
        }
        name
    }
}

fn trim_bytes(bytes: &[u8], strip: impl Fn(u8) -> bool) -> &[u8] {
    let start = bytes.iter().position(|c| !strip(*c)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|c| !strip(*c)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

impl Field for NetBiosNameField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(1 + self.name_chars() * 2)
    }

    /// Names longer than the field are cut; trailing spaces are padding.
    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match to_byte_string(value)? {
            Value::Bytes(mut b) => {
                b.truncate(self.name_chars());
                while b.last() == Some(&b' ') {
                    b.pop();
                }
                Ok(Value::Bytes(b))
            }
            other => Ok(other),
        }
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        w.write_bytes(&self.mangle(bytes_of(value)?))
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let raw = r.take(1 + self.name_chars() * 2)?;
        Ok(Value::Bytes(Self::unmangle(raw)))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Bytes {
            min_len: 0,
            max_len: self.name_chars(),
        }
    }
}

/// NUL-terminated byte string. The stored value includes the terminator.
#[derive(Debug, Clone)]
pub struct StrNullField {
    name: String,
    default: Value,
}

impl StrNullField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = StrNullField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }
}

impl Field for StrNullField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(bytes_of(value)?.len())
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match to_byte_string(value)? {
            Value::Bytes(mut b) => {
                if b.last() != Some(&0) {
                    b.push(0);
                }
                Ok(Value::Bytes(b))
            }
            other => Ok(other),
        }
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        match value {
            Value::Bytes(b) => bytes_repr(b.strip_suffix(&[0]).unwrap_or(b)),
            other => other.to_string(),
        }
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        w.write_bytes(bytes_of(value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let rest = r.remaining()?;
        let end = match rest.iter().position(|c| *c == 0) {
            Some(i) => i + 1,
            None => {
                tracing::debug!(field = %self.name, len = rest.len(), "no NUL terminator, taking the rest");
                rest.len()
            }
        };
        Ok(Value::Bytes(r.take(end)?.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Terminated {
            max_len: MAX_RANDOM_LEN,
            terminator: vec![0],
        }
    }
}

/// NUL-terminated UTF-16LE string. The stored value is the encoded bytes
/// including the `00 00` terminator.
#[derive(Debug, Clone)]
pub struct UnicodeNullField {
    name: String,
    default: Value,
}

impl UnicodeNullField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = UnicodeNullField {
            name: name.into(),
            default: Value::Absent,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    /// End of the first word-aligned `00 00`, terminator included.
    fn terminator_end(bytes: &[u8]) -> Option<usize> {
        bytes
            .chunks_exact(2)
            .position(|pair| pair == [0, 0])
            .map(|i| (i + 1) * 2)
    }

    /// Text up to the first NUL code unit.
    pub fn text_of(bytes: &[u8]) -> String {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

impl Field for UnicodeNullField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        match value {
            Value::Absent => Ok(2),
            v => Ok(bytes_of(v)?.len()),
        }
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        let mut bytes = match value {
            Value::Absent => return Ok(Value::Absent),
            Value::Text(s) => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Value::Bytes(b) => b,
            other => return Err(other.shape_error("text")),
        };
        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }
        match Self::terminator_end(&bytes) {
            Some(end) => bytes.truncate(end),
            None => bytes.extend_from_slice(&[0, 0]),
        }
        Ok(Value::Bytes(bytes))
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        match value {
            Value::Absent => String::new(),
            Value::Bytes(b) => Self::text_of(b),
            other => other.to_string(),
        }
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        match value {
            Value::Absent => w.write_bytes(&[0, 0]),
            v => w.write_bytes(bytes_of(v)?),
        }
    }

    /// Scans word-aligned offsets only, never past the end of the input.
    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let rest = r.remaining()?;
        let end = match Self::terminator_end(rest) {
            Some(end) => end,
            None => {
                tracing::debug!(field = %self.name, len = rest.len(), "no UTF-16 terminator, taking the rest");
                rest.len()
            }
        };
        Ok(Value::Bytes(r.take(end)?.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Utf16Terminated {
            max_units: MAX_RANDOM_LEN / 2,
        }
    }
}

/// Byte string running through a stop marker plus `additional` bytes.
#[derive(Debug, Clone)]
pub struct StrStopField {
    name: String,
    default: Value,
    stop: Vec<u8>,
    additional: usize,
}

impl StrStopField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        stop: impl Into<Vec<u8>>,
    ) -> Self {
        let mut field = StrStopField {
            name: name.into(),
            default: Value::Absent,
            stop: stop.into(),
            additional: 0,
        };
        field.default = normalized_default(&field, default.into());
        field
    }

    /// Also consumes this many bytes after the marker.
    pub fn with_additional(mut self, additional: usize) -> Self {
        self.additional = additional;
        self
    }
}

impl Field for StrStopField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(bytes_of(value)?.len())
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        to_byte_string(value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        w.write_bytes(bytes_of(value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let rest = r.remaining()?;
        let end = match find(rest, &self.stop) {
            Some(i) => (i + self.stop.len() + self.additional).min(rest.len()),
            None => {
                tracing::debug!(field = %self.name, "stop marker not found, taking the rest");
                rest.len()
            }
        };
        Ok(Value::Bytes(r.take(end)?.to_vec()))
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Terminated {
            max_len: MAX_RANDOM_LEN,
            terminator: self.stop.clone(),
        }
    }
}

/// Optional fixed separator: present on the wire only when the bytes match the
/// marker exactly.
#[derive(Debug, Clone)]
pub struct FixGapField {
    name: String,
    marker: Vec<u8>,
}

impl FixGapField {
    pub fn new(name: impl Into<String>, marker: impl Into<Vec<u8>>) -> Self {
        FixGapField {
            name: name.into(),
            marker: marker.into(),
        }
    }

    fn is_marker(&self, value: &Value) -> bool {
        value.as_bytes() == Some(self.marker.as_slice())
    }
}

impl Field for FixGapField {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> Value {
        Value::Bytes(self.marker.clone())
    }

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        Ok(if self.is_marker(value) {
            self.marker.len()
        } else {
            0
        })
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        to_byte_string(value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        if self.is_marker(value) {
            w.write_bytes(&self.marker)?;
        }
        Ok(())
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        if r.peek(self.marker.len()) == Some(self.marker.as_slice()) {
            r.skip(self.marker.len());
            Ok(Value::Bytes(self.marker.clone()))
        } else {
            Ok(Value::Bytes(Vec::new()))
        }
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Constant(Value::Bytes(self.marker.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Detached, length::FieldLenField, message::Message, schema::Schema};

    #[test]
    fn test_fixed_len_governed_by_its_length_field() {
        let schema = Schema::builder("Blob")
            .field(FieldLenField::length_of("len", "data").with_format("B").unwrap())
            .field(StrFixedLenField::new("data", Value::Absent, LengthFrom::field("len")))
            .build()
            .unwrap();
        let mut msg = Message::new(&schema);
        msg.set("data", "abc").unwrap();
        let bytes = msg.build().unwrap();
        assert_eq!(bytes, vec![3, b'a', b'b', b'c']);

        let parsed = schema.dissect(&bytes).unwrap();
        assert_eq!(parsed.get("len"), Some(&Value::UInt(3)));
        assert_eq!(parsed.get("data"), Some(&Value::from(b"abc")));
    }

    #[test]
    fn test_str_field_takes_rest_minus_remain() {
        let field = StrField::new("s", Value::Absent).with_remain(2);
        let (rest, value) = field.decode_standalone(b"abcdXY").unwrap();
        assert_eq!(value, Value::from(b"abcd"));
        assert_eq!(rest, b"XY");

        let (rest, value) = field.decode_standalone(b"X").unwrap();
        assert_eq!(value, Value::from(b""));
        assert_eq!(rest, b"X");
    }

    #[test]
    fn test_str_field_conversions() {
        let field = StrField::new("s", "hi");
        assert_eq!(field.default_value(), Value::from(b"hi"));
        assert_eq!(field.size(&Detached, &Value::from(b"abc")).unwrap(), 3);
        assert_eq!(field.size(&Detached, &Value::Absent).unwrap(), 0);
        assert!(field.to_internal(&Detached, Value::from("é")).is_err());
        assert_eq!(
            field.to_internal(&Detached, Value::UInt(42)).unwrap(),
            Value::from(b"42")
        );
    }

    #[test]
    fn test_fixed_len_pads_and_truncates() {
        let field = StrFixedLenField::new("s", b"ab", 4usize);
        assert_eq!(field.encode_standalone(&field.default_value()).unwrap(), b"ab\0\0");
        assert_eq!(field.encode_standalone(&Value::from(b"abcdef")).unwrap(), b"abcd");
        assert_eq!(field.to_repr(&Detached, &Value::from(b"ab\0\0")), "b\"ab\"");

        let (rest, value) = field.decode_standalone(b"wxyz!").unwrap();
        assert_eq!(value, Value::from(b"wxyz"));
        assert_eq!(rest, b"!");
        assert!(field.decode_standalone(b"wx").is_err());
    }

    #[test]
    fn test_fixed_len_negative_uses_value_length() {
        let field = StrFixedLenField::new("s", Value::Absent, LengthFrom::Fixed(-1));
        let value = Value::from(b"hello");
        assert_eq!(field.size(&Detached, &value).unwrap(), 5);
        assert_eq!(field.encode_standalone(&value).unwrap(), b"hello");
    }

    #[test]
    fn test_netbios_round_trip() {
        let field = NetBiosNameField::new("name", "TEST");
        let bytes = field.encode_standalone(&field.default_value()).unwrap();
        assert_eq!(bytes.len(), 33);
        assert_eq!(&bytes[..9], b" FEEFFDFE");
        assert_eq!(&bytes[9..11], b"CA");
        let (rest, value) = field.decode_standalone(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, Value::from(b"TEST"));
    }

    #[test]
    fn test_null_terminated() {
        let field = StrNullField::new("s", "abc");
        assert_eq!(field.default_value(), Value::from(b"abc\0"));
        assert_eq!(field.to_repr(&Detached, &field.default_value()), "b\"abc\"");

        let (rest, value) = field.decode_standalone(b"hi\0rest").unwrap();
        assert_eq!(value, Value::from(b"hi\0"));
        assert_eq!(rest, b"rest");

        let (rest, value) = field.decode_standalone(b"unterminated").unwrap();
        assert_eq!(value, Value::from(b"unterminated"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_unicode_null() {
        let field = UnicodeNullField::new("u", Value::Absent);
        let value = field.to_internal(&Detached, Value::from("ab")).unwrap();
        assert_eq!(value, Value::from(b"a\0b\0\0\0"));
        let bytes = field.encode_standalone(&value).unwrap();
        let (rest, decoded) = field.decode_standalone(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(field.to_repr(&Detached, &decoded), "ab");
        assert_eq!(field.encode_standalone(&Value::Absent).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_unicode_odd_length_keeps_single_terminator() {
        let field = UnicodeNullField::new("u", Value::Absent);
        let inputs: [&[u8]; 4] = [&[0x61, 0, 0], &[0x61], &[0, 0, 0x62, 0], &[0x61, 0, 0, 0, 0x62, 0]];
        for input in inputs {
            let value = field.to_internal(&Detached, Value::Bytes(input.to_vec())).unwrap();
            assert_eq!(field.to_internal(&Detached, value.clone()).unwrap(), value);
            let bytes = field.encode_standalone(&value).unwrap();
            let (rest, decoded) = field.decode_standalone(&bytes).unwrap();
            assert!(rest.is_empty(), "{input:?} left {rest:?}");
            assert_eq!(decoded, value);
        }
        let value = field.to_internal(&Detached, Value::Bytes(vec![0x61, 0, 0])).unwrap();
        assert_eq!(value, Value::from(b"a\0\0\0"));
    }

    #[test]
    fn test_unicode_scan_is_word_aligned_and_bounded() {
        let field = UnicodeNullField::new("u", Value::Absent);
        // `00 00` at an odd offset is not a terminator.
        let (rest, value) = field.decode_standalone(b"a\0\0b\0\0\0z").unwrap();
        assert_eq!(value, Value::from(b"a\0\0b\0\0"));
        assert_eq!(rest, b"\0z");

        let (rest, value) = field.decode_standalone(b"a\0b").unwrap();
        assert_eq!(value, Value::from(b"a\0b"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_stop_field() {
        let field = StrStopField::new("s", Value::Absent, b"\r\n".to_vec()).with_additional(1);
        let (rest, value) = field.decode_standalone(b"GET /\r\nXYZ").unwrap();
        assert_eq!(value, Value::from(b"GET /\r\nX"));
        assert_eq!(rest, b"YZ");

        let (rest, value) = field.decode_standalone(b"no marker").unwrap();
        assert_eq!(value, Value::from(b"no marker"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_fix_gap() {
        let field = FixGapField::new("gap", b"\0\0".to_vec());
        let (rest, value) = field.decode_standalone(b"\0\0ab").unwrap();
        assert_eq!(value, Value::from(b"\0\0"));
        assert_eq!(rest, b"ab");

        let (rest, value) = field.decode_standalone(b"\0ab").unwrap();
        assert_eq!(value, Value::from(b""));
        assert_eq!(rest, b"\0ab");

        assert_eq!(field.encode_standalone(&Value::from(b"zz")).unwrap(), b"");
        assert_eq!(field.size(&Detached, &field.default_value()).unwrap(), 2);
    }
}
