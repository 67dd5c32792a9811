//! Fields holding sub-messages or lists of values.
//!
//! A sub-message decoded from the middle of a buffer usually does not consume
//! all of it. Whatever its schema leaves over is detached from the sub-message
//! and handed back to the enclosing decode as unconsumed input.

use std::sync::Arc;

use crate::{
    bits::{WireReader, WireWriter},
    errors::{ReadError, ValueError, WriteError},
    field::{Context, Field, FieldRef, LengthFrom, ListBound, field_basics},
    message::Message,
    random::RandomValue,
    schema::Schema,
    value::Value,
};

const RANDOM_LIST_LEN: usize = 4;

fn message_of(value: &Value) -> Result<Option<&Message>, WriteError> {
    match value {
        Value::Absent => Ok(None),
        Value::Message(m) => Ok(Some(m)),
        other => Err(other.shape_error("message").into()),
    }
}

fn message_to_internal(schema: &Arc<Schema>, value: Value) -> Result<Value, ValueError> {
    match value {
        Value::Absent | Value::Message(_) => Ok(value),
        Value::Bytes(bytes) => schema
            .dissect(&bytes)
            .map(Value::from)
            .map_err(|_| ValueError::InvalidValueShape {
                expected: "message",
                found: "undecodable bytes",
            }),
        other => Err(other.shape_error("message")),
    }
}

fn copy_message(value: &Value) -> Value {
    match value {
        Value::Message(m) => Value::from(m.copy()),
        Value::List(items) => Value::List(items.iter().map(copy_message).collect()),
        other => other.clone(),
    }
}

/// Dissects `data` and splits off what the sub-message left over. Returns the
/// message and the number of bytes it consumed.
fn dissect_detached(schema: &Arc<Schema>, data: &[u8]) -> Result<(Message, usize), ReadError> {
    let mut msg = schema.dissect(data)?;
    let leftover = msg.take_trailing().map_or(0, |t| t.len());
    Ok((msg, data.len() - leftover))
}

/// Resolves a count or length bound; negative values count as zero.
fn resolve_bound(from: &LengthFrom, ctx: &dyn Context) -> Result<usize, ReadError> {
    Ok(from.resolve_len(ctx)?)
}

/// A single sub-message taking as much of the input as its schema consumes.
#[derive(Debug, Clone)]
pub struct PacketField {
    name: String,
    default: Value,
    schema: Arc<Schema>,
}

impl PacketField {
    pub fn new(name: impl Into<String>, default: impl Into<Value>, schema: Arc<Schema>) -> Self {
        PacketField {
            name: name.into(),
            default: default.into(),
            schema,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl Field for PacketField {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> Value {
        copy_message(&self.default)
    }

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        message_of(value)?.map_or(Ok(0), Message::wire_len)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        message_to_internal(&self.schema, value)
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        match message_of(value)? {
            Some(msg) => w.write_bytes(&msg.build()?),
            None => Ok(()),
        }
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let (msg, consumed) = dissect_detached(&self.schema, r.remaining()?)?;
        r.skip(consumed);
        Ok(Value::from(msg))
    }

    fn copy_value(&self, value: &Value) -> Value {
        copy_message(value)
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::Message(Arc::clone(&self.schema))
    }

    fn holds_messages(&self) -> bool {
        true
    }
}

/// A sub-message occupying exactly `length` bytes. A slice that does not
/// dissect becomes a raw placeholder message.
#[derive(Debug, Clone)]
pub struct PacketLenField {
    packet: PacketField,
    length: LengthFrom,
}

impl PacketLenField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        schema: Arc<Schema>,
        length: impl Into<LengthFrom>,
    ) -> Self {
        PacketLenField {
            packet: PacketField::new(name, default, schema),
            length: length.into(),
        }
    }
}

impl Field for PacketLenField {
    fn name(&self) -> &str {
        self.packet.name()
    }

    fn default_value(&self) -> Value {
        self.packet.default_value()
    }

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.packet.size(ctx, value)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        self.packet.to_internal(ctx, value)
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.packet.encode(ctx, w, value)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let len = resolve_bound(&self.length, ctx)?;
        let slice = r.take(len)?;
        match self.packet.schema.dissect(slice) {
            Ok(msg) => Ok(Value::from(msg)),
            Err(err) => {
                tracing::debug!(
                    field = %self.packet.name,
                    schema = %self.packet.schema.name(),
                    error = %err,
                    "nested decode failed, keeping raw bytes"
                );
                Ok(Value::from(Message::raw(slice)))
            }
        }
    }

    fn copy_value(&self, value: &Value) -> Value {
        copy_message(value)
    }

    fn random_value(&self) -> RandomValue {
        self.packet.random_value()
    }

    fn references(&self) -> Vec<&str> {
        self.length.reference().into_iter().collect()
    }

    fn holds_messages(&self) -> bool {
        true
    }
}

/// A list of sub-messages, bounded by element count, byte length, or the end of
/// the input.
#[derive(Debug, Clone)]
pub struct PacketListField {
    name: String,
    default: Value,
    schema: Arc<Schema>,
    bound: ListBound,
}

impl PacketListField {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>, bound: ListBound) -> Self {
        PacketListField {
            name: name.into(),
            default: Value::List(Vec::new()),
            schema,
            bound,
        }
    }

    fn messages<'v>(&self, value: &'v Value) -> Result<Vec<&'v Message>, WriteError> {
        match value {
            Value::Absent => Ok(Vec::new()),
            Value::Message(m) => Ok(vec![m]),
            Value::List(items) => items
                .iter()
                .map(|item| message_of(item)?.ok_or_else(|| item.shape_error("message").into()))
                .collect(),
            other => Err(other.shape_error("list of messages").into()),
        }
    }
}

impl Field for PacketListField {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> Value {
        copy_message(&self.default)
    }

    fn size(&self, _ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.messages(value)?
            .into_iter()
            .map(Message::wire_len)
            .sum()
    }

    fn count_of(&self, _ctx: &dyn Context, value: &Value) -> usize {
        match value {
            Value::List(items) => items.len(),
            Value::Absent => 0,
            _ => 1,
        }
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Absent => Ok(Value::List(Vec::new())),
            Value::List(items) => items
                .into_iter()
                .map(|item| message_to_internal(&self.schema, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            single => Ok(Value::List(vec![message_to_internal(&self.schema, single)?])),
        }
    }

    fn encode(
        &self,
        _ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        for msg in self.messages(value)? {
            w.write_bytes(&msg.build()?)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let rest = r.remaining()?;
        let (window, mut count) = match &self.bound {
            ListBound::Unbounded => (rest, None),
            ListBound::Count(from) => (rest, Some(resolve_bound(from, ctx)?)),
            ListBound::Length(from) => {
                let len = resolve_bound(from, ctx)?;
                if len > rest.len() {
                    return Err(ReadError::TruncatedInput {
                        needed: len,
                        available: rest.len(),
                    });
                }
                (&rest[..len], None)
            }
        };

        let mut items = Vec::new();
        let mut offset = 0;
        while offset < window.len() {
            if let Some(c) = count.as_mut() {
                if *c == 0 {
                    break;
                }
                *c -= 1;
            }
            let (msg, consumed) = dissect_detached(&self.schema, &window[offset..])?;
            if consumed == 0 {
                tracing::warn!(field = %self.name, offset, "list element consumed no input, stopping");
                break;
            }
            offset += consumed;
            items.push(Value::from(msg));
        }

        r.skip(offset);
        Ok(Value::List(items))
    }

    fn copy_value(&self, value: &Value) -> Value {
        copy_message(value)
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::List {
            element: Box::new(RandomValue::Message(Arc::clone(&self.schema))),
            max_len: RANDOM_LIST_LEN,
        }
    }

    fn references(&self) -> Vec<&str> {
        self.bound.reference().into_iter().collect()
    }

    fn is_list(&self) -> bool {
        true
    }

    fn holds_messages(&self) -> bool {
        true
    }
}

/// A list of values of any single field type, bounded like [`PacketListField`].
/// Bit-packed elements share the carry with each other.
#[derive(Debug, Clone)]
pub struct FieldListField {
    name: String,
    default: Value,
    inner: FieldRef,
    bound: ListBound,
}

impl FieldListField {
    pub fn new(
        name: impl Into<String>,
        default: Vec<Value>,
        inner: impl Field + 'static,
        bound: ListBound,
    ) -> Self {
        let inner = inner.into_ref();
        let default = default
            .into_iter()
            .map(|v| {
                inner
                    .to_internal(&crate::field::Detached, v.clone())
                    .unwrap_or(v)
            })
            .collect();
        FieldListField {
            name: name.into(),
            default: Value::List(default),
            inner,
            bound,
        }
    }

    fn items<'v>(&self, value: &'v Value) -> &'v [Value] {
        match value {
            Value::List(items) => items,
            Value::Absent => &[],
            single => std::slice::from_ref(single),
        }
    }

    fn decode_until_empty(
        &self,
        ctx: &dyn Context,
        r: &mut WireReader<'_>,
        mut count: Option<usize>,
    ) -> Result<Vec<Value>, ReadError> {
        let mut items = Vec::new();
        while !r.is_empty() {
            if let Some(c) = count.as_mut() {
                if *c == 0 {
                    break;
                }
                *c -= 1;
            }
            let before = r.bit_position();
            let value = self.inner.decode(ctx, r)?;
            if r.bit_position() == before {
                tracing::warn!(field = %self.name, "list element consumed no input, stopping");
                break;
            }
            items.push(value);
        }
        Ok(items)
    }
}

impl Field for FieldListField {
    field_basics!();

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.items(value)
            .iter()
            .map(|item| self.inner.size(ctx, item))
            .sum()
    }

    fn len_of(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.items(value)
            .iter()
            .map(|item| self.inner.len_of(ctx, item))
            .sum()
    }

    fn count_of(&self, _ctx: &dyn Context, value: &Value) -> usize {
        self.items(value).len()
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        let items = match value {
            Value::Absent => Vec::new(),
            Value::List(items) => items,
            single => vec![single],
        };
        items
            .into_iter()
            .map(|item| self.inner.to_internal(ctx, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
        let parts: Vec<String> = self
            .items(value)
            .iter()
            .map(|item| self.inner.to_repr(ctx, item))
            .collect();
        format!("[{}]", parts.join(", "))
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        for item in self.items(value) {
            self.inner.encode(ctx, w, item)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        let items = match &self.bound {
            ListBound::Unbounded => self.decode_until_empty(ctx, r, None)?,
            ListBound::Count(from) => {
                let count = resolve_bound(from, ctx)?;
                self.decode_until_empty(ctx, r, Some(count))?
            }
            ListBound::Length(from) => {
                let len = resolve_bound(from, ctx)?;
                let window = r.take(len)?;
                let mut sub = WireReader::new(window);
                let items = self.decode_until_empty(ctx, &mut sub, None)?;
                if !sub.is_empty() {
                    tracing::debug!(field = %self.name, "list window not fully consumed");
                }
                items
            }
        };
        Ok(Value::List(items))
    }

    fn copy_value(&self, value: &Value) -> Value {
        Value::List(
            self.items(value)
                .iter()
                .map(|item| self.inner.copy_value(item))
                .collect(),
        )
    }

    fn random_value(&self) -> RandomValue {
        RandomValue::List {
            element: Box::new(self.inner.random_value()),
            max_len: RANDOM_LIST_LEN * 2,
        }
    }

    fn references(&self) -> Vec<&str> {
        let mut refs = self.inner.references();
        refs.extend(self.bound.reference());
        refs
    }

    fn is_list(&self) -> bool {
        true
    }

    fn holds_messages(&self) -> bool {
        self.inner.holds_messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bitfield::BitField,
        field::Detached,
        length::FieldLenField,
        scalar::NumField,
        strings::StrLenField,
    };

    fn tlv() -> Arc<Schema> {
        Schema::compile(
            "Tlv",
            vec![
                NumField::byte("type", 0u8).into_ref(),
                NumField::byte("len", 0u8).into_ref(),
                StrLenField::new("value", Value::Absent, LengthFrom::field("len")).into_ref(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_packet_field_detaches_leftover() {
        let field = PacketField::new("hdr", Value::Absent, tlv());
        let (rest, value) = field.decode_standalone(&[1, 2, 0xaa, 0xbb, 0xcc, 0xdd]).unwrap();
        assert_eq!(rest, &[0xcc, 0xdd]);
        let msg = value.as_message().unwrap();
        assert_eq!(msg.get("value"), Some(&Value::Bytes(vec![0xaa, 0xbb])));
        assert!(msg.trailing().is_none());
        assert_eq!(field.size(&Detached, &value).unwrap(), 4);
    }

    #[test]
    fn test_packet_len_field_falls_back_to_raw() {
        let field = PacketLenField::new("opt", Value::Absent, tlv(), 3usize);
        // The declared inner length runs past the three-byte slice.
        let (rest, value) = field.decode_standalone(&[1, 9, 0xaa, 0xff]).unwrap();
        assert_eq!(rest, &[0xff]);
        let msg = value.as_message().unwrap();
        assert!(msg.is_raw());
        assert_eq!(msg.get("load"), Some(&Value::Bytes(vec![1, 9, 0xaa])));
    }

    #[test]
    fn test_packet_len_field_truncated() {
        let field = PacketLenField::new("opt", Value::Absent, tlv(), 8usize);
        assert_eq!(
            field.decode_standalone(&[1, 2]).unwrap_err(),
            ReadError::TruncatedInput {
                needed: 8,
                available: 2
            }
        );
    }

    #[test]
    fn test_packet_list_until_end() {
        let field = PacketListField::new("opts", tlv(), ListBound::Unbounded);
        let data = [1, 1, 0xaa, 2, 0, 3, 2, 0xbb, 0xcc];
        let (rest, value) = field.decode_standalone(&data).unwrap();
        assert!(rest.is_empty());
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(field.count_of(&Detached, &value), 3);
        assert_eq!(field.encode_standalone(&value).unwrap(), data.to_vec());
    }

    #[test]
    fn test_packet_list_count_bound() {
        let field = PacketListField::new("opts", tlv(), ListBound::Count(LengthFrom::Fixed(1)));
        let (rest, value) = field.decode_standalone(&[1, 1, 0xaa, 2, 0]).unwrap();
        assert_eq!(value.as_list().unwrap().len(), 1);
        assert_eq!(rest, &[2, 0]);
    }

    #[test]
    fn test_packet_list_length_bound_returns_window_leftover() {
        let field = PacketListField::new("opts", tlv(), ListBound::Length(LengthFrom::Fixed(4)));
        let (rest, value) = field.decode_standalone(&[1, 0, 2, 0, 9]).unwrap();
        assert_eq!(value.as_list().unwrap().len(), 2);
        assert_eq!(rest, &[9]);
    }

    #[test]
    fn test_field_list_count_bound_leaves_remainder() {
        let field = FieldListField::new(
            "words",
            Vec::new(),
            NumField::short("w", 0u16),
            ListBound::Count(LengthFrom::Fixed(3)),
        );
        let (rest, value) = field.decode_standalone(&[0, 1, 0, 2, 0, 3, 0xee]).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        );
        assert_eq!(rest, &[0xee]);
        assert_eq!(field.to_repr(&Detached, &value), "[1, 2, 3]");
        assert_eq!(field.size(&Detached, &value).unwrap(), 6);
    }

    #[test]
    fn test_field_list_governed_by_its_length_field() {
        let schema = Schema::builder("Words")
            .field(FieldLenField::length_of("len", "items").with_format("B").unwrap())
            .field(FieldListField::new(
                "items",
                Vec::new(),
                NumField::short("w", 0u16),
                ListBound::Length(LengthFrom::field("len")),
            ))
            .build()
            .unwrap();
        let mut msg = Message::new(&schema);
        msg.set("items", vec![Value::UInt(1), Value::UInt(2)]).unwrap();
        let bytes = msg.build().unwrap();
        assert_eq!(bytes, vec![4, 0, 1, 0, 2]);

        let parsed = schema.dissect(&bytes).unwrap();
        assert_eq!(parsed.get("len"), Some(&Value::UInt(4)));
        assert_eq!(
            parsed.get("items"),
            Some(&Value::List(vec![Value::UInt(1), Value::UInt(2)]))
        );
    }

    #[test]
    fn test_field_list_of_bits_shares_carry() {
        let field = FieldListField::new(
            "nibbles",
            Vec::new(),
            BitField::new("n", 0u8, 4).unwrap(),
            ListBound::Unbounded,
        );
        let value = Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3), Value::UInt(4)]);
        let bytes = field.encode_standalone(&value).unwrap();
        assert_eq!(bytes, vec![0x12, 0x34]);
        assert_eq!(field.decode_standalone(&bytes).unwrap().1, value);
    }

    #[test]
    fn test_field_list_wraps_single_value() {
        let field = FieldListField::new(
            "words",
            vec![Value::UInt(7)],
            NumField::short("w", 0u16),
            ListBound::Unbounded,
        );
        assert_eq!(field.default_value(), Value::List(vec![Value::UInt(7)]));
        assert_eq!(
            field.to_internal(&Detached, Value::UInt(5)).unwrap(),
            Value::List(vec![Value::UInt(5)])
        );
        assert_eq!(field.count_of(&Detached, &field.default_value()), 1);
    }
}
