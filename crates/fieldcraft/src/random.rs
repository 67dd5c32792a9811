//! Random-value generators for fuzzing and test data.
//!
//! Every field describes the shape of a valid random value with a [`RandomValue`];
//! sampling it yields a value in the field's internal (or human) representation.
//! Nothing on the encode/decode path uses these.

use std::sync::Arc;

use rand::Rng;

use crate::{message::Message, schema::Schema, value::Value};

/// Longest payload produced by the unbounded byte-string generators.
pub const MAX_RANDOM_LEN: usize = 1200;

/// Shape of a random value suitable for one field.
#[derive(Debug, Clone)]
pub enum RandomValue {
    /// Byte string with a length in `min_len..=max_len`.
    Bytes { min_len: usize, max_len: usize },
    /// Byte string free of `terminator` bytes, followed by the terminator.
    Terminated { max_len: usize, terminator: Vec<u8> },
    /// UTF-16LE code units free of NUL, followed by `00 00`.
    Utf16Terminated { max_units: usize },
    /// Integer in `0..=max`.
    Unsigned { max: u64 },
    /// Integer in `min..=max`.
    Signed { min: i64, max: i64 },
    /// Any finite single-precision float.
    Float32,
    /// Any finite double-precision float.
    Float64,
    /// Colon-separated MAC address text.
    Mac,
    /// Dotted-quad IPv4 address text.
    Ipv4,
    /// Always the same value.
    Constant(Value),
    /// List of up to `max_len` elements drawn from `element`.
    List {
        element: Box<RandomValue>,
        max_len: usize,
    },
    /// A message with every field drawn from its own generator.
    Message(Arc<Schema>),
}

impl RandomValue {
    /// Draws one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            RandomValue::Bytes { min_len, max_len } => {
                let len = rng.gen_range(*min_len..=*max_len);
                let mut bytes = vec![0u8; len];
                rng.fill(bytes.as_mut_slice());
                Value::Bytes(bytes)
            }
            RandomValue::Terminated {
                max_len,
                terminator,
            } => {
                let len = rng.gen_range(0..=*max_len);
                let mut bytes: Vec<u8> = (0..len)
                    .map(|_| rng.r#gen::<u8>())
                    .filter(|b| !terminator.contains(b))
                    .collect();
                bytes.extend_from_slice(terminator);
                Value::Bytes(bytes)
            }
            RandomValue::Utf16Terminated { max_units } => {
                let len = rng.gen_range(0..=*max_units);
                let mut bytes = Vec::with_capacity(len * 2 + 2);
                for _ in 0..len {
                    let unit: u16 = rng.gen_range(1..=0xd7ff);
                    bytes.extend_from_slice(&unit.to_le_bytes());
                }
                bytes.extend_from_slice(&[0, 0]);
                Value::Bytes(bytes)
            }
            RandomValue::Unsigned { max } => Value::UInt(rng.gen_range(0..=*max)),
            RandomValue::Signed { min, max } => Value::Int(rng.gen_range(*min..=*max)),
            RandomValue::Float32 => {
                let v = f32::from_bits(rng.r#gen::<u32>());
                Value::Float(if v.is_finite() { v as f64 } else { 0.0 })
            }
            RandomValue::Float64 => {
                let v = f64::from_bits(rng.r#gen::<u64>());
                Value::Float(if v.is_finite() { v } else { 0.0 })
            }
            RandomValue::Mac => {
                let octets: [u8; 6] = rng.r#gen();
                Value::Text(crate::scalar::mac_to_text(&octets))
            }
            RandomValue::Ipv4 => {
                let octets: [u8; 4] = rng.r#gen();
                Value::Text(std::net::Ipv4Addr::from(octets).to_string())
            }
            RandomValue::Constant(v) => v.clone(),
            RandomValue::List { element, max_len } => {
                let len = rng.gen_range(0..=*max_len);
                Value::List((0..len).map(|_| element.sample(rng)).collect())
            }
            RandomValue::Message(schema) => {
                let mut msg = Message::new(schema);
                for (index, field) in schema.fields().iter().enumerate() {
                    let raw = field.random_value().sample(rng);
                    let value = field.to_internal(&msg, raw.clone()).unwrap_or(raw);
                    msg.set_at(index, value);
                }
                Value::from(msg)
            }
        }
    }
}
