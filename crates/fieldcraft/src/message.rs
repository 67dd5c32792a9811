//! A message: one set of values laid over a [`Schema`].

use std::{fmt, sync::Arc};

use crate::{
    bits::WireWriter,
    errors::WriteError,
    field::{ActionCall, Context, Field, FieldRef},
    schema::{RAW_LOAD, Schema},
    value::{Value, bytes_repr},
};

/// Values of one message instance. Fields never set read as the schema default.
#[derive(Clone)]
pub struct Message {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
    trailing: Option<Vec<u8>>,
}

impl Message {
    /// A message with every field at its default.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Message {
            schema: Arc::clone(schema),
            values: vec![None; schema.fields().len()],
            trailing: None,
        }
    }

    /// Opaque placeholder holding `bytes` undecoded.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        let mut msg = Message::new(&Schema::raw());
        msg.set_at(0, Value::Bytes(bytes.into()));
        msg
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_raw(&self) -> bool {
        Arc::ptr_eq(&self.schema, &Schema::raw())
    }

    fn index(&self, name: &str) -> Result<usize, WriteError> {
        self.schema
            .index_of(name)
            .ok_or_else(|| WriteError::NoSuchField(name.to_string()))
    }

    fn value_at(&self, index: usize) -> &Value {
        self.values[index]
            .as_ref()
            .unwrap_or_else(|| self.schema.default_at(index))
    }

    /// Current internal value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| self.value_at(i))
    }

    /// Fields paired with their current internal values, in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldRef, &Value)> {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| (field, self.value_at(i)))
    }

    /// Assigns any accepted input shape. The field's action, if any, runs
    /// first and sees the message before the change.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), WriteError> {
        let index = self.index(name)?;
        let schema = Arc::clone(&self.schema);
        let field = &schema.fields()[index];
        let value = value.into();

        field.before_assign(self, &value)?;
        let internal = field.to_internal(&*self, value)?;
        self.values[index] = Some(internal);
        Ok(())
    }

    /// Stores a value already in internal form, skipping conversion and actions.
    pub fn set_internal(&mut self, name: &str, value: Value) -> Result<(), WriteError> {
        let index = self.index(name)?;
        self.set_at(index, value);
        Ok(())
    }

    pub(crate) fn set_at(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    /// Returns a field to its default.
    pub fn unset(&mut self, name: &str) -> Result<(), WriteError> {
        let index = self.index(name)?;
        self.values[index] = None;
        Ok(())
    }

    /// Human form of a field's value.
    pub fn human(&self, name: &str) -> Option<Value> {
        let index = self.schema.index_of(name)?;
        Some(self.schema.fields()[index].to_human(self, self.value_at(index)))
    }

    /// Display form of a field's value.
    pub fn repr(&self, name: &str) -> Option<String> {
        let index = self.schema.index_of(name)?;
        Some(self.schema.fields()[index].to_repr(self, self.value_at(index)))
    }

    /// Encodes every field in order, followed by the trailing segment.
    pub fn build(&self) -> Result<Vec<u8>, WriteError> {
        let mut w = WireWriter::new();
        for (field, value) in self.iter() {
            field.encode(self, &mut w, value)?;
        }
        let mut bytes = w.into_bytes()?;
        if let Some(trailing) = &self.trailing {
            bytes.extend_from_slice(trailing);
        }
        tracing::trace!(schema = %self.schema.name(), len = bytes.len(), "built message");
        Ok(bytes)
    }

    /// Length of [`Message::build`]'s output.
    pub fn wire_len(&self) -> Result<usize, WriteError> {
        self.build().map(|bytes| bytes.len())
    }

    /// Bytes left over after the last field when this message was dissected.
    pub fn trailing(&self) -> Option<&[u8]> {
        self.trailing.as_deref()
    }

    pub fn take_trailing(&mut self) -> Option<Vec<u8>> {
        self.trailing.take()
    }

    pub fn set_trailing(&mut self, bytes: Vec<u8>) {
        self.trailing = Some(bytes);
    }

    /// Deep copy: nested messages and lists are copied by their fields.
    pub fn copy(&self) -> Message {
        let values = self
            .schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(field, value)| value.as_ref().map(|v| field.copy_value(v)))
            .collect();
        Message {
            schema: Arc::clone(&self.schema),
            values,
            trailing: self.trailing.clone(),
        }
    }
}

impl Context for Message {
    fn field_and_value(&self, name: &str) -> Option<(&dyn Field, &Value)> {
        let index = self.schema.index_of(name)?;
        Some((self.schema.fields()[index].as_ref(), self.value_at(index)))
    }

    fn perform_action(&mut self, call: &ActionCall<'_>) -> Result<(), WriteError> {
        let handler = self
            .schema
            .action(call.action)
            .cloned()
            .ok_or_else(|| WriteError::UnknownAction(call.action.to_string()))?;
        handler(self, call)
    }

    fn trailing(&self) -> Option<&[u8]> {
        self.trailing.as_deref()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.schema.fields().len() == other.schema.fields().len()
            && self.iter().map(|(_, v)| v).eq(other.iter().map(|(_, v)| v))
            && self.trailing == other.trailing
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        for (field, value) in self.iter() {
            s.field(field.name(), value);
        }
        if let Some(trailing) = &self.trailing {
            s.field("trailing", trailing);
        }
        s.finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.schema.name())?;
        for (field, value) in self.iter() {
            write!(f, " {}={}", field.name(), field.to_repr(self, value))?;
        }
        f.write_str(" |")?;
        if let Some(trailing) = &self.trailing {
            write!(f, "<Raw {RAW_LOAD}={} |>", bytes_repr(trailing))?;
        }
        f.write_str(">")
    }
}
