//! Schema: a named, compiled list of fields used to dissect bytes into messages.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    bits::WireReader,
    errors::{CompileError, ReadError, WriteError},
    field::{ActionCall, Field, FieldRef},
    message::Message,
    strings::StrField,
    value::Value,
};

/// Handler for a named action requested by an [`crate::decorators::ActionField`].
pub type ActionHandler =
    Arc<dyn Fn(&mut Message, &ActionCall<'_>) -> Result<(), WriteError> + Send + Sync>;

/// Name of the single field of [`Schema::raw`].
pub const RAW_LOAD: &str = "load";

/// A compiled schema. Use [`Schema::compile`] or [`Schema::builder`] to build
/// one from fields, then [`Schema::dissect`] to decode bytes.
pub struct Schema {
    name: String,
    fields: Vec<FieldRef>,
    index: HashMap<String, usize>,
    defaults: Vec<Value>,
    actions: HashMap<String, ActionHandler>,
}

impl Schema {
    /// Compiles fields with no action handlers.
    pub fn compile(
        name: impl Into<String>,
        fields: Vec<FieldRef>,
    ) -> Result<Arc<Self>, CompileError> {
        Self::builder(name).fields(fields).build()
    }

    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            actions: HashMap::new(),
        }
    }

    /// The opaque one-field schema holding undecoded bytes.
    pub fn raw() -> Arc<Self> {
        static RAW: OnceLock<Arc<Schema>> = OnceLock::new();
        Arc::clone(RAW.get_or_init(|| {
            let load = StrField::new(RAW_LOAD, Value::Bytes(Vec::new())).into_ref();
            Arc::new(Schema {
                name: "Raw".to_string(),
                index: HashMap::from([(RAW_LOAD.to_string(), 0)]),
                defaults: vec![load.default_value()],
                fields: vec![load],
                actions: HashMap::new(),
            })
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in definition order.
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRef> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Default internal value of the field at `index`.
    pub fn default_at(&self, index: usize) -> &Value {
        &self.defaults[index]
    }

    pub fn action(&self, name: &str) -> Option<&ActionHandler> {
        self.actions.get(name)
    }

    /// Decodes `data` field by field. Decoding stops early, leaving later fields
    /// at their defaults, once the input is used up. Bytes no field consumed
    /// become the message's trailing segment.
    pub fn dissect(self: &Arc<Self>, data: &[u8]) -> Result<Message, ReadError> {
        let mut msg = Message::new(self);
        let mut r = WireReader::new(data);

        for (index, field) in self.fields.iter().enumerate() {
            if r.is_empty() {
                break;
            }
            let value = field.decode(&msg, &mut r)?;
            msg.set_at(index, value);
        }

        let rest = r.remaining()?;
        tracing::trace!(
            schema = %self.name,
            consumed = data.len() - rest.len(),
            trailing = rest.len(),
            "dissected message"
        );
        if !rest.is_empty() {
            msg.set_trailing(rest.to_vec());
        }

        Ok(msg)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects fields and action handlers for [`Schema`].
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldRef>,
    actions: HashMap<String, ActionHandler>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: impl Field + 'static) -> Self {
        self.fields.push(field.into_ref());
        self
    }

    pub fn field_ref(mut self, field: FieldRef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldRef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Registers the handler run for `name` before an assignment to any
    /// action field using it.
    pub fn action(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut Message, &ActionCall<'_>) -> Result<(), WriteError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    /// Validates the field list and freezes it. Fails on duplicate names,
    /// unknown sibling references or actions, and on bit-field runs that do
    /// not end on a byte boundary.
    pub fn build(self) -> Result<Arc<Schema>, CompileError> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if index.insert(field.name().to_string(), i).is_some() {
                return Err(CompileError::DuplicateFieldName(field.name().to_string()));
            }
        }

        let mut pending_bits = 0;
        for field in &self.fields {
            for target in field.references() {
                if !index.contains_key(target) {
                    return Err(CompileError::UnknownFieldReference {
                        field: field.name().to_string(),
                        target: target.to_string(),
                    });
                }
            }

            if let Some(action) = field.action() {
                if !self.actions.contains_key(action) {
                    return Err(CompileError::UnknownAction {
                        field: field.name().to_string(),
                        action: action.to_string(),
                    });
                }
            }

            match field.bit_width() {
                Some(width) => pending_bits = (pending_bits + width) % 8,
                None if pending_bits != 0 => {
                    return Err(CompileError::MisalignedBitRun {
                        field: field.name().to_string(),
                        pending_bits,
                    });
                }
                None => {}
            }
        }
        if pending_bits != 0 {
            return Err(CompileError::MisalignedBitRun {
                field: "<end>".to_string(),
                pending_bits,
            });
        }

        let defaults = self.fields.iter().map(|f| f.default_value()).collect();

        Ok(Arc::new(Schema {
            name: self.name,
            fields: self.fields,
            index,
            defaults,
            actions: self.actions,
        }))
    }
}
