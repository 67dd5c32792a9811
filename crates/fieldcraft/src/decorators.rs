//! Fields that wrap another field and change one aspect of it.
//!
//! Each decorator holds the wrapped [`FieldRef`] and forwards every operation it
//! does not override.

use std::sync::Arc;

use crate::{
    bits::{WireReader, WireWriter},
    errors::{CompileError, ReadError, ValueError, WriteError},
    field::{ActionCall, ActionParams, Condition, Context, Field, FieldRef},
    random::RandomValue,
    value::Value,
};

macro_rules! forward {
    ($($method:ident),* $(,)?) => {$(forward!(@one $method);)*};
    (@one name) => {
        fn name(&self) -> &str {
            self.inner.name()
        }
    };
    (@one default_value) => {
        fn default_value(&self) -> Value {
            self.inner.default_value()
        }
    };
    (@one size) => {
        fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
            self.inner.size(ctx, value)
        }
    };
    (@one len_of) => {
        fn len_of(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
            self.inner.len_of(ctx, value)
        }
    };
    (@one count_of) => {
        fn count_of(&self, ctx: &dyn Context, value: &Value) -> usize {
            self.inner.count_of(ctx, value)
        }
    };
    (@one to_internal) => {
        fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
            self.inner.to_internal(ctx, value)
        }
    };
    (@one to_human) => {
        fn to_human(&self, ctx: &dyn Context, value: &Value) -> Value {
            self.inner.to_human(ctx, value)
        }
    };
    (@one to_repr) => {
        fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
            self.inner.to_repr(ctx, value)
        }
    };
    (@one to_machine) => {
        fn to_machine(&self, ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
            self.inner.to_machine(ctx, value)
        }
    };
    (@one from_machine) => {
        fn from_machine(&self, ctx: &dyn Context, value: Value) -> Value {
            self.inner.from_machine(ctx, value)
        }
    };
    (@one encode) => {
        fn encode(
            &self,
            ctx: &dyn Context,
            w: &mut WireWriter,
            value: &Value,
        ) -> Result<(), WriteError> {
            self.inner.encode(ctx, w, value)
        }
    };
    (@one decode) => {
        fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
            self.inner.decode(ctx, r)
        }
    };
    (@one copy_value) => {
        fn copy_value(&self, value: &Value) -> Value {
            self.inner.copy_value(value)
        }
    };
    (@one random_value) => {
        fn random_value(&self) -> RandomValue {
            self.inner.random_value()
        }
    };
    (@one bit_width) => {
        fn bit_width(&self) -> Option<usize> {
            self.inner.bit_width()
        }
    };
    (@one references) => {
        fn references(&self) -> Vec<&str> {
            self.inner.references()
        }
    };
    (@one action) => {
        fn action(&self) -> Option<&str> {
            self.inner.action()
        }
    };
    (@one before_assign) => {
        fn before_assign(&self, ctx: &mut dyn Context, value: &Value) -> Result<(), WriteError> {
            self.inner.before_assign(ctx, value)
        }
    };
    (@one is_list) => {
        fn is_list(&self) -> bool {
            self.inner.is_list()
        }
    };
    (@one holds_messages) => {
        fn holds_messages(&self) -> bool {
            self.inner.holds_messages()
        }
    };
    (@one is_emphasized) => {
        fn is_emphasized(&self) -> bool {
            self.inner.is_emphasized()
        }
    };
}

/// Marks a field for highlighting by presentation layers. Wire behavior is the
/// wrapped field's.
#[derive(Debug, Clone)]
pub struct Emph {
    inner: FieldRef,
}

impl Emph {
    pub fn new(inner: impl Field + 'static) -> Self {
        Emph::wrap(inner.into_ref())
    }

    pub fn wrap(inner: FieldRef) -> Self {
        Emph { inner }
    }

    pub fn inner(&self) -> &FieldRef {
        &self.inner
    }
}

/// Two tags are equal when they wrap the very same field.
impl PartialEq for Emph {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Emph {}

impl std::hash::Hash for Emph {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.inner) as *const (), state);
    }
}

impl Field for Emph {
    forward!(
        name,
        default_value,
        size,
        len_of,
        count_of,
        to_internal,
        to_human,
        to_repr,
        to_machine,
        from_machine,
        encode,
        decode,
        copy_value,
        random_value,
        bit_width,
        references,
        action,
        before_assign,
        is_list,
        holds_messages,
    );

    fn is_emphasized(&self) -> bool {
        true
    }
}

/// Runs a named action on the enclosing message every time a value is assigned
/// to the wrapped field, before the value is converted.
#[derive(Debug, Clone)]
pub struct ActionField {
    inner: FieldRef,
    action: String,
    params: ActionParams,
}

impl ActionField {
    pub fn new(inner: impl Field + 'static, action: impl Into<String>) -> Self {
        ActionField {
            inner: inner.into_ref(),
            action: action.into(),
            params: ActionParams::new(),
        }
    }

    /// Adds a keyword parameter passed along with every call.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl Field for ActionField {
    forward!(
        name,
        default_value,
        size,
        len_of,
        count_of,
        to_internal,
        to_human,
        to_repr,
        to_machine,
        from_machine,
        encode,
        decode,
        copy_value,
        random_value,
        bit_width,
        references,
        is_list,
        holds_messages,
        is_emphasized,
    );

    fn action(&self) -> Option<&str> {
        Some(&self.action)
    }

    fn before_assign(&self, ctx: &mut dyn Context, value: &Value) -> Result<(), WriteError> {
        self.inner.before_assign(ctx, value)?;
        ctx.perform_action(&ActionCall {
            action: &self.action,
            value,
            field: self.inner.as_ref(),
            params: &self.params,
        })
    }
}

/// Present only while a predicate over the enclosing message holds. When absent
/// the field has size 0, encodes nothing and decodes to [`Value::Absent`]
/// without consuming input.
#[derive(Debug, Clone)]
pub struct ConditionalField {
    inner: FieldRef,
    cond: Condition,
}

impl ConditionalField {
    pub fn new(inner: impl Field + 'static, cond: Condition) -> Self {
        ConditionalField {
            inner: inner.into_ref(),
            cond,
        }
    }

    pub fn is_present(&self, ctx: &dyn Context) -> bool {
        self.cond.eval(ctx)
    }
}

impl Field for ConditionalField {
    forward!(
        name,
        default_value,
        count_of,
        to_internal,
        to_human,
        to_repr,
        to_machine,
        from_machine,
        copy_value,
        random_value,
        bit_width,
        action,
        before_assign,
        is_list,
        holds_messages,
        is_emphasized,
    );

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        if !self.is_present(ctx) {
            return Ok(0);
        }
        self.inner.size(ctx, value)
    }

    fn len_of(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        if !self.is_present(ctx) {
            return Ok(0);
        }
        self.inner.len_of(ctx, value)
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        if !self.is_present(ctx) {
            return Ok(());
        }
        self.inner.encode(ctx, w, value)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        if !self.is_present(ctx) {
            return Ok(Value::Absent);
        }
        self.inner.decode(ctx, r)
    }

    fn references(&self) -> Vec<&str> {
        let mut refs = self.inner.references();
        refs.extend(self.cond.reference());
        refs
    }
}

/// Pads the wrapped field's encoding with `pad_byte` up to a multiple of
/// `align` bytes, measured from the start of the field.
#[derive(Debug, Clone)]
pub struct PadField {
    inner: FieldRef,
    align: usize,
    pad_byte: u8,
}

impl PadField {
    pub fn new(inner: impl Field + 'static, align: usize) -> Result<Self, CompileError> {
        Self::with_pad_byte(inner, align, 0)
    }

    pub fn with_pad_byte(
        inner: impl Field + 'static,
        align: usize,
        pad_byte: u8,
    ) -> Result<Self, CompileError> {
        if align == 0 {
            return Err(CompileError::InvalidAlignment(inner.name().to_string()));
        }
        Ok(PadField {
            inner: inner.into_ref(),
            align,
            pad_byte,
        })
    }

    fn padding(&self, len: usize) -> usize {
        (self.align - len % self.align) % self.align
    }
}

impl Field for PadField {
    forward!(
        name,
        default_value,
        count_of,
        to_internal,
        to_human,
        to_repr,
        to_machine,
        from_machine,
        copy_value,
        random_value,
        references,
        action,
        before_assign,
        is_list,
        holds_messages,
        is_emphasized,
    );

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        let len = self.inner.size(ctx, value)?;
        Ok(len + self.padding(len))
    }

    fn len_of(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.size(ctx, value)
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        let mut own = WireWriter::new();
        self.inner.encode(ctx, &mut own, value)?;
        let mut bytes = own.into_bytes()?;
        bytes.resize(bytes.len() + self.padding(bytes.len()), self.pad_byte);
        w.write_bytes(&bytes)
    }

    /// Padded fields are encode-only.
    fn decode(&self, _ctx: &dyn Context, _r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        Err(ReadError::Unsupported(self.inner.name().to_string()))
    }
}
