//! The field capability shared by every descriptor, and the context it runs in.
//!
//! A field is an immutable, shareable description of one member of a message. A
//! [`crate::schema::Schema`] holds an ordered list of [`FieldRef`]s; encoding calls
//! [`Field::encode`] for each of them against one [`WireWriter`], decoding calls
//! [`Field::decode`] against one [`WireReader`] and stores each result before the
//! next field runs, so later fields can look earlier ones up by name.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    bits::{WireReader, WireWriter},
    errors::{ReadError, ResolveError, ValueError, WriteError},
    random::RandomValue,
    value::Value,
};

/// Shared handle to a field descriptor.
pub type FieldRef = Arc<dyn Field>;

/// The `name` and `default_value` methods of a field storing both as
/// `name: String` and `default: Value`.
macro_rules! field_basics {
    () => {
        fn name(&self) -> &str {
            &self.name
        }

        fn default_value(&self) -> $crate::value::Value {
            self.default.clone()
        }
    };
}
pub(crate) use field_basics;

/// Extra keyword configuration passed along with an action.
pub type ActionParams = BTreeMap<String, Value>;

/// A named side effect requested by an [`crate::decorators::ActionField`].
#[derive(Debug)]
pub struct ActionCall<'a> {
    pub action: &'a str,
    pub value: &'a Value,
    pub field: &'a dyn Field,
    pub params: &'a ActionParams,
}

/// The enclosing message as seen by a field.
pub trait Context {
    /// Looks up a sibling field and its current internal value.
    fn field_and_value(&self, name: &str) -> Option<(&dyn Field, &Value)>;

    /// Runs a named action against the message.
    fn perform_action(&mut self, call: &ActionCall<'_>) -> Result<(), WriteError>;

    /// Trailing bytes that no field consumed.
    fn trailing(&self) -> Option<&[u8]>;

    /// Current value of a sibling.
    fn value_of(&self, name: &str) -> Result<&Value, ResolveError> {
        self.field_and_value(name)
            .map(|(_, v)| v)
            .ok_or_else(|| ResolveError::Unresolved(name.to_string()))
    }

    /// Current value of a sibling as an integer.
    fn int_of(&self, name: &str) -> Result<i64, ResolveError> {
        self.value_of(name)?
            .as_i64()
            .ok_or_else(|| ResolveError::NotNumeric(name.to_string()))
    }
}

/// A context with no siblings, for defaults and standalone field use.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl Context for Detached {
    fn field_and_value(&self, _name: &str) -> Option<(&dyn Field, &Value)> {
        None
    }

    fn perform_action(&mut self, _call: &ActionCall<'_>) -> Result<(), WriteError> {
        Ok(())
    }

    fn trailing(&self) -> Option<&[u8]> {
        None
    }
}

/// Operations every field descriptor provides.
///
/// Decorators in [`crate::decorators`] implement this trait by holding an inner
/// [`FieldRef`] and forwarding everything they do not change.
pub trait Field: fmt::Debug + Send + Sync {
    /// Name, unique within a schema.
    fn name(&self) -> &str;

    /// Internal value used when a message never sets this field. A fresh value
    /// is returned on every call.
    fn default_value(&self) -> Value;

    /// Encoded byte length of `value`.
    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError>;

    /// Length reported to a length-of field.
    fn len_of(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.size(ctx, value)
    }

    /// Element count reported to a count-of field. Always 1 except for lists.
    fn count_of(&self, _ctx: &dyn Context, _value: &Value) -> usize {
        1
    }

    /// Normalizes any accepted input shape to the internal representation.
    /// Applying it to its own output changes nothing.
    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError>;

    /// Internal to human representation.
    fn to_human(&self, _ctx: &dyn Context, value: &Value) -> Value {
        value.clone()
    }

    /// Display form of an internal value.
    fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
        self.to_human(ctx, value).to_string()
    }

    /// Internal to packable machine value.
    fn to_machine(&self, _ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        Ok(value.clone())
    }

    /// Unpacked machine value to internal representation.
    fn from_machine(&self, _ctx: &dyn Context, value: Value) -> Value {
        value
    }

    /// Appends the wire form of `value`.
    fn encode(&self, ctx: &dyn Context, w: &mut WireWriter, value: &Value)
    -> Result<(), WriteError>;

    /// Consumes this field's bytes (or bits) and returns the internal value.
    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError>;

    /// Deep copy of a value of this field.
    fn copy_value(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Generator of valid random values.
    fn random_value(&self) -> RandomValue;

    /// Width in bits for sub-byte fields; `None` for byte-level fields.
    fn bit_width(&self) -> Option<usize> {
        None
    }

    /// Sibling field names this field resolves through the context.
    fn references(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Name of the action run before each assignment, if any.
    fn action(&self) -> Option<&str> {
        None
    }

    /// Hook run by [`crate::message::Message::set`] before [`Field::to_internal`].
    fn before_assign(&self, _ctx: &mut dyn Context, _value: &Value) -> Result<(), WriteError> {
        Ok(())
    }

    fn is_list(&self) -> bool {
        false
    }

    fn holds_messages(&self) -> bool {
        false
    }

    /// Presentation tag set by [`crate::decorators::Emph`].
    fn is_emphasized(&self) -> bool {
        false
    }

    /// Moves the field behind a shared handle.
    fn into_ref(self) -> FieldRef
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }

    /// Encodes a single value on its own, with no siblings.
    fn encode_standalone(&self, value: &Value) -> Result<Vec<u8>, WriteError> {
        let mut w = WireWriter::new();
        self.encode(&Detached, &mut w, value)?;
        w.into_bytes()
    }

    /// Decodes a single value on its own and returns what is left of `data`.
    fn decode_standalone<'a>(&self, data: &'a [u8]) -> Result<(&'a [u8], Value), ReadError> {
        let mut r = WireReader::new(data);
        let value = self.decode(&Detached, &mut r)?;
        let rest = r.remaining()?;
        Ok((rest, value))
    }
}

/// Adjustment applied to a measured length or count, identity by default.
#[derive(Clone)]
pub struct Adjust(Arc<dyn Fn(&dyn Context, i64) -> i64 + Send + Sync>);

impl Adjust {
    pub fn new(f: impl Fn(&dyn Context, i64) -> i64 + Send + Sync + 'static) -> Self {
        Adjust(Arc::new(f))
    }

    /// Adds a constant.
    pub fn offset(delta: i64) -> Self {
        Adjust::new(move |_, x| x + delta)
    }

    pub fn apply(&self, ctx: &dyn Context, x: i64) -> i64 {
        (self.0)(ctx, x)
    }
}

impl Default for Adjust {
    fn default() -> Self {
        Adjust::new(|_, x| x)
    }
}

impl fmt::Debug for Adjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Adjust(..)")
    }
}

/// Where a length or element count comes from at codec time.
#[derive(Clone)]
pub enum LengthFrom {
    /// A literal. Negative means "the encoded value's own length" where supported.
    Fixed(isize),
    /// The integer value of a sibling field, adjusted.
    Field { name: String, adjust: Adjust },
    /// Any computation over the context.
    Custom(Arc<dyn Fn(&dyn Context) -> isize + Send + Sync>),
}

impl LengthFrom {
    pub fn field(name: impl Into<String>) -> Self {
        LengthFrom::Field {
            name: name.into(),
            adjust: Adjust::default(),
        }
    }

    pub fn field_adjusted(name: impl Into<String>, adjust: Adjust) -> Self {
        LengthFrom::Field {
            name: name.into(),
            adjust,
        }
    }

    pub fn custom(f: impl Fn(&dyn Context) -> isize + Send + Sync + 'static) -> Self {
        LengthFrom::Custom(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &dyn Context) -> Result<isize, ResolveError> {
        match self {
            LengthFrom::Fixed(n) => Ok(*n),
            LengthFrom::Field { name, adjust } => {
                Ok(adjust.apply(ctx, sibling_int(ctx, name)?) as isize)
            }
            LengthFrom::Custom(f) => Ok(f(ctx)),
        }
    }

    /// Resolves to a non-negative length, clamping negatives to zero.
    pub fn resolve_len(&self, ctx: &dyn Context) -> Result<usize, ResolveError> {
        Ok(self.resolve(ctx)?.max(0) as usize)
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            LengthFrom::Field { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// An unset sibling stands for the number it would encode, so a length field
/// can govern the very field it measures.
fn sibling_int(ctx: &dyn Context, name: &str) -> Result<i64, ResolveError> {
    let (field, value) = ctx
        .field_and_value(name)
        .ok_or_else(|| ResolveError::Unresolved(name.to_string()))?;
    let computed;
    let value = match value {
        Value::Absent => {
            computed = field
                .to_machine(ctx, value)
                .map_err(|_| ResolveError::NotNumeric(name.to_string()))?;
            &computed
        }
        v => v,
    };
    value
        .as_i64()
        .ok_or_else(|| ResolveError::NotNumeric(name.to_string()))
}

impl From<usize> for LengthFrom {
    fn from(n: usize) -> Self {
        LengthFrom::Fixed(n as isize)
    }
}

impl fmt::Debug for LengthFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthFrom::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            LengthFrom::Field { name, .. } => f.debug_tuple("Field").field(name).finish(),
            LengthFrom::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a list field bounds its decode loop.
#[derive(Debug, Clone, Default)]
pub enum ListBound {
    /// Decode until the input is exhausted.
    #[default]
    Unbounded,
    /// Decode at most this many elements.
    Count(LengthFrom),
    /// Decode elements from exactly this many bytes.
    Length(LengthFrom),
}

impl ListBound {
    pub fn reference(&self) -> Option<&str> {
        match self {
            ListBound::Unbounded => None,
            ListBound::Count(from) | ListBound::Length(from) => from.reference(),
        }
    }
}

/// Presence predicate over the context.
#[derive(Clone)]
pub struct Condition {
    test: Arc<dyn Fn(&dyn Context) -> bool + Send + Sync>,
    depends_on: Option<String>,
}

impl Condition {
    pub fn new(f: impl Fn(&dyn Context) -> bool + Send + Sync + 'static) -> Self {
        Condition {
            test: Arc::new(f),
            depends_on: None,
        }
    }

    /// True when the named sibling currently equals `expected` as an integer.
    pub fn field_equals(name: impl Into<String>, expected: i64) -> Self {
        let name = name.into();
        let lookup = name.clone();
        Condition {
            test: Arc::new(move |ctx| ctx.int_of(&lookup).is_ok_and(|v| v == expected)),
            depends_on: Some(name),
        }
    }

    /// True when any bit of `mask` is set in the named sibling.
    pub fn flag_set(name: impl Into<String>, mask: u64) -> Self {
        let name = name.into();
        let lookup = name.clone();
        Condition {
            test: Arc::new(move |ctx| {
                ctx.value_of(&lookup)
                    .ok()
                    .and_then(Value::as_u64)
                    .is_some_and(|v| v & mask != 0)
            }),
            depends_on: Some(name),
        }
    }

    pub fn eval(&self, ctx: &dyn Context) -> bool {
        (self.test)(ctx)
    }

    pub fn reference(&self) -> Option<&str> {
        self.depends_on.as_deref()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
