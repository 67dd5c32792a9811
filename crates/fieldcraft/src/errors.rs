//! Error types for schema construction, value conversion, decoding and encoding.

use thiserror::Error;

/// Errors produced while building field descriptors or compiling a [crate::schema::Schema].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A format string such as `"<H"` or `"6s"` could not be parsed.
    #[error("invalid format spec `{0}`")]
    InvalidFormatSpec(String),
    /// A bit field is 0 bits wide or wider than 64 bits.
    #[error("field `{0}` must be between 1 and 64 bits wide")]
    InvalidFieldSize(String),
    /// A padding decorator was given an alignment of zero.
    #[error("field `{0}` has a zero alignment")]
    InvalidAlignment(String),
    /// Two fields of one schema share a name.
    #[error("duplicate field name `{0}`")]
    DuplicateFieldName(String),
    /// A field refers to a sibling that the schema does not declare.
    #[error("field `{field}` references unknown field `{target}`")]
    UnknownFieldReference { field: String, target: String },
    /// An action field names a handler that the schema does not register.
    #[error("field `{field}` uses unregistered action `{action}`")]
    UnknownAction { field: String, action: String },
    /// A run of bit fields does not end on a byte boundary.
    #[error("bit fields leave {pending_bits} pending bits before `{field}`")]
    MisalignedBitRun { field: String, pending_bits: usize },
    /// An enum table maps one code or one symbol twice.
    #[error("duplicate enum entry `{0}`")]
    DuplicateEnumEntry(String),
}

/// Errors produced when a value cannot be converted to a field's internal form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value has a shape the field cannot interpret.
    #[error("expected {expected}, found {found}")]
    InvalidValueShape {
        expected: &'static str,
        found: &'static str,
    },
    /// A symbolic name is not part of the field's table.
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// A number does not fit the encoded width.
    #[error("value {value} does not fit in {bits} bits")]
    OutOfRange { value: String, bits: usize },
}

/// Failure to resolve a sibling value through a [crate::field::Context].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No sibling with this name is visible in the context.
    #[error("no field named `{0}` in context")]
    Unresolved(String),
    /// The sibling exists but does not hold a number.
    #[error("field `{0}` does not hold a number")]
    NotNumeric(String),
}

/// Errors produced while decoding bytes (e.g. during [crate::schema::Schema::dissect]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The input ended before the field was complete.
    #[error("truncated input: need {needed} bytes, have {available}")]
    TruncatedInput { needed: usize, available: usize },
    /// A byte-level read was attempted in the middle of a byte.
    #[error("byte read attempted {bit_offset} bits into a byte")]
    MisalignedRead { bit_offset: usize },
    /// More than 64 bits were requested in a single read.
    #[error("more than 64 bits requested in a single read")]
    TooManyBitsRead,
    /// A sibling lookup failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The field only supports encoding.
    #[error("field `{0}` cannot be decoded")]
    Unsupported(String),
}

/// Errors produced while converting or encoding values (e.g. during [crate::message::Message::build]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The value could not be converted.
    #[error(transparent)]
    Value(#[from] ValueError),
    /// A sibling lookup failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A byte-level write was attempted while bits were still pending.
    #[error("byte write attempted with {pending_bits} pending bits")]
    MisalignedWrite { pending_bits: usize },
    /// The context has no handler for the requested action.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    /// The message has no field with this name.
    #[error("no such field `{0}`")]
    NoSuchField(String),
}
