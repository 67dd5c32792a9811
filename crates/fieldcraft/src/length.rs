//! Length-of and count-of fields.
//!
//! These are write-computed and read-literal: when encoded without a value they
//! measure a sibling through the context; decoding returns the stored number.

use crate::{
    bitfield::BitField,
    bits::{WireReader, WireWriter},
    errors::{CompileError, ReadError, ResolveError, ValueError, WriteError},
    field::{Adjust, Context, Field, field_basics},
    format::{FormatDescriptor, TypeCode},
    random::RandomValue,
    scalar::{format_random, hex_repr, normalize_number, pack_format, unpack_format},
    value::Value,
};

/// What a length field measures on its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measure {
    /// Encoded byte length of the named sibling.
    LengthOf(String),
    /// Element count of the named sibling (1 unless it is a list).
    CountOf(String),
}

impl Measure {
    pub fn target(&self) -> &str {
        match self {
            Measure::LengthOf(name) | Measure::CountOf(name) => name,
        }
    }

    /// Measures the target in `ctx`, before adjustment.
    pub fn measure(&self, ctx: &dyn Context) -> Result<i64, WriteError> {
        let (field, value) = ctx
            .field_and_value(self.target())
            .ok_or_else(|| ResolveError::Unresolved(self.target().to_string()))?;
        Ok(match self {
            Measure::LengthOf(_) => field.len_of(ctx, value)? as i64,
            Measure::CountOf(_) => field.count_of(ctx, value) as i64,
        })
    }
}

/// Integer field holding the length or element count of a sibling.
#[derive(Debug, Clone)]
pub struct FieldLenField {
    name: String,
    default: Value,
    format: FormatDescriptor,
    measure: Measure,
    adjust: Adjust,
    hex: bool,
}

impl FieldLenField {
    pub fn new(name: impl Into<String>, measure: Measure, format: FormatDescriptor) -> Self {
        FieldLenField {
            name: name.into(),
            default: Value::Absent,
            format,
            measure,
            adjust: Adjust::default(),
            hex: false,
        }
    }

    /// Big-endian 16-bit length of `target`.
    pub fn length_of(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            Measure::LengthOf(target.into()),
            FormatDescriptor::big(TypeCode::U16),
        )
    }

    /// Big-endian 16-bit element count of `target`.
    pub fn count_of(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            Measure::CountOf(target.into()),
            FormatDescriptor::big(TypeCode::U16),
        )
    }

    pub fn with_format(mut self, spec: &str) -> Result<Self, CompileError> {
        self.format = FormatDescriptor::parse(spec)?;
        Ok(self)
    }

    pub fn with_adjust(mut self, adjust: Adjust) -> Self {
        self.adjust = adjust;
        self
    }

    /// A fixed value that is encoded instead of the measurement.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        let default = default.into();
        self.default = normalize_number(&self.format, default.clone()).unwrap_or(default);
        self
    }

    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }
}

impl Field for FieldLenField {
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

    fn to_machine(&self, ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Absent => {
                let measured = self.measure.measure(ctx)?;
                Ok(Value::Int(self.adjust.apply(ctx, measured)))
            }
            v => Ok(v.clone()),
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        pack_format(&self.format, w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        unpack_format(&self.format, r)
    }

    fn random_value(&self) -> RandomValue {
        format_random(&self.format)
    }

    fn references(&self) -> Vec<&str> {
        vec![self.measure.target()]
    }
}

/// Integer field holding the summed, individually adjusted lengths of several
/// siblings.
#[derive(Debug, Clone)]
pub struct MultiFieldLenField {
    name: String,
    default: Value,
    format: FormatDescriptor,
    targets: Vec<String>,
    adjust: Adjust,
}

impl MultiFieldLenField {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        targets: impl IntoIterator<Item = S>,
        format: FormatDescriptor,
    ) -> Self {
        MultiFieldLenField {
            name: name.into(),
            default: Value::Absent,
            format,
            targets: targets.into_iter().map(Into::into).collect(),
            adjust: Adjust::default(),
        }
    }

    /// Applied to each target's length before summing.
    pub fn with_adjust(mut self, adjust: Adjust) -> Self {
        self.adjust = adjust;
        self
    }
}

impl Field for MultiFieldLenField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(self.format.byte_size)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        normalize_number(&self.format, value)
    }

    fn to_machine(&self, ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        if !value.is_absent() {
            return Ok(value.clone());
        }
        let mut total = 0i64;
        for target in &self.targets {
            let measured = Measure::LengthOf(target.clone()).measure(ctx)?;
            total += self.adjust.apply(ctx, measured);
        }
        Ok(Value::Int(total))
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        pack_format(&self.format, w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        unpack_format(&self.format, r)
    }

    fn random_value(&self) -> RandomValue {
        format_random(&self.format)
    }

    fn references(&self) -> Vec<&str> {
        self.targets.iter().map(String::as_str).collect()
    }
}

/// Bit-packed length-of or count-of field.
#[derive(Debug, Clone)]
pub struct BitFieldLenField {
    bits: BitField,
    measure: Measure,
    adjust: Adjust,
}

impl BitFieldLenField {
    pub fn new(
        name: impl Into<String>,
        width: usize,
        measure: Measure,
    ) -> Result<Self, CompileError> {
        Ok(BitFieldLenField {
            bits: BitField::new(name, Value::Absent, width)?,
            measure,
            adjust: Adjust::default(),
        })
    }

    pub fn with_adjust(mut self, adjust: Adjust) -> Self {
        self.adjust = adjust;
        self
    }
}

impl Field for BitFieldLenField {
    fn name(&self) -> &str {
        self.bits.name()
    }

    fn default_value(&self) -> Value {
        Value::Absent
    }

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.bits.size(ctx, value)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        self.bits.to_internal(ctx, value)
    }

    fn to_machine(&self, ctx: &dyn Context, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Absent => {
                let measured = self.measure.measure(ctx)?;
                let adjusted = self.adjust.apply(ctx, measured);
                Ok(self.bits.normalize(Value::Int(adjusted))?)
            }
            v => Ok(v.clone()),
        }
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.bits.write(w, &self.to_machine(ctx, value)?)
    }

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        self.bits.read(r)
    }

    fn random_value(&self) -> RandomValue {
        self.bits.random()
    }

    fn bit_width(&self) -> Option<usize> {
        self.bits.bit_width()
    }

    fn references(&self) -> Vec<&str> {
        vec![self.measure.target()]
    }
}
