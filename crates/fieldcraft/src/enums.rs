//! Integer fields with symbolic names.

use std::collections::{BTreeMap, HashMap};

use crate::{
    bitfield::BitField,
    bits::{WireReader, WireWriter},
    errors::{CompileError, ReadError, ValueError, WriteError},
    field::{Context, Detached, Field, field_basics},
    format::{FormatDescriptor, TypeCode},
    random::RandomValue,
    scalar::{
        format_random, hex_repr, machine_number, normalize_number, pack_format, unpack_format,
    },
    value::Value,
};

/// Bidirectional code ⇄ symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable {
    by_code: BTreeMap<i64, String>,
    by_symbol: HashMap<String, i64>,
}

impl EnumTable {
    /// Symbol `i` gets code `i`.
    pub fn from_list<S: Into<String>>(
        symbols: impl IntoIterator<Item = S>,
    ) -> Result<Self, CompileError> {
        Self::from_pairs(
            symbols
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i as i64, s)),
        )
    }

    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (i64, S)>,
    ) -> Result<Self, CompileError> {
        let mut table = EnumTable::default();
        for (code, symbol) in pairs {
            let symbol = symbol.into();
            if table.by_code.contains_key(&code) {
                return Err(CompileError::DuplicateEnumEntry(code.to_string()));
            }
            if table.by_symbol.contains_key(&symbol) {
                return Err(CompileError::DuplicateEnumEntry(symbol));
            }
            table.by_symbol.insert(symbol.clone(), code);
            table.by_code.insert(code, symbol);
        }
        Ok(table)
    }

    pub fn symbol(&self, code: i64) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn code(&self, symbol: &str) -> Option<i64> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.by_code.iter().map(|(c, s)| (*c, s.as_str()))
    }

    /// Resolves a symbol, then falls back to a numeric literal.
    fn lookup(&self, symbol: &str) -> Result<i64, ValueError> {
        self.code(symbol)
            .or_else(|| Value::from(symbol).as_i64())
            .ok_or_else(|| ValueError::UnknownSymbol(symbol.to_string()))
    }

    fn render(&self, value: &Value, hex: bool) -> String {
        match value.as_i64().and_then(|code| self.symbol(code)) {
            Some(symbol) => symbol.to_string(),
            None if hex => hex_repr(value),
            None => value.to_string(),
        }
    }
}

/// Maps every symbol in a value (also inside lists) to its code.
fn symbols_to_codes(
    value: Value,
    lookup: &dyn Fn(&str) -> Result<i64, ValueError>,
) -> Result<Value, ValueError> {
    match value {
        Value::Text(s) => Ok(Value::Int(lookup(&s)?)),
        Value::List(items) => items
            .into_iter()
            .map(|item| symbols_to_codes(item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Ok(other),
    }
}

fn normalize_codes(
    value: Value,
    normalize: &dyn Fn(Value) -> Result<Value, ValueError>,
) -> Result<Value, ValueError> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => normalize(other),
    }
}

fn render_list(value: &Value, render: impl Fn(&Value) -> String) -> String {
    match value {
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", parts.join(", "))
        }
        other => render(other),
    }
}

/// Byte-aligned enumerated integer.
#[derive(Debug, Clone)]
pub struct EnumField {
    name: String,
    default: Value,
    format: FormatDescriptor,
    table: EnumTable,
    hex: bool,
}

macro_rules! enum_constructors {
    ($($fn_name:ident => $ctor:ident($code:ident);)*) => {$(
        pub fn $fn_name(name: impl Into<String>, default: impl Into<Value>, table: EnumTable) -> Self {
            Self::new(name, default, table, FormatDescriptor::$ctor(TypeCode::$code))
        }
    )*};
}

impl EnumField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        table: EnumTable,
        format: FormatDescriptor,
    ) -> Self {
        let mut field = EnumField {
            name: name.into(),
            default: Value::Absent,
            format,
            table,
            hex: false,
        };
        let default = default.into();
        field.default = field
            .to_internal(&Detached, default.clone())
            .unwrap_or(default);
        field
    }

    enum_constructors! {
        byte => big(U8);
        short => big(U16);
        le_short => little(U16);
        int => big(U32);
        signed_int => big(I32);
        le_int => little(U32);
    }

    /// Renders unknown codes as hex.
    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn table(&self) -> &EnumTable {
        &self.table
    }
}

impl Field for EnumField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(self.format.byte_size)
    }

    fn to_internal(&self, _ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        let codes = symbols_to_codes(value, &|s: &str| self.table.lookup(s))?;
        normalize_codes(codes, &|v: Value| normalize_number(&self.format, v))
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        render_list(value, |v| self.table.render(v, self.hex))
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

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        unpack_format(&self.format, r)
    }

    fn random_value(&self) -> RandomValue {
        format_random(&self.format)
    }
}

/// Bit field with symbolic names.
#[derive(Debug, Clone)]
pub struct BitEnumField {
    bits: BitField,
    table: EnumTable,
}

impl BitEnumField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        width: usize,
        table: EnumTable,
    ) -> Result<Self, CompileError> {
        let mut field = BitEnumField {
            bits: BitField::new(name, Value::Absent, width)?,
            table,
        };
        let default = default.into();
        let normalized = field
            .to_internal(&Detached, default.clone())
            .unwrap_or(default);
        field.bits = BitField::new(field.bits.name(), normalized, width)?;
        Ok(field)
    }
}

impl Field for BitEnumField {
    fn name(&self) -> &str {
        self.bits.name()
    }

    fn default_value(&self) -> Value {
        self.bits.default_value()
    }

    fn size(&self, ctx: &dyn Context, value: &Value) -> Result<usize, WriteError> {
        self.bits.size(ctx, value)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        let codes = symbols_to_codes(value, &|s: &str| self.table.lookup(s))?;
        normalize_codes(codes, &|v: Value| self.bits.to_internal(ctx, v))
    }

    fn to_repr(&self, _ctx: &dyn Context, value: &Value) -> String {
        render_list(value, |v| self.table.render(v, false))
    }

    fn encode(
        &self,
        ctx: &dyn Context,
        w: &mut WireWriter,
        value: &Value,
    ) -> Result<(), WriteError> {
        self.bits.encode(ctx, w, value)
    }

    fn decode(&self, ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        self.bits.decode(ctx, r)
    }

    fn random_value(&self) -> RandomValue {
        self.bits.random_value()
    }

    fn bit_width(&self) -> Option<usize> {
        self.bits.bit_width()
    }
}

/// One [`EnumTable`] per discriminator value, plus every symbol of every
/// table in a combined table (first definition wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiEnumTable {
    tables: BTreeMap<i64, EnumTable>,
    combined: EnumTable,
}

impl MultiEnumTable {
    pub fn new(tables: impl IntoIterator<Item = (i64, EnumTable)>) -> Self {
        let tables: BTreeMap<i64, EnumTable> = tables.into_iter().collect();
        let mut combined = EnumTable::default();
        for table in tables.values() {
            for (code, symbol) in table.iter() {
                combined
                    .by_symbol
                    .entry(symbol.to_string())
                    .or_insert(code);
                combined
                    .by_code
                    .entry(code)
                    .or_insert_with(|| symbol.to_string());
            }
        }
        MultiEnumTable { tables, combined }
    }

    pub fn table_for(&self, discriminator: i64) -> Option<&EnumTable> {
        self.tables.get(&discriminator)
    }

    pub fn combined(&self) -> &EnumTable {
        &self.combined
    }
}

/// Enumerated integer whose table is chosen by the value of a sibling field.
#[derive(Debug, Clone)]
pub struct MultiEnumField {
    name: String,
    default: Value,
    format: FormatDescriptor,
    depends_on: String,
    tables: MultiEnumTable,
}

impl MultiEnumField {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        tables: MultiEnumTable,
        depends_on: impl Into<String>,
        format: FormatDescriptor,
    ) -> Self {
        let mut field = MultiEnumField {
            name: name.into(),
            default: Value::Absent,
            format,
            depends_on: depends_on.into(),
            tables,
        };
        let default = default.into();
        field.default = field
            .to_internal(&Detached, default.clone())
            .unwrap_or(default);
        field
    }

    fn active_table(&self, ctx: &dyn Context) -> Option<&EnumTable> {
        ctx.int_of(&self.depends_on)
            .ok()
            .and_then(|d| self.tables.table_for(d))
    }

    fn lookup(&self, ctx: &dyn Context, symbol: &str) -> Result<i64, ValueError> {
        match self.active_table(ctx).and_then(|t| t.code(symbol)) {
            Some(code) => Ok(code),
            None => self.tables.combined.lookup(symbol),
        }
    }
}

impl Field for MultiEnumField {
    field_basics!();

    fn size(&self, _ctx: &dyn Context, _value: &Value) -> Result<usize, WriteError> {
        Ok(self.format.byte_size)
    }

    fn to_internal(&self, ctx: &dyn Context, value: Value) -> Result<Value, ValueError> {
        let codes = symbols_to_codes(value, &|s: &str| self.lookup(ctx, s))?;
        normalize_codes(codes, &|v: Value| normalize_number(&self.format, v))
    }

    /// Without a table for the current discriminator the raw code is shown.
    fn to_repr(&self, ctx: &dyn Context, value: &Value) -> String {
        match self.active_table(ctx) {
            Some(table) => render_list(value, |v| table.render(v, false)),
            None => value.to_string(),
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

    fn decode(&self, _ctx: &dyn Context, r: &mut WireReader<'_>) -> Result<Value, ReadError> {
        unpack_format(&self.format, r)
    }

    fn random_value(&self) -> RandomValue {
        format_random(&self.format)
    }

    fn references(&self) -> Vec<&str> {
        vec![&self.depends_on]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ActionCall;

    fn commands() -> EnumTable {
        EnumTable::from_pairs([(0x72, "SMB_COM_NEGOTIATE"), (0x73, "SMB_COM_SESSION_SETUP_ANDX")])
            .unwrap()
    }

    struct Discriminator(Value);

    impl Context for Discriminator {
        fn field_and_value(&self, _name: &str) -> Option<(&dyn Field, &Value)> {
            None
        }

        fn perform_action(&mut self, _call: &ActionCall<'_>) -> Result<(), WriteError> {
            Ok(())
        }

        fn trailing(&self) -> Option<&[u8]> {
            None
        }

        fn value_of(&self, _name: &str) -> Result<&Value, crate::errors::ResolveError> {
            Ok(&self.0)
        }
    }

    #[test]
    fn test_table_rejects_duplicates() {
        assert_eq!(
            EnumTable::from_pairs([(1, "A"), (2, "A")]).unwrap_err(),
            CompileError::DuplicateEnumEntry("A".to_string())
        );
        assert_eq!(
            EnumTable::from_pairs([(1, "A"), (1, "B")]).unwrap_err(),
            CompileError::DuplicateEnumEntry("1".to_string())
        );
        let positional = EnumTable::from_list(["zero", "one"]).unwrap();
        assert_eq!(positional.code("one"), Some(1));
        assert_eq!(positional.symbol(0), Some("zero"));
    }

    #[test]
    fn test_symbol_and_code_inputs() {
        let field = EnumField::byte("cmd", "SMB_COM_NEGOTIATE", commands());
        assert_eq!(field.default_value(), Value::UInt(0x72));
        assert_eq!(
            field.to_internal(&Detached, Value::UInt(0x73)).unwrap(),
            Value::UInt(0x73)
        );
        assert_eq!(
            field.to_internal(&Detached, Value::from("SMB_COM_BOGUS")).unwrap_err(),
            ValueError::UnknownSymbol("SMB_COM_BOGUS".to_string())
        );
        assert_eq!(field.encode_standalone(&field.default_value()).unwrap(), vec![0x72]);
    }

    #[test]
    fn test_repr_falls_back_to_code() {
        let field = EnumField::short("cmd", 0u16, commands());
        assert_eq!(field.to_repr(&Detached, &Value::UInt(0x73)), "SMB_COM_SESSION_SETUP_ANDX");
        assert_eq!(field.to_repr(&Detached, &Value::UInt(5)), "5");
        let hex = EnumField::short("cmd", 0u16, commands()).hex();
        assert_eq!(hex.to_repr(&Detached, &Value::UInt(255)), "0xff");
    }

    #[test]
    fn test_list_input() {
        let field = EnumField::byte("cmd", 0u8, commands());
        let value = field
            .to_internal(
                &Detached,
                Value::List(vec!["SMB_COM_NEGOTIATE".into(), Value::UInt(1)]),
            )
            .unwrap();
        assert_eq!(value, Value::List(vec![Value::UInt(0x72), Value::UInt(1)]));
        assert_eq!(field.to_repr(&Detached, &value), "[SMB_COM_NEGOTIATE, 1]");
    }

    #[test]
    fn test_bit_enum() {
        let field = BitEnumField::new(
            "kind",
            "B",
            4,
            EnumTable::from_list(["A", "B", "C"]).unwrap(),
        )
        .unwrap();
        assert_eq!(field.default_value(), Value::UInt(1));
        assert_eq!(field.to_repr(&Detached, &Value::UInt(2)), "C");
        assert!(field.to_internal(&Detached, Value::UInt(16)).is_err());
    }

    #[test]
    fn test_multi_enum_selects_by_discriminator() {
        let tables = MultiEnumTable::new([
            (1, EnumTable::from_pairs([(0, "ONE_ZERO"), (1, "SHARED")]).unwrap()),
            (2, EnumTable::from_pairs([(0, "TWO_ZERO"), (5, "SHARED")]).unwrap()),
        ]);
        let field = MultiEnumField::new(
            "sub",
            Value::Absent,
            tables,
            "type",
            FormatDescriptor::big(TypeCode::U8),
        );

        let two = Discriminator(Value::UInt(2));
        assert_eq!(field.to_internal(&two, Value::from("SHARED")).unwrap(), Value::UInt(5));
        assert_eq!(field.to_repr(&two, &Value::UInt(0)), "TWO_ZERO");

        let unknown = Discriminator(Value::UInt(9));
        assert_eq!(field.to_internal(&unknown, Value::from("SHARED")).unwrap(), Value::UInt(1));
        assert_eq!(field.to_internal(&unknown, Value::from("TWO_ZERO")).unwrap(), Value::UInt(0));
        assert_eq!(field.to_repr(&unknown, &Value::UInt(0)), "0");
        assert_eq!(field.references(), vec!["type"]);
    }
}
