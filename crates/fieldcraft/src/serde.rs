//! JSON-deserializable enum and flag tables.
//!
//! Protocol dialects ship long code tables (SMB commands, NT status codes,
//! capability bits). These types let such tables live in a data file and be
//! converted into the core [`EnumTable`], [`MultiEnumTable`] and [`FlagNames`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    bitfield::FlagNames,
    enums::{EnumTable, MultiEnumTable},
    errors::CompileError,
};

/// An enum table, written either as a list (symbol `i` has code `i`) or as an
/// explicit `code -> symbol` map.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum EnumDef {
    /// Symbols in code order, starting at zero.
    List(Vec<String>),
    /// Explicit codes.
    Map(BTreeMap<i64, String>),
}

impl TryFrom<EnumDef> for EnumTable {
    type Error = CompileError;

    fn try_from(value: EnumDef) -> Result<Self, Self::Error> {
        match value {
            EnumDef::List(symbols) => EnumTable::from_list(symbols),
            EnumDef::Map(pairs) => EnumTable::from_pairs(pairs),
        }
    }
}

/// One enum table per discriminator value.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MultiEnumDef {
    /// Table to use for each value of the discriminating field.
    pub tables: BTreeMap<i64, EnumDef>,
}

impl TryFrom<MultiEnumDef> for MultiEnumTable {
    type Error = CompileError;

    fn try_from(value: MultiEnumDef) -> Result<Self, Self::Error> {
        let tables = value
            .tables
            .into_iter()
            .map(|(discriminator, def)| Ok((discriminator, EnumTable::try_from(def)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;
        Ok(MultiEnumTable::new(tables))
    }
}

/// Flag names, written either as a list (entry `i` names bit `i`) or as an
/// explicit `mask -> name` map. Mask `0` names the all-clear value.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FlagNamesDef {
    List(Vec<String>),
    Masks(BTreeMap<u64, String>),
}

impl From<FlagNamesDef> for FlagNames {
    fn from(value: FlagNamesDef) -> Self {
        match value {
            FlagNamesDef::List(names) => FlagNames::from_list(names),
            FlagNamesDef::Masks(pairs) => FlagNames::from_masks(pairs),
        }
    }
}
