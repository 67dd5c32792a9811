//! # fieldcraft
//!
//! Declarative field descriptors for encoding and decoding binary wire
//! messages in the style of SMB/CIFS and NetBIOS.
//!
//! A message type is an ordered list of fields compiled into a
//! [`schema::Schema`]. Every field converts values between a human form, the
//! internal form a [`message::Message`] stores, and a machine form it packs.
//! It also encodes and decodes itself against a shared bit-aware cursor. Fields
//! can depend on their siblings: a length field measures the field it
//! describes, a conditional field consults a flag, a string takes as many bytes
//! as another field says.
//!
//! ## Example
//!
//! ```
//! use fieldcraft::bitfield::{BitField, FlagNames, FlagsField};
//! use fieldcraft::field::LengthFrom;
//! use fieldcraft::length::FieldLenField;
//! use fieldcraft::message::Message;
//! use fieldcraft::schema::Schema;
//! use fieldcraft::strings::StrLenField;
//! use fieldcraft::value::Value;
//!
//! let schema = Schema::builder("Greeting")
//!     .field(BitField::new("version", 4u8, 4).unwrap())
//!     .field(FlagsField::new("flags", 0u8, 4, FlagNames::from_list(["ack", "urgent"])).unwrap())
//!     .field(FieldLenField::length_of("len", "text"))
//!     .field(StrLenField::new("text", Value::Absent, LengthFrom::field("len")))
//!     .build()
//!     .unwrap();
//!
//! let mut msg = Message::new(&schema);
//! msg.set("flags", "ack+urgent").unwrap();
//! msg.set("text", "hi").unwrap();
//! let bytes = msg.build().unwrap();
//! assert_eq!(bytes, [0x43, 0x00, 0x02, b'h', b'i']);
//!
//! let parsed = schema.dissect(&bytes).unwrap();
//! assert_eq!(parsed.repr("flags").as_deref(), Some("ack+urgent"));
//! assert_eq!(parsed.get("len"), Some(&Value::UInt(2)));
//! ```

pub mod bitfield;
pub mod bits;
pub mod decorators;
pub mod enums;
pub mod errors;
pub mod field;
pub mod format;
pub mod length;
pub mod message;
pub mod nested;
pub mod random;
pub mod scalar;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod strings;
pub mod value;
