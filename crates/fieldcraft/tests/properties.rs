use std::sync::Arc;

use fieldcraft::{
    bitfield::{BitField, FixedPointField, FlagNames, FlagsField},
    bits::{WireReader, WireWriter},
    decorators::ConditionalField,
    enums::{BitEnumField, EnumField, EnumTable},
    field::{Adjust, Condition, Detached, Field, FieldRef, LengthFrom, ListBound},
    length::FieldLenField,
    message::Message,
    nested::FieldListField,
    random::RandomValue,
    scalar::{BcdFloatField, IpField, MacField, NtTimeField, NumField, ThreeBytesField},
    schema::Schema,
    strings::{
        NetBiosNameField, StrField, StrFixedLenField, StrNullField, StrStopField,
        UnicodeNullField,
    },
    value::Value,
};
use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};

const SAMPLES: usize = 1000;

fn smb_commands() -> EnumTable {
    EnumTable::from_pairs([(0x72, "negotiate"), (0x73, "session_setup"), (0x75, "tree_connect")])
        .unwrap()
}

fn byte_fields() -> Vec<FieldRef> {
    vec![
        NumField::byte("byte", 0u8).into_ref(),
        NumField::short("short", 0u16).into_ref(),
        NumField::le_short("le_short", 0u16).into_ref(),
        NumField::int("int", 0u32).into_ref(),
        NumField::signed_int("signed_int", 0i32).into_ref(),
        NumField::le_int("le_int", 0u32).into_ref(),
        NumField::le_signed_int("le_signed_int", 0i32).into_ref(),
        NumField::long("long", 0u64).into_ref(),
        NumField::le_long("le_long", 0u64).into_ref(),
        NumField::float("float", 0.0f32).into_ref(),
        NumField::double("double", 0.0f64).into_ref(),
        ThreeBytesField::new("three", 0u32).into_ref(),
        MacField::new("mac", "00:00:00:00:00:00").into_ref(),
        IpField::new("ip", "127.0.0.1").into_ref(),
        NtTimeField::new("time", 0u64).into_ref(),
        BcdFloatField::new("bcd", 0.0f64).into_ref(),
        EnumField::byte("command", 0x72u8, smb_commands()).into_ref(),
        StrField::new("load", Value::Absent).into_ref(),
        StrFixedLenField::new("fixed", Value::Absent, 8usize).into_ref(),
        StrNullField::new("cstr", Value::Absent).into_ref(),
        UnicodeNullField::new("wstr", Value::Absent).into_ref(),
        StrStopField::new("line", Value::Absent, b"\r\n".to_vec()).into_ref(),
        NetBiosNameField::new("nbname", Value::Absent).into_ref(),
    ]
}

fn bit_fields() -> Vec<FieldRef> {
    vec![
        BitField::new("one", 0u8, 1).unwrap().into_ref(),
        BitField::new("three", 0u8, 3).unwrap().into_ref(),
        BitField::new("thirteen", 0u16, 13).unwrap().into_ref(),
        BitField::new("wide", 0u64, 64).unwrap().into_ref(),
        BitField::new("signed", 0i8, 12).unwrap().signed().into_ref(),
        BitField::new("reversed", 0u16, 16).unwrap().reversed().into_ref(),
        FlagsField::new("flags", 0u8, 4, FlagNames::from_list(["A", "B", "C", "D"]))
            .unwrap()
            .into_ref(),
        FixedPointField::new("fixed", 0.0f64, 32).unwrap().into_ref(),
        BitEnumField::new("kind", 0u8, 5, smb_commands()).unwrap().into_ref(),
    ]
}

#[test]
fn byte_fields_roundtrip_random_values() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for field in byte_fields() {
        let generator = field.random_value();
        for _ in 0..SAMPLES {
            let internal = field
                .to_internal(&Detached, generator.sample(&mut rng))
                .unwrap();
            let bytes = field.encode_standalone(&internal).unwrap();
            let (rest, decoded) = field.decode_standalone(&bytes).unwrap();
            assert!(rest.is_empty(), "{} left {} bytes", field.name(), rest.len());
            assert_eq!(decoded, internal, "{}", field.name());
            field.to_human(&Detached, &decoded);
            field.to_repr(&Detached, &decoded);
        }
    }
}

#[test]
fn bit_fields_roundtrip_random_values() {
    let mut rng = StdRng::seed_from_u64(13);
    for field in bit_fields() {
        let width = field.bit_width().unwrap();
        let filler = (8 - width % 8) % 8;
        let generator = field.random_value();
        for _ in 0..SAMPLES {
            let internal = field
                .to_internal(&Detached, generator.sample(&mut rng))
                .unwrap();
            let mut w = WireWriter::new();
            field.encode(&Detached, &mut w, &internal).unwrap();
            w.write_bits(0, filler);
            let bytes = w.into_bytes().unwrap();
            assert_eq!(bytes.len() * 8, width + filler);

            let mut r = WireReader::new(&bytes);
            let decoded = field.decode(&Detached, &mut r).unwrap();
            assert_eq!(decoded, internal, "{}", field.name());
            field.to_repr(&Detached, &decoded);
        }
    }
}

fn width_runs() -> impl Strategy<Value = Vec<usize>> {
    prop::sample::select(vec![
        vec![1, 7],
        vec![4, 4],
        vec![1, 3, 4],
        vec![7, 9],
        vec![3, 13],
        vec![9, 7],
        vec![13, 3],
        vec![1, 3, 4, 7, 9],
        vec![4, 7, 13],
        vec![9, 13, 1, 1],
        vec![3, 3, 3, 7],
    ])
}

proptest! {
    #[test]
    fn bit_runs_pack_exactly(widths in width_runs(), seeds in prop::collection::vec(any::<u64>(), 5)) {
        let fields: Vec<BitField> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| BitField::new(format!("f{i}"), 0u8, *w).unwrap())
            .collect();
        let values: Vec<Value> = widths
            .iter()
            .zip(&seeds)
            .map(|(w, seed)| Value::UInt(seed & ((1u64 << w) - 1)))
            .collect();

        let mut w = WireWriter::new();
        for (field, value) in fields.iter().zip(&values) {
            field.encode(&Detached, &mut w, value).unwrap();
        }
        let bytes = w.into_bytes().unwrap();
        prop_assert_eq!(bytes.len(), widths.iter().sum::<usize>() / 8);

        let mut r = WireReader::new(&bytes);
        for (field, value) in fields.iter().zip(&values) {
            prop_assert_eq!(&field.decode(&Detached, &mut r).unwrap(), value);
        }
        prop_assert!(r.is_empty());
    }

    #[test]
    fn netbios_names_survive_mangling(name in "[A-Z0-9]{1,15}") {
        let field = NetBiosNameField::new("nbname", Value::Absent);
        let internal = field.to_internal(&Detached, Value::from(name.as_str())).unwrap();
        let bytes = field.encode_standalone(&internal).unwrap();
        prop_assert_eq!(bytes.len(), 33);
        let (_, decoded) = field.decode_standalone(&bytes).unwrap();
        prop_assert_eq!(decoded, Value::Bytes(name.into_bytes()));
    }

    #[test]
    fn nt_time_renders_any_tick_count(ticks in any::<u64>()) {
        let field = NtTimeField::new("time", 0u64);
        let (_, decoded) = field.decode_standalone(&ticks.to_le_bytes()).unwrap();
        prop_assert_eq!(&decoded, &Value::UInt(ticks));
        field.to_human(&Detached, &decoded);
        prop_assert!(!field.to_repr(&Detached, &decoded).is_empty());
    }

    #[test]
    fn length_field_governs_what_it_measures(
        data in prop::collection::vec(any::<u8>(), 0..64),
        words in prop::collection::vec(any::<u16>(), 0..16),
    ) {
        let schema = Schema::builder("Governed")
            .field(FieldLenField::length_of("data_len", "data").with_format("B").unwrap())
            .field(StrFixedLenField::new("data", Value::Absent, LengthFrom::field("data_len")))
            .field(FieldLenField::length_of("words_len", "words"))
            .field(FieldListField::new(
                "words",
                Vec::new(),
                NumField::le_short("w", 0u16),
                ListBound::Length(LengthFrom::field("words_len")),
            ))
            .build()
            .unwrap();
        let words: Vec<Value> = words.into_iter().map(Value::from).collect();
        let mut msg = Message::new(&schema);
        msg.set("data", data.clone()).unwrap();
        msg.set("words", words.clone()).unwrap();

        let bytes = msg.build().unwrap();
        prop_assert_eq!(bytes.len(), 1 + data.len() + 2 + words.len() * 2);

        let parsed = schema.dissect(&bytes).unwrap();
        prop_assert_eq!(parsed.get("data_len"), Some(&Value::UInt(data.len() as u64)));
        prop_assert_eq!(parsed.get("data"), Some(&Value::Bytes(data)));
        prop_assert_eq!(parsed.get("words_len"), Some(&Value::UInt(words.len() as u64 * 2)));
        prop_assert_eq!(parsed.get("words"), Some(&Value::List(words)));
        prop_assert!(parsed.trailing().is_none());
    }

    #[test]
    fn utf16_decode_stays_in_bounds(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let field = UnicodeNullField::new("wstr", Value::Absent);
        let (rest, decoded) = field.decode_standalone(&data).unwrap();
        let taken = decoded.as_bytes().unwrap().len();
        prop_assert_eq!(taken + rest.len(), data.len());
    }
}

#[test]
fn flags_render_names() {
    let names = FlagNames::from_masks([(1, "A"), (2, "B"), (4, "C"), (8, "D")]);
    let field = FlagsField::new("flags", 0u8, 4, names).unwrap();
    assert_eq!(field.to_repr(&Detached, &Value::UInt(5)), "A+C");
    assert_eq!(field.to_repr(&Detached, &Value::UInt(0)), "0x0");
}

#[test]
fn netbios_test_name() {
    let field = NetBiosNameField::new("nbname", Value::Absent);
    let internal = field.to_internal(&Detached, Value::from("TEST")).unwrap();
    let bytes = field.encode_standalone(&internal).unwrap();
    assert!(bytes.starts_with(b" FEEFFDFE"));
    let (_, decoded) = field.decode_standalone(&bytes).unwrap();
    assert_eq!(decoded, Value::Bytes(b"TEST".to_vec()));
}

#[test]
fn utf16_text_roundtrip_and_missing_terminator() {
    let field = UnicodeNullField::new("wstr", Value::Absent);
    let internal = field.to_internal(&Detached, Value::from("ab")).unwrap();
    let bytes = field.encode_standalone(&internal).unwrap();
    assert_eq!(bytes, b"a\0b\0\0\0".to_vec());
    let (_, decoded) = field.decode_standalone(&bytes).unwrap();
    assert_eq!(field.to_repr(&Detached, &decoded), "ab");

    let (rest, decoded) = field.decode_standalone(b"a\0b").unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded, Value::Bytes(b"a\0b".to_vec()));
}

#[test]
fn length_field_measures_unset_value() {
    let schema = Schema::builder("Frame")
        .field(FieldLenField::length_of("len", "data").with_adjust(Adjust::offset(1)))
        .field(StrField::new("data", Value::Absent))
        .build()
        .unwrap();
    let mut msg = Message::new(&schema);
    msg.set("data", b"1234567").unwrap();
    msg.set("len", 3u8).unwrap();
    assert_eq!(&msg.build().unwrap()[..2], &[0, 3]);

    msg.unset("len").unwrap();
    assert_eq!(&msg.build().unwrap()[..2], &[0, 8]);
}

#[test]
fn counted_list_leaves_remainder() {
    let field = FieldListField::new(
        "words",
        Vec::new(),
        NumField::short("w", 0u16),
        ListBound::Count(LengthFrom::Fixed(3)),
    );
    let (rest, value) = field
        .decode_standalone(&[0, 1, 0, 2, 0, 3, 0xde, 0xad])
        .unwrap();
    assert_eq!(value.as_list().unwrap().len(), 3);
    assert_eq!(rest, &[0xde, 0xad]);
}

#[test]
fn conditional_false_is_invisible() {
    let field = ConditionalField::new(NumField::int("extra", 7u32), Condition::new(|_| false));
    let value = field.default_value();
    assert_eq!(field.size(&Detached, &value).unwrap(), 0);
    assert!(field.encode_standalone(&value).unwrap().is_empty());
    let (rest, decoded) = field.decode_standalone(&[1, 2, 3, 4]).unwrap();
    assert_eq!(rest, &[1, 2, 3, 4]);
    assert_eq!(decoded, Value::Absent);
}

#[test]
fn random_messages_roundtrip() {
    let schema = Schema::builder("Header")
        .field(EnumField::byte("command", 0x72u8, smb_commands()))
        .field(BitField::new("version", 4u8, 4).unwrap())
        .field(FlagsField::new("flags", 0u8, 4, FlagNames::from_list(["A", "B", "C", "D"])).unwrap())
        .field(MacField::new("mac", "00:00:00:00:00:00"))
        .field(IpField::new("ip", "0.0.0.0"))
        .field(NumField::le_long("time", 0u64))
        .field(StrFixedLenField::new("tag", Value::Absent, 4usize))
        .field(StrNullField::new("path", Value::Absent))
        .build()
        .unwrap();
    let generator = RandomValue::Message(Arc::clone(&schema));
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..200 {
        let Value::Message(msg) = generator.sample(&mut rng) else {
            panic!("expected a message");
        };
        let bytes = msg.build().unwrap();
        let parsed = schema.dissect(&bytes).unwrap();
        assert_eq!(&parsed, &*msg);
        assert!(parsed.trailing().is_none());
    }
}
