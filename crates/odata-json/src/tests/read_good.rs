use rstest::rstest;

use crate::{JsonReader, NodeKind, Number, ReaderOptions, Value};

use super::utils::{nodes, nodes_with};

fn prop(name: &str) -> (NodeKind, Option<Value>) {
    (NodeKind::Property, Some(Value::String(name.into())))
}

fn string(v: &str) -> (NodeKind, Option<Value>) {
    (NodeKind::PrimitiveValue, Some(Value::String(v.into())))
}

fn int(v: i64) -> (NodeKind, Option<Value>) {
    (NodeKind::PrimitiveValue, Some(Value::Number(Number::Int(v))))
}

fn bare(kind: NodeKind) -> (NodeKind, Option<Value>) {
    (kind, None)
}

#[test]
fn object_node_sequence() {
    assert_eq!(
        nodes(r#"{"a":1,"b":[true,null],"c":"x"}"#),
        vec![
            bare(NodeKind::StartObject),
            prop("a"),
            int(1),
            prop("b"),
            bare(NodeKind::StartArray),
            (NodeKind::PrimitiveValue, Some(Value::Bool(true))),
            (NodeKind::PrimitiveValue, Some(Value::Null)),
            bare(NodeKind::EndArray),
            prop("c"),
            string("x"),
            bare(NodeKind::EndObject),
        ]
    );
}

#[test]
fn top_level_primitive() {
    assert_eq!(nodes("  42 "), vec![int(42)]);
    assert_eq!(nodes("false"), vec![(
        NodeKind::PrimitiveValue,
        Some(Value::Bool(false))
    )]);
}

#[rstest]
#[case("13", Number::Int(13))]
#[case("-13", Number::Int(-13))]
#[case("9223372036854775807", Number::Int(i64::MAX))]
#[case("42.2", Number::Decimal("42.2".into()))]
#[case("1e3", Number::Decimal("1e3".into()))]
#[case("-0.5E-2", Number::Decimal("-0.5E-2".into()))]
// Too large for i64, preserved losslessly as its lexeme.
#[case(
    "123456789012345678901234567890",
    Number::Decimal("123456789012345678901234567890".into())
)]
fn lossless_numbers(#[case] input: &str, #[case] expected: Number) {
    assert_eq!(
        nodes(input),
        vec![(NodeKind::PrimitiveValue, Some(Value::Number(expected)))]
    );
}

#[rstest]
#[case("13", Number::Int(13))]
#[case("42.2", Number::Double(42.2))]
#[case("1e3", Number::Double(1000.0))]
fn narrow_numbers(#[case] input: &str, #[case] expected: Number) {
    let options = ReaderOptions {
        ieee754_compatible: false,
        ..ReaderOptions::default()
    };
    assert_eq!(
        nodes_with(input, &options),
        vec![(NodeKind::PrimitiveValue, Some(Value::Number(expected)))]
    );
}

#[test]
fn string_escapes() {
    assert_eq!(
        nodes(r#""a\nb\t\"q\"\\\/A""#),
        vec![string("a\nb\t\"q\"\\/A")]
    );
}

#[test]
fn unicode_escapes() {
    assert_eq!(nodes(r#""\u0041\u00e9""#), vec![string("A\u{00e9}")]);
}

#[test]
fn surrogate_pair_escape() {
    assert_eq!(nodes(r#""\uD83D\uDE00""#), vec![string("\u{1F600}")]);
}

#[test]
fn relaxed_names_and_quotes() {
    assert_eq!(
        nodes("{unquoted: 1, 'single': 'two', _under: 3}"),
        vec![
            bare(NodeKind::StartObject),
            prop("unquoted"),
            int(1),
            prop("single"),
            string("two"),
            prop("_under"),
            int(3),
            bare(NodeKind::EndObject),
        ]
    );
}

#[test]
fn empty_and_whitespace_input() {
    assert_eq!(nodes(""), vec![]);
    assert_eq!(nodes("   \r\n\t "), vec![]);
}

#[test]
fn read_after_end_keeps_returning_false() {
    let mut reader = JsonReader::new("1".as_bytes());
    assert!(reader.read().unwrap());
    assert!(!reader.read().unwrap());
    assert!(!reader.read().unwrap());
    assert_eq!(reader.node_kind(), NodeKind::EndOfInput);
}

#[test]
fn property_name_and_get_value_accessors() {
    let mut reader = JsonReader::new(r#"{"name":"value"}"#.as_bytes());
    reader.read().unwrap();
    assert_eq!(reader.property_name(), None);
    assert_eq!(reader.get_value().unwrap(), Value::Null);
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("name"));
    reader.read().unwrap();
    assert_eq!(reader.property_name(), None);
    assert_eq!(
        reader.get_value().unwrap(),
        Value::String("value".into())
    );
}

#[test]
fn typed_reads_walk_a_document() {
    let doc = r#"{"items":[1],"name":"x"}"#;
    let mut reader = JsonReader::new(doc.as_bytes());
    reader.read_start_object().unwrap();
    assert_eq!(reader.read_property_name().unwrap(), "items");
    reader.read_start_array().unwrap();
    assert_eq!(
        reader.read_primitive().unwrap(),
        Value::Number(Number::Int(1))
    );
    reader.read_end_array().unwrap();
    assert_eq!(reader.read_property_name().unwrap(), "name");
    assert_eq!(reader.read_primitive().unwrap(), Value::String("x".into()));
    reader.read_end_object().unwrap();
}

#[test]
fn skip_value_passes_whole_subtrees() {
    let input = r#"{"skipped":{"a":[1,{"b":2}],"c":3},"next":4}"#;
    let mut reader = JsonReader::new(input.as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("skipped"));
    reader.skip_value().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("next"));
    reader.read().unwrap();
    assert_eq!(
        reader.get_value().unwrap(),
        Value::Number(Number::Int(4))
    );
}

#[test]
fn skip_value_on_primitive_is_a_no_op() {
    let mut reader = JsonReader::new("[1,2]".as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    reader.skip_value().unwrap();
    reader.read().unwrap();
    assert_eq!(
        reader.get_value().unwrap(),
        Value::Number(Number::Int(2))
    );
}

#[test]
fn utf16_input_with_bom() {
    let text = "{\"k\":\"v\u{00e9}\"}";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let mut reader = JsonReader::new(bytes.as_slice());
    let mut out = Vec::new();
    while reader.read().unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    assert_eq!(
        out,
        vec![
            bare(NodeKind::StartObject),
            prop("k"),
            string("v\u{00e9}"),
            bare(NodeKind::EndObject),
        ]
    );
}
