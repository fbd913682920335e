use crate::{
    BufferingJsonReader, JsonReader, NodeKind, ReadError, ReaderOptions, SyntaxError, Value,
};

fn collect(reader: &mut BufferingJsonReader<&[u8]>) -> Vec<(NodeKind, Option<Value>)> {
    let mut out = Vec::new();
    while reader.read().unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    out
}

fn trigger_options(name: &str) -> ReaderOptions {
    ReaderOptions {
        in_stream_error_trigger: Some(name.to_owned()),
        ..ReaderOptions::default()
    }
}

const ERROR_PAYLOAD: &str = concat!(
    r#"{"error":{"code":"501","message":"Unsupported functionality","#,
    r#""target":"query","details":[{"code":"500","target":"any target","#,
    r#""message":"Inner error"}],"innererror":{"trace":"stack","#,
    r#""internalexception":{"trace":"deeper"}}}}"#
);

#[test_log::test]
fn explicit_probe_parses_error_payload() {
    let mut reader = BufferingJsonReader::new(ERROR_PAYLOAD.as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("error"));

    let err = reader
        .start_buffering_and_try_read_in_stream_error("error")
        .unwrap()
        .unwrap();
    assert_eq!(err.code.as_deref(), Some("501"));
    assert_eq!(err.message.as_deref(), Some("Unsupported functionality"));
    assert_eq!(err.target.as_deref(), Some("query"));
    assert_eq!(err.details.len(), 1);
    assert_eq!(err.details[0].code.as_deref(), Some("500"));
    assert_eq!(err.details[0].target.as_deref(), Some("any target"));
    assert_eq!(err.details[0].message.as_deref(), Some("Inner error"));
    let inner = err.inner_error.unwrap();
    assert_eq!(inner.property("trace"), Some("stack"));
    assert_eq!(inner.inner.unwrap().property("trace"), Some("deeper"));
}

#[test_log::test]
fn explicit_probe_unintelligible_candidate_replays() {
    let doc = r#"{"error":{"code":13},"after":1}"#;
    let mut reader = BufferingJsonReader::new(doc.as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("error"));

    let outcome = reader
        .start_buffering_and_try_read_in_stream_error("error")
        .unwrap();
    assert!(outcome.is_none());

    // The rest of the payload reads exactly as a plain tokenizer would
    // produce it from the same position.
    let mut plain = JsonReader::new(doc.as_bytes());
    plain.read().unwrap();
    plain.read().unwrap();
    let mut expected = Vec::new();
    while plain.read().unwrap() {
        expected.push((plain.node_kind(), plain.value().cloned()));
    }
    assert_eq!(collect(&mut reader), expected);
}

#[test_log::test]
fn auto_interception_leaves_ordinary_payload_untouched() {
    let doc = r#"{"error":{"code":13}}"#;
    let mut plain = JsonReader::new(doc.as_bytes());
    let mut expected = Vec::new();
    while plain.read().unwrap() {
        expected.push((plain.node_kind(), plain.value().cloned()));
    }

    let mut reader = BufferingJsonReader::with_options(doc.as_bytes(), &trigger_options("error"));
    assert_eq!(collect(&mut reader), expected);
}

#[test_log::test]
fn auto_interception_surfaces_in_stream_error() {
    let mut reader =
        BufferingJsonReader::with_options(ERROR_PAYLOAD.as_bytes(), &trigger_options("error"));
    reader.read().unwrap();
    let err = loop {
        match reader.read() {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    let err = err.into_in_stream_error().unwrap();
    assert_eq!(err.code.as_deref(), Some("501"));
}

#[test_log::test]
fn trigger_below_document_root_is_not_intercepted() {
    let doc = r#"{"outer":{"error":{"code":"X","message":"m"}}}"#;
    let mut reader = BufferingJsonReader::with_options(doc.as_bytes(), &trigger_options("error"));
    let nodes = collect(&mut reader);
    assert_eq!(nodes.len(), 12);
}

#[test_log::test]
fn probe_at_wrong_position_is_a_no_op() {
    let doc = r#"{"data":{"code":"X"}}"#;
    let mut reader = BufferingJsonReader::new(doc.as_bytes());
    reader.read().unwrap();
    // Positioned on StartObject, not on a property.
    assert!(reader
        .start_buffering_and_try_read_in_stream_error("data")
        .unwrap()
        .is_none());
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("data"));
    // Positioned on a property with a different name.
    assert!(reader
        .start_buffering_and_try_read_in_stream_error("error")
        .unwrap()
        .is_none());
    // The payload is unaffected by either attempt.
    assert_eq!(collect(&mut reader).len(), 5);
}

#[test_log::test]
fn buffering_session_does_not_interfere() {
    let doc = r#"{"a":[1,2],"b":{"c":"x"},"d":null}"#;
    let mut plain = JsonReader::new(doc.as_bytes());
    let mut expected = Vec::new();
    while plain.read().unwrap() {
        expected.push((plain.node_kind(), plain.value().cloned()));
    }

    let mut reader = BufferingJsonReader::new(doc.as_bytes());
    let mut seen = Vec::new();
    let mut step = 0;
    while reader.read().unwrap() {
        seen.push((reader.node_kind(), reader.value().cloned()));
        step += 1;
        if step == 2 {
            reader.start_buffering();
        }
        if step == 7 {
            reader.stop_buffering();
        }
    }
    assert_eq!(seen, expected);
}

#[test_log::test]
fn replayed_string_value_can_be_carved_out() {
    let doc = r#"{"error":{"code":13,"text":"oops"},"z":2}"#;
    let mut reader = BufferingJsonReader::new(doc.as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    assert!(reader
        .start_buffering_and_try_read_in_stream_error("error")
        .unwrap()
        .is_none());

    // StartObject, "code", 13.
    for _ in 0..3 {
        reader.read().unwrap();
    }
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("text"));
    assert!(reader.can_stream().unwrap());
    let text = reader.text_value_reader().unwrap().read_to_string().unwrap();
    assert_eq!(text, "oops");
    // The value was consumed through the carve-out.
    assert!(matches!(
        reader.get_value(),
        Err(ReadError::Syntax(SyntaxError::InStreamState))
    ));
    reader.read().unwrap();
    assert_eq!(reader.node_kind(), NodeKind::EndObject);
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("z"));
}
