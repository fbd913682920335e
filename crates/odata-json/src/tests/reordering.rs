use crate::{
    JsonReader, NodeKind, ReadError, ReaderOptions, ReorderingJsonReader, SyntaxError, Value,
};

fn collect(reader: &mut ReorderingJsonReader<&[u8]>) -> Vec<(NodeKind, Option<Value>)> {
    let mut out = Vec::new();
    while reader.read().unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    out
}

fn property_order(doc: &str) -> Vec<String> {
    let mut reader = ReorderingJsonReader::new(doc.as_bytes());
    let mut names = Vec::new();
    while reader.read().unwrap() {
        if let Some(name) = reader.property_name() {
            names.push(name.to_owned());
        }
    }
    names
}

#[test_log::test]
fn annotations_surface_ahead_of_data_properties() {
    let doc = r##"{"name":"x","@odata.etag":"W/\"1\"","@odata.type":"#T","@id":"urn:1"}"##;
    assert_eq!(
        property_order(doc),
        ["@odata.type", "@id", "@odata.etag", "name"]
    );
}

#[test_log::test]
fn data_properties_keep_their_relative_order() {
    let doc = r#"{"b":1,"@id":"u","a":2,"c":3}"#;
    assert_eq!(property_order(doc), ["@id", "b", "a", "c"]);
}

#[test_log::test]
fn values_stay_attached_to_their_properties() {
    let doc = r##"{"name":"x","@odata.type":"#T"}"##;
    let mut reader = ReorderingJsonReader::new(doc.as_bytes());
    let nodes = collect(&mut reader);
    assert_eq!(
        nodes,
        vec![
            (NodeKind::StartObject, None),
            (
                NodeKind::Property,
                Some(Value::String("@odata.type".into()))
            ),
            (NodeKind::PrimitiveValue, Some(Value::String("#T".into()))),
            (NodeKind::Property, Some(Value::String("name".into()))),
            (NodeKind::PrimitiveValue, Some(Value::String("x".into()))),
            (NodeKind::EndObject, None),
        ]
    );
}

#[test_log::test]
fn each_array_element_is_reordered_independently() {
    let doc = r#"[{"b":1,"@id":"u"},{"@odata.etag":"e","a":2}]"#;
    assert_eq!(property_order(doc), ["@id", "b", "@odata.etag", "a"]);
}

#[test_log::test]
fn nested_objects_are_reordered_but_not_validated() {
    // Annotations in nested scopes are fronted like any other scope, but
    // unknown names there are tolerated in place.
    let doc = r#"{"@odata.etag":"e","child":{"z":1,"@bogus":2,"@odata.type":"ct"}}"#;
    assert_eq!(
        property_order(doc),
        ["@odata.etag", "child", "@odata.type", "z", "@bogus"]
    );
}

#[test_log::test]
fn objects_inside_nested_arrays_are_reordered() {
    let doc = r##"{"items":[{"b":1,"@id":"u"},7],"@odata.type":"#T"}"##;
    assert_eq!(
        property_order(doc),
        ["@odata.type", "items", "@id", "b"]
    );
}

#[test_log::test]
fn custom_namespace_annotations_stay_in_place() {
    let doc = r#"{"z":1,"@custom.hint":"h","a":2}"#;
    assert_eq!(property_order(doc), ["z", "@custom.hint", "a"]);
}

#[test_log::test]
fn unknown_reserved_annotations_are_rejected() {
    let mut reader = ReorderingJsonReader::new(r#"{"@odata.bogus":1}"#.as_bytes());
    let err = loop {
        match reader.read() {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(
        err,
        ReadError::Syntax(SyntaxError::UnknownODataAnnotation(_))
    ));

    let mut reader = ReorderingJsonReader::new(r#"{"@bogus":1}"#.as_bytes());
    let err = loop {
        match reader.read() {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(
        err,
        ReadError::Syntax(SyntaxError::InvalidInstanceAnnotationName(_))
    ));
}

#[test_log::test]
fn non_object_payloads_pass_through() {
    let doc = "[1,2,\"three\"]";
    let mut plain = JsonReader::new(doc.as_bytes());
    let mut expected = Vec::new();
    while plain.read().unwrap() {
        expected.push((plain.node_kind(), plain.value().cloned()));
    }
    let mut reader = ReorderingJsonReader::new(doc.as_bytes());
    assert_eq!(collect(&mut reader), expected);
}

#[test_log::test]
fn replayed_values_support_carve_outs() {
    let doc = r#"{"@id":"urn:1","text":"streamed"}"#;
    let mut reader = ReorderingJsonReader::new(doc.as_bytes());
    for _ in 0..4 {
        reader.read().unwrap();
    }
    assert_eq!(reader.property_name(), Some("text"));
    assert!(reader.can_stream().unwrap());
    let text = reader.text_value_reader().unwrap().read_to_string().unwrap();
    assert_eq!(text, "streamed");
    reader.read().unwrap();
    assert_eq!(reader.node_kind(), NodeKind::EndObject);
}

#[test_log::test]
fn in_stream_errors_pass_through_the_reorderer() {
    let doc = r#"{"error":{"code":"42","message":"boom"}}"#;
    let options = ReaderOptions {
        in_stream_error_trigger: Some("error".to_owned()),
        ..ReaderOptions::default()
    };
    let mut reader = ReorderingJsonReader::with_options(doc.as_bytes(), &options);
    let err = loop {
        match reader.read() {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    let err = err.into_in_stream_error().unwrap();
    assert_eq!(err.code.as_deref(), Some("42"));
    assert_eq!(err.message.as_deref(), Some("boom"));
}

#[test_log::test]
fn skip_value_works_over_replayed_nodes() {
    let doc = r#"{"@id":"u","big":{"x":[1,2,3]},"tail":true}"#;
    let mut reader = ReorderingJsonReader::new(doc.as_bytes());
    reader.read().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("@id"));
    reader.read().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("big"));
    reader.skip_value().unwrap();
    reader.read().unwrap();
    assert_eq!(reader.property_name(), Some("tail"));
}
