use crate::{
    AsyncBufferingJsonReader, AsyncJsonReader, AsyncJsonWriter, AsyncReorderingJsonReader,
    NodeKind, Primitive, ReadError, ReaderOptions, Value,
};

use super::utils::nodes;

#[tokio::test]
async fn async_reader_matches_sync_node_sequence() {
    let doc = r#"{"a":1,"b":[true,null],"c":"x"}"#;
    let expected = nodes(doc);
    let mut reader = AsyncJsonReader::new(doc.as_bytes());
    let mut out = Vec::new();
    while reader.read().await.unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    assert_eq!(out, expected);
}

#[tokio::test]
async fn async_reader_respects_chunk_size() {
    let doc = r#"{"long":"abcdefghijklmnopqrstuvwxyz","n":-12.5e2}"#;
    let expected = nodes(doc);
    let options = ReaderOptions {
        chunk_size: 3,
        ..ReaderOptions::default()
    };
    let mut reader = AsyncJsonReader::with_options(doc.as_bytes(), &options);
    let mut out = Vec::new();
    while reader.read().await.unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    assert_eq!(out, expected);
}

#[tokio::test]
async fn async_text_carve_out() {
    let doc = r#"{"text":"streamed value","after":1}"#;
    let mut reader = AsyncJsonReader::new(doc.as_bytes());
    reader.read().await.unwrap();
    reader.read().await.unwrap();
    assert!(reader.can_stream().await.unwrap());
    let text = {
        let mut value = reader.text_value_reader().await.unwrap();
        value.read_to_string().await.unwrap()
    };
    assert_eq!(text, "streamed value");
    reader.read().await.unwrap();
    assert_eq!(reader.property_name(), Some("after"));
}

#[tokio::test]
async fn async_binary_carve_out() {
    let doc = r#""Zm9vYmFy""#;
    let mut reader = AsyncJsonReader::new(doc.as_bytes());
    let bytes = {
        let mut value = reader.binary_value_reader().await.unwrap();
        value.read_to_end().await.unwrap()
    };
    assert_eq!(bytes, b"foobar");
}

#[tokio::test]
async fn async_explicit_probe() {
    let doc = r#"{"error":{"code":"7","message":"async boom"}}"#;
    let mut reader = AsyncBufferingJsonReader::new(doc.as_bytes());
    reader.read().await.unwrap();
    reader.read().await.unwrap();
    let err = reader
        .start_buffering_and_try_read_in_stream_error("error")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(err.code.as_deref(), Some("7"));
    assert_eq!(err.message.as_deref(), Some("async boom"));
}

#[tokio::test]
async fn async_auto_interception_surfaces_error() {
    let doc = r#"{"error":{"code":"7","message":"async boom"}}"#;
    let options = ReaderOptions {
        in_stream_error_trigger: Some("error".to_owned()),
        ..ReaderOptions::default()
    };
    let mut reader = AsyncBufferingJsonReader::with_options(doc.as_bytes(), &options);
    reader.read().await.unwrap();
    let err = loop {
        match reader.read().await {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(err, ReadError::InStream(_)));
}

#[tokio::test]
async fn async_reordering_matches_sync() {
    let doc = r##"{"name":"x","@odata.type":"#T","@id":"urn:1"}"##;
    let mut reader = AsyncReorderingJsonReader::new(doc.as_bytes());
    let mut names = Vec::new();
    while reader.read().await.unwrap() {
        if reader.node_kind() == NodeKind::Property {
            if let Some(Value::String(name)) = reader.value() {
                names.push(name.clone());
            }
        }
    }
    assert_eq!(names, ["@odata.type", "@id", "name"]);
}

#[tokio::test]
async fn async_writer_produces_identical_output() {
    let mut writer = AsyncJsonWriter::new(Vec::new());
    writer.start_object().await.unwrap();
    writer.write_name("a").await.unwrap();
    writer.write_value(&Primitive::Int32(1)).await.unwrap();
    writer.write_name("data").await.unwrap();
    let mut stream = writer.start_stream_value_scope().await.unwrap();
    stream.write_bytes(b"foobar").await.unwrap();
    stream.finish().await.unwrap();
    writer.end_object().await.unwrap();
    let bytes = writer.into_inner().await.unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"a":1,"data":"Zm9vYmFy"}"#
    );
}

#[tokio::test]
async fn async_text_stream_scope() {
    let mut writer = AsyncJsonWriter::new(Vec::new());
    writer.start_array().await.unwrap();
    let mut stream = writer.start_text_value_scope("text/plain").await.unwrap();
    stream.write_chars("two\nlines").await.unwrap();
    stream.finish().await.unwrap();
    writer.end_array().await.unwrap();
    let bytes = writer.into_inner().await.unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), r#"["two\nlines"]"#);
}
