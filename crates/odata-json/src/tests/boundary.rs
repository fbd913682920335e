//! Chunk-boundary invariance: the node sequence must not depend on where
//! the input happens to be split.

use quickcheck::QuickCheck;

use crate::{JsonReader, NodeKind, Number, ReaderOptions, Value};

use super::utils::{nodes, nodes_with, SplitReader};

const CORPUS: &[&str] = &[
    r#"{"a":1,"b":[true,null],"c":"x"}"#,
    r#"{"name":"he said \"hi\"","n":-12.5e2,"t":"tab\there"}"#,
    r##"[{"@odata.type":"#T","v":"😀 and \uD83D\uDE00"},[[]],{}]"##,
    r#""just a string with \\ and \n inside""#,
    "123456789012345678901234567890",
    r#"{"deep":{"er":{"est":[1,2,3,{"x":null}]}}}"#,
];

#[test]
fn every_chunk_size_yields_identical_nodes() {
    for doc in CORPUS {
        let expected = nodes(doc);
        for chunk_size in 1..=doc.len() {
            let options = ReaderOptions {
                chunk_size,
                ..ReaderOptions::default()
            };
            assert_eq!(
                nodes_with(doc, &options),
                expected,
                "chunk size {chunk_size} diverged on {doc:?}"
            );
        }
    }
}

#[test]
fn arbitrary_partition_quickcheck() {
    fn prop(doc_index: usize, splits: Vec<usize>) -> bool {
        let doc = CORPUS[doc_index % CORPUS.len()];
        let expected = nodes(doc);
        let source = SplitReader::new(doc.as_bytes(), &splits);
        let mut reader = JsonReader::new(source);
        let mut out = Vec::new();
        loop {
            match reader.read() {
                Ok(true) => out.push((reader.node_kind(), reader.value().cloned())),
                Ok(false) => break,
                Err(_) => return false,
            }
        }
        out == expected
    }

    QuickCheck::new()
        .tests(1_000)
        .quickcheck(prop as fn(usize, Vec<usize>) -> bool);
}

/// A property name long enough that the colon lands past the tokenizer's
/// internal buffer still decodes as one name.
#[test]
fn long_property_name_straddles_internal_buffer() {
    let mut name = String::from("Pro");
    for _ in 0..2029 {
        name.push('o');
    }
    name.push('p');
    let doc = format!("{{\"{name}\":13}}");
    for chunk_size in [1, 7, 1024, 2048, 4096] {
        let options = ReaderOptions {
            chunk_size,
            ..ReaderOptions::default()
        };
        let mut reader = JsonReader::with_options(doc.as_bytes(), &options);
        reader.read().unwrap();
        reader.read().unwrap();
        assert_eq!(reader.property_name(), Some(name.as_str()));
        reader.read().unwrap();
        assert_eq!(
            reader.get_value().unwrap(),
            Value::Number(Number::Int(13))
        );
        reader.read().unwrap();
        assert_eq!(reader.node_kind(), NodeKind::EndObject);
    }
}

/// Multi-byte UTF-8 sequences split across chunk boundaries reassemble.
#[test]
fn multibyte_utf8_across_boundaries() {
    let doc = r#"{"héllo":"wörld 😀"}"#;
    let expected = nodes(doc);
    let options = ReaderOptions {
        chunk_size: 1,
        ..ReaderOptions::default()
    };
    assert_eq!(nodes_with(doc, &options), expected);
}

/// An escape sequence split at every possible point inside `\uXXXX`.
#[test]
fn split_escape_sequences_reassemble() {
    let doc = r#""a\uD83D\uDE00b\n""#;
    let expected = nodes(doc);
    for chunk_size in 1..doc.len() {
        let options = ReaderOptions {
            chunk_size,
            ..ReaderOptions::default()
        };
        assert_eq!(nodes_with(doc, &options), expected);
    }
}
