//! Wire compatibility of the three exported artifacts.

use serde_json::{json, Value as Json};

use dataspec::schema::{Schema, Size, Type};
use dataspec::source::{Catalog, TableDef, TableName};
use dataspec::wire::WIRE_VERSION;
use dataspec::{AnyArtifact, Artifact, Artifacts, DataSpecError, Manager, Node, Pipeline};

fn artifacts() -> Artifacts {
    let catalog = Catalog::new()
        .with_table(
            "extract",
            "visits",
            TableDef::new(420)
                .with_column("patient", Type::integer())
                .with_column("ward", Type::text_values(["A", "B", "C"])),
        )
        .with_table(
            "extract",
            "wards",
            TableDef::new(3)
                .with_column("ward", Type::text_values(["A", "B", "C"]))
                .public(),
        );
    let manager = Manager::in_memory().unwrap();
    let source = manager
        .source(
            &catalog,
            "postgres://hospital",
            &[TableName::new("extract", "visits"), TableName::new("extract", "wards")],
        )
        .unwrap();
    manager.set_big_data(source.uuid(), false).unwrap();
    let output = Pipeline::new(&manager).run(&source).unwrap();
    manager.export(output.result()).unwrap()
}

fn json(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn test_each_artifact_decodes_independently() {
    let artifacts = artifacts();
    let node = Node::decode(&artifacts.dataset).unwrap();
    let schema = Schema::decode(&artifacts.schema).unwrap();
    let size = Size::decode(&artifacts.size).unwrap();

    assert_eq!(schema.dataset(), node.uuid());
    assert_eq!(size.dataset(), node.uuid());
    assert_ne!(schema.uuid(), size.uuid());

    assert_eq!(node.encode().unwrap(), artifacts.dataset);
    assert_eq!(schema.encode().unwrap(), artifacts.schema);
    assert_eq!(size.encode().unwrap(), artifacts.size);
}

#[test]
fn test_envelope_fields() {
    let artifacts = artifacts();
    for (bytes, type_url) in [
        (&artifacts.dataset, "dataspec/Dataset"),
        (&artifacts.schema, "dataspec/Schema"),
        (&artifacts.size, "dataspec/Size"),
    ] {
        let value = json(bytes);
        assert_eq!(value["@type"], json!(type_url));
        assert_eq!(value["version"], json!(WIRE_VERSION));
        assert_eq!(AnyArtifact::decode(bytes).unwrap().type_url(), type_url);
    }
}

#[test]
fn test_keys_are_sorted() {
    let text = String::from_utf8(artifacts().schema).unwrap();
    let value = json(text.as_bytes());
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(serde_json::to_string(&value).unwrap(), text);
}

#[test]
fn test_future_top_level_fields_survive() {
    let artifacts = artifacts();
    let mut value = json(&artifacts.size);
    value["provenance"] = json!({"job": 7});
    let bytes = serde_json::to_vec(&value).unwrap();

    let size = Size::decode(&bytes).unwrap();
    assert_eq!(size.extra()["provenance"], json!({"job": 7}));
    assert_eq!(size.encode().unwrap(), bytes);
}

#[test]
fn test_tampered_definition_is_rejected() {
    let mut value = json(&artifacts().dataset);
    value["spec"]["transformed"]["transform"]["version"] = json!(9);
    let err = Node::decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
    assert!(matches!(err, DataSpecError::Decode { .. }));
}

#[test]
fn test_truncated_payload_reports_offset() {
    let artifacts = artifacts();
    let cut = &artifacts.schema[..artifacts.schema.len() / 2];
    match Schema::decode(cut).unwrap_err() {
        DataSpecError::Decode { offset, .. } => {
            let offset = offset.expect("offset of the parse error");
            assert!(offset <= cut.len());
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_unknown_artifact_type() {
    let bytes = serde_json::to_vec(&json!({"@type": "dataspec/Plan", "version": 1})).unwrap();
    assert!(matches!(
        AnyArtifact::decode(&bytes),
        Err(DataSpecError::Decode { .. })
    ));
}
