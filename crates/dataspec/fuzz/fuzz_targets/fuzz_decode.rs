//! Fuzz target for the wire decoder.
//!
//! This fuzzer tests that artifact decoding:
//! 1. Never panics on malformed input
//! 2. Only accepts payloads that re-encode to an equal value
//! 3. Reports parse errors at an offset inside the input

#![no_main]

use dataspec::{AnyArtifact, Artifact, DataSpecError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only process reasonable-sized inputs to avoid OOM
    if data.len() > 100_000 {
        return;
    }

    match AnyArtifact::decode(data) {
        Ok(artifact) => {
            let bytes = match &artifact {
                AnyArtifact::Dataset(node) => node.encode(),
                AnyArtifact::Schema(schema) => schema.encode(),
                AnyArtifact::Size(size) => size.encode(),
            }
            .expect("decoded artifact must encode");
            let again = AnyArtifact::decode(&bytes).expect("re-encoded artifact must decode");
            assert_eq!(again, artifact);
        }
        Err(DataSpecError::Decode { offset: Some(offset), .. }) => {
            assert!(offset <= data.len());
        }
        Err(_) => {}
    }
});
