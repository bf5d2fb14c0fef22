// Copyright 2025 Mongosink Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for the document model adapter and canonical representation.

use bson::{doc, Document};
use mongosink_core::document::SinkDocument;
use mongosink_core::error::SinkError;
use mongosink_core::record::{RecordPayload, SinkRecord};

fn record(key: RecordPayload, value: RecordPayload) -> SinkRecord {
    SinkRecord::new("topic", 0, 0, key, value)
}

#[test]
fn structured_and_string_payloads_adapt_to_the_same_document() {
    let doc = doc! { "name": "Alice", "tags": ["a", "b"], "nested": { "x": true } };
    let json = serde_json::to_string(&doc).unwrap();

    let from_doc = SinkDocument::from_record(&record(
        RecordPayload::Document(doc! { "_id": "k" }),
        RecordPayload::Document(doc.clone()),
    ))
    .unwrap();
    let from_json = SinkDocument::from_record(&record(
        RecordPayload::String(r#"{"_id": "k"}"#.to_string()),
        RecordPayload::String(json),
    ))
    .unwrap();

    assert_eq!(from_doc.value_doc, from_json.value_doc);
    assert_eq!(from_doc.key_doc, from_json.key_doc);
}

#[test]
fn non_document_payloads_fail_before_any_downstream_stage() {
    let err = SinkDocument::from_record(&record(
        RecordPayload::Int32(1),
        RecordPayload::Int32(1),
    ))
    .unwrap_err();
    assert!(matches!(err, SinkError::MalformedRecord { .. }));
}

#[test]
fn bson_round_trip_preserves_every_field() {
    let original = doc! {
        "string": "value",
        "int32": 42i32,
        "int64": 42i64,
        "double": 4.25,
        "bool": true,
        "null": bson::Bson::Null,
        "array": [1, 2, 3],
        "nested": { "deep": { "field": "x" } },
    };

    let bytes = bson::to_vec(&original).unwrap();
    let decoded: Document = bson::from_slice(&bytes).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn json_round_trip_is_stable_after_first_parse() {
    // Parsing normalizes JSON numbers into concrete BSON types; after
    // that first parse, encode/decode must be a fixpoint.
    let parsed: Document = serde_json::from_str(
        r#"{"a": 1, "b": [true, null, "s"], "c": {"d": 2.5}}"#,
    )
    .unwrap();

    let encoded = serde_json::to_string(&parsed).unwrap();
    let reparsed: Document = serde_json::from_str(&encoded).unwrap();
    assert_eq!(reparsed, parsed);
}
