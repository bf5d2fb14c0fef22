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

//! Document model adapter.
//!
//! Converts a raw record's key and value payloads into the canonical
//! [`bson::Document`] pair every later stage operates on. This is the
//! first pipeline stage; its failures are [`SinkError::MalformedRecord`]
//! and are therefore always distinguishable from downstream semantic
//! errors.
//!
//! String payloads are parsed as JSON (extended JSON included, via the
//! `bson` serde integration). Structured payloads are taken as-is. Any
//! other payload type is terminal for the record.

use crate::error::SinkError;
use crate::record::{RecordPayload, SinkRecord};
use bson::Document;

/// The canonical key/value document pair for one record.
///
/// Produced fresh per record and never shared across records. The value
/// document is cloned out as the working document that later stages
/// mutate; the key document stays read-only for the whole invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkDocument {
    /// Canonical form of the record key.
    pub key_doc: Document,

    /// Canonical form of the record value.
    pub value_doc: Document,
}

impl SinkDocument {
    /// Adapts a raw record into its canonical document pair.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::MalformedRecord`] when either payload is not a
    /// structured or string-encoded document, or when a string payload is
    /// not valid JSON.
    pub fn from_record(record: &SinkRecord) -> Result<Self, SinkError> {
        Ok(Self {
            key_doc: payload_to_document(&record.key, "key")?,
            value_doc: payload_to_document(&record.value, "value")?,
        })
    }
}

fn payload_to_document(payload: &RecordPayload, side: &str) -> Result<Document, SinkError> {
    match payload {
        RecordPayload::Document(doc) => Ok(doc.clone()),
        RecordPayload::String(json) => serde_json::from_str(json).map_err(|err| {
            SinkError::malformed(format!("record {side} is not a valid JSON document: {err}"))
        }),
        other => Err(SinkError::malformed(format!(
            "record {side} of type '{}' cannot be converted to a document",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SinkRecord;
    use bson::doc;

    fn record(key: RecordPayload, value: RecordPayload) -> SinkRecord {
        SinkRecord::new("topic", 0, 0, key, value)
    }

    #[test]
    fn adapts_string_and_document_payloads() {
        let adapted = SinkDocument::from_record(&record(
            RecordPayload::String(r#"{"_id": "k"}"#.to_string()),
            RecordPayload::Document(doc! { "name": "Alice" }),
        ))
        .unwrap();

        assert_eq!(adapted.key_doc, doc! { "_id": "k" });
        assert_eq!(adapted.value_doc, doc! { "name": "Alice" });
    }

    #[test]
    fn rejects_non_document_payloads() {
        for payload in [
            RecordPayload::Int32(1),
            RecordPayload::Int64(1),
            RecordPayload::Bytes(vec![0xde, 0xad]),
            RecordPayload::Null,
        ] {
            let err = SinkDocument::from_record(&record(
                RecordPayload::String("{}".to_string()),
                payload,
            ))
            .unwrap_err();
            assert!(matches!(err, SinkError::MalformedRecord { .. }));
        }
    }

    #[test]
    fn rejects_invalid_json_string() {
        let err = SinkDocument::from_record(&record(
            RecordPayload::String("{}".to_string()),
            RecordPayload::String("not json".to_string()),
        ))
        .unwrap_err();
        assert!(matches!(err, SinkError::MalformedRecord { .. }));
    }

    #[test]
    fn key_errors_name_the_key_side() {
        let err = SinkDocument::from_record(&record(
            RecordPayload::Int32(7),
            RecordPayload::String("{}".to_string()),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("key"));
    }
}
