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

//! Inbound sink record representation.
//!
//! A [`SinkRecord`] is the immutable input to the pipeline: one key/value
//! pair delivered from a topic, together with its partition and offset.
//! The coordinates identify a delivery but carry no processing semantics;
//! only the key and value content matter to the pipeline.
//!
//! The key and value are [`RecordPayload`]s — a typed value whose variant
//! plays the role of the schema descriptor. Only string-encoded JSON and
//! structured documents can enter the pipeline; the remaining variants
//! exist so the document adapter can reject them with a classified error.
//!
//! # Example
//!
//! ```rust
//! use mongosink_core::record::{RecordPayload, SinkRecord};
//! use bson::doc;
//!
//! let record = SinkRecord::new(
//!     "orders",
//!     0,
//!     42,
//!     RecordPayload::String(r#"{"_id": 1}"#.to_string()),
//!     RecordPayload::Document(doc! { "_id": 1, "total": 99.5 }),
//! );
//! assert_eq!(record.coordinates(), "orders-0-42");
//! ```

use bson::Document;

/// A typed key or value payload.
///
/// The variant doubles as the payload's schema descriptor: the pipeline
/// only ever needs to know whether a payload is string-encodable,
/// structured, or neither.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    /// A string payload, expected to contain a JSON document.
    String(String),

    /// A structured payload already in document form.
    Document(Document),

    /// A bare 32-bit integer. Not convertible to a document.
    Int32(i32),

    /// A bare 64-bit integer. Not convertible to a document.
    Int64(i64),

    /// Raw bytes with no registered schema. Not convertible to a document.
    Bytes(Vec<u8>),

    /// An absent payload.
    Null,
}

impl RecordPayload {
    /// Returns the payload's type name for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Document(_) => "document",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Bytes(_) => "bytes",
            Self::Null => "null",
        }
    }

    /// Returns true if this payload can be converted to a document.
    #[must_use]
    pub const fn is_document_convertible(&self) -> bool {
        matches!(self, Self::String(_) | Self::Document(_))
    }
}

/// One inbound change-event record.
///
/// Immutable for the lifetime of a pipeline invocation. Cloning is cheap
/// relative to processing and is done once per tolerated failure so the
/// original record can be handed back for dead-lettering.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    /// Source topic name.
    pub topic: String,

    /// Source partition.
    pub partition: i32,

    /// Offset of this record within its partition.
    pub offset: i64,

    /// Record key.
    pub key: RecordPayload,

    /// Record value.
    pub value: RecordPayload,
}

impl SinkRecord {
    /// Creates a new sink record.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        key: RecordPayload,
        value: RecordPayload,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key,
            value,
        }
    }

    /// Returns the record's delivery coordinates as `topic-partition-offset`.
    ///
    /// Used in log output and by the topic-metadata identity strategy.
    #[must_use]
    pub fn coordinates(&self) -> String {
        format!("{}-{}-{}", self.topic, self.partition, self.offset)
    }
}

/// Read-only record context handed to post-processors and id strategies.
///
/// Bundles the original record with its adapted key document so stages
/// mutating the value document can still reach both.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// The record being processed.
    pub record: &'a SinkRecord,

    /// The adapted key document.
    pub key_doc: &'a Document,
}
