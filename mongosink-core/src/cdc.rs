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

//! Change-event unwrapping.
//!
//! Change-data-capture records arrive wrapped in an envelope document
//! carrying an operation discriminator and before/after images of the
//! logical entity. A configured [`CdcHandler`] recognizes the envelope
//! and extracts a [`ChangeEvent`]; with no handler configured the
//! pipeline wraps the value document in a pass-through insert event.
//!
//! Two envelope dialects are supported out of the box:
//!
//! - [`MongoDbCdcHandler`]: the MongoDB source dialect, where `before`
//!   and `after` images are carried as embedded JSON strings.
//! - [`RdbmsCdcHandler`]: the relational source dialect, where images
//!   are subdocuments.
//!
//! Structurally invalid envelopes (unparseable embedded JSON, an update
//! with neither image) fail with [`SinkError::ChangeEvent`]; an unknown
//! operation tag is surfaced as [`EventOperation::Unrecognized`] and
//! rejected by the orchestrator.

use crate::document::SinkDocument;
use crate::error::SinkError;
use bson::{Bson, Document};

/// Envelope field carrying the operation discriminator.
pub const FIELD_OP: &str = "op";

/// Envelope field carrying the pre-image.
pub const FIELD_BEFORE: &str = "before";

/// Envelope field carrying the post-image.
pub const FIELD_AFTER: &str = "after";

/// The logical operation a change event describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventOperation {
    /// A new entity was created (or read during an initial snapshot).
    Insert,

    /// An existing entity was modified.
    Update,

    /// An entity was removed.
    Delete,

    /// The envelope carried an operation tag this handler does not know.
    ///
    /// Carries the original tag for error reporting.
    Unrecognized(String),
}

impl EventOperation {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "c" | "r" => Self::Insert,
            "u" => Self::Update,
            "d" => Self::Delete,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// One unwrapped change event.
///
/// Constructed once by the unwrapping stage and consumed immediately by
/// the post-processor chain and write-model strategy; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The logical operation.
    pub operation: EventOperation,

    /// The entity state before the operation, when the envelope carries it.
    pub pre_image: Option<Document>,

    /// The entity state after the operation, when the envelope carries it.
    pub post_image: Option<Document>,
}

impl ChangeEvent {
    /// Wraps a plain (non-CDC) value document as an insert event.
    #[must_use]
    pub fn pass_through(value_doc: Document) -> Self {
        Self {
            operation: EventOperation::Insert,
            pre_image: None,
            post_image: Some(value_doc),
        }
    }

    /// Returns true if this event describes a delete.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.operation == EventOperation::Delete
    }

    /// Returns the document later stages should operate on: the
    /// post-image for inserts and updates, the pre-image for deletes.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ChangeEvent`] when the required image is
    /// absent.
    pub fn working_document(&self) -> Result<Document, SinkError> {
        match self.operation {
            EventOperation::Delete => self.pre_image.clone().ok_or_else(|| {
                SinkError::change_event("delete event carries no identifying pre-image")
            }),
            _ => self
                .post_image
                .clone()
                .ok_or_else(|| SinkError::change_event("event carries no post-image")),
        }
    }
}

/// Pluggable change-event recognition.
///
/// Handlers are instantiated once from configuration and must be safe
/// for concurrent invocation.
pub trait CdcHandler: Send + Sync {
    /// Unwraps an envelope-formatted record into a change event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ChangeEvent`] when the envelope is
    /// structurally invalid.
    fn unwrap(&self, doc: &SinkDocument) -> Result<ChangeEvent, SinkError>;
}

fn operation_tag(value_doc: &Document) -> Result<&str, SinkError> {
    match value_doc.get(FIELD_OP) {
        Some(Bson::String(tag)) => Ok(tag),
        Some(_) => Err(SinkError::change_event(format!(
            "envelope field '{FIELD_OP}' is not a string"
        ))),
        None => Err(SinkError::change_event(format!(
            "value document is not a change event envelope: missing '{FIELD_OP}' field"
        ))),
    }
}

/// Handler for the MongoDB source envelope dialect.
///
/// Before/after images are embedded JSON strings (the source serializes
/// the raw oplog entry); a missing image for a delete falls back to the
/// record key, which carries the entity id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDbCdcHandler;

impl MongoDbCdcHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_image(field: &str, value: &Bson) -> Result<Option<Document>, SinkError> {
        match value {
            Bson::Null => Ok(None),
            Bson::String(json) => serde_json::from_str(json).map(Some).map_err(|err| {
                SinkError::change_event_caused_by(
                    format!("envelope field '{field}' is not valid embedded JSON"),
                    err,
                )
            }),
            Bson::Document(doc) => Ok(Some(doc.clone())),
            _ => Err(SinkError::change_event(format!(
                "envelope field '{field}' must be an embedded JSON string or a document"
            ))),
        }
    }

    fn image(value_doc: &Document, field: &str) -> Result<Option<Document>, SinkError> {
        value_doc
            .get(field)
            .map_or(Ok(None), |value| Self::parse_image(field, value))
    }
}

impl CdcHandler for MongoDbCdcHandler {
    fn unwrap(&self, doc: &SinkDocument) -> Result<ChangeEvent, SinkError> {
        let operation = EventOperation::from_tag(operation_tag(&doc.value_doc)?);
        let before = Self::image(&doc.value_doc, FIELD_BEFORE)?;
        let after = Self::image(&doc.value_doc, FIELD_AFTER)?;

        match operation {
            EventOperation::Insert => {
                if after.is_none() {
                    return Err(SinkError::change_event(
                        "insert envelope carries no after image",
                    ));
                }
            }
            EventOperation::Update => {
                if after.is_none() && before.is_none() {
                    return Err(SinkError::change_event(
                        "update envelope carries neither a before nor an after image",
                    ));
                }
            }
            EventOperation::Delete | EventOperation::Unrecognized(_) => {}
        }

        let (pre_image, post_image) = match operation {
            // The key document identifies the deleted entity when the
            // envelope has no before image.
            EventOperation::Delete => (before.or_else(|| Some(doc.key_doc.clone())), after),
            // An update without an after image falls back to the before
            // image so downstream stages still see the entity fields.
            EventOperation::Update => match after {
                Some(after) => (before, Some(after)),
                None => (None, before),
            },
            _ => (before, after),
        };

        Ok(ChangeEvent {
            operation,
            pre_image,
            post_image,
        })
    }
}

/// Handler for the relational source envelope dialect.
///
/// Identical envelope layout, but before/after images are plain
/// subdocuments rather than embedded JSON strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdbmsCdcHandler;

impl RdbmsCdcHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn image(value_doc: &Document, field: &str) -> Result<Option<Document>, SinkError> {
        match value_doc.get(field) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::Document(doc)) => Ok(Some(doc.clone())),
            Some(_) => Err(SinkError::change_event(format!(
                "envelope field '{field}' must be a document"
            ))),
        }
    }
}

impl CdcHandler for RdbmsCdcHandler {
    fn unwrap(&self, doc: &SinkDocument) -> Result<ChangeEvent, SinkError> {
        let operation = EventOperation::from_tag(operation_tag(&doc.value_doc)?);
        let before = Self::image(&doc.value_doc, FIELD_BEFORE)?;
        let after = Self::image(&doc.value_doc, FIELD_AFTER)?;

        match operation {
            EventOperation::Insert | EventOperation::Update => {
                if after.is_none() {
                    return Err(SinkError::change_event(format!(
                        "'{FIELD_AFTER}' image is required for inserts and updates"
                    )));
                }
            }
            EventOperation::Delete => {
                if before.is_none() && doc.key_doc.is_empty() {
                    return Err(SinkError::change_event(
                        "delete envelope carries no before image and the key is empty",
                    ));
                }
            }
            EventOperation::Unrecognized(_) => {}
        }

        let pre_image = match (&operation, before) {
            (EventOperation::Delete, None) => Some(doc.key_doc.clone()),
            (_, before) => before,
        };

        Ok(ChangeEvent {
            operation,
            pre_image,
            post_image: after,
        })
    }
}
