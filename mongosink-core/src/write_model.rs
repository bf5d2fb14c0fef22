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

//! Write-operation construction.
//!
//! A [`WriteModelStrategy`] turns the processed document, its identity
//! and the change event into one concrete [`WriteOp`]. Every
//! upsert-capable operation carries a filter built from the resolved
//! identity; strategies never emit an unfiltered upsert.
//!
//! Strategies that are not change-data-capture aware reject delete
//! events with [`SinkError::WriteModel`] rather than upserting a
//! tombstone.

use crate::cdc::ChangeEvent;
use crate::error::SinkError;
use crate::id_strategy::ID_FIELD;
use crate::record::SinkRecord;
use bson::{doc, Bson, Document};
use chrono::Utc;

/// Field receiving the last-modified timestamp on timestamped updates.
pub const FIELD_MODIFIED_TS: &str = "_modifiedTS";

/// Field receiving the inserted-at timestamp on first insert.
pub const FIELD_INSERTED_TS: &str = "_insertedTS";

/// One concrete storage write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert the document as-is.
    InsertOne {
        /// The document to insert.
        document: Document,
    },

    /// Replace the document matching `filter`, inserting when absent.
    ReplaceOne {
        /// Identity filter.
        filter: Document,
        /// The replacement document.
        replacement: Document,
        /// Whether to insert when no document matches.
        upsert: bool,
    },

    /// Apply an update spec to the document matching `filter`.
    UpdateOne {
        /// Identity filter.
        filter: Document,
        /// The update specification (`$set` and friends).
        update: Document,
        /// Whether to insert when no document matches.
        upsert: bool,
    },

    /// Delete the document matching `filter`.
    DeleteOne {
        /// Identity filter.
        filter: Document,
    },
}

impl WriteOp {
    /// Returns the operation's identity filter, if it has one.
    #[must_use]
    pub fn filter(&self) -> Option<&Document> {
        match self {
            Self::InsertOne { .. } => None,
            Self::ReplaceOne { filter, .. }
            | Self::UpdateOne { filter, .. }
            | Self::DeleteOne { filter } => Some(filter),
        }
    }

    /// Returns true for upsert-capable operations with upsert enabled.
    #[must_use]
    pub fn is_upsert(&self) -> bool {
        match self {
            Self::ReplaceOne { upsert, .. } | Self::UpdateOne { upsert, .. } => *upsert,
            Self::InsertOne { .. } | Self::DeleteOne { .. } => false,
        }
    }
}

/// Everything a strategy needs to build one operation.
#[derive(Debug, Clone, Copy)]
pub struct WriteModelContext<'a> {
    /// The unwrapped change event.
    pub event: &'a ChangeEvent,

    /// The derived identity.
    pub identity: &'a Bson,

    /// The fully processed document.
    pub document: &'a Document,

    /// The original record.
    pub record: &'a SinkRecord,
}

/// Pluggable write-operation construction.
pub trait WriteModelStrategy: Send + Sync {
    /// Builds the write operation for one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::WriteModel`] for unsupported
    /// operation/strategy combinations.
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError>;
}

fn identity_filter(identity: &Bson) -> Document {
    doc! { ID_FIELD: identity.clone() }
}

/// Requires the identity to be a compound (document-valued) business key.
fn business_key_filter(ctx: &WriteModelContext<'_>, strategy: &str) -> Result<Document, SinkError> {
    match ctx.identity {
        Bson::Document(business_key) => Ok(business_key.clone()),
        _ => Err(SinkError::write_model(format!(
            "{strategy} requires a document-valued identity; \
             configure a partial key/value identity strategy"
        ))),
    }
}

fn reject_delete(ctx: &WriteModelContext<'_>, strategy: &str) -> Result<(), SinkError> {
    if ctx.event.is_delete() {
        return Err(SinkError::write_model(format!(
            "{strategy} cannot handle delete events; \
             configure a delete-capable write model strategy"
        )));
    }
    Ok(())
}

fn now() -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(Utc::now()))
}

/// Replace-with-upsert keyed on the identity. The default strategy.
///
/// Change-data-capture aware: delete events become a [`WriteOp::DeleteOne`]
/// on the identity filter, and the post-image is ignored for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceOneDefaultStrategy;

impl ReplaceOneDefaultStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for ReplaceOneDefaultStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        if ctx.event.is_delete() {
            return Ok(WriteOp::DeleteOne {
                filter: identity_filter(ctx.identity),
            });
        }
        Ok(WriteOp::ReplaceOne {
            filter: identity_filter(ctx.identity),
            replacement: ctx.document.clone(),
            upsert: true,
        })
    }
}

/// Plain insert, for append-only collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOneDefaultStrategy;

impl InsertOneDefaultStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for InsertOneDefaultStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        reject_delete(ctx, "insert-one strategy")?;
        Ok(WriteOp::InsertOne {
            document: ctx.document.clone(),
        })
    }
}

/// Update-with-upsert keyed on the identity, maintaining
/// `_modifiedTS`/`_insertedTS` timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOneTimestampsStrategy;

impl UpdateOneTimestampsStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for UpdateOneTimestampsStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        reject_delete(ctx, "timestamped update strategy")?;
        let mut set = strip_timestamps(ctx.document);
        set.insert(FIELD_MODIFIED_TS, now());
        Ok(WriteOp::UpdateOne {
            filter: identity_filter(ctx.identity),
            update: doc! {
                "$set": set,
                "$setOnInsert": { FIELD_INSERTED_TS: now() },
            },
            upsert: true,
        })
    }
}

/// Update-with-upsert keyed on a compound business key.
///
/// The filter is the business-key document itself; `$set` carries every
/// document field except the identity and the timestamp markers, plus a
/// fresh `_modifiedTS`; `$setOnInsert` adds `_insertedTS` on first
/// insert only.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOneBusinessKeyTimestampStrategy;

impl UpdateOneBusinessKeyTimestampStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for UpdateOneBusinessKeyTimestampStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        reject_delete(ctx, "business-key update strategy")?;
        let filter = business_key_filter(ctx, "business-key update strategy")?;
        let mut set = strip_timestamps(ctx.document);
        set.remove(ID_FIELD);
        set.insert(FIELD_MODIFIED_TS, now());
        Ok(WriteOp::UpdateOne {
            filter,
            update: doc! {
                "$set": set,
                "$setOnInsert": { FIELD_INSERTED_TS: now() },
            },
            upsert: true,
        })
    }
}

/// Replace-with-upsert keyed on a compound business key.
///
/// The replacement document drops the injected identity so the stored
/// document keeps its storage-assigned `_id` across replacements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceOneBusinessKeyStrategy;

impl ReplaceOneBusinessKeyStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for ReplaceOneBusinessKeyStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        reject_delete(ctx, "business-key replace strategy")?;
        let filter = business_key_filter(ctx, "business-key replace strategy")?;
        let mut replacement = ctx.document.clone();
        replacement.remove(ID_FIELD);
        Ok(WriteOp::ReplaceOne {
            filter,
            replacement,
            upsert: true,
        })
    }
}

/// Deletes the document matching the identity.
///
/// The configured delete strategy for change-data-capture delete events;
/// applied to every event when configured as the main strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOneDefaultStrategy;

impl DeleteOneDefaultStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WriteModelStrategy for DeleteOneDefaultStrategy {
    fn create(&self, ctx: &WriteModelContext<'_>) -> Result<WriteOp, SinkError> {
        Ok(WriteOp::DeleteOne {
            filter: identity_filter(ctx.identity),
        })
    }
}

fn strip_timestamps(doc: &Document) -> Document {
    let mut out = doc.clone();
    out.remove(FIELD_MODIFIED_TS);
    out.remove(FIELD_INSERTED_TS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::{ChangeEvent, EventOperation};
    use crate::record::{RecordPayload, SinkRecord};

    fn test_record() -> SinkRecord {
        SinkRecord::new(
            "topic",
            0,
            0,
            RecordPayload::Document(doc! { "_id": 1 }),
            RecordPayload::Document(doc! {}),
        )
    }

    fn upsert_event(doc: Document) -> ChangeEvent {
        ChangeEvent::pass_through(doc)
    }

    fn delete_event() -> ChangeEvent {
        ChangeEvent {
            operation: EventOperation::Delete,
            pre_image: Some(doc! { "_id": 1 }),
            post_image: None,
        }
    }

    #[test]
    fn replace_default_builds_upsert_on_identity() {
        let record = test_record();
        let event = upsert_event(doc! { "_id": 1, "a": "a" });
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1, "a": "a" };
        let op = ReplaceOneDefaultStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap();
        assert_eq!(
            op,
            WriteOp::ReplaceOne {
                filter: doc! { "_id": 1 },
                replacement: doc! { "_id": 1, "a": "a" },
                upsert: true,
            }
        );
    }

    #[test]
    fn replace_default_turns_deletes_into_delete_ops() {
        let record = test_record();
        let event = delete_event();
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1 };
        let op = ReplaceOneDefaultStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap();
        assert_eq!(
            op,
            WriteOp::DeleteOne {
                filter: doc! { "_id": 1 }
            }
        );
    }

    #[test]
    fn insert_strategy_rejects_deletes() {
        let record = test_record();
        let event = delete_event();
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1 };
        let err = InsertOneDefaultStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap_err();
        assert!(matches!(err, SinkError::WriteModel { .. }));
    }

    #[test]
    fn timestamps_strategy_splits_set_and_set_on_insert() {
        let record = test_record();
        let event = upsert_event(doc! {});
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1, "a": "a" };
        let op = UpdateOneTimestampsStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap();
        let WriteOp::UpdateOne {
            filter,
            update,
            upsert,
        } = op
        else {
            panic!("expected an update operation");
        };
        assert!(upsert);
        assert_eq!(filter, doc! { "_id": 1 });

        let set = update.get_document("$set").unwrap();
        assert!(set.get_datetime(FIELD_MODIFIED_TS).is_ok());
        assert_eq!(set.get("a"), Some(&Bson::String("a".to_string())));

        let set_on_insert = update.get_document("$setOnInsert").unwrap();
        assert!(set_on_insert.get_datetime(FIELD_INSERTED_TS).is_ok());
    }

    #[test]
    fn business_key_strategy_requires_document_identity() {
        let record = test_record();
        let event = upsert_event(doc! {});
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1 };
        let err = UpdateOneBusinessKeyTimestampStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap_err();
        assert!(matches!(err, SinkError::WriteModel { .. }));
    }

    #[test]
    fn business_key_replace_drops_identity_from_replacement() {
        let record = test_record();
        let event = upsert_event(doc! {});
        let identity = Bson::Document(doc! { "a": "a" });
        let document = doc! { "_id": { "a": "a" }, "a": "a", "b": "b" };
        let op = ReplaceOneBusinessKeyStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap();
        assert_eq!(
            op,
            WriteOp::ReplaceOne {
                filter: doc! { "a": "a" },
                replacement: doc! { "a": "a", "b": "b" },
                upsert: true,
            }
        );
    }

    #[test]
    fn delete_strategy_filters_on_identity() {
        let record = test_record();
        let event = delete_event();
        let identity = Bson::Int32(1);
        let document = doc! { "_id": 1 };
        let op = DeleteOneDefaultStrategy::new()
            .create(&WriteModelContext {
                event: &event,
                identity: &identity,
                document: &document,
                record: &record,
            })
            .unwrap();
        assert_eq!(
            op,
            WriteOp::DeleteOne {
                filter: doc! { "_id": 1 }
            }
        );
        assert!(!op.is_upsert());
        assert_eq!(op.filter(), Some(&doc! { "_id": 1 }));
    }
}
