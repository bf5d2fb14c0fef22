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

//! Identity derivation strategies.
//!
//! The identity is the `_id` value targeted by upsert filters and
//! deletes. An [`IdStrategy`] derives a candidate identity for a record;
//! the [`DocumentIdAdder`](crate::processor::DocumentIdAdder)
//! post-processor applies it to the document, honoring the
//! overwrite-existing flag.
//!
//! Strategies that compute the identity from record content (key or
//! value fields) report themselves deterministic, which lets the adder
//! detect a conflicting pre-existing identity instead of silently
//! keeping it.

use crate::error::SinkError;
use crate::projection::Projection;
use crate::record::RecordContext;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use uuid::Uuid;

/// The identity field name.
pub const ID_FIELD: &str = "_id";

/// Pluggable identity derivation.
pub trait IdStrategy: Send + Sync {
    /// Derives the identity value for one record.
    ///
    /// `value_doc` is the current working document, which may already
    /// have been rewritten by earlier post-processors.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Identity`] when the strategy's source field
    /// is absent.
    fn generate_id(&self, ctx: &RecordContext<'_>, value_doc: &Document)
        -> Result<Bson, SinkError>;

    /// True if the strategy derives the same identity for the same
    /// record content.
    ///
    /// Generated identities (object ids, UUIDs) are not deterministic;
    /// identities projected from the record are.
    fn is_deterministic(&self) -> bool {
        false
    }
}

/// Generates a fresh BSON `ObjectId` per record. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonOidStrategy;

impl BsonOidStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for BsonOidStrategy {
    fn generate_id(
        &self,
        _ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::ObjectId(ObjectId::new()))
    }
}

/// Generates a random UUID string per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidStrategy;

impl UuidStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for UuidStrategy {
    fn generate_id(
        &self,
        _ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::String(Uuid::new_v4().to_string()))
    }
}

/// Uses the record's delivery coordinates (`topic-partition-offset`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicMetadataStrategy;

impl TopicMetadataStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for TopicMetadataStrategy {
    fn generate_id(
        &self,
        ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::String(ctx.record.coordinates()))
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Takes the `_id` field from the key document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvidedInKeyStrategy;

impl ProvidedInKeyStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for ProvidedInKeyStrategy {
    fn generate_id(
        &self,
        ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        ctx.key_doc.get(ID_FIELD).cloned().ok_or_else(|| {
            SinkError::identity(format!("key document has no '{ID_FIELD}' field"))
        })
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Takes the `_id` field from the value document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvidedInValueStrategy;

impl ProvidedInValueStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for ProvidedInValueStrategy {
    fn generate_id(
        &self,
        _ctx: &RecordContext<'_>,
        value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        value_doc.get(ID_FIELD).cloned().ok_or_else(|| {
            SinkError::identity(format!("value document has no '{ID_FIELD}' field"))
        })
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Uses the whole key document as a compound identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullKeyStrategy;

impl FullKeyStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdStrategy for FullKeyStrategy {
    fn generate_id(
        &self,
        ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::Document(ctx.key_doc.clone()))
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Projects a compound identity out of the key document.
#[derive(Debug, Clone)]
pub struct PartialKeyStrategy {
    projection: Projection,
}

impl PartialKeyStrategy {
    /// Creates the strategy with the given field projection.
    #[must_use]
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }
}

impl IdStrategy for PartialKeyStrategy {
    fn generate_id(
        &self,
        ctx: &RecordContext<'_>,
        _value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::Document(self.projection.apply(ctx.key_doc)))
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Projects a compound identity out of the value document.
#[derive(Debug, Clone)]
pub struct PartialValueStrategy {
    projection: Projection,
}

impl PartialValueStrategy {
    /// Creates the strategy with the given field projection.
    #[must_use]
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }
}

impl IdStrategy for PartialValueStrategy {
    fn generate_id(
        &self,
        _ctx: &RecordContext<'_>,
        value_doc: &Document,
    ) -> Result<Bson, SinkError> {
        Ok(Bson::Document(self.projection.apply(value_doc)))
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Extracts and validates the final identity from a processed document.
///
/// Called by the orchestrator after the post-processor chain has run:
/// whatever injection policy was configured, the processed document must
/// carry an identity by now.
///
/// # Errors
///
/// Returns [`SinkError::Identity`] when the document has no `_id` field.
pub fn derive_identity(doc: &Document) -> Result<Bson, SinkError> {
    doc.get(ID_FIELD).cloned().ok_or_else(|| {
        SinkError::identity(format!(
            "processed document has no '{ID_FIELD}' field; \
             configure an identity-injecting post-processor"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordPayload, SinkRecord};
    use bson::doc;

    fn ctx_record() -> SinkRecord {
        SinkRecord::new(
            "topic",
            2,
            9,
            RecordPayload::Document(doc! { "_id": "key-id", "region": "eu" }),
            RecordPayload::Document(doc! {}),
        )
    }

    #[test]
    fn oid_strategy_generates_unique_object_ids() {
        let record = ctx_record();
        let key_doc = doc! {};
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        let strategy = BsonOidStrategy::new();
        let first = strategy.generate_id(&ctx, &doc! {}).unwrap();
        let second = strategy.generate_id(&ctx, &doc! {}).unwrap();
        assert!(matches!(first, Bson::ObjectId(_)));
        assert_ne!(first, second);
        assert!(!strategy.is_deterministic());
    }

    #[test]
    fn provided_in_key_requires_id() {
        let record = ctx_record();
        let key_doc = doc! { "_id": "key-id" };
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        assert_eq!(
            ProvidedInKeyStrategy::new().generate_id(&ctx, &doc! {}).unwrap(),
            Bson::String("key-id".to_string())
        );

        let empty = doc! {};
        let ctx = RecordContext {
            record: &record,
            key_doc: &empty,
        };
        let err = ProvidedInKeyStrategy::new()
            .generate_id(&ctx, &doc! {})
            .unwrap_err();
        assert!(matches!(err, SinkError::Identity { .. }));
    }

    #[test]
    fn provided_in_value_requires_id() {
        let record = ctx_record();
        let key_doc = doc! {};
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        let err = ProvidedInValueStrategy::new()
            .generate_id(&ctx, &doc! { "name": "x" })
            .unwrap_err();
        assert!(matches!(err, SinkError::Identity { .. }));
    }

    #[test]
    fn topic_metadata_strategy_uses_coordinates() {
        let record = ctx_record();
        let key_doc = doc! {};
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        assert_eq!(
            TopicMetadataStrategy::new().generate_id(&ctx, &doc! {}).unwrap(),
            Bson::String("topic-2-9".to_string())
        );
    }

    #[test]
    fn partial_value_projects_allow_list() {
        let record = ctx_record();
        let key_doc = doc! {};
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        let strategy = PartialValueStrategy::new(Projection::allow_list(["a", "b"]));
        let id = strategy
            .generate_id(&ctx, &doc! { "a": 1, "b": 2, "c": 3 })
            .unwrap();
        assert_eq!(id, Bson::Document(doc! { "a": 1, "b": 2 }));
        assert!(strategy.is_deterministic());
    }

    #[test]
    fn full_key_uses_entire_key_document() {
        let record = ctx_record();
        let key_doc = doc! { "_id": "key-id", "region": "eu" };
        let ctx = RecordContext {
            record: &record,
            key_doc: &key_doc,
        };
        assert_eq!(
            FullKeyStrategy::new().generate_id(&ctx, &doc! {}).unwrap(),
            Bson::Document(doc! { "_id": "key-id", "region": "eu" })
        );
    }

    #[test]
    fn derive_identity_requires_id_field() {
        assert_eq!(
            derive_identity(&doc! { "_id": 5, "a": 1 }).unwrap(),
            Bson::Int32(5)
        );
        assert!(matches!(
            derive_identity(&doc! { "a": 1 }).unwrap_err(),
            SinkError::Identity { .. }
        ));
    }
}
