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

//! Namespace resolution.
//!
//! A [`Namespace`] is the destination database/collection pair for one
//! record. Resolution is pluggable through [`NamespaceMapper`]; a
//! configured mapper fully determines the namespace, the
//! [`DefaultNamespaceMapper`] otherwise derives the collection from the
//! record's topic.
//!
//! Mapper failures are record-level [`SinkError::NamespaceMapping`]
//! errors, never pipeline crashes: the orchestrator applies the
//! configured error tolerance to them like to any other stage failure.

use crate::document::SinkDocument;
use crate::error::SinkError;
use crate::projection::get_path;
use crate::record::SinkRecord;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A destination namespace (database + collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name.
    pub database: String,

    /// Collection name.
    pub collection: String,
}

impl Namespace {
    /// Creates a new namespace from database and collection names.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Creates a namespace, rejecting empty parts.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NamespaceMapping`] when either part is empty.
    pub fn checked(
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let namespace = Self::new(database, collection);
        if namespace.database.is_empty() {
            return Err(SinkError::namespace_mapping("database name is empty"));
        }
        if namespace.collection.is_empty() {
            return Err(SinkError::namespace_mapping("collection name is empty"));
        }
        Ok(namespace)
    }

    /// Returns the fully qualified namespace as "database.collection".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// Pluggable namespace resolution.
///
/// Implementations are instantiated once from configuration and must be
/// safe to call from concurrent pipeline invocations.
pub trait NamespaceMapper: Send + Sync {
    /// Resolves the destination namespace for one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NamespaceMapping`] when no valid namespace
    /// can be produced.
    fn map(&self, record: &SinkRecord, doc: &SinkDocument) -> Result<Namespace, SinkError>;
}

/// Topic-based default resolution.
///
/// Database comes from configuration; the collection is the record's
/// topic name unless an explicit override is configured, in which case
/// the override wins regardless of topic.
#[derive(Debug, Clone)]
pub struct DefaultNamespaceMapper {
    database: String,
    collection: Option<String>,
}

impl DefaultNamespaceMapper {
    /// Creates the default mapper.
    #[must_use]
    pub fn new(database: impl Into<String>, collection: Option<String>) -> Self {
        Self {
            database: database.into(),
            collection,
        }
    }
}

impl NamespaceMapper for DefaultNamespaceMapper {
    fn map(&self, record: &SinkRecord, _doc: &SinkDocument) -> Result<Namespace, SinkError> {
        let collection = self
            .collection
            .clone()
            .unwrap_or_else(|| record.topic.clone());
        Namespace::checked(self.database.clone(), collection)
    }
}

/// Which adapted document a field path reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Read from the key document.
    Key,

    /// Read from the value document.
    Value,
}

/// Resolves namespace parts from document fields.
///
/// Each part (database, collection) can be read from a dotted field path
/// in the key or value document. Parts without a configured path fall
/// back to the default mapping. When `error_if_invalid` is set, a missing
/// or non-string field fails the record; otherwise the part falls back
/// to the default mapping as well.
#[derive(Debug, Clone)]
pub struct FieldPathNamespaceMapper {
    fallback: DefaultNamespaceMapper,
    database_field: Option<(FieldSource, String)>,
    collection_field: Option<(FieldSource, String)>,
    error_if_invalid: bool,
}

impl FieldPathNamespaceMapper {
    /// Creates a field-path mapper falling back to the given default
    /// mapping.
    #[must_use]
    pub fn new(fallback: DefaultNamespaceMapper) -> Self {
        Self {
            fallback,
            database_field: None,
            collection_field: None,
            error_if_invalid: false,
        }
    }

    /// Reads the database name from a field path.
    #[must_use]
    pub fn database_field(mut self, source: FieldSource, path: impl Into<String>) -> Self {
        self.database_field = Some((source, path.into()));
        self
    }

    /// Reads the collection name from a field path.
    #[must_use]
    pub fn collection_field(mut self, source: FieldSource, path: impl Into<String>) -> Self {
        self.collection_field = Some((source, path.into()));
        self
    }

    /// Fails the record instead of falling back when a configured field
    /// is missing or not a string.
    #[must_use]
    pub const fn error_if_invalid(mut self, strict: bool) -> Self {
        self.error_if_invalid = strict;
        self
    }

    fn resolve_part(
        &self,
        doc: &SinkDocument,
        field: &Option<(FieldSource, String)>,
    ) -> Result<Option<String>, SinkError> {
        let Some((source, path)) = field else {
            return Ok(None);
        };
        let source_doc: &Document = match source {
            FieldSource::Key => &doc.key_doc,
            FieldSource::Value => &doc.value_doc,
        };
        match get_path(source_doc, path) {
            Some(Bson::String(part)) => Ok(Some(part.clone())),
            Some(_other) => {
                if self.error_if_invalid {
                    Err(SinkError::namespace_mapping(format!(
                        "field '{path}' must be a string"
                    )))
                } else {
                    Ok(None)
                }
            }
            None => {
                if self.error_if_invalid {
                    Err(SinkError::namespace_mapping(format!(
                        "field '{path}' is missing from the record"
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

impl NamespaceMapper for FieldPathNamespaceMapper {
    fn map(&self, record: &SinkRecord, doc: &SinkDocument) -> Result<Namespace, SinkError> {
        let fallback = self.fallback.map(record, doc)?;
        let database = self
            .resolve_part(doc, &self.database_field)?
            .unwrap_or(fallback.database);
        let collection = self
            .resolve_part(doc, &self.collection_field)?
            .unwrap_or(fallback.collection);
        Namespace::checked(database, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordPayload;
    use bson::doc;

    fn record_with_value(value: Document) -> (SinkRecord, SinkDocument) {
        let record = SinkRecord::new(
            "topic",
            0,
            0,
            RecordPayload::Document(doc! { "_id": 1 }),
            RecordPayload::Document(value),
        );
        let adapted = SinkDocument::from_record(&record).unwrap();
        (record, adapted)
    }

    #[test]
    fn checked_rejects_empty_parts() {
        assert!(Namespace::checked("", "coll").is_err());
        assert!(Namespace::checked("db", "").is_err());
        assert_eq!(
            Namespace::checked("db", "coll").unwrap().full_name(),
            "db.coll"
        );
    }

    #[test]
    fn default_mapper_uses_topic_as_collection() {
        let (record, doc) = record_with_value(doc! {});
        let mapper = DefaultNamespaceMapper::new("mydb", None);
        assert_eq!(
            mapper.map(&record, &doc).unwrap(),
            Namespace::new("mydb", "topic")
        );
    }

    #[test]
    fn default_mapper_collection_override_wins() {
        let (record, doc) = record_with_value(doc! {});
        let mapper = DefaultNamespaceMapper::new("mydb", Some("override".to_string()));
        assert_eq!(
            mapper.map(&record, &doc).unwrap(),
            Namespace::new("mydb", "override")
        );
    }

    #[test]
    fn field_path_mapper_reads_parts_from_value() {
        let (record, doc) =
            record_with_value(doc! { "routing": { "db": "tenants", "coll": "alice" } });
        let mapper = FieldPathNamespaceMapper::new(DefaultNamespaceMapper::new("mydb", None))
            .database_field(FieldSource::Value, "routing.db")
            .collection_field(FieldSource::Value, "routing.coll");
        assert_eq!(
            mapper.map(&record, &doc).unwrap(),
            Namespace::new("tenants", "alice")
        );
    }

    #[test]
    fn field_path_mapper_reads_from_key() {
        let (record, doc) = record_with_value(doc! {});
        let mapper = FieldPathNamespaceMapper::new(DefaultNamespaceMapper::new("mydb", None))
            .collection_field(FieldSource::Key, "_id");
        // _id is an int, not a string: lenient mode falls back to topic.
        assert_eq!(
            mapper.map(&record, &doc).unwrap(),
            Namespace::new("mydb", "topic")
        );
    }

    #[test]
    fn strict_mode_fails_on_missing_field() {
        let (record, doc) = record_with_value(doc! {});
        let mapper = FieldPathNamespaceMapper::new(DefaultNamespaceMapper::new("mydb", None))
            .collection_field(FieldSource::Value, "missing")
            .error_if_invalid(true);
        let err = mapper.map(&record, &doc).unwrap_err();
        assert!(matches!(err, SinkError::NamespaceMapping { .. }));
    }

    #[test]
    fn lenient_mode_falls_back_on_missing_field() {
        let (record, doc) = record_with_value(doc! {});
        let mapper = FieldPathNamespaceMapper::new(DefaultNamespaceMapper::new("mydb", None))
            .collection_field(FieldSource::Value, "missing");
        assert_eq!(
            mapper.map(&record, &doc).unwrap(),
            Namespace::new("mydb", "topic")
        );
    }
}
