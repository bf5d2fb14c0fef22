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

//! Sink configuration.
//!
//! [`SinkConfig`] carries everything the pipeline consumes: the
//! destination database, the pluggable strategies for each stage, and
//! the error-tolerance mode. Strategies are instantiated once here and
//! shared read-only across concurrent pipeline invocations.
//!
//! # Example
//!
//! ```rust
//! use mongosink_core::config::{ErrorTolerance, SinkConfig};
//!
//! let config = SinkConfig::builder()
//!     .database("myDB")
//!     .collection("events")
//!     .error_tolerance(ErrorTolerance::All)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.error_tolerance, ErrorTolerance::All);
//! ```

use crate::cdc::CdcHandler;
use crate::error::SinkError;
use crate::id_strategy::{BsonOidStrategy, IdStrategy};
use crate::namespace::{DefaultNamespaceMapper, NamespaceMapper};
use crate::processor::{DocumentIdAdder, PostProcessor};
use crate::write_model::{ReplaceOneDefaultStrategy, WriteModelStrategy};
use std::sync::Arc;

/// What to do when a record fails any pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorTolerance {
    /// Fail fast: the error is returned to the caller synchronously.
    #[default]
    None,

    /// Capture the error on the processed record; the caller inspects
    /// it and skips the record without aborting the batch.
    All,
}

/// Immutable per-topic sink configuration.
///
/// Construct through [`SinkConfig::builder`].
#[derive(Clone)]
pub struct SinkConfig {
    /// Destination database name.
    pub database: String,

    /// Optional collection override; the record topic is used otherwise.
    pub collection: Option<String>,

    /// Namespace resolution. Defaults to topic-based resolution over
    /// `database`/`collection`.
    pub namespace_mapper: Arc<dyn NamespaceMapper>,

    /// Change-data-capture envelope handler. With none configured,
    /// records pass through as insert events.
    pub cdc_handler: Option<Arc<dyn CdcHandler>>,

    /// Ordered post-processor chain. Defaults to identity injection
    /// only.
    pub post_processors: Vec<Arc<dyn PostProcessor>>,

    /// Main write-model strategy. Defaults to replace-with-upsert.
    pub write_model_strategy: Arc<dyn WriteModelStrategy>,

    /// Strategy for delete events. With none configured, delete events
    /// go to the main strategy, which may reject them.
    pub delete_write_model_strategy: Option<Arc<dyn WriteModelStrategy>>,

    /// Error-tolerance mode.
    pub error_tolerance: ErrorTolerance,
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkConfig")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("error_tolerance", &self.error_tolerance)
            .finish_non_exhaustive()
    }
}

impl SinkConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::default()
    }
}

/// Builder for [`SinkConfig`].
#[derive(Default)]
pub struct SinkConfigBuilder {
    database: Option<String>,
    collection: Option<String>,
    namespace_mapper: Option<Arc<dyn NamespaceMapper>>,
    cdc_handler: Option<Arc<dyn CdcHandler>>,
    post_processors: Option<Vec<Arc<dyn PostProcessor>>>,
    id_strategy: Option<Arc<dyn IdStrategy>>,
    id_overwrite_existing: bool,
    write_model_strategy: Option<Arc<dyn WriteModelStrategy>>,
    delete_write_model_strategy: Option<Arc<dyn WriteModelStrategy>>,
    error_tolerance: ErrorTolerance,
}

impl SinkConfigBuilder {
    /// Sets the destination database (required).
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Overrides the destination collection for every topic.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Installs a custom namespace mapper, fully overriding the default
    /// topic-based resolution.
    #[must_use]
    pub fn namespace_mapper(mut self, mapper: Arc<dyn NamespaceMapper>) -> Self {
        self.namespace_mapper = Some(mapper);
        self
    }

    /// Installs a change-data-capture handler.
    #[must_use]
    pub fn cdc_handler(mut self, handler: Arc<dyn CdcHandler>) -> Self {
        self.cdc_handler = Some(handler);
        self
    }

    /// Replaces the post-processor chain. The default chain (identity
    /// injection) is dropped; list it explicitly if it should run.
    #[must_use]
    pub fn post_processors(mut self, processors: Vec<Arc<dyn PostProcessor>>) -> Self {
        self.post_processors = Some(processors);
        self
    }

    /// Sets the identity strategy used by the default post-processor
    /// chain.
    #[must_use]
    pub fn id_strategy(mut self, strategy: Arc<dyn IdStrategy>) -> Self {
        self.id_strategy = Some(strategy);
        self
    }

    /// Lets the default identity injection overwrite an existing
    /// identity.
    #[must_use]
    pub const fn id_overwrite_existing(mut self, overwrite: bool) -> Self {
        self.id_overwrite_existing = overwrite;
        self
    }

    /// Sets the main write-model strategy.
    #[must_use]
    pub fn write_model_strategy(mut self, strategy: Arc<dyn WriteModelStrategy>) -> Self {
        self.write_model_strategy = Some(strategy);
        self
    }

    /// Routes delete events to a dedicated strategy.
    #[must_use]
    pub fn delete_write_model_strategy(mut self, strategy: Arc<dyn WriteModelStrategy>) -> Self {
        self.delete_write_model_strategy = Some(strategy);
        self
    }

    /// Sets the error-tolerance mode.
    #[must_use]
    pub const fn error_tolerance(mut self, tolerance: ErrorTolerance) -> Self {
        self.error_tolerance = tolerance;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Config`] when the database is missing or
    /// empty, or when an explicit collection override is empty.
    pub fn build(self) -> Result<SinkConfig, SinkError> {
        let database = self
            .database
            .filter(|db| !db.is_empty())
            .ok_or_else(|| {
                SinkError::config("database name is required", Some("database".to_string()))
            })?;
        if self.collection.as_deref() == Some("") {
            return Err(SinkError::config(
                "collection override must not be empty",
                Some("collection".to_string()),
            ));
        }

        let namespace_mapper = self.namespace_mapper.unwrap_or_else(|| {
            Arc::new(DefaultNamespaceMapper::new(
                database.clone(),
                self.collection.clone(),
            ))
        });

        let id_strategy = self
            .id_strategy
            .unwrap_or_else(|| Arc::new(BsonOidStrategy::new()));
        let post_processors = self.post_processors.unwrap_or_else(|| {
            vec![Arc::new(DocumentIdAdder::new(
                id_strategy,
                self.id_overwrite_existing,
            ))]
        });

        Ok(SinkConfig {
            database,
            collection: self.collection,
            namespace_mapper,
            cdc_handler: self.cdc_handler,
            post_processors,
            write_model_strategy: self
                .write_model_strategy
                .unwrap_or_else(|| Arc::new(ReplaceOneDefaultStrategy::new())),
            delete_write_model_strategy: self.delete_write_model_strategy,
            error_tolerance: self.error_tolerance,
        })
    }
}
