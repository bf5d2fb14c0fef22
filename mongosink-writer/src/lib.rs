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

//! Mongosink Writer - MongoDB Write Submission
//!
//! This crate submits the write operations produced by
//! `mongosink-core` to a MongoDB deployment. The pipeline itself is
//! pure and synchronous; everything that touches the network lives
//! here, behind the [`SinkWriter`] trait.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mongosink_core::config::SinkConfig;
//! use mongosink_core::pipeline::ProcessedSinkRecord;
//! use mongosink_writer::{group_by_namespace, MongoWriter, SinkWriter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SinkConfig::builder().database("myDB").build()?;
//!     let writer = MongoWriter::connect("mongodb://localhost:27017").await?;
//!
//!     let processed: Vec<ProcessedSinkRecord> = records
//!         .into_iter()
//!         .map(|r| ProcessedSinkRecord::process(r, &config))
//!         .collect::<Result<_, _>>()?;
//!
//!     for (namespace, ops) in group_by_namespace(&processed) {
//!         writer.write(&namespace, &ops).await?;
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use bson::Document;
use mongodb::Client;
use mongosink_core::namespace::Namespace;
use mongosink_core::pipeline::ProcessedSinkRecord;
use mongosink_core::write_model::WriteOp;
use tracing::{debug, info};

/// Errors raised while submitting writes.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// The MongoDB driver reported a failure.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// The client could not be constructed from the given URI.
    #[error("connection failed: {message}")]
    Connection {
        /// Human-readable description.
        message: String,
    },
}

/// Submits a batch of write operations to one namespace.
///
/// Implementations must apply the operations in order; the pipeline
/// guarantees nothing about commutativity between an upsert and a
/// delete for the same identity.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// Applies `ops` to the collection identified by `namespace`.
    async fn write(&self, namespace: &Namespace, ops: &[WriteOp]) -> Result<(), WriterError>;
}

/// [`SinkWriter`] backed by a live MongoDB deployment.
///
/// The wrapped [`Client`] is cheap to clone and safe to share across
/// tasks, so one `MongoWriter` can serve every namespace of a batch.
pub struct MongoWriter {
    client: Client,
}

impl MongoWriter {
    /// Connects to the deployment at `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Connection`] when the URI cannot be
    /// parsed or the client cannot be initialized.
    pub async fn connect(uri: &str) -> Result<Self, WriterError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| WriterError::Connection {
                message: e.to_string(),
            })?;
        info!("connected to MongoDB");
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn apply(
        &self,
        namespace: &Namespace,
        op: &WriteOp,
    ) -> Result<(), mongodb::error::Error> {
        let collection = self
            .client
            .database(&namespace.database)
            .collection::<Document>(&namespace.collection);
        match op {
            WriteOp::InsertOne { document } => {
                collection.insert_one(document.clone()).await?;
            }
            WriteOp::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                collection
                    .replace_one(filter.clone(), replacement.clone())
                    .upsert(*upsert)
                    .await?;
            }
            WriteOp::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                collection
                    .update_one(filter.clone(), update.clone())
                    .upsert(*upsert)
                    .await?;
            }
            WriteOp::DeleteOne { filter } => {
                collection.delete_one(filter.clone()).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SinkWriter for MongoWriter {
    async fn write(&self, namespace: &Namespace, ops: &[WriteOp]) -> Result<(), WriterError> {
        for op in ops {
            self.apply(namespace, op).await?;
        }
        debug!(
            namespace = %namespace.full_name(),
            operations = ops.len(),
            "batch written"
        );
        Ok(())
    }
}

/// Groups the operations of successfully processed records by their
/// destination namespace, preserving record order within each group.
///
/// Failed records (those carrying a captured error) contribute nothing.
#[must_use]
pub fn group_by_namespace(processed: &[ProcessedSinkRecord]) -> Vec<(Namespace, Vec<WriteOp>)> {
    let mut groups: Vec<(Namespace, Vec<WriteOp>)> = Vec::new();
    for record in processed {
        let Some(namespace) = record.namespace() else {
            continue;
        };
        let ops = record.write_ops();
        match groups.iter_mut().find(|(ns, _)| ns == namespace) {
            Some((_, existing)) => existing.extend_from_slice(ops),
            None => groups.push((namespace.clone(), ops.to_vec())),
        }
    }
    groups
}
