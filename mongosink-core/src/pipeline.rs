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

//! Per-record pipeline orchestration.
//!
//! [`ProcessedSinkRecord::process`] chains the stages — document
//! adaptation, namespace resolution, change-event unwrapping, the
//! post-processor chain, identity derivation, write-model construction —
//! into one deterministic decision per record.
//!
//! Error tolerance is applied exactly once, here: under
//! [`ErrorTolerance::None`] the first stage failure is returned
//! synchronously; under [`ErrorTolerance::All`] it is captured on the
//! returned record, whose write-operation list stays empty, so the
//! caller can skip the record while the rest of the batch proceeds.
//!
//! The pipeline is a pure, synchronous, in-memory transformation: it
//! shares nothing mutable across invocations and can run on any number
//! of worker threads concurrently.
//!
//! # Example
//!
//! ```rust
//! use mongosink_core::config::SinkConfig;
//! use mongosink_core::pipeline::ProcessedSinkRecord;
//! use mongosink_core::record::{RecordPayload, SinkRecord};
//! use bson::doc;
//!
//! let config = SinkConfig::builder().database("myDB").build().unwrap();
//! let record = SinkRecord::new(
//!     "orders",
//!     0,
//!     0,
//!     RecordPayload::Document(doc! { "_id": 1 }),
//!     RecordPayload::Document(doc! { "_id": 1, "total": 10 }),
//! );
//!
//! let processed = ProcessedSinkRecord::process(record, &config).unwrap();
//! assert_eq!(processed.namespace().unwrap().full_name(), "myDB.orders");
//! assert_eq!(processed.write_ops().len(), 1);
//! ```

use crate::cdc::{ChangeEvent, EventOperation};
use crate::config::{ErrorTolerance, SinkConfig};
use crate::document::SinkDocument;
use crate::error::SinkError;
use crate::id_strategy::derive_identity;
use crate::namespace::Namespace;
use crate::record::{RecordContext, SinkRecord};
use crate::write_model::{WriteModelContext, WriteOp};
use tracing::{debug, warn};

/// The outcome of processing one record.
///
/// Owns exactly one of: a resolved namespace with a non-empty write
/// operation list, or a captured failure. Successful completion never
/// leaves either half missing.
#[derive(Debug)]
pub struct ProcessedSinkRecord {
    record: SinkRecord,
    namespace: Option<Namespace>,
    write_ops: Vec<WriteOp>,
    error: Option<SinkError>,
}

impl ProcessedSinkRecord {
    /// Runs the full pipeline on one record.
    ///
    /// # Errors
    ///
    /// Under [`ErrorTolerance::None`], any stage failure is returned
    /// immediately. Under [`ErrorTolerance::All`] this never returns an
    /// error; failures are captured on the returned record instead.
    pub fn process(record: SinkRecord, config: &SinkConfig) -> Result<Self, SinkError> {
        match run_stages(&record, config) {
            Ok((namespace, write_ops)) => {
                debug!(
                    coordinates = %record.coordinates(),
                    namespace = %namespace.full_name(),
                    operations = write_ops.len(),
                    "record processed"
                );
                Ok(Self {
                    record,
                    namespace: Some(namespace),
                    write_ops,
                    error: None,
                })
            }
            Err(error) => match config.error_tolerance {
                ErrorTolerance::None => Err(error),
                ErrorTolerance::All => {
                    warn!(
                        coordinates = %record.coordinates(),
                        stage = error.stage().as_str(),
                        %error,
                        "record failed, error captured under tolerance"
                    );
                    Ok(Self {
                        record,
                        namespace: None,
                        write_ops: Vec::new(),
                        error: Some(error),
                    })
                }
            },
        }
    }

    /// The original record, retained for logging and dead-lettering.
    #[must_use]
    pub fn record(&self) -> &SinkRecord {
        &self.record
    }

    /// The resolved destination namespace, absent on captured failure.
    #[must_use]
    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// The write operations to submit, empty on captured failure.
    #[must_use]
    pub fn write_ops(&self) -> &[WriteOp] {
        &self.write_ops
    }

    /// The captured failure, if processing did not succeed.
    #[must_use]
    pub fn error(&self) -> Option<&SinkError> {
        self.error.as_ref()
    }

    /// True if a failure was captured for this record.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Consumes the result into namespace and write operations.
    ///
    /// Returns the captured error when processing failed.
    ///
    /// # Errors
    ///
    /// Returns the captured [`SinkError`] for failed records.
    pub fn into_parts(self) -> Result<(Namespace, Vec<WriteOp>), SinkError> {
        match self.error {
            Some(error) => Err(error),
            // A successful record always carries a namespace.
            None => match self.namespace {
                Some(namespace) => Ok((namespace, self.write_ops)),
                None => Err(SinkError::write_model(
                    "processed record has no namespace despite carrying no error",
                )),
            },
        }
    }
}

fn run_stages(
    record: &SinkRecord,
    config: &SinkConfig,
) -> Result<(Namespace, Vec<WriteOp>), SinkError> {
    // Adapting.
    let sink_doc = SinkDocument::from_record(record)?;

    // Resolving the namespace. Mapper output is re-validated so a custom
    // mapper cannot smuggle an empty part past the invariant.
    let namespace = config.namespace_mapper.map(record, &sink_doc)?;
    let namespace = Namespace::checked(namespace.database, namespace.collection)?;

    // Unwrapping.
    let event = match &config.cdc_handler {
        Some(handler) => handler.unwrap(&sink_doc)?,
        None => ChangeEvent::pass_through(sink_doc.value_doc.clone()),
    };
    if let EventOperation::Unrecognized(tag) = &event.operation {
        return Err(SinkError::change_event(format!(
            "unrecognized change event operation '{tag}'"
        )));
    }

    // Post-processing. The chain owns the working document; on failure
    // it is dropped here, never partially committed.
    let mut document = event.working_document()?;
    let ctx = RecordContext {
        record,
        key_doc: &sink_doc.key_doc,
    };
    for processor in &config.post_processors {
        processor.process(&mut document, &ctx)?;
    }

    // Deriving the identity.
    let identity = derive_identity(&document)?;

    // Building the write model.
    let wm_ctx = WriteModelContext {
        event: &event,
        identity: &identity,
        document: &document,
        record,
    };
    let op = if event.is_delete() {
        match &config.delete_write_model_strategy {
            Some(delete_strategy) => delete_strategy.create(&wm_ctx)?,
            None => config.write_model_strategy.create(&wm_ctx)?,
        }
    } else {
        config.write_model_strategy.create(&wm_ctx)?
    };

    Ok((namespace, vec![op]))
}
