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

//! Mongosink Core - Per-Record Sink Processing Pipeline
//!
//! This crate converts one inbound change-event record (key + value +
//! topic metadata) into a destination namespace plus a concrete set of
//! MongoDB write operations, or an explicitly captured failure.
//!
//! # Key Components
//!
//! - **Records**: [`record`] defines the inbound record and its typed
//!   payloads
//! - **Adapter**: [`document`] converts raw payloads to canonical BSON
//!   documents
//! - **Namespaces**: [`namespace`] resolves the destination
//!   database/collection
//! - **CDC**: [`cdc`] unwraps change-data-capture envelopes
//! - **Processors**: [`processor`] transforms documents in a configured
//!   chain
//! - **Identity**: [`id_strategy`] derives the upsert/delete identity
//! - **Write models**: [`write_model`] builds the storage operations
//! - **Pipeline**: [`pipeline`] sequences the stages and applies the
//!   error-tolerance policy
//!
//! # Example
//!
//! ```rust
//! use mongosink_core::config::{ErrorTolerance, SinkConfig};
//! use mongosink_core::pipeline::ProcessedSinkRecord;
//! use mongosink_core::record::{RecordPayload, SinkRecord};
//!
//! let config = SinkConfig::builder()
//!     .database("myDB")
//!     .error_tolerance(ErrorTolerance::All)
//!     .build()
//!     .unwrap();
//!
//! // A record whose payloads cannot become documents is captured, not
//! // raised, under tolerance.
//! let record = SinkRecord::new(
//!     "topic",
//!     0,
//!     0,
//!     RecordPayload::Int32(1),
//!     RecordPayload::Int32(1),
//! );
//! let processed = ProcessedSinkRecord::process(record, &config).unwrap();
//! assert!(processed.is_failed());
//! assert!(processed.write_ops().is_empty());
//! ```

pub mod cdc;
pub mod config;
pub mod document;
pub mod error;
pub mod id_strategy;
pub mod namespace;
pub mod pipeline;
pub mod processor;
pub mod projection;
pub mod record;
pub mod write_model;

pub use config::{ErrorTolerance, SinkConfig};
pub use error::{ProcessingStage, SinkError};
pub use namespace::Namespace;
pub use pipeline::ProcessedSinkRecord;
pub use record::{RecordPayload, SinkRecord};
pub use write_model::WriteOp;
