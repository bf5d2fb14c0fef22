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

//! Error taxonomy for the record-processing pipeline.
//!
//! Every failure a record can hit maps onto exactly one [`SinkError`]
//! variant, and each variant corresponds to one pipeline stage. Errors are
//! record-scoped: they never carry or corrupt state shared across records.
//!
//! Whether an error is raised to the caller or captured on the processed
//! record is decided once, by the pipeline orchestrator, based on the
//! configured error tolerance — no stage makes that call itself.

use thiserror::Error;

/// The pipeline stage a [`SinkError`] originated from.
///
/// Exposed so callers inspecting a captured failure (dead-letter queues,
/// structured logs) can report where processing stopped without matching
/// on the error variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Converting the raw key/value into canonical documents.
    Adapting,

    /// Resolving the destination database and collection.
    ResolvingNamespace,

    /// Unwrapping a change-data-capture envelope.
    Unwrapping,

    /// Running the post-processor chain.
    PostProcessing,

    /// Deriving or validating the document identity.
    DerivingIdentity,

    /// Building the concrete write operation.
    BuildingWriteModel,

    /// Validating configuration before any record is processed.
    Configuring,
}

impl ProcessingStage {
    /// Returns the stage name as used in log output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Adapting => "adapting",
            Self::ResolvingNamespace => "resolving-namespace",
            Self::Unwrapping => "unwrapping",
            Self::PostProcessing => "post-processing",
            Self::DerivingIdentity => "deriving-identity",
            Self::BuildingWriteModel => "building-write-model",
            Self::Configuring => "configuring",
        }
    }
}

/// Errors produced while processing a single sink record.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The raw record's key or value cannot be converted into a document.
    ///
    /// Raised before any namespace or change-event logic runs, so it is
    /// always distinguishable from downstream semantic failures.
    #[error("malformed record: {message}")]
    MalformedRecord {
        /// What made the record unusable.
        message: String,
    },

    /// A namespace mapper could not produce a destination namespace.
    #[error("namespace mapping failed: {message}")]
    NamespaceMapping {
        /// Why resolution failed.
        message: String,
    },

    /// A change-data-capture envelope was unrecognized or malformed.
    #[error("change event error: {message}")]
    ChangeEvent {
        /// Why the envelope could not be unwrapped.
        message: String,
        /// The underlying parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A post-processor failed, aborting the remainder of the chain.
    #[error("post-processor '{processor}' failed: {message}")]
    PostProcessing {
        /// Name of the failing processor.
        processor: String,
        /// Why it failed.
        message: String,
    },

    /// The document identity could not be derived or validated.
    #[error("identity error: {message}")]
    Identity {
        /// Why identity derivation failed.
        message: String,
    },

    /// The write-model strategy could not build an operation.
    ///
    /// Typically an unsupported operation/strategy combination, such as a
    /// delete event handed to a strategy that only builds upserts.
    #[error("write model error: {message}")]
    WriteModel {
        /// Why the operation could not be built.
        message: String,
    },

    /// Invalid sink configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
        /// The offending option, if it can be named.
        parameter: Option<String>,
    },
}

impl SinkError {
    /// Creates a malformed-record error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    /// Creates a namespace-mapping error.
    #[must_use]
    pub fn namespace_mapping(message: impl Into<String>) -> Self {
        Self::NamespaceMapping {
            message: message.into(),
        }
    }

    /// Creates a change-event error without an underlying cause.
    #[must_use]
    pub fn change_event(message: impl Into<String>) -> Self {
        Self::ChangeEvent {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a change-event error wrapping an underlying cause.
    #[must_use]
    pub fn change_event_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ChangeEvent {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a post-processing error attributed to a named processor.
    #[must_use]
    pub fn post_processing(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PostProcessing {
            processor: processor.into(),
            message: message.into(),
        }
    }

    /// Creates an identity error.
    #[must_use]
    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity {
            message: message.into(),
        }
    }

    /// Creates a write-model error.
    #[must_use]
    pub fn write_model(message: impl Into<String>) -> Self {
        Self::WriteModel {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, parameter: Option<String>) -> Self {
        Self::Config {
            message: message.into(),
            parameter,
        }
    }

    /// Returns the pipeline stage this error originated from.
    #[must_use]
    pub const fn stage(&self) -> ProcessingStage {
        match self {
            Self::MalformedRecord { .. } => ProcessingStage::Adapting,
            Self::NamespaceMapping { .. } => ProcessingStage::ResolvingNamespace,
            Self::ChangeEvent { .. } => ProcessingStage::Unwrapping,
            Self::PostProcessing { .. } => ProcessingStage::PostProcessing,
            Self::Identity { .. } => ProcessingStage::DerivingIdentity,
            Self::WriteModel { .. } => ProcessingStage::BuildingWriteModel,
            Self::Config { .. } => ProcessingStage::Configuring,
        }
    }
}
