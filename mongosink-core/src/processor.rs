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

//! Post-processor chain.
//!
//! Post-processors transform the working document after change-event
//! unwrapping, strictly in configured order. A failing processor aborts
//! the rest of the chain for that record; the orchestrator discards the
//! partially transformed document, so no partial result ever reaches the
//! write-model stage.

use crate::error::SinkError;
use crate::id_strategy::{IdStrategy, ID_FIELD};
use crate::projection::{rename_path, Projection};
use crate::record::RecordContext;
use bson::Document;
use std::sync::Arc;

/// One document transformation in the chain.
///
/// Implementations are instantiated once from configuration and must be
/// safe for concurrent invocation; any internal state must be
/// synchronized by the processor itself.
pub trait PostProcessor: Send + Sync {
    /// The processor's name, used in error and log output.
    fn name(&self) -> &'static str;

    /// Transforms the working document in place.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::PostProcessing`] when the transformation
    /// cannot be applied.
    fn process(&self, doc: &mut Document, ctx: &RecordContext<'_>) -> Result<(), SinkError>;
}

/// One old-path → new-name rename.
#[derive(Debug, Clone)]
pub struct FieldRename {
    /// Dotted path of the field to rename.
    pub old_path: String,

    /// The new field name, kept inside the same parent document.
    pub new_name: String,
}

impl FieldRename {
    /// Creates a rename mapping.
    pub fn new(old_path: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_name: new_name.into(),
        }
    }
}

/// Renames fields by an explicit old→new mapping.
///
/// Mappings whose path does not resolve are skipped; renaming is not a
/// presence assertion.
#[derive(Debug, Clone)]
pub struct RenameByMapping {
    mappings: Vec<FieldRename>,
}

impl RenameByMapping {
    /// Creates the processor from an ordered list of renames.
    #[must_use]
    pub fn new(mappings: Vec<FieldRename>) -> Self {
        Self { mappings }
    }
}

impl PostProcessor for RenameByMapping {
    fn name(&self) -> &'static str {
        "rename-by-mapping"
    }

    fn process(&self, doc: &mut Document, _ctx: &RecordContext<'_>) -> Result<(), SinkError> {
        for mapping in &self.mappings {
            rename_path(doc, &mapping.old_path, &mapping.new_name);
        }
        Ok(())
    }
}

/// Injects the derived identity into the working document.
///
/// With `overwrite_existing` unset, an existing `_id` is kept — unless
/// the configured strategy is deterministic and derives a different
/// identity, which is a conflict the record must not silently carry
/// into an upsert filter.
pub struct DocumentIdAdder {
    strategy: Arc<dyn IdStrategy>,
    overwrite_existing: bool,
}

impl DocumentIdAdder {
    /// Creates the processor around an identity strategy.
    #[must_use]
    pub fn new(strategy: Arc<dyn IdStrategy>, overwrite_existing: bool) -> Self {
        Self {
            strategy,
            overwrite_existing,
        }
    }
}

impl PostProcessor for DocumentIdAdder {
    fn name(&self) -> &'static str {
        "document-id-adder"
    }

    fn process(&self, doc: &mut Document, ctx: &RecordContext<'_>) -> Result<(), SinkError> {
        let existing = doc.get(ID_FIELD).cloned();
        match existing {
            None => {
                let id = self.strategy.generate_id(ctx, doc)?;
                doc.insert(ID_FIELD, id);
            }
            Some(_) if self.overwrite_existing => {
                let id = self.strategy.generate_id(ctx, doc)?;
                doc.insert(ID_FIELD, id);
            }
            Some(existing) if self.strategy.is_deterministic() => {
                let candidate = self.strategy.generate_id(ctx, doc)?;
                if candidate != existing {
                    return Err(SinkError::identity(format!(
                        "document already has an '{ID_FIELD}' that differs from the derived \
                         identity and overwriting is disabled"
                    )));
                }
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// Keeps only the allow-listed value fields (plus the identity).
#[derive(Debug, Clone)]
pub struct AllowListValueProjector {
    projection: Projection,
}

impl AllowListValueProjector {
    /// Creates the projector from an ordered list of field paths.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            projection: Projection::allow_list(fields),
        }
    }
}

impl PostProcessor for AllowListValueProjector {
    fn name(&self) -> &'static str {
        "allow-list-value-projector"
    }

    fn process(&self, doc: &mut Document, _ctx: &RecordContext<'_>) -> Result<(), SinkError> {
        let id = doc.get(ID_FIELD).cloned();
        let mut projected = self.projection.apply(doc);
        // The identity always survives projection.
        if let Some(id) = id {
            if !projected.contains_key(ID_FIELD) {
                projected.insert(ID_FIELD, id);
            }
        }
        *doc = projected;
        Ok(())
    }
}

/// Drops the block-listed value fields (never the identity).
#[derive(Debug, Clone)]
pub struct BlockListValueProjector {
    projection: Projection,
}

impl BlockListValueProjector {
    /// Creates the projector from an ordered list of field paths.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            projection: Projection::block_list(fields),
        }
    }
}

impl PostProcessor for BlockListValueProjector {
    fn name(&self) -> &'static str {
        "block-list-value-projector"
    }

    fn process(&self, doc: &mut Document, _ctx: &RecordContext<'_>) -> Result<(), SinkError> {
        let id = doc.get(ID_FIELD).cloned();
        let mut projected = self.projection.apply(doc);
        if let Some(id) = id {
            projected.insert(ID_FIELD, id);
        }
        *doc = projected;
        Ok(())
    }
}
