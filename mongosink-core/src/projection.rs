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

//! Dotted field paths and allow/deny-list projection.
//!
//! Field paths use `.` to address nested documents (`address.city`).
//! Array elements are not addressable; a path segment that lands on a
//! non-document value simply does not resolve.
//!
//! [`Projection`] is shared between the value-projector post-processors
//! and the partial key/value identity strategies, which are the same
//! operation applied to different documents.

use bson::{Bson, Document};

/// Resolves a dotted path inside a document.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let (head, rest) = split_head(path);
    let value = doc.get(head)?;
    match rest {
        None => Some(value),
        Some(rest) => match value {
            Bson::Document(sub) => get_path(sub, rest),
            _ => None,
        },
    }
}

/// Removes the value at a dotted path, returning it if it was present.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Bson> {
    let (head, rest) = split_head(path);
    match rest {
        None => doc.remove(head),
        Some(rest) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => remove_path(sub, rest),
            _ => None,
        },
    }
}

/// Renames the field at a dotted path, keeping its position in the
/// enclosing document. The new name is a plain field name, not a path:
/// the field stays inside the same parent document.
///
/// Returns false (and leaves the document untouched) if the path does
/// not resolve.
pub fn rename_path(doc: &mut Document, path: &str, new_name: &str) -> bool {
    match path.rsplit_once('.') {
        None => rename_key(doc, path, new_name),
        Some((parent, leaf)) => match get_path_mut(doc, parent) {
            Some(Bson::Document(sub)) => rename_key(sub, leaf, new_name),
            _ => false,
        },
    }
}

fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    let (head, rest) = split_head(path);
    let value = doc.get_mut(head)?;
    match rest {
        None => Some(value),
        Some(rest) => match value {
            Bson::Document(sub) => get_path_mut(sub, rest),
            _ => None,
        },
    }
}

fn rename_key(doc: &mut Document, old: &str, new: &str) -> bool {
    if !doc.contains_key(old) {
        return false;
    }
    let renamed: Vec<(String, Bson)> = std::mem::take(doc)
        .into_iter()
        .map(|(key, value)| {
            if key == old {
                (new.to_string(), value)
            } else {
                (key, value)
            }
        })
        .collect();
    for (key, value) in renamed {
        doc.insert(key, value);
    }
    true
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Whether a projection keeps or drops the listed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    /// Keep only the listed field paths.
    AllowList,

    /// Keep everything except the listed field paths.
    BlockList,
}

/// A field projection over an ordered list of dotted paths.
#[derive(Debug, Clone)]
pub struct Projection {
    kind: ProjectionType,
    fields: Vec<String>,
}

impl Projection {
    /// Creates a projection over the given field paths.
    #[must_use]
    pub fn new(kind: ProjectionType, fields: Vec<String>) -> Self {
        Self { kind, fields }
    }

    /// Convenience constructor for an allow-list projection.
    #[must_use]
    pub fn allow_list(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(
            ProjectionType::AllowList,
            fields.into_iter().map(Into::into).collect(),
        )
    }

    /// Convenience constructor for a block-list projection.
    #[must_use]
    pub fn block_list(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(
            ProjectionType::BlockList,
            fields.into_iter().map(Into::into).collect(),
        )
    }

    /// Applies the projection, producing a new document.
    ///
    /// Field order follows the source document, not the field list.
    #[must_use]
    pub fn apply(&self, doc: &Document) -> Document {
        match self.kind {
            ProjectionType::AllowList => project_allowed(doc, &self.fields, ""),
            ProjectionType::BlockList => {
                let mut out = doc.clone();
                for path in &self.fields {
                    remove_path(&mut out, path);
                }
                out
            }
        }
    }
}

fn project_allowed(doc: &Document, paths: &[String], prefix: &str) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if paths.iter().any(|p| *p == full) {
            out.insert(key.clone(), value.clone());
        } else if let Bson::Document(sub) = value {
            if paths.iter().any(|p| p.starts_with(&full) && p[full.len()..].starts_with('.')) {
                let projected = project_allowed(sub, paths, &full);
                if !projected.is_empty() {
                    out.insert(key.clone(), Bson::Document(projected));
                }
            }
        }
    }
    out
}
