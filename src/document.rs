// Copyright 2024 Saptak Santra
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

//! Snapshot document layout
//!
//! ```json
//! {
//!   "entities": [ <saved id>, ... ],
//!   "componentIdentifiers": { "<tag>": "<type name>", ... },
//!   "archetypes": [ { "types": ["<tag>", ...] }, ... ],
//!   "entityData": [ { "archetype": 0, "components": { "<tag>": <payload> } }, ... ]
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::archetype_index::ArchetypeId;
use crate::entity::EntityId;
use crate::error::{Result, SnapshotError};
use crate::registry::ComponentTypeId;

pub(crate) const DOCUMENT_STRUCT: &str = "SaveSnapshot";
pub(crate) const DOCUMENT_ENTITIES: &str = "entities";
pub(crate) const DOCUMENT_IDENTIFIERS: &str = "componentIdentifiers";
pub(crate) const DOCUMENT_ARCHETYPES: &str = "archetypes";
pub(crate) const DOCUMENT_ENTITY_DATA: &str = "entityData";

pub(crate) const ARCHETYPE_STRUCT: &str = "ArchetypeRecord";
pub(crate) const ARCHETYPE_TYPES: &str = "types";

pub(crate) const RECORD_STRUCT: &str = "EntityRecord";
pub(crate) const RECORD_ARCHETYPE: &str = "archetype";
pub(crate) const RECORD_COMPONENTS: &str = "components";
pub(crate) const RECORD_KEY: &str = "key";

/// Self-contained snapshot of a world selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSnapshot {
    /// Saved ids, order defines the position of each `entityData` record
    pub entities: Vec<EntityId>,
    pub component_identifiers: BTreeMap<String, String>,
    pub archetypes: Vec<ArchetypeRecord>,
    pub entity_data: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeRecord {
    pub types: Vec<ComponentTypeId>,
}

/// Archetype and payloads of one saved entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub archetype: ArchetypeId,
    pub components: BTreeMap<ComponentTypeId, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Pass-one view of a document: only the type registry section
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocumentHeader {
    #[serde(rename = "componentIdentifiers", default)]
    pub component_identifiers: BTreeMap<String, String>,
}

impl SaveSnapshot {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.map_err(|e| SnapshotError::SerializationError(e.to_string()))
    }

    pub fn to_writer<W: Write>(&self, writer: W, pretty: bool) -> Result<()> {
        let result = if pretty {
            serde_json::to_writer_pretty(writer, self)
        } else {
            serde_json::to_writer(writer, self)
        };
        result.map_err(|e| {
            if e.is_io() {
                SnapshotError::IoError(e.to_string())
            } else {
                SnapshotError::SerializationError(e.to_string())
            }
        })
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| SnapshotError::SerializationError(e.to_string()))
    }

    /// Untyped parse, without resolving any tag
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
