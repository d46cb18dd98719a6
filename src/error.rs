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

//! Error types

use std::fmt;

use crate::entity::EntityId;

/// Snapshot error type
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// Entity not found in the world
    EntityNotFound(EntityId),

    /// Component not attached to the entity
    ComponentNotFound {
        entity: EntityId,
        type_name: &'static str,
    },

    /// Tag in a document has no local concrete type
    UnknownComponentType {
        tag: String,
        /// Declared type name listed in `componentIdentifiers`, if the tag was listed at all
        type_name: Option<String>,
    },

    /// Same saved entity id listed twice in one document
    DuplicateEntityId(EntityId),

    /// Archetype or transmuter delta that cannot be applied
    MalformedArchetype(String),

    /// Document structure violates the snapshot layout
    MalformedDocument(String),

    /// Declared entity reference field rejected at registration
    InvalidReferenceField {
        type_name: &'static str,
        field: &'static str,
    },

    /// Two concrete types registered under one declared name
    DuplicateTypeName(&'static str),

    /// Reference translation attempted before every entity was populated
    PhaseViolation(String),

    /// Storage column registered under a type's id holds another type
    ColumnTypeMismatch(&'static str),

    /// Serialization error
    SerializationError(String),

    /// Deserialization error
    DeserializationError(String),

    /// IO error (truncated or unreadable stream)
    IoError(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::EntityNotFound(entity) => write!(f, "Entity not found: {entity:?}"),
            SnapshotError::ComponentNotFound { entity, type_name } => {
                write!(f, "Component {type_name} not found on {entity:?}")
            }
            SnapshotError::UnknownComponentType { tag, type_name } => match type_name {
                Some(name) => write!(f, "Unknown component type: tag `{tag}` names `{name}`"),
                None => write!(f, "Unknown component type: tag `{tag}` is not listed"),
            },
            SnapshotError::DuplicateEntityId(entity) => {
                write!(f, "Duplicate entity id in document: {entity:?}")
            }
            SnapshotError::MalformedArchetype(msg) => write!(f, "Malformed archetype: {msg}"),
            SnapshotError::MalformedDocument(msg) => write!(f, "Malformed document: {msg}"),
            SnapshotError::InvalidReferenceField { type_name, field } => {
                write!(f, "Invalid entity reference field `{field}` on {type_name}")
            }
            SnapshotError::DuplicateTypeName(name) => {
                write!(f, "Type name `{name}` registered by two different types")
            }
            SnapshotError::PhaseViolation(msg) => write!(f, "Phase violation: {msg}"),
            SnapshotError::ColumnTypeMismatch(type_name) => {
                write!(f, "Column for {type_name} stores a different type")
            }
            SnapshotError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            SnapshotError::DeserializationError(msg) => write!(f, "Deserialization error: {msg}"),
            SnapshotError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Io | Category::Eof => SnapshotError::IoError(err.to_string()),
            Category::Syntax | Category::Data => {
                SnapshotError::DeserializationError(err.to_string())
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_json_is_io_error() {
        let err = serde_json::from_str::<serde_json::Value>("{\"entities\": [")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(SnapshotError::from(err), SnapshotError::IoError(_)));
    }

    #[test]
    fn test_unknown_type_display() {
        let err = SnapshotError::UnknownComponentType {
            tag: "Foo".into(),
            type_name: Some("LegacyFoo".into()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown component type: tag `Foo` names `LegacyFoo`"
        );
    }
}
