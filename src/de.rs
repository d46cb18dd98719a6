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

//! Second decode pass
//!
//! The body of a document is read against the registry recovered in the
//! first pass. Every tag met in `archetypes` or `entityData` must be listed in
//! that registry; tags marked as skipped are dropped from archetype sets and
//! their payloads are consumed without being kept.

use std::collections::BTreeSet;
use std::fmt::Formatter;

use serde::de::{DeserializeSeed, Error, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::archetype_index::ArchetypeId;
use crate::document::{
    ARCHETYPE_STRUCT, ARCHETYPE_TYPES, DOCUMENT_ARCHETYPES, DOCUMENT_ENTITIES,
    DOCUMENT_ENTITY_DATA, DOCUMENT_IDENTIFIERS, DOCUMENT_STRUCT, RECORD_ARCHETYPE,
    RECORD_COMPONENTS, RECORD_KEY, RECORD_STRUCT,
};
use crate::entity::EntityId;
use crate::registry::{ComponentTypeId, TypeRegistry};

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "camelCase")]
enum DocumentField {
    Entities,
    ComponentIdentifiers,
    Archetypes,
    EntityData,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum ArchetypeField {
    Types,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum RecordField {
    Archetype,
    Components,
    Key,
    #[serde(other)]
    Unknown,
}

/// Document body after the second pass
#[derive(Debug, Default)]
pub struct DecodedDocument {
    pub entities: Vec<EntityId>,
    /// Archetype table, skipped tags already removed
    pub archetypes: Vec<Vec<ComponentTypeId>>,
    pub records: Vec<DecodedRecord>,
}

impl DecodedDocument {
    /// Payloads that were read but not kept
    pub fn skipped_payloads(&self) -> usize {
        self.records.iter().map(|r| r.skipped).sum()
    }
}

#[derive(Debug, Default)]
pub struct DecodedRecord {
    pub archetype: ArchetypeId,
    pub components: Vec<(ComponentTypeId, serde_json::Value)>,
    pub key: Option<String>,
    pub skipped: usize,
}

/// Tag filter shared by every nested seed
#[derive(Clone, Copy)]
struct Tags<'a> {
    registry: &'a TypeRegistry,
    skipped: &'a BTreeSet<ComponentTypeId>,
}

impl Tags<'_> {
    /// `Ok(true)` keep, `Ok(false)` skip, `Err` tag not listed at all
    fn keep<E: Error>(&self, tag: &ComponentTypeId) -> Result<bool, E> {
        if !self.registry.contains(tag) {
            return Err(E::custom(format_args!(
                "component tag `{tag}` is not listed in {DOCUMENT_IDENTIFIERS}"
            )));
        }
        Ok(!self.skipped.contains(tag))
    }
}

/// Handles the document body.
pub struct DocumentDeserializer<'a> {
    /// Registry read from the document header
    pub registry: &'a TypeRegistry,
    /// Listed tags with no local type, ignored on read
    pub skipped: &'a BTreeSet<ComponentTypeId>,
}

impl<'de> DeserializeSeed<'de> for DocumentDeserializer<'_> {
    type Value = DecodedDocument;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_struct(
            DOCUMENT_STRUCT,
            &[
                DOCUMENT_ENTITIES,
                DOCUMENT_IDENTIFIERS,
                DOCUMENT_ARCHETYPES,
                DOCUMENT_ENTITY_DATA,
            ],
            DocumentVisitor {
                tags: Tags {
                    registry: self.registry,
                    skipped: self.skipped,
                },
            },
        )
    }
}

struct DocumentVisitor<'a> {
    tags: Tags<'a>,
}

impl<'de> Visitor<'de> for DocumentVisitor<'_> {
    type Value = DecodedDocument;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("snapshot document")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entities = None;
        let mut archetypes = None;
        let mut records = None;

        while let Some(key) = map.next_key()? {
            match key {
                DocumentField::Entities => {
                    if entities.is_some() {
                        return Err(Error::duplicate_field(DOCUMENT_ENTITIES));
                    }
                    entities = Some(map.next_value::<Vec<EntityId>>()?);
                }
                DocumentField::Archetypes => {
                    if archetypes.is_some() {
                        return Err(Error::duplicate_field(DOCUMENT_ARCHETYPES));
                    }
                    archetypes = Some(map.next_value_seed(ArchetypeListDeserializer { tags: self.tags })?);
                }
                DocumentField::EntityData => {
                    if records.is_some() {
                        return Err(Error::duplicate_field(DOCUMENT_ENTITY_DATA));
                    }
                    records = Some(map.next_value_seed(RecordListDeserializer { tags: self.tags })?);
                }
                // Already consumed by the header pass
                DocumentField::ComponentIdentifiers | DocumentField::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        Ok(DecodedDocument {
            entities: entities.ok_or_else(|| Error::missing_field(DOCUMENT_ENTITIES))?,
            archetypes: archetypes.ok_or_else(|| Error::missing_field(DOCUMENT_ARCHETYPES))?,
            records: records.ok_or_else(|| Error::missing_field(DOCUMENT_ENTITY_DATA))?,
        })
    }
}

struct ArchetypeListDeserializer<'a> {
    tags: Tags<'a>,
}

impl<'de> DeserializeSeed<'de> for ArchetypeListDeserializer<'_> {
    type Value = Vec<Vec<ComponentTypeId>>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ArchetypeListDeserializer<'_> {
    type Value = Vec<Vec<ComponentTypeId>>;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("list of archetypes")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut archetypes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(types) = seq.next_element_seed(ArchetypeDeserializer { tags: self.tags })? {
            archetypes.push(types);
        }
        Ok(archetypes)
    }
}

struct ArchetypeDeserializer<'a> {
    tags: Tags<'a>,
}

impl<'de> DeserializeSeed<'de> for ArchetypeDeserializer<'_> {
    type Value = Vec<ComponentTypeId>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_struct(ARCHETYPE_STRUCT, &[ARCHETYPE_TYPES], self)
    }
}

impl<'de> Visitor<'de> for ArchetypeDeserializer<'_> {
    type Value = Vec<ComponentTypeId>;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("archetype struct")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut types: Option<Vec<ComponentTypeId>> = None;

        while let Some(key) = map.next_key()? {
            match key {
                ArchetypeField::Types => {
                    if types.is_some() {
                        return Err(Error::duplicate_field(ARCHETYPE_TYPES));
                    }
                    let listed = map.next_value::<Vec<ComponentTypeId>>()?;
                    let mut kept = Vec::with_capacity(listed.len());
                    for tag in listed {
                        if self.tags.keep::<A::Error>(&tag)? {
                            kept.push(tag);
                        }
                    }
                    types = Some(kept);
                }
                ArchetypeField::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        types.ok_or_else(|| Error::missing_field(ARCHETYPE_TYPES))
    }
}

struct RecordListDeserializer<'a> {
    tags: Tags<'a>,
}

impl<'de> DeserializeSeed<'de> for RecordListDeserializer<'_> {
    type Value = Vec<DecodedRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for RecordListDeserializer<'_> {
    type Value = Vec<DecodedRecord>;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("list of entity records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut records = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(record) = seq.next_element_seed(RecordDeserializer { tags: self.tags })? {
            records.push(record);
        }
        Ok(records)
    }
}

struct RecordDeserializer<'a> {
    tags: Tags<'a>,
}

impl<'de> DeserializeSeed<'de> for RecordDeserializer<'_> {
    type Value = DecodedRecord;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_struct(
            RECORD_STRUCT,
            &[RECORD_ARCHETYPE, RECORD_COMPONENTS, RECORD_KEY],
            self,
        )
    }
}

impl<'de> Visitor<'de> for RecordDeserializer<'_> {
    type Value = DecodedRecord;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("entity record")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut archetype = None;
        let mut components = None;
        let mut key = None;

        while let Some(field) = map.next_key()? {
            match field {
                RecordField::Archetype => {
                    if archetype.is_some() {
                        return Err(Error::duplicate_field(RECORD_ARCHETYPE));
                    }
                    archetype = Some(map.next_value::<ArchetypeId>()?);
                }
                RecordField::Components => {
                    if components.is_some() {
                        return Err(Error::duplicate_field(RECORD_COMPONENTS));
                    }
                    components = Some(map.next_value_seed(PayloadMapDeserializer { tags: self.tags })?);
                }
                RecordField::Key => {
                    if key.is_some() {
                        return Err(Error::duplicate_field(RECORD_KEY));
                    }
                    key = Some(map.next_value::<Option<String>>()?);
                }
                RecordField::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let archetype = archetype.ok_or_else(|| Error::missing_field(RECORD_ARCHETYPE))?;
        let (components, skipped) = components.unwrap_or_default();
        Ok(DecodedRecord {
            archetype,
            components,
            key: key.flatten(),
            skipped,
        })
    }
}

struct PayloadMapDeserializer<'a> {
    tags: Tags<'a>,
}

impl<'de> DeserializeSeed<'de> for PayloadMapDeserializer<'_> {
    type Value = (Vec<(ComponentTypeId, serde_json::Value)>, usize);

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for PayloadMapDeserializer<'_> {
    type Value = (Vec<(ComponentTypeId, serde_json::Value)>, usize);

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("map of component tag to payload")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut payloads: Vec<(ComponentTypeId, serde_json::Value)> =
            Vec::with_capacity(map.size_hint().unwrap_or(0));
        let mut skipped = 0;

        while let Some(tag) = map.next_key::<ComponentTypeId>()? {
            if !self.tags.keep::<A::Error>(&tag)? {
                map.next_value::<IgnoredAny>()?;
                skipped += 1;
                continue;
            }
            if payloads.iter().any(|(seen, _)| *seen == tag) {
                return Err(Error::custom(format_args!("payload for `{tag}` given twice")));
            }
            let payload = map.next_value::<serde_json::Value>()?;
            payloads.push((tag, payload));
        }

        Ok((payloads, skipped))
    }
}
