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

//! Save and load entry points
//!
//! Saving reads from `&World` and returns an owned [`SaveSnapshot`]. Loading
//! decodes in two passes: the header pass reads only `componentIdentifiers`
//! and resolves it against the local catalog, the body pass then decodes the
//! rest with that registry. A failed load despawns whatever it created.

use std::collections::BTreeSet;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};

use ahash::AHashSet;
use serde::de::DeserializeSeed;
use serde::Deserialize;
use tracing::{debug, warn};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype_index::ArchetypeIndex;
use crate::collector::ComponentCollector;
use crate::config::SnapshotConfig;
use crate::de::{DecodedDocument, DecodedRecord, DocumentDeserializer};
use crate::document::{ArchetypeRecord, DocumentHeader, SaveSnapshot};
use crate::entity::EntityId;
use crate::entity_ids::{EntityIdEncoder, IdTranslationTable};
use crate::entity_serializer::{EntitySerializer, EntityState};
use crate::error::Result;
use crate::key::KeyTracker;
use crate::reference::{ReferenceTracker, TranslationStats};
use crate::reflection::{ComponentTypes, SaveComponent};
use crate::registry::{ComponentTypeId, TypeRegistry};
use crate::world::World;

/// Outcome of a successful load
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Saved id -> id allocated in the target world
    pub entities: IdTranslationTable,
    /// Record keys -> new ids
    pub keys: KeyTracker,
    pub references: TranslationStats,
    /// Listed tags without a local type, dropped under the lenient policy
    pub skipped_types: Vec<ComponentTypeId>,
    pub skipped_payloads: usize,
}

impl LoadResult {
    /// New id of a saved entity
    pub fn entity(&self, saved: EntityId) -> Option<EntityId> {
        self.entities.get(saved)
    }

    /// New id of the entity saved under `key`
    pub fn keyed(&self, key: &str) -> Option<EntityId> {
        self.keys.get(key)
    }
}

/// Saves world selections and loads snapshots back
#[derive(Default)]
pub struct WorldSerializer {
    types: ComponentTypes,
    config: SnapshotConfig,
}

impl WorldSerializer {
    pub fn new(types: ComponentTypes) -> Self {
        Self::with_config(types, SnapshotConfig::default())
    }

    pub fn with_config(types: ComponentTypes, config: SnapshotConfig) -> Self {
        Self { types, config }
    }

    /// Add a component type to the catalog
    pub fn register<T: SaveComponent>(&mut self) -> Result<&mut Self> {
        self.types.register::<T>()?;
        Ok(self)
    }

    pub fn types(&self) -> &ComponentTypes {
        &self.types
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SnapshotConfig {
        &mut self.config
    }

    /// Snapshot `selection`, keeping its order
    pub fn save(&self, world: &World, selection: &[EntityId]) -> Result<SaveSnapshot> {
        #[cfg(feature = "profiling")]
        let span = info_span!("snapshot.save", selected = selection.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let entities = EntityIdEncoder::encode(world, selection)?;

        let mut registry = TypeRegistry::new();
        let collected = ComponentCollector::new(&self.types).collect(world, &entities, &mut registry)?;
        let index = ArchetypeIndex::build(world, &entities, &self.types, &registry)?;

        let mut tracker = ReferenceTracker::new();
        tracker.inspect_types(
            collected
                .iter()
                .filter_map(|tag| registry.resolve(tag, &self.types).ok()),
        );
        let recorded = tracker.pre_write(world, &entities, &self.types);
        let selected: AHashSet<EntityId> = entities.iter().copied().collect();
        let outside = tracker.outside_references(&selected);

        let entity_data = EntitySerializer::new(&registry, &self.types).save_records(world, &entities, &index)?;

        debug!(
            entities = entities.len(),
            types = collected.len(),
            archetypes = index.len(),
            references = recorded,
            outside_selection = outside,
            "snapshot saved"
        );

        Ok(SaveSnapshot {
            entities,
            component_identifiers: registry.identifiers(),
            archetypes: index
                .sets()
                .map(|types| ArchetypeRecord {
                    types: types.to_vec(),
                })
                .collect(),
            entity_data,
        })
    }

    /// Snapshot every live entity
    pub fn save_all(&self, world: &World) -> Result<SaveSnapshot> {
        let entities: Vec<EntityId> = world.entities().collect();
        self.save(world, &entities)
    }

    pub fn save_to_string(&self, world: &World, selection: &[EntityId]) -> Result<String> {
        self.save(world, selection)?.to_json(self.config.pretty_print)
    }

    pub fn save_to_writer<W: Write>(&self, world: &World, selection: &[EntityId], writer: W) -> Result<()> {
        self.save(world, selection)?
            .to_writer(writer, self.config.pretty_print)
    }

    pub fn load_str(&self, world: &mut World, json: &str) -> Result<LoadResult> {
        self.load_slice(world, json.as_bytes())
    }

    pub fn load_slice(&self, world: &mut World, bytes: &[u8]) -> Result<LoadResult> {
        let header: DocumentHeader = serde_json::from_slice(bytes)?;
        let (registry, skipped) = self.resolve_header(header)?;

        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        let decoded = DocumentDeserializer {
            registry: &registry,
            skipped: &skipped,
        }
        .deserialize(&mut deserializer)?;
        deserializer.end()?;

        self.apply(world, &registry, skipped, decoded)
    }

    /// Load from a seekable source, rewound to its starting position between the two passes
    pub fn load_reader<R: Read + Seek>(&self, world: &mut World, mut reader: R) -> Result<LoadResult> {
        let start = reader.stream_position()?;
        let header: DocumentHeader = serde_json::from_reader(BufReader::new(&mut reader))?;
        let (registry, skipped) = self.resolve_header(header)?;

        reader.seek(SeekFrom::Start(start))?;
        let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(&mut reader));
        let decoded = DocumentDeserializer {
            registry: &registry,
            skipped: &skipped,
        }
        .deserialize(&mut deserializer)?;
        deserializer.end()?;

        self.apply(world, &registry, skipped, decoded)
    }

    /// Load an in-memory snapshot through the same two passes
    pub fn load_snapshot(&self, world: &mut World, snapshot: &SaveSnapshot) -> Result<LoadResult> {
        let value = snapshot.to_value()?;
        let header = DocumentHeader::deserialize(&value)?;
        let (registry, skipped) = self.resolve_header(header)?;

        let decoded = DocumentDeserializer {
            registry: &registry,
            skipped: &skipped,
        }
        .deserialize(&value)?;

        self.apply(world, &registry, skipped, decoded)
    }

    /// Rebuild the document registry and check every tag against the catalog
    fn resolve_header(&self, header: DocumentHeader) -> Result<(TypeRegistry, BTreeSet<ComponentTypeId>)> {
        let registry = TypeRegistry::from_identifiers(header.component_identifiers)?;

        let mut skipped = BTreeSet::new();
        for tag in registry.tags() {
            match registry.resolve(tag, &self.types) {
                Ok(_) => {}
                Err(_) if self.config.skips_unknown() => {
                    warn!(
                        %tag,
                        type_name = registry.type_name(tag).unwrap_or_default(),
                        "skipping unknown component type"
                    );
                    skipped.insert(tag.clone());
                }
                Err(err) => return Err(err),
            }
        }
        Ok((registry, skipped))
    }

    fn apply(
        &self,
        world: &mut World,
        registry: &TypeRegistry,
        skipped: BTreeSet<ComponentTypeId>,
        decoded: DecodedDocument,
    ) -> Result<LoadResult> {
        #[cfg(feature = "profiling")]
        let span = info_span!("snapshot.load", entities = decoded.entities.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let skipped_payloads = decoded.skipped_payloads();
        let index = ArchetypeIndex::from_sets(decoded.archetypes)?;
        let table = EntityIdEncoder::decode(&decoded.entities, world)?;

        match self.populate(world, registry, &index, &table, decoded.records) {
            Ok((keys, references)) => {
                debug!(
                    entities = table.len(),
                    archetypes = index.len(),
                    skipped_types = skipped.len(),
                    skipped_payloads,
                    "snapshot loaded"
                );
                Ok(LoadResult {
                    entities: table,
                    keys,
                    references,
                    skipped_types: skipped.into_iter().collect(),
                    skipped_payloads,
                })
            }
            Err(err) => {
                rollback(world, &table);
                Err(err)
            }
        }
    }

    fn populate(
        &self,
        world: &mut World,
        registry: &TypeRegistry,
        index: &ArchetypeIndex,
        table: &IdTranslationTable,
        records: Vec<DecodedRecord>,
    ) -> Result<(KeyTracker, TranslationStats)> {
        let mut tracker = ReferenceTracker::new();
        tracker.inspect_types(
            registry
                .tags()
                .filter_map(|tag| registry.resolve(tag, &self.types).ok()),
        );

        let mut keys = KeyTracker::new();
        let mut states = EntitySerializer::new(registry, &self.types).load_records(
            world,
            table,
            index,
            records,
            &mut tracker,
            &mut keys,
        )?;

        states.require(EntityState::FieldsPopulated)?;
        let references = tracker.translate(world, table, &self.types)?;
        states.advance_all(EntityState::ReferencesResolved)?;

        Ok((keys, references))
    }
}

fn rollback(world: &mut World, table: &IdTranslationTable) {
    for entity in table.new_ids() {
        if let Err(err) = world.despawn(entity) {
            debug!(?entity, %err, "rollback could not despawn entity");
        }
    }
    debug!(entities = table.len(), "load rolled back");
}
