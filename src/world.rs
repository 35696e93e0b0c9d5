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

//! World: central entity and column storage
//!
//! The world is the shared data store the state machine runs against:
//! entity liveness plus one dense column per record type. Structural edits
//! (attach/detach) must never happen while an enumeration over the same
//! column is in progress; during an update cycle they are routed through
//! the [`CommandBuffer`](crate::command::CommandBuffer).

use ahash::AHashMap;
use slotmap::SlotMap;
use std::any::TypeId;

use crate::column::{Column, ColumnStorage};
use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::query::QueryBuilder;

/// Central data store: entities and their attached records.
pub struct World {
    /// Entity liveness table
    entities: SlotMap<EntityId, ()>,

    /// One column per record type ever attached
    columns: AHashMap<TypeId, Box<dyn ColumnStorage>>,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            columns: AHashMap::with_capacity(16),
        }
    }

    /// Spawn a new entity with no records attached.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.insert(())
    }

    /// Spawn a new entity carrying one record.
    pub fn spawn_with<T: Component>(&mut self, component: T) -> EntityId {
        let entity = self.entities.insert(());
        self.column_mut::<T>().insert(entity, component);
        entity
    }

    /// Remove an entity and every record attached to it.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        if self.entities.remove(entity).is_none() {
            return Err(EcsError::EntityNotFound);
        }
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        Ok(())
    }

    /// Check if an entity is alive.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Attach a record to an entity, overwriting any existing record of the
    /// same type in place.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        if !self.entities.contains_key(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.column_mut::<T>().insert(entity, component);
        Ok(())
    }

    /// Detach a record from an entity.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        if !self.entities.contains_key(entity) {
            return Err(EcsError::EntityNotFound);
        }
        let removed = self
            .columns
            .get_mut(&TypeId::of::<T>())
            .is_some_and(|column| column.remove_entity(entity));
        if removed {
            Ok(())
        } else {
            Err(EcsError::ComponentNotFound)
        }
    }

    /// Get immutable reference to a record on an entity
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.column::<T>()?.get(entity)
    }

    /// Get mutable reference to a record on an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Column<T>>()?
            .get_mut(entity)
    }

    /// Check if entity has a record of the given type
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.column::<T>().is_some_and(|column| column.contains(entity))
    }

    pub(crate) fn has_component_id(&self, entity: EntityId, type_id: TypeId) -> bool {
        self.columns
            .get(&type_id)
            .is_some_and(|column| column.contains(entity))
    }

    /// Begin a presence-predicate query over this world.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Typed column accessor (None until a record of T was ever attached).
    pub fn column<T: Component>(&self) -> Option<&Column<T>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    fn column_mut<T: Component>(&mut self) -> &mut Column<T> {
        let storage = self
            .columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Column::<T>::new()));
        storage
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .expect("column storage registered under a foreign TypeId")
    }

    pub(crate) fn column_len(&self, type_id: TypeId) -> Option<usize> {
        self.columns.get(&type_id).map(|column| column.len())
    }

    pub(crate) fn column_entities(&self, type_id: TypeId) -> Option<&[EntityId]> {
        self.columns.get(&type_id).map(|column| column.entities())
    }

    pub(crate) fn live_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys()
    }

    /// Visit every record of type T in parallel (read-only).
    ///
    /// The cycle's phases stay sequential; this only parallelizes within
    /// one column enumeration, which the store permits.
    ///
    /// Requires the "parallel" feature.
    #[cfg(feature = "parallel")]
    pub fn par_for_each<T, F>(&self, f: F)
    where
        T: Component + Sync,
        F: Fn(EntityId, &T) + Send + Sync,
    {
        if let Some(column) = self.column::<T>() {
            column.par_for_each(f);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
