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

//! Columnar per-type record storage.
//!
//! One `Column<T>` holds every attached record of type `T` in dense
//! parallel arrays (entity ids and payloads), with a sparse generational
//! index for O(1) lookup. Removal swaps the last row into the hole, so
//! iteration order is unspecified but storage stays contiguous.

use slotmap::SecondaryMap;
use std::any::Any;

use crate::component::Component;
use crate::entity::EntityId;

/// Type-erased column interface used by the world's column table.
pub(crate) trait ColumnStorage: Send + Sync {
    fn contains(&self, entity: EntityId) -> bool;

    /// Remove the entity's row if present. Returns true if a row was removed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;

    fn len(&self) -> usize;

    /// Dense entity list, parallel to the payload array.
    fn entities(&self) -> &[EntityId];

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense column of `T` records keyed by entity.
pub struct Column<T: Component> {
    entities: Vec<EntityId>,
    data: Vec<T>,
    index: SecondaryMap<EntityId, usize>,
}

impl<T: Component> Column<T> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            data: Vec::new(),
            index: SecondaryMap::new(),
        }
    }

    /// Insert or overwrite the entity's record. Returns the previous value
    /// when the entity already had a row.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(&row) = self.index.get(entity) {
            return Some(std::mem::replace(&mut self.data[row], value));
        }
        let row = self.data.len();
        self.entities.push(entity);
        self.data.push(value);
        self.index.insert(entity, row);
        None
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        let &row = self.index.get(entity)?;
        self.data.get(row)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let &row = self.index.get(entity)?;
        self.data.get_mut(row)
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let row = self.index.remove(entity)?;
        let value = self.data.swap_remove(row);
        self.entities.swap_remove(row);
        // The swapped-in row (if any) needs its sparse index fixed up
        if row < self.entities.len() {
            let moved = self.entities[row];
            self.index.insert(moved, row);
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities.iter().copied().zip(self.data.iter())
    }

    /// Visit every row in parallel (read-only).
    ///
    /// Requires the "parallel" feature.
    #[cfg(feature = "parallel")]
    pub fn par_for_each<F>(&self, f: F)
    where
        T: Sync,
        F: Fn(EntityId, &T) + Send + Sync,
    {
        use rayon::prelude::*;
        self.entities
            .par_iter()
            .zip(self.data.par_iter())
            .for_each(|(&entity, value)| f(entity, value));
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ColumnStorage for Column<T> {
    fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(entity)
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<EntityId> {
        let mut map: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_insert_get_remove() {
        let ids = keys(3);
        let mut column = Column::new();

        assert!(column.insert(ids[0], 10u32).is_none());
        assert!(column.insert(ids[1], 20u32).is_none());
        assert_eq!(column.get(ids[0]), Some(&10));
        assert_eq!(column.get(ids[1]), Some(&20));
        assert_eq!(column.len(), 2);

        assert_eq!(column.remove(ids[0]), Some(10));
        assert_eq!(column.get(ids[0]), None);
        assert_eq!(column.len(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let ids = keys(1);
        let mut column = Column::new();

        column.insert(ids[0], 1u32);
        assert_eq!(column.insert(ids[0], 2u32), Some(1));
        assert_eq!(column.get(ids[0]), Some(&2));
        assert_eq!(column.len(), 1);
    }

    #[test]
    fn test_swap_remove_fixes_index() {
        let ids = keys(3);
        let mut column = Column::new();

        for (i, &id) in ids.iter().enumerate() {
            column.insert(id, i as u32);
        }

        // Removing the first row swaps the last one into its place
        column.remove(ids[0]);
        assert_eq!(column.get(ids[2]), Some(&2));
        assert_eq!(column.get(ids[1]), Some(&1));
        assert_eq!(column.entities().len(), 2);
    }
}
