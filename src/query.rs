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

//! Presence-predicate queries.
//!
//! Enumeration is driven from the smallest participating `with` column, so
//! cost scales with the matching set rather than the whole population. The
//! builder collects entity ids; callers mutate records afterwards, never
//! while the enumeration is live.

use smallvec::SmallVec;
use std::any::TypeId;

use crate::component::Component;
use crate::entity::EntityId;
use crate::world::World;

/// Builder for "has X / lacks Y" entity enumeration.
pub struct QueryBuilder<'w> {
    world: &'w World,
    with: SmallVec<[TypeId; 4]>,
    without: SmallVec<[TypeId; 4]>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            with: SmallVec::new(),
            without: SmallVec::new(),
        }
    }

    /// Require a record of type T to be present.
    pub fn with<T: Component>(mut self) -> Self {
        self.with.push(TypeId::of::<T>());
        self
    }

    /// Require a record of type T to be absent.
    pub fn without<T: Component>(mut self) -> Self {
        self.without.push(TypeId::of::<T>());
        self
    }

    /// Collect all matching entity ids.
    pub fn entities(&self) -> Vec<EntityId> {
        if self.with.is_empty() {
            // No presence anchor: fall back to scanning live entities.
            // The update cycle never takes this path.
            return self
                .world
                .live_entities()
                .filter(|&entity| self.matches_filters(entity, None))
                .collect();
        }

        // Drive from the smallest with-column; a missing column means no
        // record of that type was ever attached, so nothing can match.
        let mut driver = self.with[0];
        let mut driver_len = match self.world.column_len(driver) {
            Some(len) => len,
            None => return Vec::new(),
        };
        for &type_id in &self.with[1..] {
            match self.world.column_len(type_id) {
                Some(len) if len < driver_len => {
                    driver = type_id;
                    driver_len = len;
                }
                Some(_) => {}
                None => return Vec::new(),
            }
        }

        let Some(candidates) = self.world.column_entities(driver) else {
            return Vec::new();
        };

        candidates
            .iter()
            .copied()
            .filter(|&entity| self.matches_filters(entity, Some(driver)))
            .collect()
    }

    /// Number of matching entities.
    pub fn count(&self) -> usize {
        self.entities().len()
    }

    fn matches_filters(&self, entity: EntityId, skip: Option<TypeId>) -> bool {
        for &type_id in &self.with {
            if Some(type_id) == skip {
                continue;
            }
            if !self.world.has_component_id(entity, type_id) {
                return false;
            }
        }
        for &type_id in &self.without {
            if self.world.has_component_id(entity, type_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_with_single() {
        let mut world = World::new();
        let e1 = world.spawn_with(A);
        let _e2 = world.spawn_with(B);

        let matched = world.query().with::<A>().entities();
        assert_eq!(matched, vec![e1]);
    }

    #[test]
    fn test_with_and_without() {
        let mut world = World::new();
        let e1 = world.spawn_with(A);
        let e2 = world.spawn_with(A);
        world.add_component(e2, B).unwrap();

        let matched = world.query().with::<A>().without::<B>().entities();
        assert_eq!(matched, vec![e1]);

        let matched = world.query().with::<A>().with::<B>().entities();
        assert_eq!(matched, vec![e2]);
    }

    #[test]
    fn test_unattached_type_matches_nothing() {
        let mut world = World::new();
        world.spawn_with(A);

        assert!(world.query().with::<C>().entities().is_empty());
        assert!(world.query().with::<A>().with::<C>().entities().is_empty());
    }

    #[test]
    fn test_no_anchor_scans_live_entities() {
        let mut world = World::new();
        let e1 = world.spawn();
        let e2 = world.spawn_with(A);

        let mut matched = world.query().without::<B>().entities();
        matched.sort();
        let mut expected = vec![e1, e2];
        expected.sort();
        assert_eq!(matched, expected);

        let matched = world.query().without::<A>().entities();
        assert_eq!(matched, vec![e1]);
    }

    #[test]
    fn test_count() {
        let mut world = World::new();
        for _ in 0..5 {
            world.spawn_with(A);
        }
        world.spawn_with(B);

        assert_eq!(world.query().with::<A>().count(), 5);
        assert_eq!(world.query().with::<B>().count(), 1);
    }
}
