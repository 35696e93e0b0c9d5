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

//! State identity marker and transition request records.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::Component;
use crate::entity::EntityId;
use crate::registry::{type_index_of, TypeIndex};
use crate::world::World;

/// Monotonic tag distinguishing individual requests with equal targets.
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Per-entity record tracking the current state's type index.
///
/// Backfilled lazily by the update cycle when a transition request arrives
/// for an entity that lacks one; application code may pre-seed an
/// [`unset`](StateId::unset) marker but never writes the index itself.
/// The index stays [`TypeIndex::UNSET`] until the first transition completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateId {
    current: TypeIndex,
}

impl StateId {
    /// Marker with no state yet. Useful for pre-seeding entities that will
    /// receive transition requests later; the cycle backfills one otherwise.
    pub fn unset() -> Self {
        Self {
            current: TypeIndex::UNSET,
        }
    }

    pub(crate) fn with_index(current: TypeIndex) -> Self {
        Self { current }
    }

    pub fn type_index(&self) -> TypeIndex {
        self.current
    }

    pub(crate) fn set_type_index(&mut self, index: TypeIndex) {
        self.current = index;
    }

    /// True iff the marker currently points at state `T`.
    pub fn is<T: Component>(&self) -> bool {
        self.current == type_index_of::<T>()
    }
}

/// Per-entity record expressing "move to the state with this type index."
///
/// Attached by callers (or by handlers through the deferred queue), consumed
/// by exactly one update cycle, and removed at that cycle's flush. At most
/// one lives on an entity at a time; attaching overwrites. Every request
/// carries a distinct sequence tag, so the cycle removes exactly the record
/// it serviced and never a fresh one a callback queued behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeRequest {
    target: TypeIndex,
    sequence: u64,
}

impl StateChangeRequest {
    /// Request a transition to the state whose payload record is `T`.
    pub fn to<T: Component>() -> Self {
        Self {
            target: type_index_of::<T>(),
            sequence: REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Request a transition by raw type index.
    pub fn with_index(target: TypeIndex) -> Self {
        Self {
            target,
            sequence: REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn target(&self) -> TypeIndex {
        self.target
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// True iff the entity carries `T`'s payload record **and** its marker
/// points at `T`. Either condition alone is a mid-cycle transient, never
/// observable between cycles. Absence of either is `false`, not an error.
pub fn is_in_state<T: Component>(world: &World, entity: EntityId) -> bool {
    if !world.has_component::<T>(entity) {
        return false;
    }
    match world.get_component::<StateId>(entity) {
        Some(marker) => marker.is::<T>(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Walking;
    struct Swimming;

    #[test]
    fn test_marker_identity() {
        let mut marker = StateId::with_index(TypeIndex::UNSET);
        assert!(marker.type_index().is_unset());
        assert!(!marker.is::<Walking>());

        marker.set_type_index(type_index_of::<Walking>());
        assert!(marker.is::<Walking>());
        assert!(!marker.is::<Swimming>());
    }

    #[test]
    fn test_request_target() {
        let request = StateChangeRequest::to::<Swimming>();
        assert_eq!(request.target(), type_index_of::<Swimming>());

        let by_index = StateChangeRequest::with_index(request.target());
        assert_eq!(by_index.target(), request.target());
    }

    #[test]
    fn test_requests_with_equal_targets_are_distinct() {
        let first = StateChangeRequest::to::<Swimming>();
        let second = StateChangeRequest::to::<Swimming>();
        assert_eq!(first.target(), second.target());
        assert_ne!(first.sequence(), second.sequence());
    }

    #[test]
    fn test_is_in_state_needs_both_conditions() {
        let mut world = World::new();
        let entity = world.spawn();

        // Nothing attached at all
        assert!(!is_in_state::<Walking>(&world, entity));

        // Payload alone is not enough
        world.add_component(entity, Walking).unwrap();
        assert!(!is_in_state::<Walking>(&world, entity));

        // Marker pointing elsewhere is not enough either
        world
            .add_component(entity, StateId::with_index(type_index_of::<Swimming>()))
            .unwrap();
        assert!(!is_in_state::<Walking>(&world, entity));

        world
            .get_component_mut::<StateId>(entity)
            .unwrap()
            .set_type_index(type_index_of::<Walking>());
        assert!(is_in_state::<Walking>(&world, entity));
    }
}
