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

//! State handlers: the per-state lifecycle contract and the erased sweep
//! driver the dispatcher runs each phase.
//!
//! A handler owns one payload record type. Its type index is fixed at
//! construction; membership tests in the sweeps compare indices only. The
//! sweeps collect matching entities through the query layer first and
//! mutate afterwards, so no structural edit ever races an enumeration.

use ahash::AHashMap;
use std::any::TypeId;

use crate::command::CommandBuffer;
use crate::component::Component;
use crate::entity::EntityId;
use crate::error::Result;
use crate::registry::{type_index_of, TypeIndex};
use crate::state::{StateChangeRequest, StateId};
use crate::world::World;

/// Lifecycle contract for one registered state.
///
/// `Payload` is the record whose presence (together with a matching marker)
/// makes an entity a member of this state. Callbacks receive the entity,
/// the live payload, and a deferred command handle; they never mutate the
/// store's structure directly.
pub trait State: 'static + Send + Sync {
    type Payload: Component + Default;

    /// Payload type of the state this handler overrides, if any.
    ///
    /// Declaring `Some(TypeId::of::<Base>())` makes registration replace
    /// the handler occupying Base's slot instead of appending (single-level
    /// "subclass wins"). The relation is declared, not introspected.
    fn overrides(&self) -> Option<TypeId> {
        None
    }

    /// Called once when the handler is bound to a dispatcher.
    fn on_registered(&mut self) {}

    /// Called once per cycle before any sweep, in registration order.
    fn on_before_update(&mut self, _world: &World) {}

    /// Payload used when a transition request carries no explicit payload.
    fn create_default_payload(&self) -> Self::Payload {
        Self::Payload::default()
    }

    fn on_enter(
        &mut self,
        _entity: EntityId,
        _payload: &mut Self::Payload,
        _commands: &mut StateCommands<'_>,
    ) {
    }

    fn on_update(
        &mut self,
        _entity: EntityId,
        _payload: &mut Self::Payload,
        _commands: &mut StateCommands<'_>,
    ) {
    }

    fn on_exit(
        &mut self,
        _entity: EntityId,
        _payload: &mut Self::Payload,
        _commands: &mut StateCommands<'_>,
    ) {
    }
}

/// Deferred command handle passed to handler callbacks.
///
/// Everything issued here lands in the cycle's mutation queue and becomes
/// visible at the flush barrier, so it is safe to call from inside any
/// callback while sweeps are running.
pub struct StateCommands<'a> {
    buffer: &'a mut CommandBuffer,
}

impl<'a> StateCommands<'a> {
    pub(crate) fn new(buffer: &'a mut CommandBuffer) -> Self {
        Self { buffer }
    }

    /// Request a transition to state `T`, overwriting any live request on
    /// the entity. Serviced by the *next* update cycle.
    pub fn request_state_change<T: Component>(&mut self, entity: EntityId) {
        self.buffer
            .attach_component(entity, StateChangeRequest::to::<T>());
    }

    /// Like [`request_state_change`](Self::request_state_change), but seeds
    /// the target payload instead of letting the handler default-construct
    /// it ahead of the enter pass.
    pub fn request_state_change_with<T: Component>(&mut self, entity: EntityId, payload: T) {
        self.buffer.attach_component(entity, payload);
        self.buffer
            .attach_component(entity, StateChangeRequest::to::<T>());
    }

    /// Queue despawning the entity at the flush barrier.
    pub fn despawn(&mut self, entity: EntityId) {
        self.buffer.despawn(entity);
    }

    /// Queue an arbitrary deferred store edit.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.buffer.add(f);
    }
}

/// Per-cycle scratch shared by all sweeps: markers backfilled this cycle
/// (attached to the store only at flush, but visible to phase logic) and
/// the cycle's deferred mutation queue.
pub(crate) struct CycleState {
    pub(crate) staged_markers: AHashMap<EntityId, TypeIndex>,
    pub(crate) commands: CommandBuffer,
}

impl CycleState {
    pub(crate) fn new() -> Self {
        Self {
            staged_markers: AHashMap::new(),
            commands: CommandBuffer::new(),
        }
    }

    /// Marker view: staged value first, then the store.
    pub(crate) fn marker_of(&self, world: &World, entity: EntityId) -> Option<TypeIndex> {
        if let Some(&index) = self.staged_markers.get(&entity) {
            return Some(index);
        }
        world
            .get_component::<StateId>(entity)
            .map(|marker| marker.type_index())
    }

    /// Set the marker through the view. Markers already in the store are
    /// field-written in place (non-structural); staged ones keep their
    /// final value until flush.
    pub(crate) fn set_marker(&mut self, world: &mut World, entity: EntityId, index: TypeIndex) {
        if let Some(staged) = self.staged_markers.get_mut(&entity) {
            *staged = index;
        } else if let Some(marker) = world.get_component_mut::<StateId>(entity) {
            marker.set_type_index(index);
        }
    }
}

/// Object-safe face of a registered handler, one per dispatcher slot.
pub(crate) trait ErasedState: Send + Sync {
    fn type_index(&self) -> TypeIndex;
    fn payload_type_id(&self) -> TypeId;
    fn overrides(&self) -> Option<TypeId>;
    fn name(&self) -> &'static str;
    fn registered(&mut self);
    fn before_update(&mut self, world: &World);
    fn run_exit(&mut self, world: &mut World, cycle: &mut CycleState);
    fn run_enter(&mut self, world: &mut World, cycle: &mut CycleState);
    fn run_update(&mut self, world: &mut World, cycle: &mut CycleState);
    fn flush_staged(&mut self, world: &mut World) -> Result<()>;
}

/// Typed driver wrapping a [`State`] implementation.
pub(crate) struct TypedHandler<S: State> {
    state: S,
    type_index: TypeIndex,

    /// Payloads created by this cycle's enter pass, attached at flush.
    /// Entered and updated in place while staged.
    staged: AHashMap<EntityId, S::Payload>,
}

impl<S: State> TypedHandler<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state,
            // Assigned at construction, never lazily in the sweeps
            type_index: type_index_of::<S::Payload>(),
            staged: AHashMap::new(),
        }
    }

    fn request_targets(&self, world: &World) -> Vec<(EntityId, TypeIndex)> {
        world
            .query()
            .with::<StateChangeRequest>()
            .entities()
            .into_iter()
            .filter_map(|entity| {
                world
                    .get_component::<StateChangeRequest>(entity)
                    .map(|request| (entity, request.target()))
            })
            .collect()
    }
}

impl<S: State> ErasedState for TypedHandler<S> {
    fn type_index(&self) -> TypeIndex {
        self.type_index
    }

    fn payload_type_id(&self) -> TypeId {
        TypeId::of::<S::Payload>()
    }

    fn overrides(&self) -> Option<TypeId> {
        self.state.overrides()
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<S>()
    }

    fn registered(&mut self) {
        self.state.on_registered();
    }

    fn before_update(&mut self, world: &World) {
        self.state.on_before_update(world);
    }

    fn run_exit(&mut self, world: &mut World, cycle: &mut CycleState) {
        let candidates = world
            .query()
            .with::<S::Payload>()
            .with::<StateChangeRequest>()
            .entities();

        for entity in candidates {
            let Some(target) = world
                .get_component::<StateChangeRequest>(entity)
                .map(|request| request.target())
            else {
                continue;
            };
            // Retargeting to the current state is a no-op transition
            if target == self.type_index {
                continue;
            }
            if cycle.marker_of(world, entity) != Some(self.type_index) {
                continue;
            }

            if let Some(payload) = world.get_component_mut::<S::Payload>(entity) {
                let mut commands = StateCommands::new(&mut cycle.commands);
                self.state.on_exit(entity, payload, &mut commands);
            }
            cycle.commands.detach_component::<S::Payload>(entity);
        }
    }

    fn run_enter(&mut self, world: &mut World, cycle: &mut CycleState) {
        let requests = self.request_targets(world);

        // First sweep: stage a default payload for entities entering
        // without one (either present in the store or seeded by a caller)
        for &(entity, target) in &requests {
            if target != self.type_index {
                continue;
            }
            let Some(current) = cycle.marker_of(world, entity) else {
                continue;
            };
            if current == self.type_index {
                continue;
            }
            if world.has_component::<S::Payload>(entity) || self.staged.contains_key(&entity) {
                continue;
            }
            let payload = self.state.create_default_payload();
            self.staged.insert(entity, payload);
        }

        // Second sweep: flip the marker and enter on the live payload
        for &(entity, target) in &requests {
            if target != self.type_index {
                continue;
            }
            let Some(current) = cycle.marker_of(world, entity) else {
                continue;
            };
            if current == self.type_index {
                continue;
            }
            if !world.has_component::<S::Payload>(entity) && !self.staged.contains_key(&entity) {
                continue;
            }

            cycle.set_marker(world, entity, self.type_index);
            let mut commands = StateCommands::new(&mut cycle.commands);
            if let Some(payload) = self.staged.get_mut(&entity) {
                self.state.on_enter(entity, payload, &mut commands);
            } else if let Some(payload) = world.get_component_mut::<S::Payload>(entity) {
                self.state.on_enter(entity, payload, &mut commands);
            }
        }
    }

    fn run_update(&mut self, world: &mut World, cycle: &mut CycleState) {
        // Steady-state members plus entities that entered this cycle.
        // Staged entities never have a store payload, so no duplicates.
        let mut candidates = world.query().with::<S::Payload>().entities();
        candidates.extend(self.staged.keys().copied());

        for entity in candidates {
            if cycle.marker_of(world, entity) != Some(self.type_index) {
                continue;
            }
            let mut commands = StateCommands::new(&mut cycle.commands);
            if let Some(payload) = self.staged.get_mut(&entity) {
                self.state.on_update(entity, payload, &mut commands);
            } else if let Some(payload) = world.get_component_mut::<S::Payload>(entity) {
                self.state.on_update(entity, payload, &mut commands);
            }
        }
    }

    fn flush_staged(&mut self, world: &mut World) -> Result<()> {
        for (entity, payload) in self.staged.drain() {
            if world.contains(entity) {
                world.add_component(entity, payload)?;
            }
        }
        Ok(())
    }
}
