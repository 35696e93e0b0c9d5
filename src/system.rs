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

//! State registry, dispatcher, and the update cycle.
//!
//! The system owns an ordered collection of handler slots and advances the
//! whole population one cycle per [`update`](StateSystem::update) call. No
//! current-state enum is tracked anywhere: membership is entirely
//! data-driven from payload presence plus the marker record.

use std::any::TypeId;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::Result;
use crate::handler::{CycleState, ErasedState, State, TypedHandler};
use crate::registry::TypeIndex;
use crate::state::{self, StateChangeRequest, StateId};
use crate::world::World;

/// Observer for transition requests that matched no registered handler.
///
/// Purely diagnostic; the request is consumed either way.
pub type UnresolvedTargetHook = Box<dyn Fn(EntityId, TypeIndex) + Send + Sync>;

struct HandlerSlot {
    /// Payload type this slot was created for. Replacement registrations
    /// keep the key, so later overrides against the same base land here.
    key: TypeId,
    handler: Box<dyn ErasedState>,
}

/// Finite-state-machine dispatcher over one world's entity population.
#[derive(Default)]
pub struct StateSystem {
    slots: Vec<HandlerSlot>,
    unresolved_hook: Option<UnresolvedTargetHook>,
}

impl StateSystem {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            unresolved_hook: None,
        }
    }

    /// Register a state handler during system initialization (never
    /// mid-cycle).
    ///
    /// Appends in registration order, unless the handler declares an
    /// override of an occupied slot's payload type, in which case it
    /// replaces that slot in place. Last registration for a slot wins.
    pub fn register_state<S: State>(&mut self, state: S) {
        let mut handler: Box<dyn ErasedState> = Box::new(TypedHandler::new(state));
        handler.registered();

        let key = handler
            .overrides()
            .unwrap_or_else(|| handler.payload_type_id());

        if let Some(pos) = self.slots.iter().position(|slot| slot.key == key) {
            #[cfg(feature = "profiling")]
            tracing::debug!(
                replaced = self.slots[pos].handler.name(),
                with = handler.name(),
                "state handler slot override"
            );
            self.slots[pos].handler = handler;
        } else {
            self.slots.push(HandlerSlot { key, handler });
        }
    }

    /// Number of registered handler slots.
    pub fn handler_count(&self) -> usize {
        self.slots.len()
    }

    /// Install an observer for requests targeting unregistered states.
    /// Default behavior (and behavior with no hook) is a silent no-op.
    pub fn set_unresolved_hook(&mut self, hook: UnresolvedTargetHook) {
        self.unresolved_hook = Some(hook);
    }

    /// Request a transition to state `T`, overwriting any live request.
    ///
    /// Immediate variant for use between cycles; inside handler callbacks
    /// use [`StateCommands`](crate::handler::StateCommands) instead.
    pub fn request_state_change<T: Component>(
        &self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<()> {
        world.add_component(entity, StateChangeRequest::to::<T>())
    }

    /// Request a transition to state `T`, seeding the payload record so the
    /// enter pass uses it instead of default-constructing one.
    pub fn request_state_change_with<T: Component>(
        &self,
        world: &mut World,
        entity: EntityId,
        payload: T,
    ) -> Result<()> {
        world.add_component(entity, payload)?;
        world.add_component(entity, StateChangeRequest::to::<T>())
    }

    /// True iff the entity carries `T`'s payload and its marker points at
    /// `T`. False (never an error) on any absence.
    pub fn is_in_state<T: Component>(&self, world: &World, entity: EntityId) -> bool {
        state::is_in_state::<T>(world, entity)
    }

    /// Advance exactly one cycle. The host scheduler decides cadence.
    ///
    /// Phases run strictly in order: backfill markers, before-update hooks,
    /// exit pass, enter pass, update pass, request cleanup, flush. The
    /// store is consistent only between calls, never mid-cycle.
    pub fn update(&mut self, world: &mut World) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = tracing::info_span!(
            "state_system.update",
            handlers = self.slots.len(),
            entities = world.entity_count()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut cycle = CycleState::new();

        // Phase 1: backfill markers for first-time requesters. Later
        // phases assume every requesting entity has a marker view.
        for entity in world
            .query()
            .with::<StateChangeRequest>()
            .without::<StateId>()
            .entities()
        {
            cycle.staged_markers.insert(entity, TypeIndex::UNSET);
        }

        // Phase 2: per-cycle handler hooks, registration order
        for slot in &mut self.slots {
            slot.handler.before_update(world);
        }

        // Phase 3: exit stale states before anything enters, so a
        // retargeting entity is never both entering and exiting one state
        for slot in &mut self.slots {
            slot.handler.run_exit(world, &mut cycle);
        }

        // Phase 4: enter requested states
        for slot in &mut self.slots {
            slot.handler.run_enter(world, &mut cycle);
        }

        // Phase 5: steady-state update, freshly entered entities included
        for slot in &mut self.slots {
            slot.handler.run_update(world, &mut cycle);
        }

        self.cleanup_requests(world, &mut cycle);

        // Phase 7: one flush barrier applies every structural edit
        for (entity, index) in cycle.staged_markers.drain() {
            if world.contains(entity) {
                world.add_component(entity, StateId::with_index(index))?;
            }
        }
        for slot in &mut self.slots {
            slot.handler.flush_staged(world)?;
        }
        cycle.commands.apply(world)?;

        Ok(())
    }

    /// Phase 6: queue removal of every serviced request, whether or not a
    /// handler claimed it (unregistered targets are consumed silently).
    fn cleanup_requests(&self, world: &mut World, cycle: &mut CycleState) {
        let mut serviced = world
            .query()
            .with::<StateId>()
            .with::<StateChangeRequest>()
            .entities();
        // Backfilled entities have no store marker yet but were serviced too
        serviced.extend(
            cycle
                .staged_markers
                .keys()
                .copied()
                .filter(|&entity| world.has_component::<StateChangeRequest>(entity)),
        );

        for entity in serviced {
            let Some((target, sequence)) = world
                .get_component::<StateChangeRequest>(entity)
                .map(|request| (request.target(), request.sequence()))
            else {
                continue;
            };

            if !self.is_registered(target) {
                #[cfg(feature = "profiling")]
                tracing::debug!(?entity, %target, "transition request targeted an unregistered state");
                if let Some(hook) = &self.unresolved_hook {
                    hook(entity, target);
                }
                // The exit pass already ran and its payload detach lands at
                // flush; with no handler entering, the marker must not keep
                // pointing at the exited state between cycles.
                if let Some(current) = cycle.marker_of(world, entity) {
                    let exited = self.slots.iter().any(|slot| {
                        slot.handler.type_index() == current
                            && world.has_component_id(entity, slot.handler.payload_type_id())
                    });
                    if exited {
                        cycle.set_marker(world, entity, TypeIndex::UNSET);
                    }
                }
            }

            // Remove only the request serviced this cycle; a handler
            // callback may have queued a fresh one that must survive,
            // even one retargeting the same state
            cycle.commands.add(move |world| {
                let live = world
                    .get_component::<StateChangeRequest>(entity)
                    .map(|request| request.sequence());
                if live == Some(sequence) {
                    let _ = world.remove_component::<StateChangeRequest>(entity);
                }
                Ok(())
            });
        }
    }

    fn is_registered(&self, target: TypeIndex) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.handler.type_index() == target)
    }
}

impl std::fmt::Debug for StateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSystem")
            .field(
                "handlers",
                &self
                    .slots
                    .iter()
                    .map(|slot| slot.handler.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct IdlePayload;
    #[derive(Default)]
    struct StunnedPayload;

    struct Idle;
    impl State for Idle {
        type Payload = IdlePayload;
    }

    struct Stunned;
    impl State for Stunned {
        type Payload = StunnedPayload;
    }

    /// Replaces Idle's slot.
    #[derive(Default)]
    struct DeepIdlePayload;
    struct DeepIdle;
    impl State for DeepIdle {
        type Payload = DeepIdlePayload;

        fn overrides(&self) -> Option<TypeId> {
            Some(TypeId::of::<IdlePayload>())
        }
    }

    #[test]
    fn test_registration_order_and_count() {
        let mut system = StateSystem::new();
        system.register_state(Idle);
        system.register_state(Stunned);
        assert_eq!(system.handler_count(), 2);
    }

    #[test]
    fn test_override_replaces_in_place() {
        let mut system = StateSystem::new();
        system.register_state(Idle);
        system.register_state(Stunned);
        system.register_state(DeepIdle);

        // Replacement, not append
        assert_eq!(system.handler_count(), 2);
        assert!(system.is_registered(crate::registry::type_index_of::<DeepIdlePayload>()));
        assert!(!system.is_registered(crate::registry::type_index_of::<IdlePayload>()));
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut system = StateSystem::new();
        system.register_state(Idle);
        system.register_state(Idle);
        assert_eq!(system.handler_count(), 1);
    }

    #[test]
    fn test_update_on_empty_world() -> Result<()> {
        let mut system = StateSystem::new();
        system.register_state(Idle);

        let mut world = World::new();
        system.update(&mut world)?;
        Ok(())
    }
}
