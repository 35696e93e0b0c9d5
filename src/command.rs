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

//! Deferred mutation queue.
//!
//! Structural edits (attach/detach/despawn) issued while an enumeration is
//! in progress are queued here and applied in submission order at the
//! cycle's flush barrier. Queued edits are invisible to queries until then.

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Deferred command for world mutations
pub enum Command {
    /// Attach a record to an entity
    Attach(CommandClosure),

    /// Detach a record from an entity
    Detach(CommandClosure),

    /// Despawn entity
    Despawn(EntityId),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Attach(_) => write!(f, "Attach(...)"),
            Command::Detach(_) => write!(f, "Detach(...)"),
            Command::Despawn(e) => f.debug_tuple("Despawn").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue attaching a record to an entity.
    ///
    /// A no-op at flush time if the entity died in the meantime.
    pub fn attach_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.commands.push(Command::Attach(Box::new(move |world| {
            if world.contains(entity) {
                world.add_component(entity, component)?;
            }
            Ok(())
        })));
    }

    /// Queue detaching a record from an entity.
    ///
    /// A no-op at flush time if the entity died or never carried the record.
    pub fn detach_component<T: Component>(&mut self, entity: EntityId) {
        self.commands.push(Command::Detach(Box::new(move |world| {
            if world.contains(entity) {
                let _ = world.remove_component::<T>(entity);
            }
            Ok(())
        })));
    }

    /// Queue despawn command
    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue a custom world mutation
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Apply all commands to the world in submission order and clear the buffer
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        for command in self.commands.drain(..) {
            match command {
                Command::Attach(f) | Command::Detach(f) | Command::Custom(f) => {
                    f(world)?;
                }
                Command::Despawn(entity) => {
                    if world.contains(entity) {
                        world.despawn(entity)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u32);

    #[test]
    fn test_deferred_attach_detach() -> Result<()> {
        let mut world = World::new();
        let entity = world.spawn();

        let mut buffer = CommandBuffer::new();
        buffer.attach_component(entity, Marker(1));
        assert_eq!(buffer.len(), 1);

        // Invisible until apply
        assert!(!world.has_component::<Marker>(entity));

        buffer.apply(&mut world)?;
        assert!(world.has_component::<Marker>(entity));
        assert!(buffer.is_empty());

        buffer.detach_component::<Marker>(entity);
        buffer.apply(&mut world)?;
        assert!(!world.has_component::<Marker>(entity));
        Ok(())
    }

    #[test]
    fn test_submission_order() -> Result<()> {
        let mut world = World::new();
        let entity = world.spawn();

        let mut buffer = CommandBuffer::new();
        buffer.attach_component(entity, Marker(1));
        buffer.attach_component(entity, Marker(2));
        buffer.apply(&mut world)?;

        // Later submission wins
        assert_eq!(world.get_component::<Marker>(entity).map(|m| m.0), Some(2));
        Ok(())
    }

    #[test]
    fn test_dead_entity_is_noop() -> Result<()> {
        let mut world = World::new();
        let entity = world.spawn();

        let mut buffer = CommandBuffer::new();
        buffer.attach_component(entity, Marker(1));
        buffer.detach_component::<Marker>(entity);
        world.despawn(entity)?;

        // Both commands should pass over the dead entity silently
        buffer.apply(&mut world)?;
        Ok(())
    }

    #[test]
    fn test_deferred_despawn() -> Result<()> {
        let mut world = World::new();
        let entity = world.spawn_with(Marker(7));

        let mut buffer = CommandBuffer::new();
        buffer.despawn(entity);
        assert!(world.contains(entity));

        buffer.apply(&mut world)?;
        assert!(!world.contains(entity));
        Ok(())
    }
}
