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

//! State Machine ECS - data-oriented finite state machines
//!
//! Finite-state-machine engine over a columnar entity store. An entity's
//! state is the presence of a typed payload record plus a small identity
//! marker; transitions attach and detach records through a deferred
//! mutation queue so structural edits never race an enumeration.
//!
//! ```
//! use state_machine_ecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Alive;
//!
//! struct AliveState;
//! impl State for AliveState {
//!     type Payload = Alive;
//! }
//!
//! let mut world = World::new();
//! let mut system = StateSystem::new();
//! system.register_state(AliveState);
//!
//! let entity = world.spawn();
//! system.request_state_change::<Alive>(&mut world, entity).unwrap();
//! system.update(&mut world).unwrap();
//! assert!(system.is_in_state::<Alive>(&world, entity));
//! ```

pub mod column;
pub mod command;
pub mod component;
pub mod entity;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod state;
pub mod system;
pub mod world;

pub use column::*;
pub use command::*;
pub use component::*;
pub use entity::*;
pub use error::*;
pub use handler::*;
pub use query::*;
pub use registry::*;
pub use state::*;
pub use system::*;
pub use world::*;
