use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use state_machine_ecs::prelude::*;

#[derive(Default, Debug, Clone)]
#[allow(dead_code)]
struct Patrolling {
    waypoint: u32,
}

#[derive(Default, Debug, Clone)]
#[allow(dead_code)]
struct Chasing {
    target_distance: f32,
}

struct PatrollingState;

impl State for PatrollingState {
    type Payload = Patrolling;

    fn on_update(&mut self, _: EntityId, payload: &mut Patrolling, _: &mut StateCommands<'_>) {
        payload.waypoint = payload.waypoint.wrapping_add(1);
    }
}

struct ChasingState;

impl State for ChasingState {
    type Payload = Chasing;

    fn on_update(&mut self, _: EntityId, payload: &mut Chasing, _: &mut StateCommands<'_>) {
        payload.target_distance -= 0.1;
    }
}

fn populated(entities: usize) -> (World, StateSystem, Vec<EntityId>) {
    let mut world = World::new();
    let mut system = StateSystem::new();
    system.register_state(PatrollingState);
    system.register_state(ChasingState);

    let ids: Vec<EntityId> = (0..entities).map(|_| world.spawn()).collect();
    for &entity in &ids {
        system
            .request_state_change::<Patrolling>(&mut world, entity)
            .unwrap();
    }
    system.update(&mut world).unwrap();
    (world, system, ids)
}

fn steady_state_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_cycle");

    group.bench_function("steady_state_10k", |b| {
        b.iter_batched(
            || populated(10_000),
            |(mut world, mut system, _ids)| {
                system.update(&mut world).unwrap();
                world
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn transition_heavy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_cycle_transitions");

    group.bench_function("all_entities_retarget_10k", |b| {
        b.iter_batched(
            || populated(10_000),
            |(mut world, mut system, ids)| {
                for &entity in &ids {
                    system
                        .request_state_change::<Chasing>(&mut world, entity)
                        .unwrap();
                }
                system.update(&mut world).unwrap();
                world
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, steady_state_benchmark, transition_heavy_benchmark);
criterion_main!(benches);
