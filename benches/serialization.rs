use archetype_snapshot::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

impl SaveComponent for Position {
    const TYPE_NAME: &'static str = "bench::Position";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Health {
    hp: f32,
}

impl SaveComponent for Health {
    const TYPE_NAME: &'static str = "bench::Health";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Target {
    entity: EntityId,
}

impl SaveComponent for Target {
    const TYPE_NAME: &'static str = "bench::Target";

    fn entity_fields() -> Vec<EntityField<Self>> {
        vec![EntityField::single(
            "entity",
            |t: &Self| &t.entity,
            |t: &mut Self| &mut t.entity,
        )]
    }
}

fn serializer() -> WorldSerializer {
    let mut types = ComponentTypes::new();
    types.register::<Position>().unwrap();
    types.register::<Health>().unwrap();
    types.register::<Target>().unwrap();
    WorldSerializer::new(types)
}

/// Every other entity targets its predecessor
fn create_test_world(entity_count: usize) -> World {
    let mut world = World::new();
    let mut previous = no_entity();
    for i in 0..entity_count {
        let position = Position {
            x: i as f32,
            y: (i * 2) as f32,
            z: 0.0,
        };
        previous = if i % 2 == 0 {
            world.spawn((position, Health { hp: 100.0 })).unwrap()
        } else {
            world.spawn((position, Target { entity: previous })).unwrap()
        };
    }
    world
}

fn bench_save(c: &mut Criterion) {
    let serializer = serializer();
    let mut group = c.benchmark_group("snapshot_save");
    for count in [100, 1_000, 10_000] {
        let world = create_test_world(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &world, |b, world| {
            b.iter(|| serializer.save_all(black_box(world)).unwrap())
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let serializer = serializer();
    let mut group = c.benchmark_group("snapshot_load");
    for count in [100, 1_000, 10_000] {
        let json = serializer
            .save_all(&create_test_world(count))
            .and_then(|s| s.to_json(false))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &json, |b, json| {
            b.iter(|| {
                let mut world = World::new();
                serializer.load_str(&mut world, black_box(json)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
