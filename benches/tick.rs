//! Hot-path benchmarks: component joins, the movement system, and
//! snapshot encoding.
//!
//! Run with: cargo bench --bench tick

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use rtype_server::codec::Compressor;
use rtype_server::ecs::{Entity, Registry};
use rtype_server::game::components::{EntityTag, Health, Player, Position, Velocity};
use rtype_server::game::systems::movement;
use rtype_server::net::broadcast;
use rtype_server::net::protocol::EntityType;

const DT: f32 = 1.0 / 60.0;

/// Four players plus `count` moving enemies, half of them with health
fn create_registry(count: usize) -> (Registry, BTreeMap<u32, Entity>) {
    let mut reg = Registry::new();
    let mut clients = BTreeMap::new();
    let mut rng = rand::thread_rng();

    for i in 0..4u8 {
        let e = reg.spawn_entity();
        reg.add_component(e, Position::new(100.0, 200.0 + i as f32 * 150.0));
        reg.add_component(e, Velocity::new(0.0, 0.0));
        reg.add_component(e, Health::new(100));
        reg.add_component(e, EntityTag(EntityType::Player));
        reg.add_component(
            e,
            Player {
                client_id: i as u32 + 1,
                index: i,
                keys: 0,
            },
        );
        clients.insert(i as u32 + 1, e);
    }

    for i in 0..count {
        let e = reg.spawn_entity();
        reg.add_component(
            e,
            Position::new(rng.gen_range(0.0..1920.0), rng.gen_range(0.0..1080.0)),
        );
        reg.add_component(e, Velocity::new(rng.gen_range(-300.0..-50.0), 0.0));
        reg.add_component(e, EntityTag(EntityType::Enemy));
        if i % 2 == 0 {
            reg.add_component(e, Health::new(30));
        }
    }

    (reg, clients)
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");

    for count in [50, 200, 1000] {
        let (reg, _) = create_registry(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("join3", count), &reg, |b, reg| {
            b.iter(|| black_box(reg.join3::<Position, Velocity, Health>().len()))
        });
    }

    group.finish();
}

fn bench_movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement");

    for count in [50, 200, 1000] {
        let (mut reg, _) = create_registry(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(BenchmarkId::new("update", count), |b| {
            b.iter(|| movement::update(black_box(&mut reg), DT))
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    // Snapshots carry at most 255 entities
    for count in [50, 250] {
        let (reg, clients) = create_registry(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(BenchmarkId::new("encode", count), |b| {
            b.iter(|| black_box(broadcast::entity_snapshot(&reg, &clients)))
        });

        let mut compressor = Compressor::default();
        group.bench_function(BenchmarkId::new("encode_compressed", count), |b| {
            b.iter(|| {
                let packet = broadcast::entity_snapshot(&reg, &clients).unwrap_or_default();
                black_box(compressor.compress(&packet))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_join, bench_movement, bench_snapshot);
criterion_main!(benches);
