//! Simulation benchmarks
//!
//! Mask overlap, ball integration, bullet resolution and a full tick at
//! increasing ball counts.
//!
//! Run with: cargo bench --bench simulation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ball_blast::game::assets::{AssetCache, SpriteId};
use ball_blast::game::game_loop::{GameLoop, GameLoopConfig};
use ball_blast::game::mask::overlaps;
use ball_blast::game::progression::CannonStats;
use ball_blast::game::state::{Ball, Bounds, Bullet, GameState, MoveIntent};
use ball_blast::game::systems::collision::{resolve_bullets, Resolution};
use ball_blast::game::systems::physics;
use ball_blast::net::protocol::BallSnapshot;
use ball_blast::util::vec2::Vec2;

fn random_balls(assets: &AssetCache, count: usize, rng: &mut StdRng) -> Vec<Ball> {
    (0..count)
        .map(|_| {
            let radius = rng.gen_range(10..=70);
            Ball::normal(
                assets,
                SpriteId::Ball(rng.gen_range(0..15)),
                Vec2::new(rng.gen_range(50.0..1150.0), rng.gen_range(50.0..700.0)),
                Vec2::new(rng.gen_range(-4.0..4.0), rng.gen_range(-3.0..3.0)),
                radius,
                // High hp keeps the set stable across iterations
                1_000_000,
                3,
            )
        })
        .collect()
}

fn random_bullets(assets: &AssetCache, count: usize, rng: &mut StdRng) -> Vec<Bullet> {
    (0..count)
        .map(|_| {
            let pos = Vec2::new(rng.gen_range(0.0..1200.0), rng.gen_range(0.0..800.0));
            Bullet::new(assets, pos, false, 1.0)
        })
        .collect()
}

/// Benchmark the pixel-mask kernel for hit and miss cases
fn bench_overlaps(c: &mut Criterion) {
    let assets = AssetCache::new();
    let bullet = assets.bullet_mask(false);
    let mut group = c.benchmark_group("overlaps");

    for radius in [10u32, 40, 70] {
        let ball = assets.ball_mask(SpriteId::Ball(0), radius);
        let centre = Vec2::new(500.0, 500.0);
        group.bench_with_input(BenchmarkId::new("hit", radius), &radius, |b, _| {
            b.iter(|| black_box(overlaps(&ball, centre, &bullet, black_box(centre))))
        });
        // Bounding boxes touch, pixels do not (disc corner)
        let corner = centre + Vec2::new(radius as f32 + 3.0, radius as f32 + 13.0);
        group.bench_with_input(BenchmarkId::new("corner_miss", radius), &radius, |b, _| {
            b.iter(|| black_box(overlaps(&ball, centre, &bullet, black_box(corner))))
        });
    }
    group.finish();
}

/// Benchmark parallel ball integration
fn bench_physics(c: &mut Criterion) {
    let assets = AssetCache::new();
    let mut group = c.benchmark_group("physics");
    group.sample_size(50);

    for count in [10, 100, 1000] {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = GameState::new(&assets, Bounds::default(), 600.0);
        state.balls = random_balls(&assets, count, &mut rng);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("balls", count), &count, |b, _| {
            b.iter(|| physics::update(black_box(&mut state), true))
        });
    }
    group.finish();
}

/// Benchmark bullet-vs-ball resolution
fn bench_resolve(c: &mut Criterion) {
    let assets = AssetCache::new();
    let stats = CannonStats::default();
    let mut group = c.benchmark_group("resolve_bullets");
    group.sample_size(50);

    for count in [10, 50, 200] {
        let mut rng = StdRng::seed_from_u64(2);
        let balls = random_balls(&assets, count, &mut rng);
        let bullets = random_bullets(&assets, count * 2, &mut rng);

        group.throughput(Throughput::Elements((count * count * 2) as u64));
        group.bench_with_input(BenchmarkId::new("pairs", count), &count, |b, _| {
            b.iter(|| {
                let mut balls = balls.clone();
                let mut bullets = bullets.clone();
                black_box(resolve_bullets(
                    &mut balls,
                    &mut bullets,
                    &stats,
                    &assets,
                    &mut rng,
                    Resolution::Authoritative,
                ))
            })
        });
    }
    group.finish();
}

/// Benchmark a complete tick with a populated field
fn bench_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_tick");
    group.sample_size(30);

    for count in [10, 50, 200] {
        let assets = AssetCache::shared();
        let mut game = GameLoop::new(
            GameLoopConfig {
                seed: Some(3),
                ..GameLoopConfig::default()
            },
            assets.clone(),
        );
        let mut rng = StdRng::seed_from_u64(3);
        // Keep balls clear of the cannon so the match does not end mid-bench
        game.state_mut().balls = random_balls(&assets, count, &mut rng)
            .into_iter()
            .map(|mut ball| {
                ball.position.y = ball.position.y.min(300.0);
                ball.gravity = 0.0;
                ball.velocity.y = 0.0;
                ball
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("complete", count), &count, |b, _| {
            b.iter(|| black_box(game.tick(MoveIntent::IDLE).len()))
        });
    }
    group.finish();
}

/// Benchmark host capture and client rebuild of the ball list
fn bench_snapshot(c: &mut Criterion) {
    let assets = AssetCache::new();
    let mut group = c.benchmark_group("snapshot");

    for count in [10, 100] {
        let mut rng = StdRng::seed_from_u64(4);
        let balls = random_balls(&assets, count, &mut rng);
        let snapshots: Vec<BallSnapshot> = balls.iter().map(BallSnapshot::capture).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("capture", count), &count, |b, _| {
            b.iter(|| black_box(balls.iter().map(BallSnapshot::capture).collect::<Vec<_>>()))
        });
        group.bench_with_input(BenchmarkId::new("rebuild", count), &count, |b, _| {
            b.iter(|| {
                black_box(
                    snapshots
                        .iter()
                        .filter_map(|s| s.to_ball(&assets))
                        .collect::<Vec<_>>(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_overlaps,
    bench_physics,
    bench_resolve,
    bench_full_tick,
    bench_snapshot,
);

criterion_main!(benches);
