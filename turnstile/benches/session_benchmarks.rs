use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::{hint::black_box, time::Duration};
use turnstile::{
    security::IpRange,
    session::{MemorySessionStore, SessionConfig, SessionStore},
};
use uuid::Uuid;

/// Helper to create a registry holding N sessions
fn setup_store(n_sessions: usize) -> (MemorySessionStore, Vec<Uuid>) {
    let store = MemorySessionStore::new(SessionConfig {
        ttl: Some(Duration::from_secs(300)),
        ..Default::default()
    });
    let ids = (0..n_sessions)
        .map(|i| {
            store
                .login(&format!("user{i}"), &format!("10.0.{}.{}", i / 256, i % 256), None)
                .unwrap()
        })
        .collect();
    (store, ids)
}

/// Benchmark heartbeats, which only take the read lock
fn bench_update_now(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_now");
    for n in [10, 1_000, 10_000] {
        let (store, ids) = setup_store(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % ids.len();
                store.update_now(black_box(ids[i]), None).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark repeated login of an already online user
fn bench_login_existing(c: &mut Criterion) {
    let (store, _) = setup_store(1_000);
    c.bench_function("login_existing_1000", |b| {
        b.iter(|| store.login(black_box("user500"), black_box("10.0.1.244"), None).unwrap());
    });
}

/// Benchmark the conflict check, which sweeps first
fn bench_is_online_exists(c: &mut Criterion) {
    let (store, _) = setup_store(1_000);
    c.bench_function("is_online_exists_1000", |b| {
        b.iter(|| store.is_online_exists(black_box("user500"), black_box("192.168.1.1")).is_err());
    });
}

/// Benchmark whitelist matching against a short range list
fn bench_ip_range_contains(c: &mut Criterion) {
    let ranges: Vec<IpRange> = ["10.0.0.0/8", "172.16.0.0/12", "192.168.1.10-192.168.1.20"]
        .iter()
        .map(|r| r.parse().unwrap())
        .collect();
    let ip = "192.168.1.15".parse().unwrap();
    c.bench_function("ip_range_any_contains", |b| {
        b.iter(|| IpRange::any_contains(black_box(&ranges), black_box(ip)));
    });
}

criterion_group!(
    session_registry,
    bench_update_now,
    bench_login_existing,
    bench_is_online_exists,
);

criterion_group!(security, bench_ip_range_contains);

criterion_main!(session_registry, security);
