//! # Relay-Bus Dispatch Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | publish fan-out | Sync dispatch to N mixed-priority subscribers |
//! | namespace lookup | Publish with many registered namespaces |
//! | history | Publish into a full history ring |
//! | replay | Replay of a full history window |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relay_bus::{done, BusConfig, EventBus, Handler, ReplayFilter, SubscribeOptions};
use serde_json::json;
use std::time::Duration;

fn noop() -> Handler {
    Handler::sync(|data, _| {
        black_box(data);
        done()
    })
}

fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish-fanout");
    group.measurement_time(Duration::from_secs(5));

    for size in [1, 10, 100, 500] {
        let bus = EventBus::with_config(BusConfig::default().with_max_listeners(size + 1))
            .unwrap_or_default();
        for i in 0..size {
            let priority = (i % 7) as i32;
            bus.subscribe_with("bench:event", noop(), SubscribeOptions::new().priority(priority))
                .ok();
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sync_publish", size), &bus, |b, bus| {
            b.iter(|| black_box(bus.publish("bench:event", json!({"n": 1}))))
        });
    }

    group.finish();
}

fn bench_namespace_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("namespace-lookup");

    for namespaces in [10, 100, 1000] {
        let bus = EventBus::new();
        for i in 0..namespaces {
            bus.subscribe(&format!("ns{i}:*"), noop()).ok();
        }
        let topic = format!("ns{}:leaf", namespaces - 1);

        group.bench_with_input(BenchmarkId::new("publish", namespaces), &topic, |b, topic| {
            b.iter(|| black_box(bus.publish(topic, json!(null))))
        });
    }

    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");

    let bus = EventBus::new();
    for i in 0..bus.config().history_capacity {
        bus.publish("warmup", json!(i)).ok();
    }
    group.bench_function("publish_into_full_ring", |b| {
        b.iter(|| black_box(bus.publish("steady", json!("payload"))))
    });

    bus.subscribe("steady", noop()).ok();
    group.bench_function("replay_full_window", |b| {
        b.iter(|| black_box(bus.replay(&ReplayFilter::topic("steady"))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_fanout,
    bench_namespace_lookup,
    bench_history
);

criterion_main!(benches);
