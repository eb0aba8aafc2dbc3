//! # Core Interface Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Registry register + resolve | < 5µs per call |
//! | Full RPC round trip (in-memory broker) | < 100µs per call |

use core_interface::{CorrelationId, CorrelationRegistry, CoreInterfaceService, InterfaceConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_bus::{BrokerSession, InMemoryBroker, MessageProperties, QueueSpec, DEFAULT_EXCHANGE};
use shared_types::{CoreQueryRequest, QueryResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-registry");

    let registry = CorrelationRegistry::new();
    group.bench_function("register_resolve", |b| {
        b.iter(|| {
            let token = CorrelationId::new();
            let deadline = Instant::now() + Duration::from_secs(20);
            let mut reply = registry
                .register(token, "bench", "QueryResponse", deadline)
                .unwrap();
            registry.resolve(token, b"{}".to_vec());
            black_box(reply.try_recv().is_ok())
        })
    });

    for backlog in [100usize, 10_000] {
        let registry = CorrelationRegistry::new();
        let deadline = Instant::now() + Duration::from_secs(3600);
        let _waiting: Vec<_> = (0..backlog)
            .map(|_| {
                registry
                    .register(CorrelationId::new(), "bench", "QueryResponse", deadline)
                    .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("resolve_with_backlog", backlog),
            &backlog,
            |b, _| {
                b.iter(|| {
                    let token = CorrelationId::new();
                    let _reply = registry.register(token, "bench", "QueryResponse", deadline);
                    black_box(registry.resolve(token, Vec::new()))
                })
            },
        );
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (client, _service) = runtime.block_on(async {
        let broker = InMemoryBroker::new();
        let service = CoreInterfaceService::start(
            InterfaceConfig::default(),
            Arc::new(broker.clone()),
        )
        .await
        .unwrap();

        broker.declare_queue(&QueueSpec::named("search")).await.unwrap();
        broker
            .bind_queue("search", "symbIoTe.resource", "symbIoTe.resource.search")
            .await
            .unwrap();
        let mut requests = broker.consume("search", "bench-search").await.unwrap();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                let properties = MessageProperties {
                    correlation_id: request.properties.correlation_id.clone(),
                    ..MessageProperties::default()
                };
                let reply_to = request.properties.reply_to.clone().unwrap_or_default();
                let _ = broker
                    .publish(
                        DEFAULT_EXCHANGE,
                        &reply_to,
                        properties,
                        br#"{"status":200,"body":[]}"#.to_vec(),
                    )
                    .await;
            }
        });
        (service.client(), service)
    });

    let mut group = c.benchmark_group("rpc-round-trip");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("search_in_memory", |b| {
        b.to_async(&runtime).iter(|| async {
            let reply: QueryResponse = client.send(&CoreQueryRequest::default()).await.unwrap();
            black_box(reply)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_registry, bench_round_trip);
criterion_main!(benches);
