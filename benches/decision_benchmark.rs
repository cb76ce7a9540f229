use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guardian::cidr::CidrSet;
use guardian::chain::{BlacklistPredicate, Chain, LimitPredicate, WhitelistPredicate};
use guardian::config::{ConfStore, Defaults, Duration as GuardianDuration, Limit};
use guardian::limit_provider::{canonical_route_key, GlobalLimitProvider};
use guardian::request::Request;
use guardian::store::{LocalStore, Store};
use std::sync::Arc;

fn cidr_matching_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cidr_matching");

    let mut set = CidrSet::new();
    for i in 0..64u8 {
        set.insert(format!("10.{}.0.0/16", i));
    }

    group.bench_function("contains_hit", |b| {
        b.iter(|| black_box(set.contains("10.32.1.1".parse().unwrap())))
    });

    group.bench_function("contains_miss", |b| {
        b.iter(|| black_box(set.contains("8.8.8.8".parse().unwrap())))
    });

    group.finish();
}

fn route_key_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_key");

    group.bench_function("canonical_route_key_no_query", |b| {
        b.iter(|| black_box(canonical_route_key("/api/v1/widgets/123")))
    });

    group.bench_function("canonical_route_key_with_query", |b| {
        b.iter(|| black_box(canonical_route_key("/api/v1/widgets?b=2&a=1&c=3")))
    });

    group.finish();
}

fn rate_limiter_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = LocalStore::new();
    let limit = Limit::new(1_000_000, GuardianDuration::from_secs(60));

    let mut group = c.benchmark_group("rate_limiter");

    group.bench_function("limiter_check_same_client", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                guardian::limiter::Limiter::check(&store, "bench", "192.168.1.1", limit).await,
            )
        })
    });

    group.bench_function("limiter_check_distinct_clients", |b| {
        let mut n = 0u32;
        b.to_async(&rt).iter(|| {
            n = n.wrapping_add(1);
            let ip = format!("10.0.{}.{}", (n >> 8) as u8, n as u8);
            let store = &store;
            async move {
                black_box(guardian::limiter::Limiter::check(store, "bench", &ip, limit).await)
            }
        })
    });

    group.finish();
}

fn decision_chain_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let defaults = Defaults {
        whitelist: vec!["172.16.0.0/12".to_string()],
        blacklist: vec!["203.0.113.0/24".to_string()],
        global_limit: Limit::new(10_000, GuardianDuration::from_secs(60)),
        ..Default::default()
    };
    let conf_store = ConfStore::from_defaults(&defaults);
    let snapshot = conf_store.snapshot();
    let store: Arc<dyn Store> = Arc::new(LocalStore::new());

    let chain = Chain::new(vec![
        Box::new(WhitelistPredicate),
        Box::new(BlacklistPredicate),
        Box::new(LimitPredicate::new(
            store.clone(),
            Box::new(GlobalLimitProvider),
            "global",
        )),
    ]);

    let ordinary = Request::new("8.8.8.8", "example.com", "/", "GET");
    let whitelisted = Request::new("172.16.0.1", "example.com", "/", "GET");
    let blacklisted = Request::new("203.0.113.5", "example.com", "/", "GET");

    let mut group = c.benchmark_group("decision_chain");

    group.bench_function("allow_via_global_limit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(chain.evaluate(&ordinary, &snapshot).await) })
    });

    group.bench_function("allow_via_whitelist_shortcircuit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(chain.evaluate(&whitelisted, &snapshot).await) })
    });

    group.bench_function("deny_via_blacklist_shortcircuit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(chain.evaluate(&blacklisted, &snapshot).await) })
    });

    group.finish();
}

criterion_group!(
    benches,
    cidr_matching_benchmark,
    route_key_benchmark,
    rate_limiter_benchmark,
    decision_chain_benchmark,
);

criterion_main!(benches);
