use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lapi_gate::decision::RawDecision;
use lapi_gate::gate::EnforcementGate;
use lapi_gate::resolver::TableResolver;
use lapi_gate::store::DecisionStore;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

// Hot path: one evaluation against a store the size of a typical community
// blocklist, with the geo scopes enabled.

fn populated_store() -> Arc<DecisionStore> {
    let store = Arc::new(DecisionStore::new());
    let mut batch = Vec::with_capacity(20_000);
    for i in 0..15_000u32 {
        let ip = Ipv4Addr::from(0x0A00_0000 + i * 7);
        batch.push(RawDecision::new(&format!("ip-{i}"), "ip", &ip.to_string(), "4h"));
    }
    for i in 0..5_000u32 {
        let net = Ipv4Addr::from(0x6400_0000 + (i << 8));
        batch.push(RawDecision::new(&format!("range-{i}"), "range", &format!("{net}/24"), "4h"));
    }
    batch.push(RawDecision::new("country", "country", "FR", "4h"));
    batch.push(RawDecision::new("as", "AS", "64500", "4h"));
    store.insert(batch);
    store
}

fn evaluate_benchmark(c: &mut Criterion) {
    let store = populated_store();
    let mut table = TableResolver::new();
    table.add_country("0.0.0.0/0".parse().unwrap(), "US");
    table.add_asn("0.0.0.0/0".parse().unwrap(), 12300);
    let gate = EnforcementGate::new(store).with_geo_scopes(Arc::new(table), true, true);

    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(1));

    let banned_ip = IpAddr::from(Ipv4Addr::from(0x0A00_0000 + 7 * 100));
    group.bench_function("ip_hit", |b| b.iter(|| gate.evaluate(banned_ip)));

    let banned_range = IpAddr::from(Ipv4Addr::new(100, 0, 10, 42));
    group.bench_function("range_hit", |b| b.iter(|| gate.evaluate(banned_range)));

    // Misses walk every scope, including both geo lookups.
    let clean = IpAddr::from(Ipv4Addr::new(203, 0, 113, 9));
    group.bench_function("miss", |b| b.iter(|| gate.evaluate(clean)));

    group.finish();
}

criterion_group!(benches, evaluate_benchmark);
criterion_main!(benches);
