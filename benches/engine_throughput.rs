//! Throughput benchmarks for the parsing engine and ingestion
//!
//! - Line scanning over a large synthetic capture
//! - Async line reading of the same capture
//! - Parse + ingest into the in-memory store
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use netsnap_core::{
    codec::{ParsingEngine, PARSERS},
    ingest::{IngestionContext, IngestionOrchestrator},
    store::{MemoryStore, NetworkStore},
};

/// One device's worth of tables, with `rows` entries per table.
fn synthetic_capture(rows: usize) -> String {
    let mut out = String::from("<BENCH-01>display interface brief\n");
    out.push_str("Interface                   PHY   Protocol  InUti OutUti   inErrors  outErrors\n");
    for i in 0..rows {
        out.push_str(&format!(
            "GigabitEthernet0/0/{i:<8}  up    up        0.01%  0.01%          0          0\n"
        ));
    }
    out.push_str("\n<BENCH-01>display arp all\n");
    out.push_str("IP ADDRESS      MAC ADDRESS     EXPIRE(M) TYPE        INTERFACE   VPN-INSTANCE\n");
    for i in 0..rows {
        out.push_str(&format!(
            "10.{}.{}.1      00e0-fc12-{:04x}  20        D-0         GE0/0/{i}\n",
            i / 256,
            i % 256,
            i % 0xffff
        ));
    }
    out.push_str(&format!("Total:{rows}         Dynamic:{rows}       Static:0\n"));
    out.push_str("\n<BENCH-01>display alarm active\n");
    out.push_str("Sequence   AlarmId    Severity Date Time  Description\n");
    for i in 0..rows {
        out.push_str(&format!(
            "{i:<10} 0x8520003  Major    2024-01-02 10:11:12 The interface status changes.\n\
             \x20                               (ifName=GigabitEthernet0/0/{i}, AdminStatus=UP)\n"
        ));
    }
    out.push_str("\n<BENCH-01>\n");
    out
}

fn bench_parse_str(c: &mut Criterion) {
    let capture = synthetic_capture(2_000);
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(capture.lines().count() as u64));
    group.bench_function("parse_str", |b| {
        b.iter(|| ParsingEngine::new(&PARSERS, 50).parse_str(&capture).blocks.len());
    });
    group.finish();
}

fn bench_parse_reader(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let capture = synthetic_capture(2_000);
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(capture.lines().count() as u64));
    group.bench_function("parse_reader", |b| {
        b.to_async(&rt).iter(|| async {
            ParsingEngine::new(&PARSERS, 50)
                .parse_reader(capture.as_bytes())
                .await
                .unwrap()
                .blocks
                .len()
        });
    });
    group.finish();
}

fn bench_parse_and_ingest(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let capture = synthetic_capture(500);

    c.bench_function("parse_and_ingest", |b| {
        b.to_async(&rt).iter(|| async {
            let store = MemoryStore::new();
            let snapshot = store.create_snapshot(None).await.unwrap();
            let device = store.upsert_device("BENCH-01").await.unwrap();
            let mut ctx = IngestionContext::new(snapshot, device);
            let run = ParsingEngine::new(&PARSERS, 50).parse_str(&capture);
            IngestionOrchestrator::builtin()
                .ingest(&run.blocks, &mut ctx, &store)
                .await
                .unwrap();
            store.fact_count()
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .measurement_time(std::time::Duration::from_secs(10));
    targets =
        bench_parse_str,
        bench_parse_reader,
        bench_parse_and_ingest
}

criterion_main!(benches);
