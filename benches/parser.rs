//! Parser Throughput Benchmark for glreplay
//!
//! Measures how fast the general log reader turns bytes into entries for
//! single-line and multi-line workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glreplay::querylog::LogReader;
use tokio::runtime::Runtime;

/// Builds a log with `sessions` connections of `queries` statements each.
fn synthetic_log(sessions: usize, queries: usize, multiline: bool) -> Vec<u8> {
    let mut log = String::new();
    for id in 0..sessions {
        log.push_str(&format!(
            "150703 23:30:07\t{:>5} Connect\tsomeuser@localhost on blah_core\n",
            id
        ));
        for q in 0..queries {
            if multiline {
                log.push_str(&format!(
                    "\t\t{:>5} Query\tSELECT\n*\nFROM\nblah_core.users\nWHERE id = {}\n",
                    id, q
                ));
            } else {
                log.push_str(&format!(
                    "\t\t{:>5} Query\tSELECT * FROM blah_core.users WHERE id = {}\n",
                    id, q
                ));
            }
        }
        log.push_str(&format!("\t\t{:>5} Quit\t\n", id));
    }
    log.into_bytes()
}

fn count_entries(rt: &Runtime, log: &[u8]) -> u64 {
    rt.block_on(async {
        let mut reader = LogReader::new(log);
        let mut n = 0u64;
        while let Some(entry) = reader.next_entry().await.unwrap() {
            black_box(entry);
            n += 1;
        }
        n
    })
}

/// Benchmark parsing of single-line statements
fn bench_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let log = synthetic_log(1_000, 20, false);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(log.len() as u64));
    group.bench_function("single_line", |b| {
        b.iter(|| count_entries(&rt, &log));
    });
    group.finish();
}

/// Benchmark parsing of statements spread over several lines
fn bench_multi_line(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let log = synthetic_log(1_000, 20, true);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(log.len() as u64));
    group.bench_function("multi_line", |b| {
        b.iter(|| count_entries(&rt, &log));
    });
    group.finish();
}

criterion_group!(benches, bench_single_line, bench_multi_line);
criterion_main!(benches);
