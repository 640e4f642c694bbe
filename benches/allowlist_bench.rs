//! Benchmarks for allowlist admission checks.
//!
//! Measures how quickly we can decide whether a query name is admitted.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};

use hickory_proto::rr::Name;

use dnsfwd::filter::Allowlist;

fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

fn bench_admits(c: &mut Criterion) {
    let allowlist = Allowlist::parse("example.com,corp.internal,cdn.example.net,lab.test").unwrap();
    let pass_through = Allowlist::parse("").unwrap();

    let exact = name("example.com.");
    let subdomain = name("a.b.c.lab.test.");
    let unanchored = name("notexample.com.");
    let miss = name("www.google.com.");
    let anything = name("anything.example.org.");

    let mut group = c.benchmark_group("allowlist");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("admits", "exact_match"), |b| {
        b.iter(|| allowlist.admits(black_box(&exact)))
    });

    group.bench_function(BenchmarkId::new("admits", "subdomain_match"), |b| {
        b.iter(|| allowlist.admits(black_box(&subdomain)))
    });

    // Shares a raw suffix with an entry but not a label boundary
    group.bench_function(BenchmarkId::new("admits", "unanchored_miss"), |b| {
        b.iter(|| allowlist.admits(black_box(&unanchored)))
    });

    group.bench_function(BenchmarkId::new("admits", "miss"), |b| {
        b.iter(|| allowlist.admits(black_box(&miss)))
    });

    group.bench_function(BenchmarkId::new("admits", "pass_through"), |b| {
        b.iter(|| pass_through.admits(black_box(&anything)))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_admits(&mut criterion);
    criterion.final_summary();
}
