//! Interning and resolution benchmarks
//!
//! Run with: `cargo bench --package vmrt --bench intern_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use vmrt::invoke::{MemberName, RefKind};
use vmrt::oops::JavaString;
use vmrt::{RuntimeConfig, RuntimeRegistry, Symbol};

fn create_runtime() -> RuntimeRegistry {
    let config = RuntimeConfig {
        verbose: false,
        ..Default::default()
    };
    RuntimeRegistry::new(config).unwrap()
}

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("bench/pkg/Class{}", i)).collect()
}

fn bench_symbol_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_lookup");
    let runtime = create_runtime();
    let symbols = runtime.symbols();

    for count in [100usize, 10_000] {
        let names = names(count);
        let held: Vec<Symbol> = names.iter().map(|n| symbols.lookup_str(n).unwrap()).collect();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("hit", count), &names, |b, names| {
            b.iter(|| {
                for n in names {
                    black_box(symbols.lookup_str(n).unwrap());
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("probe", count), &names, |b, names| {
            b.iter(|| {
                for n in names {
                    black_box(symbols.lookup_only(n.as_bytes()));
                }
            })
        });
        drop(held);
    }

    group.bench_function("miss_then_insert", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(symbols.lookup_str(&format!("fresh/Name{}", i)).unwrap())
        })
    });

    group.finish();
}

fn bench_string_intern(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_intern");
    let runtime = create_runtime();
    let strings = runtime.strings();
    let held: Vec<_> = (0..1000)
        .map(|i| strings.intern(&format!("literal {}", i)).unwrap())
        .collect();

    group.bench_function("utf16_hit", |b| {
        let chars: Vec<u16> = "literal 500".encode_utf16().collect();
        b.iter(|| black_box(strings.intern_utf16(&chars).unwrap()))
    });

    group.bench_function("string_object_hit", |b| {
        let candidate = Arc::new(JavaString::of("literal 42"));
        b.iter(|| black_box(strings.intern_string(&candidate).unwrap()))
    });

    group.bench_function("modified_utf8_hit", |b| {
        b.iter(|| black_box(strings.intern_utf8(b"literal 7").unwrap()))
    });

    drop(held);
    group.finish();
}

fn bench_member_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("member_resolution");
    let runtime = create_runtime();
    let object = runtime.object_klass().unwrap();
    let mh_klass = runtime.method_handle_klass().unwrap();
    let mh = runtime.method_handles();

    group.bench_function("virtual", |b| {
        b.iter(|| {
            let mname = MemberName::method(&object, "equals", "(Ljava/lang/Object;)Z", RefKind::InvokeVirtual);
            mh.resolve(&mname, None).unwrap();
            black_box(mname.vmindex())
        })
    });

    group.bench_function("special", |b| {
        b.iter(|| {
            let mname = MemberName::method(&object, "toString", "()Ljava/lang/String;", RefKind::InvokeSpecial);
            mh.resolve(&mname, None).unwrap();
            black_box(mname.vmindex())
        })
    });

    group.bench_function("signature_polymorphic", |b| {
        b.iter(|| {
            let mname = MemberName::method(&mh_klass, "invokeExact", "(JI)Ljava/lang/Object;", RefKind::InvokeVirtual);
            mh.resolve(&mname, None).unwrap();
            black_box(mname.vmindex())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_symbol_lookup,
    bench_string_intern,
    bench_member_resolution
);
criterion_main!(benches);
