#![allow(clippy::uninlined_format_args)]
//! 容器性能基准测试

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use object_commander::Container;
use std::sync::Arc;
use std::thread;

/// 测试用的简单服务
struct SimpleService {
    value: i32,
}

/// 依赖 SimpleService 的服务
struct DependentService {
    base: Arc<SimpleService>,
    factor: i32,
}

/// 基准测试：注册
fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    for count in [1, 10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let container = Container::new();
                for i in 0..count {
                    container
                        .register(format!("service-{}", i), move || SimpleService { value: i })
                        .unwrap();
                }
                black_box(container.len())
            });
        });
    }

    group.finish();
}

/// 基准测试：缓存性能
fn bench_cache_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_performance");

    group.bench_function("cache_miss", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register("simple", || SimpleService { value: 42 }).unwrap();

            let service = container.get::<SimpleService>("simple").unwrap();
            black_box(service.value)
        });
    });

    let container = Container::new();
    container.register("simple", || SimpleService { value: 42 }).unwrap();
    let _ = container.get::<SimpleService>("simple").unwrap();

    group.bench_function("cache_hit", |b| {
        b.iter(|| {
            let service = container.get::<SimpleService>("simple").unwrap();
            black_box(service.value)
        });
    });

    group.bench_function("get_by_type", |b| {
        b.iter(|| {
            let service = container.get_by_type::<SimpleService>().unwrap();
            black_box(service.value)
        });
    });

    group.finish();
}

/// 基准测试：依赖解析与 create
fn bench_dependency_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_resolution");

    let container = Container::new();
    container.register("simple", || SimpleService { value: 7 }).unwrap();
    container
        .register("dependent", |base: Arc<SimpleService>| DependentService { base, factor: 3 })
        .unwrap();

    group.bench_function("create_with_dependency", |b| {
        b.iter(|| {
            let service = container.create::<DependentService>("dependent").unwrap();
            black_box(service.base.value * service.factor)
        });
    });

    group.bench_function("invoke", |b| {
        b.iter(|| {
            let value = container
                .invoke(|d: Arc<DependentService>| d.base.value * d.factor, &[])
                .unwrap();
            black_box(value)
        });
    });

    group.finish();
}

/// 基准测试：并发解析性能
fn bench_concurrent_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_resolution");

    for threads in [2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            b.iter(|| {
                let container = Container::new();
                container.register("simple", || SimpleService { value: 42 }).unwrap();

                let sum: i32 = thread::scope(|scope| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            scope.spawn(|| {
                                (0..100)
                                    .map(|_| container.get::<SimpleService>("simple").unwrap().value)
                                    .sum::<i32>()
                            })
                        })
                        .collect();
                    handles.into_iter().map(|h| h.join().unwrap()).sum()
                });

                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_cache_performance,
    bench_dependency_resolution,
    bench_concurrent_resolution
);

criterion_main!(benches);
