//! Direct versus staged execution of the trailing-update multiply.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hplgpu::{BackendConfig, Direct, GridInfo, HostContext, Staged, Trans};

fn bench_dgemm(c: &mut Criterion) {
    let ctx = HostContext::init(&BackendConfig::default()).unwrap();
    let grid = GridInfo::single();
    let mut group = c.benchmark_group("dgemm");

    for size in [64, 128, 256] {
        let bytes = size * size * 8;
        let (a, b, d) = (
            ctx.memory().allocate(bytes).unwrap(),
            ctx.memory().allocate(bytes).unwrap(),
            ctx.memory().allocate(bytes).unwrap(),
        );
        let generator = ctx.generator();
        generator.generate(&grid, size, size, 64, a.ptr(), size, 1).unwrap();
        generator.generate(&grid, size, size, 64, b.ptr(), size, 2).unwrap();

        let mut host_a = vec![0.0; size * size];
        let mut host_b = vec![0.0; size * size];
        ctx.memory().download(&mut host_a, a.ptr()).unwrap();
        ctx.memory().download(&mut host_b, b.ptr()).unwrap();
        let mut host_c = vec![0.0; size * size];

        group.bench_with_input(BenchmarkId::new("direct", size), &size, |bencher, &n| {
            let lib = ctx.kernels::<Direct>();
            bencher.iter(|| {
                lib.dgemm(
                    Trans::NoTrans,
                    Trans::NoTrans,
                    n,
                    n,
                    n,
                    black_box(1.0),
                    a.ptr(),
                    n,
                    b.ptr(),
                    n,
                    0.0,
                    d.ptr(),
                    n,
                )
                .unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("staged", size), &size, |bencher, &n| {
            let lib = ctx.kernels::<Staged>();
            bencher.iter(|| {
                lib.dgemm(
                    Trans::NoTrans,
                    Trans::NoTrans,
                    n,
                    n,
                    n,
                    black_box(1.0),
                    &host_a,
                    n,
                    &host_b,
                    n,
                    0.0,
                    &mut host_c,
                    n,
                )
                .unwrap()
            });
        });

        for buf in [a, b, d] {
            ctx.memory().deallocate(buf).unwrap();
        }
    }

    group.finish();
}

criterion_group!(benches, bench_dgemm);
criterion_main!(benches);
