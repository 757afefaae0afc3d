use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use isobridge_core::foreign::endpoints::TO_BYTE_ARRAY;
use isobridge_core::foreign::pending::PendingGuard;
use isobridge_core::loopback::LoopbackVm;
use isobridge_core::{
    merge_stack_trace, DefaultThrowableMarshaller, Direction, ForeignError, FrameGuard, RemoteError,
};
use isobridge_sdk::{Isolate, IsolateKind, StackFrame};

fn trace(depth: usize) -> Vec<StackFrame> {
    (0..depth)
        .map(|i| StackFrame::new("app.Worker", format!("step{}", i)).with_location("worker.rs", i as u32))
        .collect()
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for depth in [0, 16, 128] {
        let error = RemoteError::new("app.Failure", Some("request failed".to_string()), trace(depth));
        group.bench_with_input(BenchmarkId::new("for_error", depth), &error, |b, error| {
            b.iter(|| ForeignError::for_error(black_box(error), &DefaultThrowableMarshaller));
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let isolate = Isolate::new(1, IsolateKind::Native);
    let foreign = trace(32);

    c.bench_function("merge_without_pending", |b| {
        b.iter(|| merge_stack_trace(&isolate, black_box(&foreign)));
    });

    let _guard = PendingGuard::new();
    let _frame = FrameGuard::enter(StackFrame::new("app.Client", "run"));
    let _carrier = ForeignError::create(Some(vec![0; 16]), Direction::ForeignToLocal);
    c.bench_function("merge_with_pending", |b| {
        b.iter(|| merge_stack_trace(&isolate, black_box(&foreign)));
    });
}

fn bench_resolver(c: &mut Criterion) {
    let vm = LoopbackVm::new();
    let env = vm.attach();
    TO_BYTE_ARRAY.resolve(&env).unwrap();

    c.bench_function("resolve_cached", |b| {
        b.iter(|| TO_BYTE_ARRAY.resolve(black_box(&env)).unwrap());
    });
}

criterion_group!(benches, bench_export, bench_merge, bench_resolver);
criterion_main!(benches);
