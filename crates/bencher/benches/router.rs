use bencher::{TestCase, TestGroup};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sprig::router::get;
use sprig::{endpoint_fn, handler_fn, Router};
use std::hint::black_box;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("small_literal", "/health"),
        TestCase::small("small_param", "/users/42"),
        TestCase::large("large_literal", "/api/v1/customers"),
        TestCase::large("large_nested_params", "/api/v1/orders/7/items/3"),
        TestCase::large("large_regex", "/files/a/b/c.png"),
        TestCase::large("large_not_found", "/nothing/here/at/all"),
    ]
}

fn build_router(group: TestGroup) -> Router {
    let mut builder = Router::builder();
    for path in group.routes() {
        builder = if path.ends_with('*') {
            builder.get(path, handler_fn(|ctx, next| Box::pin(async move { next.run(ctx).await })))
        } else {
            builder.get(path, endpoint_fn(|ctx| Box::pin(async move { ctx.text("ok") })))
        };
    }
    builder.build().expect("benchmark routes should be valid")
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should start");
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("router_dispatch");

    for case in test_cases {
        let router = build_router(case.group());
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let response = runtime.block_on(router.request(case.path()));
                black_box(response);
            });
        });
    }

    group.finish();
}

fn benchmark_build(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("router_build");
    for group_kind in [TestGroup::Small, TestGroup::Large] {
        group.bench_function(BenchmarkId::from_parameter(format!("{group_kind:?}")), |b| {
            b.iter(|| black_box(build_router(group_kind)));
        });
    }
    group.finish();
}

criterion_group!(router, benchmark_dispatch, benchmark_build);
criterion_main!(router);
