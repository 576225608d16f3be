//! Interception hot-path benchmarks.
//!
//! Benchmarks the per-event costs the hooks add on top of the raw
//! primitives: fingerprinting, unwrapping, registration tracking, and
//! message observation.
//!
//! Run with: cargo bench --bench interception
//! Results saved to: target/criterion/

use criterion::{Criterion, criterion_group, criterion_main};

use postmessage_monitor::{
    Fingerprint, Handler, Monitor, Payload, PropValue, WrapperRegistry,
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn sentry_wrap(original: &Handler) -> Handler {
    let wrapper = Handler::stub("function sentryWrapped(e) { /* report */ }");
    wrapper.set_flag("__sentry_wrapped__");
    wrapper.set_prop("__sentry_original__", PropValue::Func(original.clone()));
    wrapper
}

// ============================================================================
// Benchmark: Fingerprinting
// ============================================================================

fn bench_fingerprint(c: &mut Criterion) {
    let short = Handler::stub("function (e) { handle(e.data); }");
    let long_source = format!("function (e) {{ {} }}", "dispatch(e);".repeat(200));
    let long = Handler::stub(long_source);

    let mut group = c.benchmark_group("fingerprint");
    group.bench_function("short_source", |b| b.iter(|| Fingerprint::of(&short)));
    group.bench_function("long_source", |b| b.iter(|| Fingerprint::of(&long)));
    group.finish();
}

// ============================================================================
// Benchmark: Unwrapping
// ============================================================================

fn bench_unwrap(c: &mut Criterion) {
    let monitor = Monitor::builder().build();
    let page = monitor.page("https://bench.example").expect("page");
    page.environment().define("Sentry");

    let registry = WrapperRegistry::new();
    let original = Handler::stub("function onMessage(e) {}");
    let wrapped = sentry_wrap(&original);

    let mut group = c.benchmark_group("unwrap");
    group.bench_function("wrapped", |b| {
        b.iter(|| registry.unwrap_all(page.environment(), &wrapped));
    });
    group.bench_function("plain", |b| {
        b.iter(|| registry.unwrap_all(page.environment(), &original));
    });
    group.finish();
}

// ============================================================================
// Benchmark: Registration Cycle
// ============================================================================

fn bench_register_cycle(c: &mut Criterion) {
    let monitor = Monitor::builder().build();
    let page = monitor.page("https://bench.example").expect("page");

    c.bench_function("register_unregister", |b| {
        b.iter(|| {
            let handler = Handler::stub("function onMessage(e) { handle(e); }");
            page.add_message_listener(handler.clone());
            page.remove_listener(
                "message",
                &handler,
                postmessage_monitor::ListenerOptions::default(),
            );
        });
    });
}

// ============================================================================
// Benchmark: Message Observation
// ============================================================================

fn bench_transmit(c: &mut Criterion) {
    let monitor = Monitor::builder().build();
    let page = monitor.page("https://bench.example").expect("page");
    let frame = page.spawn_child("https://widget.example").expect("child");
    frame.add_message_listener(Handler::stub("function onMessage(e) {}"));

    let payload = json!({"action": "tick", "values": [1, 2, 3, 4, 5]});

    c.bench_function("transmit_cross_frame", |b| {
        b.iter(|| page.post_message_to(&frame, Payload::json(payload.clone()), "*"));
    });
}

// ============================================================================
// Harness
// ============================================================================

criterion_group!(
    benches,
    bench_fingerprint,
    bench_unwrap,
    bench_register_cycle,
    bench_transmit
);
criterion_main!(benches);
