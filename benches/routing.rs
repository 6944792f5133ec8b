//! Message routing benchmark suite.
//!
//! Benchmarks the hot paths of the background:
//! - Routing a message to the global context
//! - Routing a message to a tab context, at different tab counts
//! - Creating and tearing down a tab context
//!
//! Run with: cargo bench --bench routing
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

use tab_context_router::broadcast::NullMessageSink;
use tab_context_router::protocol::messages;
use tab_context_router::{Background, Message, SimulatedBrowserAdapter, TabId, TabInfo, WindowId};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const TAB_COUNTS: &[u32] = &[1, 50, 500];

// ============================================================================
// Setup
// ============================================================================

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn tab(id: u32) -> TabInfo {
    TabInfo::new(TabId::new(id), WindowId::new(1), format!("https://site-{id}.test/"))
}

async fn background_with_tabs(count: u32) -> Background {
    let browser = Arc::new(SimulatedBrowserAdapter::new());
    for id in 1..=count {
        browser.add_tab(tab(id));
    }

    let background = Background::with_parts(browser, Arc::new(NullMessageSink), None)
        .await
        .expect("background");
    background.initialize().await.expect("initialize");
    background
}

// ============================================================================
// Benchmark: Global Routing
// ============================================================================

fn bench_global_routing(c: &mut Criterion) {
    let rt = runtime();
    let background = rt.block_on(background_with_tabs(1));

    c.bench_function("route_global", |b| {
        b.to_async(&rt).iter(|| async {
            let message = Message::new(messages::feature_flags::SET)
                .with_payload(json!({"feature": "debugTools", "enabled": true}));
            background.distribute(message, None).await.expect("distribute")
        });
    });
}

// ============================================================================
// Benchmark: Tab Routing
// ============================================================================

fn bench_tab_routing(c: &mut Criterion) {
    let rt = runtime();

    let mut group = c.benchmark_group("route_tab");
    for &count in TAB_COUNTS {
        let background = rt.block_on(background_with_tabs(count));
        let target = TabId::new(count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &target, |b, &target| {
            b.to_async(&rt).iter(|| async {
                let message = Message::new(messages::tab::GET_CURRENT).with_tab(target);
                background.distribute(message, None).await.expect("distribute")
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark: Context Lifecycle
// ============================================================================

fn bench_context_lifecycle(c: &mut Criterion) {
    let rt = runtime();
    let background = rt.block_on(background_with_tabs(1));
    let controller = Arc::clone(background.target_page_controller());
    let tab_id = TabId::new(1);

    c.bench_function("context_create_remove", |b| {
        b.to_async(&rt).iter(|| async {
            controller.on_target_tab_removed(tab_id).await;
            controller.handle_tab_url_update(tab_id).await;
        });
    });
}

criterion_group!(
    benches,
    bench_global_routing,
    bench_tab_routing,
    bench_context_lifecycle
);
criterion_main!(benches);
