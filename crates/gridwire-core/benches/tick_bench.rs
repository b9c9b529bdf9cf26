//! Criterion benchmarks for the power engine.
//!
//! Three benchmark groups:
//! - `long_chain`: one turbine feeding 500 poles in a line
//! - `fan_out`: 20 turbines each feeding 50 power boxes
//! - `dense_mesh`: a 12x12 pole mesh, walked under an expansion budget

use criterion::{Criterion, criterion_group, criterion_main};
use gridwire_core::config::{EngineConfig, FlowConfig};
use gridwire_core::engine::PowerEngine;
use gridwire_core::id::*;
use gridwire_core::test_utils::*;

// ===========================================================================
// Layouts
// ===========================================================================

fn build_fan_out() -> Scenario {
    let mut s = Scenario::new();
    for t in 0..20 {
        let turbine = s.place(DevicePos::new(t * 100, 0, 0), MockDevice::turbine(140.0));
        for b in 0..50 {
            let sink = s.place(
                DevicePos::new(t * 100 + b - 25, 0, 5),
                MockDevice::power_box(),
            );
            s.connect(turbine, sink);
        }
    }
    s
}

fn budgeted_engine(budget: u32) -> PowerEngine {
    let config = EngineConfig {
        flow: FlowConfig {
            expansion_budget: Some(budget),
            ..FlowConfig::default()
        },
        ..EngineConfig::default()
    };
    PowerEngine::with_config(config).unwrap()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_long_chain(c: &mut Criterion) {
    let mut s = Scenario::new();
    s.weather = FixedWeather::new(12.0, 0.4);
    chain(&mut s, 140.0, 500, 4);
    let mut engine = PowerEngine::new();

    c.bench_function("long_chain", |b| {
        b.iter(|| {
            s.recorder.clear();
            s.tick(&mut engine)
        });
    });
}

fn bench_fan_out(c: &mut Criterion) {
    let mut s = build_fan_out();
    s.weather = FixedWeather::new(19.0, 0.8);
    let mut engine = PowerEngine::new();

    c.bench_function("fan_out", |b| {
        b.iter(|| {
            s.recorder.clear();
            s.tick(&mut engine)
        });
    });
}

fn bench_dense_mesh(c: &mut Criterion) {
    let mut s = Scenario::new();
    mesh(&mut s, 140.0, 12, 8);
    let mut engine = budgeted_engine(20_000);

    c.bench_function("dense_mesh", |b| {
        b.iter(|| {
            s.recorder.clear();
            s.tick(&mut engine)
        });
    });
}

criterion_group!(benches, bench_long_chain, bench_fan_out, bench_dense_mesh);
criterion_main!(benches);
