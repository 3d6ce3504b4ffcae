//! Benchmarks for the per-frame path: driver tick, rendering into recording
//! surfaces and readout formatting.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rtviz::{CanvasSize, DriverState, Formatter, HeadlessHost, ParamSpec, ParameterStore, Sample, SampleShell};

fn host_for(sample: &Sample) -> HeadlessHost {
    let mut host = HeadlessHost::new();
    for scene in &sample.schema.layout.scenes {
        host.add_canvas(&scene.canvas_id, CanvasSize::new(600.0, 400.0, 2.0));
    }
    for plot in &sample.schema.layout.plots {
        host.add_canvas(&plot.canvas_id, CanvasSize::new(480.0, 280.0, 2.0));
    }
    match &sample.schema.layout.readout {
        Some(readout) => host.with_readout(&readout.container),
        None => host,
    }
}

fn bench_sample_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_frame");

    for id in rtviz::samples::IDS {
        let Some(sample) = rtviz::samples::by_id(id) else {
            continue;
        };
        let mut host = host_for(&sample);
        let Ok(mut shell) = SampleShell::mount(sample) else {
            continue;
        };

        group.bench_with_input(BenchmarkId::from_parameter(id), id, |b, _| {
            let mut now = 0.0;
            b.iter(|| {
                now += 1.0 / 60.0;
                if shell.frame(black_box(now), &mut host) == DriverState::Finished {
                    shell.reset();
                }
                host.clear_commands();
            })
        });
    }

    group.finish();
}

fn bench_parameter_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("parameter_edit");

    group.bench_function("linear_set", |b| {
        let mut store = ParameterStore::declare(vec![ParamSpec::linear("x", 0.0, 100.0, 0.5, 1.0)]).unwrap();
        let mut raw = 0.0;
        b.iter(|| {
            raw = (raw + 7.3) % 100.0;
            black_box(store.set("x", black_box(raw)).unwrap())
        })
    });

    group.bench_function("log_position", |b| {
        let mut store = ParameterStore::declare(vec![ParamSpec::log("c", 1e-6, 1e-3, 1e-4)]).unwrap();
        let mut s = 0.0;
        b.iter(|| {
            s = (s + 0.013) % 1.0;
            black_box(store.set_position("c", black_box(s)).unwrap())
        })
    });

    group.finish();
}

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("format");

    let engineering = Formatter::engineering("V");
    let fixed = Formatter::fixed(2, "V");
    let values = [0.0, 3.16e-9, 4.7e-3, 12.0, 7667.5, 2.9e6, f64::NAN];

    group.bench_function("engineering", |b| {
        b.iter(|| {
            for v in values {
                black_box(engineering.format(black_box(v)));
            }
        })
    });

    group.bench_function("fixed", |b| {
        b.iter(|| {
            for v in values {
                black_box(fixed.format(black_box(v)));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_sample_frames, bench_parameter_edits, bench_formatting);
criterion_main!(benches);
