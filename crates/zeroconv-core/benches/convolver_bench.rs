//! Criterion benchmarks for zeroconv-core audio-context paths
//!
//! Run with: cargo bench -p zeroconv-core
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use zeroconv_core::{
    ConvolutionEngine, Convolver, DelayLine, IrChannelConfig, IrSettings, MemoryLoader,
    PartitionedEngine, Routing, SampleBuffer, SchedulingHints, TailLeg, TimeDomainConvolver,
};

const SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];
const IR_SECONDS: &[f32] = &[0.5, 2.0];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn generate_ir(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let noise = ((i * 7919) % 1000) as f32 / 500.0 - 1.0;
            noise * (-(i as f32) / len as f32 * 6.0).exp()
        })
        .collect()
}

fn stereo_convolver(ir_len: usize, block: usize) -> Convolver {
    let loader = MemoryLoader::new().with(
        "bench",
        vec![
            SampleBuffer::new(generate_ir(ir_len), SAMPLE_RATE),
            SampleBuffer::new(generate_ir(ir_len), SAMPLE_RATE),
        ],
    );
    let mut convolver = Convolver::new(
        "bench",
        SAMPLE_RATE,
        SchedulingHints::default(),
        IrChannelConfig::Stereo,
        IrSettings::default(),
        Arc::new(loader),
    );
    convolver.reconfigure(block, false).unwrap();
    convolver
}

fn bench_delay_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("DelayLine");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        group.bench_with_input(BenchmarkId::new("run", block_size), &block_size, |b, _| {
            let mut line = DelayLine::with_capacity(4096);
            line.reset(1500);
            let mut buf = input.clone();
            b.iter(|| {
                buf.copy_from_slice(&input);
                line.run(black_box(&mut buf));
            });
        });
    }

    group.finish();
}

fn bench_tdc(c: &mut Criterion) {
    let mut group = c.benchmark_group("TimeDomainConvolver");
    let ir = SampleBuffer::new(generate_ir(TimeDomainConvolver::MAX_TAPS), SAMPLE_RATE);

    for &block_size in BLOCK_SIZES {
        let mut input = vec![0.0; TimeDomainConvolver::HISTORY];
        input.extend(generate_test_signal(block_size));
        group.bench_with_input(BenchmarkId::new("run", block_size), &block_size, |b, &n| {
            let mut tdc = TimeDomainConvolver::new();
            tdc.configure(&ir, 1.0, 0);
            let mut out = vec![0.0; n];
            b.iter(|| {
                out.fill(0.0);
                tdc.run(black_box(&mut out), black_box(&input));
            });
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("PartitionedEngine");

    for &seconds in IR_SECONDS {
        let ir_len = (seconds * SAMPLE_RATE as f32) as usize;
        for &block_size in &[256usize, 1024] {
            let id = format!("{seconds}s/{block_size}");
            group.bench_function(BenchmarkId::new("process", id), |b| {
                let mut engine = PartitionedEngine::new();
                engine
                    .configure(
                        Routing::Mono,
                        &[TailLeg {
                            input: 0,
                            output: 0,
                            offset: 64,
                            samples: generate_ir(ir_len),
                        }],
                        block_size,
                    )
                    .unwrap();
                engine
                    .input_mut(0)
                    .copy_from_slice(&generate_test_signal(block_size));
                b.iter(|| {
                    engine.process();
                    black_box(engine.output(0)[0]);
                });
            });
        }
    }

    group.finish();
}

fn bench_convolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convolver");
    let ir_len = SAMPLE_RATE as usize;

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("run_stereo", block_size),
            &block_size,
            |b, &n| {
                let mut convolver = stereo_convolver(ir_len, n);
                let (mut left, mut right) = (input.clone(), input.clone());
                b.iter(|| {
                    left.copy_from_slice(&input);
                    right.copy_from_slice(&input);
                    convolver.run_stereo(black_box(&mut left), black_box(&mut right));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("run_buffered_stereo_odd", block_size),
            &block_size,
            |b, &n| {
                let mut convolver = stereo_convolver(ir_len, n);
                let odd = n * 3 / 2 + 1;
                let (mut left, mut right) = (vec![0.1; odd], vec![0.1; odd]);
                b.iter(|| {
                    left.fill(0.1);
                    right.fill(0.1);
                    convolver.run_buffered_stereo(black_box(&mut left), black_box(&mut right));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_delay_line,
    bench_tdc,
    bench_engine,
    bench_convolver
);
criterion_main!(benches);
