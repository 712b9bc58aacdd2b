/// Benchmarks for the statistic engine.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rasterstat::crop::CroppedFrame;
use rasterstat::operation::Operation;
use rasterstat::operations::{self, AggregateOptions};
use std::path::PathBuf;
use time::{Date, Duration, Month};

/// Build `count` frames of `size` x `size` samples, with every seventh sample missing.
fn get_test_frames(count: usize, size: usize) -> Vec<CroppedFrame> {
    let start = Date::from_calendar_date(2020, Month::January, 1).unwrap();
    (0..count)
        .map(|i| {
            let data = Array2::from_shape_fn((size, size), |(row, col)| {
                let n = i * size * size + row * size + col;
                if n % 7 == 0 {
                    f64::NAN
                } else {
                    (n % 256) as f64
                }
            });
            let date = start + Duration::days(i as i64);
            CroppedFrame {
                path: PathBuf::from(format!("bench_{}.tif", i)),
                date,
                data,
            }
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    for (count, size) in [(10, 64), (30, 128), (365, 32)] {
        let frames = get_test_frames(count, size);
        for operation in Operation::ALL {
            for (label, spatial) in [("scalar+temporal", false), ("all", true)] {
                let name = format!("{}({}x{}x{}, {})", operation, count, size, size, label);
                let options = AggregateOptions {
                    spatial,
                    ..Default::default()
                };
                c.bench_function(&name, |b| {
                    b.iter(|| {
                        operations::aggregate(black_box(&frames), operation, &options).unwrap();
                    })
                });
            }
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
