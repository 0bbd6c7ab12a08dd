use criterion::{
	black_box, criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, BenchmarkId, Criterion,
	SamplingMode,
};
use image::{Rgb, RgbImage};
use kquant::{Codebook, ColorGrid, KmeansOptions, QuantizeOptions, Strategy};
use std::time::Duration;

const SIZES: [(u32, u32); 3] = [(80, 60), (640, 480), (1920, 1080)];

/// A synthetic image with smooth gradients and a few hard edges
#[allow(clippy::cast_possible_truncation)]
fn synthetic_image(width: u32, height: u32) -> RgbImage {
	RgbImage::from_fn(width, height, |x, y| {
		let r = (x * 255 / width) as u8;
		let g = (y * 255 / height) as u8;
		let b = if (x / 64 + y / 64) % 2 == 0 { 200 } else { 40 };
		Rgb([r, g, b])
	})
}

fn grids() -> Vec<(String, ColorGrid)> {
	SIZES
		.into_iter()
		.map(|(width, height)| {
			let grid = ColorGrid::from_rgb_image(&synthetic_image(width, height)).expect("non-empty image");
			(format!("{width}x{height}"), grid)
		})
		.collect()
}

fn create_group<'a>(c: &'a mut Criterion, name: &'a str) -> BenchmarkGroup<'a, WallTime> {
	let mut group = c.benchmark_group(name);
	group
		.sample_size(30)
		.noise_threshold(0.05)
		.sampling_mode(SamplingMode::Flat)
		.warm_up_time(Duration::from_millis(500));
	group
}

fn sampling(c: &mut Criterion) {
	let mut group = create_group(c, "sampling");

	for (name, grid) in grids() {
		group.bench_with_input(BenchmarkId::from_parameter(&name), &grid, |b, grid| {
			b.iter(|| kquant::sample(grid.pixels(), black_box(1000), black_box(0)));
		});
	}
}

fn kmeans(c: &mut Criterion) {
	let mut group = create_group(c, "kmeans");

	let samples = grids()
		.into_iter()
		.map(|(name, grid)| (name, kquant::sample(grid.pixels(), 1000, 0).expect("enough pixels")))
		.collect::<Vec<_>>();

	fn bench(name: &str, group: &mut BenchmarkGroup<WallTime>, samples: &[(String, Vec<kquant::Color>)], k: u8, trials: u32) {
		for (path, sample) in samples {
			group.bench_with_input(BenchmarkId::new(name, path), sample, |b, sample| {
				b.iter(|| kquant::fit(sample, black_box(k), black_box(0), &KmeansOptions::new().trials(black_box(trials))));
			});
		}
	}

	group.measurement_time(Duration::from_secs(2));
	bench("default", &mut group, &samples, 10, 1);
	bench("low k", &mut group, &samples, 4, 1);

	group.measurement_time(Duration::from_secs(4));
	bench("high k", &mut group, &samples, 64, 1);
	bench("trials", &mut group, &samples, 10, 4);
}

fn assignment(c: &mut Criterion) {
	let mut group = create_group(c, "assign");
	group.measurement_time(Duration::from_secs(4));

	for (name, grid) in grids() {
		for k in [10, 64, 255] {
			let codebook = Codebook::new(kquant::sample(grid.pixels(), k, 0).expect("enough pixels")).expect("valid codebook");
			group.bench_with_input(BenchmarkId::new(format!("k={k}"), &name), &grid, |b, grid| {
				b.iter(|| kquant::assign(&codebook, grid.pixels()));
			});
		}
	}
}

fn all_steps(c: &mut Criterion) {
	let mut group = create_group(c, "all steps");
	group.measurement_time(Duration::from_secs(8));

	let options = QuantizeOptions::new();
	for (name, grid) in grids() {
		for strategy in Strategy::ALL {
			group.bench_with_input(BenchmarkId::new(strategy.name(), &name), &grid, |b, grid| {
				b.iter(|| kquant::quantize(grid, black_box(strategy), &options));
			});
		}
	}
}

criterion_group!(benches, sampling, kmeans, assignment, all_steps);
criterion_main!(benches);
