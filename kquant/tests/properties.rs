use image::{Rgb, RgbImage};
use kquant::{
	assign, fit, sample_indices, squared_distance, Codebook, Color, ColorGrid, KmeansOptions, QuantizeError,
	QuantizeOptions, Stage, Strategy,
};
use std::collections::HashSet;

fn rgb(r: u8, g: u8, b: u8) -> Color {
	Color::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0)
}

/// A small image with a few large blocks of color and some noise
fn test_image() -> RgbImage {
	RgbImage::from_fn(48, 32, |x, y| {
		let base = match (x / 16, y / 16) {
			(0, 0) => [200, 30, 40],
			(1, 0) => [20, 160, 60],
			(2, 0) => [30, 40, 210],
			(0, 1) => [240, 230, 90],
			(1, 1) => [15, 15, 20],
			_ => [250, 250, 250],
		};
		#[allow(clippy::cast_possible_truncation)]
		let noise = ((x * 7 + y * 13) % 5) as u8;
		Rgb(base.map(|c: u8| c.saturating_add(noise)))
	})
}

fn test_grid() -> ColorGrid {
	ColorGrid::from_rgb_image(&test_image()).unwrap()
}

#[test]
fn fit_is_deterministic() {
	let grid = test_grid();
	let sample = kquant::sample(grid.pixels(), 500, 3).unwrap();
	let options = KmeansOptions::new().trials(2);

	let first = fit(&sample, 6, 11, &options).unwrap();
	for _ in 0..4 {
		assert_eq!(fit(&sample, 6, 11, &options).unwrap(), first);
	}
}

#[test]
fn quantize_is_deterministic() {
	let grid = test_grid();
	let options = QuantizeOptions::new().k(5).sample_size(300);

	for strategy in Strategy::ALL {
		let a = kquant::quantize(&grid, strategy, &options).unwrap();
		let b = kquant::quantize(&grid, strategy, &options).unwrap();
		assert_eq!(a, b);
	}
}

#[test]
fn assignment_is_total() {
	let grid = test_grid();
	for k in [1, 2, 7, 64, 255] {
		let colors = kquant::sample(grid.pixels(), k, u64::try_from(k).unwrap()).unwrap();
		let codebook = Codebook::new(colors).unwrap();
		let labels = assign(&codebook, grid.pixels());

		assert_eq!(labels.len(), grid.len());
		assert!(labels.iter().all(|&label| usize::from(label) < k));
	}
}

#[test]
fn assignment_picks_the_nearest_codeword() {
	let codebook = Codebook::new(vec![
		rgb(0, 0, 0),
		rgb(255, 0, 0),
		rgb(0, 255, 0),
		rgb(0, 0, 255),
		rgb(128, 128, 128),
		rgb(255, 255, 255),
	])
	.unwrap();

	let pixels = (0..=255u8)
		.step_by(15)
		.flat_map(|r| (0..=255u8).step_by(51).flat_map(move |g| (0..=255u8).step_by(85).map(move |b| rgb(r, g, b))))
		.collect::<Vec<_>>();

	let labels = assign(&codebook, &pixels);

	for (&label, &pixel) in labels.iter().zip(&pixels) {
		let chosen = squared_distance(pixel, codebook.colors()[usize::from(label)]);
		for (i, &other) in codebook.colors().iter().enumerate() {
			let dist = squared_distance(pixel, other);
			assert!(chosen <= dist);
			if dist <= chosen {
				// Ties go to the lowest index
				assert!(usize::from(label) <= i);
			}
		}
	}
}

/// The lowest index codeword at minimal distance, by exhaustive search
fn brute_force_label(codebook: &Codebook, pixel: Color) -> u8 {
	let colors = codebook.colors();
	let mut best = 0;
	for i in 1..colors.len() {
		if squared_distance(pixel, colors[i]) < squared_distance(pixel, colors[best]) {
			best = i;
		}
	}
	u8::try_from(best).unwrap()
}

#[test]
fn assignment_at_midpoints_ignores_neighbors() {
	let offsets = [(16, -8, 0), (1, 1, 0), (3, -5, 2), (7, 2, -4), (12, 12, 12), (-9, 4, 1)];

	for r in (20..=236).step_by(16) {
		for g in (20..=236).step_by(16) {
			for (dr, dg, db) in offsets {
				let channel = |c: i32| u8::try_from(c).unwrap();
				let near = rgb(channel(r + dr), channel(g + dg), channel(240 + db));
				let far = rgb(channel(r - dr), channel(g - dg), channel(240 - db));
				let codebook = Codebook::new(vec![near, far, rgb(255, 0, 0), rgb(0, 0, 0)]).unwrap();

				// Halfway between the first two codewords, before rounding
				let pixel = rgb(channel(r), channel(g), 240);
				let expected = brute_force_label(&codebook, pixel);

				assert_eq!(assign(&codebook, &[pixel]), vec![expected]);
				for &previous in codebook.colors() {
					assert_eq!(assign(&codebook, &[previous, pixel])[1], expected);
				}
			}
		}
	}
}

#[test]
fn reconstruction_is_idempotent() {
	let grid = test_grid();

	for strategy in Strategy::ALL {
		let quantized = kquant::quantize(&grid, strategy, &QuantizeOptions::new().k(7).sample_size(400)).unwrap();
		let relabeled = assign(&quantized.codebook, quantized.grid.pixels());
		assert_eq!(relabeled, quantized.labels);

		let again = quantized.codebook.reconstruct(&relabeled, grid.width(), grid.height()).unwrap();
		assert_eq!(again, quantized.grid);
	}
}

#[test]
fn sampling_never_repeats_an_index() {
	for seed in 0..16 {
		let indices = sample_indices(1536, 1000, seed).unwrap();
		assert_eq!(indices.iter().collect::<HashSet<_>>().len(), 1000);
	}

	assert_eq!(
		sample_indices(10, 11, 0),
		Err(QuantizeError::InsufficientData { requested: 11, available: 10 })
	);
}

#[test]
fn two_by_two_scenario() {
	// Two dark reds and two light blues
	let pixels = vec![rgb(10, 0, 0), rgb(30, 0, 0), rgb(200, 220, 250), rgb(180, 220, 250)];
	let grid = ColorGrid::new(2, 2, pixels.clone()).unwrap();

	for seed in 0..8 {
		let result = fit(&pixels, 2, seed, &KmeansOptions::new()).unwrap();
		let labels = assign(&result.codebook, grid.pixels());

		// Normalize for the order of the codebook
		let (dark, light) = if labels[0] == 0 { (0, 1) } else { (1, 0) };
		assert_eq!(labels, vec![dark, dark, light, light]);

		let colors = result.codebook.colors();
		let expected_dark = rgb(20, 0, 0);
		let expected_light = rgb(190, 220, 250);
		assert!(squared_distance(colors[usize::from(dark)], expected_dark) <= 1e-10);
		assert!(squared_distance(colors[usize::from(light)], expected_light) <= 1e-10);
	}
}

#[test]
fn k_equal_to_distinct_colors_reproduces_the_image() {
	let palette = [[12, 34, 56], [200, 10, 10], [0, 255, 128], [255, 255, 255], [90, 90, 90]];
	let image = RgbImage::from_fn(10, 6, |x, y| Rgb(palette[((x / 2 + y) % 5) as usize]));
	let grid = ColorGrid::from_rgb_image(&image).unwrap();

	let options = QuantizeOptions::new().k(5).sample_size(grid.len());
	let quantized = kquant::quantize(&grid, Strategy::Kmeans, &options).unwrap();

	assert_eq!(quantized.grid, grid);
	assert_eq!(quantized.grid.to_rgb_image(), image);
}

#[test]
fn oversized_sample_fails_before_clustering() {
	let grid = test_grid();
	let options = QuantizeOptions::new().k(4).sample_size(grid.len() + 1);

	let error = kquant::quantize(&grid, Strategy::Kmeans, &options).unwrap_err();
	assert_eq!(error.strategy, Strategy::Kmeans);
	assert_eq!(error.stage, Stage::Sampling);
	assert_eq!(
		error.source,
		QuantizeError::InsufficientData { requested: grid.len() + 1, available: grid.len() }
	);

	// The random strategy does not use the sample size
	assert!(kquant::quantize(&grid, Strategy::Random, &options).is_ok());
}

#[test]
fn kmeans_finds_the_color_blocks() {
	let grid = test_grid();
	let options = QuantizeOptions::new().k(6).sample_size(1000).kmeans(KmeansOptions::new().trials(4));
	let quantized = kquant::quantize(&grid, Strategy::Kmeans, &options).unwrap();

	// Each block has only a little noise, so every pixel should be close to its codeword
	let max_error = grid
		.pixels()
		.iter()
		.zip(quantized.grid.pixels())
		.map(|(&x, &y)| squared_distance(x, y))
		.fold(0.0, f32::max);

	assert!(max_error < 0.01, "max error {max_error}");
}
