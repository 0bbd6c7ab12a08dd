//! Runs the quantization steps for each codebook strategy

use crate::{
	assign, kmeans, sample, squared_distance, Codebook, ColorGrid, KmeansOptions, PipelineError, QuantizeError,
	MAX_CODEWORDS,
};
use std::fmt::{self, Display};

/// The way a codebook is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
	/// Run k-means on a random sample of the pixels
	Kmeans,
	/// Use randomly chosen pixels as the codebook
	Random,
}

impl Strategy {
	/// Every strategy, in the order they are run and displayed
	pub const ALL: [Self; 2] = [Self::Kmeans, Self::Random];

	/// A short lowercase name, suitable for file names
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Kmeans => "kmeans",
			Self::Random => "random",
		}
	}
}

impl Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Kmeans => write!(f, "k-means"),
			Self::Random => write!(f, "random"),
		}
	}
}

/// A step of a quantization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Drawing the pixel sample for k-means
	Sampling,
	/// Running k-means on the sample
	Clustering,
	/// Drawing random pixels for the codebook
	RandomCodebook,
	/// Building the output grid from the labels
	Reconstruction,
}

impl Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Sampling => write!(f, "sampling pixels"),
			Self::Clustering => write!(f, "clustering the sample"),
			Self::RandomCodebook => write!(f, "drawing the random codebook"),
			Self::Reconstruction => write!(f, "reconstructing the image"),
		}
	}
}

/// The seeds for each random draw
///
/// Each draw uses its own generator, so changing one seed never affects the other draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Seeds {
	/// Seed for the pixel sample given to k-means
	pub sample: u64,
	/// Seed for the k-means initialization
	pub kmeans: u64,
	/// Seed for the pixels of the random codebook
	pub codebook: u64,
}

impl Seeds {
	/// Use the same seed for every draw.
	#[must_use]
	pub const fn new(seed: u64) -> Self {
		Self { sample: seed, kmeans: seed, codebook: seed }
	}
}

/// The configuration for a quantization run
///
/// # Examples
///
/// ```
/// # use kquant::{KmeansOptions, QuantizeOptions, Seeds};
/// QuantizeOptions::new()
///     .k(16)
///     .sample_size(5000)
///     .seeds(Seeds { sample: 1, kmeans: 2, codebook: 3 })
///     .kmeans(KmeansOptions::new().trials(2));
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeOptions {
	/// The number of colors in the codebook
	k: u8,
	/// The number of pixels given to k-means
	sample_size: usize,
	/// The seeds for each random draw
	seeds: Seeds,
	/// Options for k-means
	kmeans: KmeansOptions,
}

impl QuantizeOptions {
	/// Create a new [`QuantizeOptions`] with default options:
	/// 10 colors, a sample of 1000 pixels, all seeds set to `0`, and the default [`KmeansOptions`].
	pub const fn new() -> Self {
		Self {
			k: 10,
			sample_size: 1000,
			seeds: Seeds::new(0),
			kmeans: KmeansOptions::new(),
		}
	}

	/// Set the number of colors in the codebook.
	pub const fn k(mut self, k: u8) -> Self {
		self.k = k;
		self
	}

	/// Set the number of pixels given to k-means.
	pub const fn sample_size(mut self, sample_size: usize) -> Self {
		self.sample_size = sample_size;
		self
	}

	/// Set the seeds for each random draw.
	pub const fn seeds(mut self, seeds: Seeds) -> Self {
		self.seeds = seeds;
		self
	}

	/// Set the options for k-means.
	pub const fn kmeans(mut self, kmeans: KmeansOptions) -> Self {
		self.kmeans = kmeans;
		self
	}

	/// Returns the number of colors in the codebook.
	#[must_use]
	pub const fn get_k(&self) -> u8 {
		self.k
	}

	/// Returns the number of pixels given to k-means.
	#[must_use]
	pub const fn get_sample_size(&self) -> usize {
		self.sample_size
	}

	/// Returns the seeds.
	#[must_use]
	pub const fn get_seeds(&self) -> Seeds {
		self.seeds
	}

	/// Returns the options for k-means.
	#[must_use]
	pub const fn get_kmeans(&self) -> KmeansOptions {
		self.kmeans
	}

	/// Check these options against an image with `num_pixels` pixels before doing any work.
	///
	/// # Errors
	/// Returns the error that the given strategy would eventually fail with, along with the failing stage.
	pub fn validate(&self, strategy: Strategy, num_pixels: usize) -> Result<(), PipelineError> {
		let fail = |stage, source| Err(PipelineError { strategy, stage, source });
		let k = usize::from(self.k);

		match strategy {
			Strategy::Kmeans => {
				if self.sample_size == 0 {
					fail(Stage::Sampling, QuantizeError::EmptySample)
				} else if self.sample_size > num_pixels {
					fail(
						Stage::Sampling,
						QuantizeError::InsufficientData { requested: self.sample_size, available: num_pixels },
					)
				} else if k == 0 || k > self.sample_size {
					fail(Stage::Clustering, QuantizeError::InvalidClusterCount { k, samples: self.sample_size })
				} else {
					Ok(())
				}
			},
			Strategy::Random => {
				if k == 0 {
					fail(Stage::RandomCodebook, QuantizeError::EmptyCodebook)
				} else if k > num_pixels {
					fail(
						Stage::RandomCodebook,
						QuantizeError::InsufficientData { requested: k, available: num_pixels },
					)
				} else if k > MAX_CODEWORDS {
					fail(Stage::RandomCodebook, QuantizeError::TooManyCodewords(k))
				} else {
					Ok(())
				}
			},
		}
	}
}

impl Default for QuantizeOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// The output of a quantization run
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
	/// The strategy used to build the codebook
	pub strategy: Strategy,
	/// The codebook
	pub codebook: Codebook,
	/// The label of each pixel, in the same order as the input pixels
	pub labels: Vec<u8>,
	/// The number of pixels assigned to each codeword
	pub counts: Vec<u32>,
	/// The quantized image
	pub grid: ColorGrid,
}

impl Quantized {
	/// Sum of the squared distances between each original pixel and its codeword.
	///
	/// `original` should be the grid this output was created from.
	#[must_use]
	pub fn inertia(&self, original: &ColorGrid) -> f64 {
		original
			.pixels()
			.iter()
			.zip(self.grid.pixels())
			.map(|(&x, &y)| f64::from(squared_distance(x, y)))
			.sum()
	}
}

/// Count the pixels assigned to each codeword
fn label_counts(labels: &[u8], k: usize) -> Vec<u32> {
	let mut counts = vec![0u32; k];
	for &label in labels {
		counts[usize::from(label)] += 1;
	}
	counts
}

/// Build the codebook for a strategy
fn build_codebook(grid: &ColorGrid, strategy: Strategy, options: &QuantizeOptions) -> Result<Codebook, PipelineError> {
	let fail = |stage| move |source| PipelineError { strategy, stage, source };

	match strategy {
		Strategy::Kmeans => {
			let sample = sample(grid.pixels(), options.sample_size, options.seeds.sample)
				.map_err(fail(Stage::Sampling))?;
			tracing::debug!(samples = sample.len(), "drew the k-means sample");

			let result = kmeans::fit(&sample, options.k, options.seeds.kmeans, &options.kmeans)
				.map_err(fail(Stage::Clustering))?;
			tracing::debug!(iterations = result.iterations, inertia = result.inertia, "k-means finished");

			Ok(result.codebook)
		},
		Strategy::Random => {
			let colors = sample(grid.pixels(), usize::from(options.k), options.seeds.codebook)
				.map_err(fail(Stage::RandomCodebook))?;
			tracing::debug!(colors = colors.len(), "drew the random codebook");

			Codebook::new(colors).map_err(fail(Stage::RandomCodebook))
		},
	}
}

/// Quantize a grid using the given strategy.
///
/// The run is deterministic: the same grid, strategy, and options always give the same output.
///
/// # Errors
/// Returns a [`PipelineError`] naming the failing step if the options are invalid for this grid.
/// The options are checked before any work is done.
pub fn quantize(grid: &ColorGrid, strategy: Strategy, options: &QuantizeOptions) -> Result<Quantized, PipelineError> {
	options.validate(strategy, grid.len())?;

	let codebook = build_codebook(grid, strategy, options)?;
	let labels = assign(&codebook, grid.pixels());
	let counts = label_counts(&labels, codebook.len());

	let output = codebook
		.reconstruct(&labels, grid.width(), grid.height())
		.map_err(|source| PipelineError { strategy, stage: Stage::Reconstruction, source })?;

	tracing::debug!(%strategy, colors = codebook.len(), "quantization finished");

	Ok(Quantized { strategy, codebook, labels, counts, grid: output })
}

/// Quantize a grid using every strategy in [`Strategy::ALL`].
///
/// The strategies are independent, so a failure in one does not affect the others.
#[cfg(not(feature = "threads"))]
#[must_use]
pub fn quantize_all(grid: &ColorGrid, options: &QuantizeOptions) -> Vec<(Strategy, Result<Quantized, PipelineError>)> {
	Strategy::ALL
		.into_iter()
		.map(|strategy| (strategy, quantize(grid, strategy, options)))
		.collect()
}

/// Quantize a grid using every strategy in [`Strategy::ALL`], running the strategies concurrently.
///
/// The strategies are independent, so a failure in one does not affect the others.
#[cfg(feature = "threads")]
#[must_use]
pub fn quantize_all(grid: &ColorGrid, options: &QuantizeOptions) -> Vec<(Strategy, Result<Quantized, PipelineError>)> {
	let (kmeans, random) = rayon::join(
		|| quantize(grid, Strategy::Kmeans, options),
		|| quantize(grid, Strategy::Random, options),
	);

	vec![(Strategy::Kmeans, kmeans), (Strategy::Random, random)]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::Color;

	#[allow(clippy::cast_precision_loss)]
	fn gradient(width: u32, height: u32) -> ColorGrid {
		let pixels = (0..height)
			.flat_map(|y| {
				(0..width).map(move |x| Color::new(x as f32 / width as f32, y as f32 / height as f32, 0.5))
			})
			.collect();

		ColorGrid::new(width, height, pixels).unwrap()
	}

	#[test]
	fn both_strategies_keep_the_shape() {
		let grid = gradient(32, 24);
		let options = QuantizeOptions::new().k(6).sample_size(200);

		for (strategy, result) in quantize_all(&grid, &options) {
			let quantized = result.unwrap();
			assert_eq!(quantized.strategy, strategy);
			assert_eq!(quantized.codebook.len(), 6);
			assert_eq!(quantized.labels.len(), grid.len());
			assert_eq!((quantized.grid.width(), quantized.grid.height()), (32, 24));
			assert_eq!(quantized.counts.iter().sum::<u32>(), 32 * 24);
			assert!(quantized.grid.pixels().iter().all(|c| quantized.codebook.colors().contains(c)));
		}
	}

	#[test]
	fn random_codebook_comes_from_the_image() {
		let grid = gradient(16, 16);
		let quantized = quantize(&grid, Strategy::Random, &QuantizeOptions::new().k(8)).unwrap();

		assert!(quantized.codebook.colors().iter().all(|c| grid.pixels().contains(c)));
	}

	#[test]
	fn seeds_only_affect_their_own_draw() {
		let grid = gradient(20, 20);
		let options = QuantizeOptions::new().k(5).sample_size(100);

		let base = quantize(&grid, Strategy::Random, &options).unwrap();
		let other_sample = quantize(
			&grid,
			Strategy::Random,
			&options.seeds(Seeds { sample: 99, kmeans: 98, codebook: 0 }),
		)
		.unwrap();

		assert_eq!(base, other_sample);
	}

	#[test]
	fn oversized_sample_fails_in_sampling() {
		let grid = gradient(4, 4);
		let error = quantize(&grid, Strategy::Kmeans, &QuantizeOptions::new().k(2).sample_size(17)).unwrap_err();

		assert_eq!(error.stage, Stage::Sampling);
		assert_eq!(error.source, QuantizeError::InsufficientData { requested: 17, available: 16 });
	}

	#[test]
	fn k_larger_than_sample_fails_in_clustering() {
		let grid = gradient(4, 4);
		let error = quantize(&grid, Strategy::Kmeans, &QuantizeOptions::new().k(9).sample_size(8)).unwrap_err();

		assert_eq!(error.stage, Stage::Clustering);
		assert_eq!(error.source, QuantizeError::InvalidClusterCount { k: 9, samples: 8 });
	}

	#[test]
	fn one_failing_strategy_does_not_block_the_other() {
		// Too many colors for k-means on the sample, but enough pixels for the random codebook
		let grid = gradient(8, 8);
		let options = QuantizeOptions::new().k(20).sample_size(10);

		let results = quantize_all(&grid, &options);
		let (_, kmeans) = &results[0];
		let (_, random) = &results[1];

		assert!(kmeans.is_err());
		assert_eq!(random.as_ref().unwrap().codebook.len(), 20);
	}

	#[test]
	fn zero_k_is_rejected_for_both() {
		let grid = gradient(4, 4);
		let options = QuantizeOptions::new().k(0).sample_size(4);

		for (_, result) in quantize_all(&grid, &options) {
			assert!(result.is_err());
		}
	}

	#[test]
	fn error_message_names_strategy_and_stage() {
		let grid = gradient(2, 2);
		let error = quantize(&grid, Strategy::Random, &QuantizeOptions::new().k(5)).unwrap_err();

		assert_eq!(
			error.to_string(),
			"random quantization failed while drawing the random codebook: cannot sample 5 pixels from only 4 available pixels"
		);
	}

	#[test]
	fn inertia_of_kmeans_is_lower_than_a_single_color() {
		let grid = gradient(16, 16);
		let four = quantize(&grid, Strategy::Kmeans, &QuantizeOptions::new().k(4).sample_size(256)).unwrap();
		let one = quantize(&grid, Strategy::Kmeans, &QuantizeOptions::new().k(1).sample_size(256)).unwrap();

		assert!(four.inertia(&grid) < one.inertia(&grid));
	}
}
