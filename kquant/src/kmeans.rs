//! Provides the implementation for (sort) k-means

use crate::{assign::NeighborTable, squared_distance, Codebook, Color, ColorCounts, QuantizeError};
use palette::Srgb;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Options for running k-means
///
/// # Examples
///
/// ```
/// # use kquant::KmeansOptions;
/// KmeansOptions::new()
///     .trials(4)
///     .convergence_threshold(1e-5)
///     .max_iter(100);
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
	/// The number of trials to run
	trials: u32,
	/// Stop once the sum of squared centroid movements is at or below this value
	convergence_threshold: f32,
	/// The maximum number of iterations for each trial
	max_iter: u32,
}

impl KmeansOptions {
	/// Create a new [`KmeansOptions`] with default options:
	/// 1 trial, a convergence threshold of `1e-6`, and at most 300 iterations.
	pub const fn new() -> Self {
		Self { trials: 1, convergence_threshold: 1e-6, max_iter: 300 }
	}

	/// Set the number of trials to run, keeping the trial with the lowest inertia.
	///
	/// A value of `0` is treated as `1`.
	pub const fn trials(mut self, trials: u32) -> Self {
		self.trials = trials;
		self
	}

	/// Set the convergence threshold.
	pub const fn convergence_threshold(mut self, convergence_threshold: f32) -> Self {
		self.convergence_threshold = convergence_threshold;
		self
	}

	/// Set the maximum number of iterations for each trial.
	pub const fn max_iter(mut self, max_iter: u32) -> Self {
		self.max_iter = max_iter;
		self
	}

	/// Returns the number of trials.
	#[must_use]
	pub const fn get_trials(&self) -> u32 {
		self.trials
	}

	/// Returns the convergence threshold.
	#[must_use]
	pub const fn get_convergence_threshold(&self) -> f32 {
		self.convergence_threshold
	}

	/// Returns the maximum number of iterations.
	#[must_use]
	pub const fn get_max_iter(&self) -> u32 {
		self.max_iter
	}
}

impl Default for KmeansOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// Bookkeeping for each k-means data point
struct PointData {
	/// Center assignment for this data point
	assignment: Vec<u8>,
	/// Weight of each data point used to randomly select starting centroids in k-means++
	weight: Vec<f32>,
}

impl PointData {
	/// Create a [`PointData`] with the given number data points
	fn new(n: usize) -> Self {
		Self {
			assignment: vec![0; n],
			weight: vec![f32::INFINITY; n],
		}
	}

	/// Reset data for the next k-means trial
	fn reset(&mut self) {
		self.assignment.fill(0);
		self.weight.fill(f32::INFINITY);
	}
}

/// The zero vector used to start each center sum
const ZERO: Srgb<f64> = Srgb::new(0.0, 0.0, 0.0);

/// Add `n` copies of `color` to `sum`
fn add_weighted(sum: &mut Srgb<f64>, color: Color, n: u32) {
	let nf = f64::from(n);
	sum.red += nf * f64::from(color.red);
	sum.green += nf * f64::from(color.green);
	sum.blue += nf * f64::from(color.blue);
}

/// Data for each center/centroid
struct CenterData {
	/// The centroid point
	centroid: Vec<Color>,
	/// Vector sum for all data points in this center
	sum: Vec<Srgb<f64>>,
	/// Number of points in this center
	count: Vec<u32>,
}

impl CenterData {
	/// Create a [`CenterData`] with the given number of centers
	fn new(k: u8) -> Self {
		let k = usize::from(k);
		Self {
			centroid: Vec::with_capacity(k),
			sum: vec![ZERO; k],
			count: vec![0; k],
		}
	}

	/// Reset data for the next k-means trial
	fn reset(&mut self) {
		self.centroid.clear();
		self.sum.fill(ZERO);
		self.count.fill(0);
	}
}

/// Holds all the state used by k-means
struct KmeansState {
	/// Data for each center
	centers: CenterData,
	/// Data for each point
	points: PointData,
}

impl KmeansState {
	/// Initialize a new [`KmeansState`] with `k` centers and `n` data points
	fn new(k: u8, n: usize) -> Self {
		Self { centers: CenterData::new(k), points: PointData::new(n) }
	}
}

/// Result from running k-means
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansResult {
	/// Sum of the squared distances from each sample point to its centroid
	///
	/// A lower inertia indicates a higher accuracy.
	pub inertia: f64,
	/// The final centroids, always exactly `k` of them
	pub codebook: Codebook,
	/// Number of sample points in each centroid, which may be zero
	pub counts: Vec<u32>,
	/// Number of elapsed iterations
	pub iterations: u32,
}

/// Choose the starting centroids using the k-means++ algorithm
///
/// Each color is weighted by its count, so the result is the same as running k-means++ on the duplicated colors.
/// If fewer than `k` distinct colors exist, the remaining centroids repeat randomly chosen colors.
fn kmeans_plus_plus(k: u8, rng: &mut impl Rng, data: &ColorCounts, centroids: &mut Vec<Color>, weights: &mut [f32]) {
	use rand::distributions::{Distribution, WeightedError::*, WeightedIndex};

	let colors = &data.colors;

	// Pick the first centroid with a probability based off the count of each color
	let first = match WeightedIndex::new(&data.counts) {
		Ok(sampler) => sampler.sample(rng),
		Err(_) => rng.gen_range(0..colors.len()),
	};
	centroids.push(colors[first]);

	// Pick each next centroid with a weighted probability based off the squared distance to its closest centroid
	for i in 1..usize::from(k) {
		let centroid = centroids[i - 1];
		for (weight, &color) in weights.iter_mut().zip(colors) {
			*weight = f32::min(*weight, squared_distance(color, centroid));
		}

		#[allow(clippy::cast_precision_loss)]
		let weighted = weights.iter().zip(&data.counts).map(|(&w, &n)| w * n as f32);

		match WeightedIndex::new(weighted) {
			Ok(sampler) => centroids.push(colors[sampler.sample(rng)]),
			// All points exactly match a centroid
			Err(AllWeightsZero) => break,
			Err(InvalidWeight | NoItem | TooMany) => {
				unreachable!("distances are >= 0 and colors is not empty")
			},
		}
	}

	while centroids.len() < usize::from(k) {
		centroids.push(colors[rng.gen_range(0..colors.len())]);
	}
}

/// For each data point, update its assigned center and recompute the center sums and counts
#[cfg(not(feature = "threads"))]
fn update_assignments(data: &ColorCounts, centers: &mut CenterData, table: &NeighborTable, points: &mut PointData) {
	centers.sum.fill(ZERO);
	centers.count.fill(0);

	for ((color, n), center) in data.pairs().zip(&mut points.assignment) {
		let (nearest, _) = table.nearest(&centers.centroid, color, *center);
		*center = nearest;

		let i = usize::from(nearest);
		add_weighted(&mut centers.sum[i], color, n);
		centers.count[i] += n;
	}
}

/// For each data point, update its assigned center and recompute the center sums and counts
#[cfg(feature = "threads")]
fn update_assignments(data: &ColorCounts, centers: &mut CenterData, table: &NeighborTable, points: &mut PointData) {
	use rayon::prelude::*;

	let k = centers.centroid.len();
	let num_points = data.num_colors();
	let centroids = &centers.centroid;

	let partials = points
		.assignment
		.par_iter_mut()
		.with_min_len((num_points / rayon::current_num_threads()).max(1))
		.zip(&data.colors)
		.zip(&data.counts)
		.fold_with((vec![ZERO; k], vec![0; k]), |(mut sums, mut counts), ((center, &color), &n)| {
			let (nearest, _) = table.nearest(centroids, color, *center);
			*center = nearest;

			let i = usize::from(nearest);
			add_weighted(&mut sums[i], color, n);
			counts[i] += n;

			(sums, counts)
		})
		.collect::<Vec<(Vec<Srgb<f64>>, Vec<u32>)>>();

	centers.sum.fill(ZERO);
	centers.count.fill(0);

	for (partial_sums, partial_counts) in partials {
		for (sum, partial) in centers.sum.iter_mut().zip(&partial_sums) {
			sum.red += partial.red;
			sum.green += partial.green;
			sum.blue += partial.blue;
		}
		// The total count of all points is <= u32::MAX, so no sum of counts can overflow
		for (count, &partial) in centers.count.iter_mut().zip(&partial_counts) {
			*count += partial;
		}
	}
}

/// For each center, update its centroid using the vector sums and return the total squared movement
///
/// Centers with no points keep their previous centroid.
fn update_centroids(centers: &mut CenterData) -> f32 {
	let mut total_delta = 0.0;
	for ((centroid, &n), sum) in centers.centroid.iter_mut().zip(&centers.count).zip(&centers.sum) {
		if n == 0 {
			continue;
		}

		let n = f64::from(n);
		// Sums may need greater precision, but the average can fall back down to a reduced precision
		#[allow(clippy::cast_possible_truncation)]
		let new_centroid = Color::new((sum.red / n) as f32, (sum.green / n) as f32, (sum.blue / n) as f32);

		total_delta += squared_distance(*centroid, new_centroid);
		*centroid = new_centroid;
	}

	total_delta
}

/// Run a trial of sort k-means
fn kmeans(data: &ColorCounts, KmeansState { centers, points }: &mut KmeansState, k: u8, options: &KmeansOptions, seed: u64) -> KmeansResult {
	let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
	kmeans_plus_plus(k, &mut rng, data, &mut centers.centroid, &mut points.weight);

	let mut table = NeighborTable::new(&centers.centroid);

	let mut iterations = 0;
	let mut total_delta = f32::INFINITY;
	while iterations < options.max_iter && total_delta > options.convergence_threshold {
		table.update(&centers.centroid);
		update_assignments(data, centers, &table, points);
		total_delta = update_centroids(centers);
		iterations += 1;
		tracing::trace!(iterations, total_delta, "k-means iteration");
	}

	// Make the assignments and counts agree with the final centroids
	table.update(&centers.centroid);
	update_assignments(data, centers, &table, points);

	let inertia = data
		.pairs()
		.zip(&points.assignment)
		.map(|((color, n), &center)| f64::from(n) * f64::from(squared_distance(color, centers.centroid[usize::from(center)])))
		.sum();

	let result = Codebook::new(centers.centroid.clone()).map(|codebook| KmeansResult {
		inertia,
		codebook,
		counts: centers.count.clone(),
		iterations,
	});

	centers.reset();
	points.reset();

	// k is in 1..=u8::MAX and kmeans_plus_plus always gives exactly k centroids
	match result {
		Ok(result) => result,
		Err(e) => unreachable!("k-means produced an invalid codebook: {e}"),
	}
}

/// Run multiple trials of k-means, taking the trial with the lowest inertia
fn run_trials(data: &ColorCounts, k: u8, options: &KmeansOptions, seed: u64) -> KmeansResult {
	let mut state = KmeansState::new(k, data.num_colors());

	let mut best: Option<KmeansResult> = None;
	for i in 0..options.trials.max(1) {
		let trial_seed = seed ^ u64::from(i);
		let result = kmeans(data, &mut state, k, options, trial_seed);
		tracing::debug!(trial = i, seed = trial_seed, iterations = result.iterations, inertia = result.inertia, "k-means trial finished");

		if best.as_ref().map_or(true, |best| result.inertia < best.inertia) {
			best = Some(result);
		}
	}

	match best {
		Some(best) => best,
		None => unreachable!("at least one trial is run"),
	}
}

/// Run k-means on deduplicated colors, returning a codebook of exactly `k` colors.
///
/// # Errors
/// Returns [`QuantizeError::InvalidClusterCount`] if `k` is zero
/// or greater than the total number of colors (counting duplicates).
pub fn fit_counts(data: &ColorCounts, k: u8, seed: u64, options: &KmeansOptions) -> Result<KmeansResult, QuantizeError> {
	let samples = usize::try_from(data.total_count()).unwrap_or(usize::MAX);
	if k == 0 || usize::from(k) > samples {
		return Err(QuantizeError::InvalidClusterCount { k: usize::from(k), samples });
	}

	Ok(run_trials(data, k, options, seed))
}

/// Run k-means on the sample colors, returning a codebook of exactly `k` colors.
///
/// The same `sample`, `k`, `seed`, and `options` always give the same result.
///
/// # Errors
/// Returns [`QuantizeError::InvalidClusterCount`] if `k` is zero or greater than the number of sample colors.
///
/// # Panics
/// Panics if `sample` has more than `u32::MAX` colors.
pub fn fit(sample: &[Color], k: u8, seed: u64, options: &KmeansOptions) -> Result<KmeansResult, QuantizeError> {
	if k == 0 || usize::from(k) > sample.len() {
		return Err(QuantizeError::InvalidClusterCount { k: usize::from(k), samples: sample.len() });
	}

	fit_counts(&ColorCounts::new(sample), k, seed, options)
}
