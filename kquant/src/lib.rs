//! Reduce the number of colors in an image through vector quantization.
//!
//! Every pixel is replaced by the nearest color of a small codebook.
//! Two ways of building the codebook are provided:
//! - [`Strategy::Kmeans`] runs k-means clustering on a random sample of the pixels.
//! - [`Strategy::Random`] picks the codebook directly from randomly chosen pixels of the image.
//!
//! # Examples
//!
//! ## Quantize an image file to 10 colors using k-means.
//!
//! ```no_run
//! use kquant::{ColorGrid, QuantizeOptions, Strategy};
//!
//! let image = image::open("some image").unwrap().into_rgb8();
//! let grid = ColorGrid::from_rgb_image(&image).unwrap();
//! let quantized = kquant::quantize(&grid, Strategy::Kmeans, &QuantizeOptions::new()).unwrap();
//! quantized.grid.to_rgb_image().save("some image_kmeans.png").unwrap();
//! ```
//!
//! ## Run both strategies and compare their inertia.
//!
//! ```no_run
//! use kquant::{ColorGrid, QuantizeOptions};
//!
//! let image = image::open("some image").unwrap().into_rgb8();
//! let grid = ColorGrid::from_rgb_image(&image).unwrap();
//! let options = QuantizeOptions::new().k(6).sample_size(2000);
//!
//! for (strategy, result) in kquant::quantize_all(&grid, &options) {
//!     let quantized = result.unwrap();
//!     println!("{strategy}: {}", quantized.inertia(&grid));
//! }
//! ```
//!
//! ## Use the building blocks directly.
//!
//! ```
//! use kquant::{Color, KmeansOptions};
//!
//! let pixels = vec![
//!     Color::new(0.0, 0.0, 0.0),
//!     Color::new(0.1, 0.0, 0.0),
//!     Color::new(1.0, 1.0, 1.0),
//!     Color::new(0.9, 1.0, 1.0),
//! ];
//!
//! let sample = kquant::sample(&pixels, 4, 0).unwrap();
//! let result = kquant::fit(&sample, 2, 0, &KmeansOptions::new()).unwrap();
//! let labels = kquant::assign(&result.codebook, &pixels);
//!
//! assert_eq!(labels[0], labels[1]);
//! assert_eq!(labels[2], labels[3]);
//! assert_ne!(labels[0], labels[2]);
//! ```
//!
//! # Arguments
//!
//! ## K
//!
//! The number of colors in the codebook, in the range `1..=255`.
//! For k-means, `k` must not exceed the sample size.
//! For the random strategy, `k` must not exceed the number of pixels.
//!
//! ## Sample Size
//!
//! The number of pixels k-means is run on.
//! Running k-means on every pixel of a large image is slow and rarely gives a visibly different palette,
//! so a sample of around `1000` pixels is usually enough.
//! The sample size must be in the range `1..=` the number of pixels.
//!
//! ## Seeds
//!
//! Every random draw has its own seed: the pixel sample, the k-means initialization,
//! and the random codebook. Using the same seeds on the same image always gives the same output.
//! See [`Seeds`].
//!
//! ## Trials
//!
//! The number of times to run k-means, keeping the trial with the lowest inertia.
//! k-means can get stuck in a local minimum, so a few trials may give a better palette.
//!
//! ## Convergence Threshold
//!
//! k-means stops once the sum of the squared centroid movements of an iteration is at or below this value.
//! Colors have components in `0.0..=1.0`, so values around `1e-6` already give visually stable results.
//!
//! ## Max Iterations
//!
//! The maximum number of iterations for each k-means trial, in case the convergence threshold is never reached.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::unreadable_literal)]

use palette::Srgb;
use std::collections::HashMap;

mod assign;
mod codebook;
mod error;
mod grid;
mod kmeans;
mod pipeline;
mod sample;

pub use assign::assign;
pub use codebook::Codebook;
pub use error::{PipelineError, QuantizeError};
pub use grid::ColorGrid;
pub use kmeans::{fit, fit_counts, KmeansOptions, KmeansResult};
pub use pipeline::{quantize, quantize_all, QuantizeOptions, Quantized, Seeds, Stage, Strategy};
pub use sample::{sample, sample_indices};

/// A color vector: sRGB components normalized to `0.0..=1.0`
pub type Color = Srgb<f32>;

/// The largest number of codewords a [`Codebook`] may hold, so that every label fits in a `u8`
pub const MAX_CODEWORDS: usize = u8::MAX as usize;

/// Squared Euclidean distance between two colors
#[must_use]
#[inline]
pub fn squared_distance(x: Color, y: Color) -> f32 {
	let dr = x.red - y.red;
	let dg = x.green - y.green;
	let db = x.blue - y.blue;
	dr * dr + dg * dg + db * db
}

/// Deduplicated colors along with the number of times each one occurred
///
/// k-means treats a color with a count of `n` exactly the same as `n` copies of that color,
/// but only has to visit it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct ColorCounts {
	/// The unique colors
	pub(crate) colors: Vec<Color>,
	/// The number of duplicates for each color
	pub(crate) counts: Vec<u32>,
}

impl ColorCounts {
	/// Merge duplicate colors from the given slice, keeping the order of first occurrence.
	///
	/// # Panics
	/// Panics if `colors` has more than `u32::MAX` elements.
	#[must_use]
	pub fn new(colors: &[Color]) -> Self {
		assert!(u32::try_from(colors.len()).is_ok(), "more than u32::MAX colors");

		let mut data = Self::default();

		// Color bits -> data index
		let mut memo: HashMap<[u32; 3], usize> = HashMap::new();

		for &color in colors {
			let key = [color.red.to_bits(), color.green.to_bits(), color.blue.to_bits()];
			let index = *memo.entry(key).or_insert_with(|| {
				data.colors.push(color);
				data.counts.push(0);
				data.colors.len() - 1
			});

			data.counts[index] += 1;
		}

		data
	}

	/// The unique colors
	#[must_use]
	pub fn colors(&self) -> &[Color] {
		&self.colors
	}

	/// The number of duplicates for each unique color
	#[must_use]
	pub fn counts(&self) -> &[u32] {
		&self.counts
	}

	/// The number of unique colors
	#[must_use]
	pub fn num_colors(&self) -> usize {
		self.colors.len()
	}

	/// The total number of colors, counting duplicates
	#[must_use]
	pub fn total_count(&self) -> u64 {
		self.counts.iter().map(|&n| u64::from(n)).sum()
	}

	/// Iterate over each unique color and its count
	pub(crate) fn pairs(&self) -> impl Iterator<Item = (Color, u32)> + '_ {
		self.colors.iter().copied().zip(self.counts.iter().copied())
	}
}
