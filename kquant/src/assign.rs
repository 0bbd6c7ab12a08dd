//! Nearest codeword search shared by k-means and the final pixel assignment

use crate::{squared_distance, Codebook, Color};
use std::cmp::Ordering;

/// Relative slack on the early exit bound, covering the rounding of both compared distances
const PRUNE_MARGIN: f32 = 1.0 + 16.0 * f32::EPSILON;

/// For each centroid, every other centroid sorted by one fourth of their squared distance
///
/// If a color `x` is at a (squared) distance of `d` from centroid `i`
/// and `d` is less than the quarter distance between `i` and `j`,
/// then `j` is strictly farther from `x` than `i` is, by the triangle inequality.
/// So, a search can stop at the first such `j` in the sorted row of `i`.
/// The bound is only trusted when it holds by more than the rounding error of the computed distances,
/// so near ties are always settled by comparing the distances themselves.
pub(crate) struct NeighborTable {
	/// The number of entries in each row (`k - 1`)
	row_len: usize,
	/// Row `i` holds `(j, distance(i, j) / 4)` for every `j != i`, sorted by increasing distance
	rows: Vec<(u8, f32)>,
}

impl NeighborTable {
	/// Create a table for the given centroids
	pub(crate) fn new(centroids: &[Color]) -> Self {
		let k = centroids.len();
		let row_len = k.saturating_sub(1);
		let mut table = Self { row_len, rows: vec![(0, 0.0); k * row_len] };
		table.update(centroids);
		table
	}

	/// Recompute the distances for new centroids (of the same length)
	// i and j are < centroids.len() <= u8::MAX
	#[allow(clippy::cast_possible_truncation)]
	pub(crate) fn update(&mut self, centroids: &[Color]) {
		let k = centroids.len();
		debug_assert_eq!(k * self.row_len, self.rows.len());

		if self.row_len == 0 {
			return;
		}

		for (i, row) in self.rows.chunks_exact_mut(self.row_len).enumerate() {
			let ci = centroids[i];
			let others = (0..k).filter(|&j| j != i);
			for (entry, j) in row.iter_mut().zip(others) {
				*entry = (j as u8, squared_distance(ci, centroids[j]) / 4.0);
			}

			row.sort_by(|(_, x), (_, y)| f32::total_cmp(x, y));
		}
	}

	/// The sorted neighbors of centroid `i`
	fn row(&self, i: usize) -> &[(u8, f32)] {
		&self.rows[(i * self.row_len)..((i + 1) * self.row_len)]
	}

	/// Find the centroid closest to `color`, starting the search at centroid `hint`.
	///
	/// Returns the centroid index and its squared distance.
	/// Ties are broken by the lowest centroid index, regardless of `hint`.
	pub(crate) fn nearest(&self, centroids: &[Color], color: Color, hint: u8) -> (u8, f32) {
		let ci = usize::from(hint);
		let dist = squared_distance(color, centroids[ci]);

		let mut min_dist = dist;
		let mut min_center = hint;
		for &(other_center, quarter_dist) in self.row(ci) {
			if dist * PRUNE_MARGIN < quarter_dist {
				break;
			}

			let other_dist = squared_distance(color, centroids[usize::from(other_center)]);
			let closer = match f32::total_cmp(&other_dist, &min_dist) {
				Ordering::Less => true,
				Ordering::Equal => other_center < min_center,
				Ordering::Greater => false,
			};

			if closer {
				min_dist = other_dist;
				min_center = other_center;
			}
		}

		(min_center, min_dist)
	}
}

/// Label each pixel with the index of its nearest codeword.
///
/// Distance is squared Euclidean distance, and ties go to the codeword with the lowest index.
/// The returned labels have the same length and order as `pixels`.
#[must_use]
#[cfg(not(feature = "threads"))]
pub fn assign(codebook: &Codebook, pixels: &[Color]) -> Vec<u8> {
	let centroids = codebook.colors();
	let table = NeighborTable::new(centroids);

	// Neighboring pixels often share a label, so the previous label is a good place to start
	let mut hint = 0;
	pixels
		.iter()
		.map(|&color| {
			hint = table.nearest(centroids, color, hint).0;
			hint
		})
		.collect()
}

/// Label each pixel with the index of its nearest codeword.
///
/// Distance is squared Euclidean distance, and ties go to the codeword with the lowest index.
/// The returned labels have the same length and order as `pixels`.
#[must_use]
#[cfg(feature = "threads")]
pub fn assign(codebook: &Codebook, pixels: &[Color]) -> Vec<u8> {
	use rayon::prelude::*;

	/// The number of pixels each task labels sequentially
	const CHUNK_SIZE: usize = 4096;

	let centroids = codebook.colors();
	let table = NeighborTable::new(centroids);

	let mut labels = vec![0; pixels.len()];
	labels
		.par_chunks_mut(CHUNK_SIZE)
		.zip(pixels.par_chunks(CHUNK_SIZE))
		.for_each(|(labels, pixels)| {
			// Neighboring pixels often share a label, so the previous label is a good place to start
			let mut hint = 0;
			for (label, &color) in labels.iter_mut().zip(pixels) {
				hint = table.nearest(centroids, color, hint).0;
				*label = hint;
			}
		});

	labels
}
