//! Error types for quantization

use crate::{Stage, Strategy};
use thiserror::Error;

/// An invalid input to one of the quantization steps
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantizeError {
	/// A grid with a width or height of zero
	#[error("image dimensions cannot be zero")]
	ZeroDimension,

	/// The number of pixels does not match the grid dimensions
	#[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
	DimensionMismatch {
		/// The number of pixels provided
		len: usize,
		/// The grid width
		width: u32,
		/// The grid height
		height: u32,
	},

	/// A sample of zero pixels was requested
	#[error("the sample size must be at least 1")]
	EmptySample,

	/// More pixels were requested than are available
	#[error("cannot sample {requested} pixels from only {available} available pixels")]
	InsufficientData {
		/// The number of pixels requested
		requested: usize,
		/// The number of pixels available
		available: usize,
	},

	/// The number of clusters is zero or larger than the number of sample points
	#[error("the number of clusters must be in 1..={samples}, got {k}")]
	InvalidClusterCount {
		/// The requested number of clusters
		k: usize,
		/// The number of sample points
		samples: usize,
	},

	/// A codebook with no codewords
	#[error("the codebook must contain at least one color")]
	EmptyCodebook,

	/// A codebook with more codewords than a `u8` label can address
	#[error("the codebook can hold at most {} colors, got {0}", crate::MAX_CODEWORDS)]
	TooManyCodewords(usize),

	/// A label that does not index into the codebook
	#[error("label {label} is out of range for a codebook of {len} colors")]
	InvalidLabel {
		/// The offending label
		label: u8,
		/// The codebook length
		len: usize,
	},
}

/// A failed quantization run, along with the strategy and step it failed in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{strategy} quantization failed while {stage}: {source}")]
pub struct PipelineError {
	/// The strategy that was being run
	pub strategy: Strategy,
	/// The step that failed
	pub stage: Stage,
	/// The underlying error
	#[source]
	pub source: QuantizeError,
}
