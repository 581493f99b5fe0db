//! # attnsim
//!
//! A fully deterministic simulator of multi-head scaled dot-product
//! self-attention, meant for looking at how attention weights form over a
//! short token sequence.
//!
//! ## Pipeline
//!
//! 1. **Tokenize**: characters or whitespace-delimited words, at most 40
//! 2. **Embed**: per-token seeded vectors, independent of position
//! 3. **Project**: one seeded stream draws `W_q`, `W_k`, `W_v`
//! 4. **Attend**: split into heads, scaled scores, optional causal mask,
//!    row-wise softmax, mean over heads
//!
//! Every random number comes from a [`core::rng::Mulberry32`] stream keyed
//! by a string hash, so a given [`runtime::pipeline::SimConfig`] always
//! yields the same matrices.

pub mod core;
pub mod kernels;
pub mod runtime;

/// Simulator-wide constants.
pub mod config {
    use std::ops::RangeInclusive;

    /// Maximum sequence length after tokenization.
    pub const MAX_TOKENS: usize = 40;

    /// Model width is rounded down to a multiple of this, and every head
    /// is at least this wide.
    pub const HEAD_WIDTH_QUANTUM: usize = 4;

    /// Smallest effective model width.
    pub const MIN_D_MODEL: usize = 4;

    /// Embedding entries lie in `[-EMBEDDING_SCALE, EMBEDDING_SCALE)`.
    pub const EMBEDDING_SCALE: f64 = 0.5;

    /// Projection entries lie in `[-PROJECTION_SCALE, PROJECTION_SCALE)`.
    pub const PROJECTION_SCALE: f64 = 0.2;

    /// Score written into masked (future) cells under the causal mask.
    pub const MASK_SENTINEL: f64 = -1e9;

    /// Tolerance for row sums and masked weights.
    pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

    /// Default requested model width.
    pub const DEFAULT_D_MODEL: i64 = 32;

    /// Default requested head count.
    pub const DEFAULT_N_HEADS: i64 = 4;

    /// Default global seed.
    pub const DEFAULT_SEED: u32 = 42;

    /// Default input text.
    pub const DEFAULT_TEXT: &str = "the cat sat on the mat";

    /// Intended model-width range for interactive use.
    pub const D_MODEL_RANGE: RangeInclusive<i64> = 16..=128;

    /// Intended head-count range for interactive use.
    pub const N_HEADS_RANGE: RangeInclusive<i64> = 1..=8;

    /// Largest effective model width. `Dims::derive` clamps to it and
    /// `SimConfig::validate` rejects requests above it.
    pub const MAX_SERVICE_D_MODEL: i64 = 1024;

    /// Default number of configurations kept by the result cache.
    pub const DEFAULT_CACHE_CAPACITY: usize = 32;
}
