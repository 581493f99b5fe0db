//! Multi-head scaled dot-product attention weights.
//!
//! Per head `h` owning columns `[h·d_head, (h+1)·d_head)`:
//!
//! ```text
//! scores_h  = (Q_h · K_hᵀ) · (1 / sqrt(d_head))     [T × T]
//! scores_h[i, j] = MASK_SENTINEL   for j > i       (causal only)
//! weights_h = softmax_rows(scores_h)
//! averaged  = mean_h(weights_h)
//! ```
//!
//! Masked cells use a finite sentinel rather than `-inf`, so their weight is
//! tiny but not exactly zero.

use ndarray::{s, Array2};

use crate::config::MASK_SENTINEL;
use crate::kernels::dense_cpu::{add, matmul, scale, softmax_rows, transpose};

/// Head layout for one attention pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadLayout {
    /// Number of heads.
    pub n_heads: usize,

    /// Columns owned by each head.
    pub head_dim: usize,

    /// Whether queries may only attend to themselves and earlier keys.
    pub causal: bool,
}

/// Per-head and averaged attention weights for one sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadWeights {
    /// One row-stochastic `[T × T]` matrix per head.
    pub per_head: Vec<Array2<f64>>,

    /// Elementwise mean of `per_head`.
    pub averaged: Array2<f64>,
}

impl HeadLayout {
    /// Attention weights for projected queries and keys, both `[T × d]`.
    pub fn weights(&self, q_all: &Array2<f64>, k_all: &Array2<f64>) -> HeadWeights {
        let q_heads = split_heads(q_all, self.n_heads, self.head_dim);
        let k_heads = split_heads(k_all, self.n_heads, self.head_dim);

        let per_head: Vec<Array2<f64>> = q_heads
            .iter()
            .zip(&k_heads)
            .enumerate()
            .map(|(h, (q_h, k_h))| {
                let mut scores = head_scores(q_h, k_h, self.head_dim);
                if self.causal {
                    apply_causal_mask(&mut scores);
                }
                tracing::trace!("head {}: scores {:?}", h, scores.dim());
                softmax_rows(&scores)
            })
            .collect();

        let averaged = mean_weights(&per_head, q_all.nrows());
        HeadWeights { per_head, averaged }
    }
}

/// Split `[T × d]` into `n_heads` contiguous column blocks of width `head_dim`.
///
/// Columns past `n_heads · head_dim` belong to no head and are dropped.
pub fn split_heads(x: &Array2<f64>, n_heads: usize, head_dim: usize) -> Vec<Array2<f64>> {
    assert!(
        n_heads * head_dim <= x.ncols(),
        "split_heads: {} heads of width {} exceed {} columns",
        n_heads,
        head_dim,
        x.ncols()
    );
    (0..n_heads)
        .map(|h| x.slice(s![.., h * head_dim..(h + 1) * head_dim]).to_owned())
        .collect()
}

/// Concatenate per-head blocks back into one `[T × Σ widths]` matrix.
///
/// Inverse of [`split_heads`] over the covered columns. The weight pipeline
/// never produces value-weighted head outputs, so nothing calls this yet;
/// it is the hook for computing attended output vectors.
pub fn combine_heads(heads: &[Array2<f64>]) -> Array2<f64> {
    let Some(first) = heads.first() else {
        return Array2::zeros((0, 0));
    };
    let rows = first.nrows();
    let width: usize = heads.iter().map(|h| h.ncols()).sum();

    let mut out = Array2::zeros((rows, width));
    let mut col = 0;
    for head in heads {
        assert_eq!(head.nrows(), rows, "combine_heads: row count mismatch");
        out.slice_mut(s![.., col..col + head.ncols()]).assign(head);
        col += head.ncols();
    }
    out
}

/// Raw scaled scores `(Q_h · K_hᵀ) · (1 / sqrt(head_dim))`.
///
/// The reciprocal is taken once and multiplied in; dividing each entry by
/// `sqrt(head_dim)` can differ in the last bit.
pub fn head_scores(q_h: &Array2<f64>, k_h: &Array2<f64>, head_dim: usize) -> Array2<f64> {
    let inv_sqrt = 1.0 / (head_dim as f64).sqrt();
    scale(&matmul(q_h, &transpose(k_h)), inv_sqrt)
}

/// Overwrite every future cell (`col > row`) with [`MASK_SENTINEL`].
pub fn apply_causal_mask(scores: &mut Array2<f64>) {
    for ((row, col), v) in scores.indexed_iter_mut() {
        if col > row {
            *v = MASK_SENTINEL;
        }
    }
}

/// Elementwise mean over heads. Returns a `t × t` zero matrix for no heads.
pub fn mean_weights(heads: &[Array2<f64>], t: usize) -> Array2<f64> {
    if heads.is_empty() {
        return Array2::zeros((t, t));
    }
    let n = heads.len() as f64;
    let sum = heads
        .iter()
        .skip(1)
        .fold(heads[0].clone(), |acc, h| add(&acc, h));
    sum.mapv(|v| v / n)
}
