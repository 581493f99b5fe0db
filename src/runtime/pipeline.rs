//! Full simulation pass: configuration in → attention maps out.
//!
//! Stages:
//! 1. Tokenize (`core::tokenizer`)
//! 2. Embed (`core::embedding`)
//! 3. Draw `W_q`, `W_k`, `W_v` and project (`core::projection`)
//! 4. Per-head weights and their mean (`core::attention`)
//!
//! [`simulate`] is a pure function of its [`SimConfig`]; nothing is kept
//! between calls. Memoization lives in `runtime::cache`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_D_MODEL, DEFAULT_N_HEADS, DEFAULT_SEED, DEFAULT_TEXT, HEAD_WIDTH_QUANTUM,
    MAX_SERVICE_D_MODEL, MIN_D_MODEL,
};
use crate::core::attention::{HeadLayout, HeadWeights};
use crate::core::embedding::embed_tokens;
use crate::core::projection::ProjectionWeights;
use crate::core::tokenizer::{tokenize, TokenMode};

/// Simulation configuration.
///
/// Numeric fields are taken as requested and clamped by [`Dims::derive`];
/// the full tuple is the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Raw input text.
    pub text: String,

    /// Tokenization granularity.
    pub token_mode: TokenMode,

    /// Requested model width.
    pub d_model: i64,

    /// Requested number of heads.
    pub n_heads: i64,

    /// Whether to apply the causal mask.
    pub causal: bool,

    /// Global seed.
    pub seed: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            token_mode: TokenMode::Word,
            d_model: DEFAULT_D_MODEL,
            n_heads: DEFAULT_N_HEADS,
            causal: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl SimConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    /// Boundary check for untrusted input.
    ///
    /// [`simulate`] accepts anything; this rejects non-positive sizes, widths
    /// above [`MAX_SERVICE_D_MODEL`] and more heads than that width could
    /// hold, so a service can bound the cost of a single request.
    pub fn validate(&self) -> Result<()> {
        if self.d_model < 1 {
            bail!("d_model must be positive, got {}", self.d_model);
        }
        if self.d_model > MAX_SERVICE_D_MODEL {
            bail!(
                "d_model {} exceeds the limit of {}",
                self.d_model,
                MAX_SERVICE_D_MODEL
            );
        }
        if self.n_heads < 1 {
            bail!("n_heads must be positive, got {}", self.n_heads);
        }
        let max_heads = MAX_SERVICE_D_MODEL / HEAD_WIDTH_QUANTUM as i64;
        if self.n_heads > max_heads {
            bail!("n_heads {} exceeds the limit of {}", self.n_heads, max_heads);
        }
        Ok(())
    }

    /// Effective dimensions for this configuration.
    pub fn dims(&self) -> Dims {
        Dims::derive(self.d_model, self.n_heads)
    }
}

/// Effective model dimensions derived from a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Dims {
    /// Model width: a multiple of 4, between 4 and 1024.
    pub d: usize,

    /// Head count: between 1 and `d / 4`.
    pub n_heads: usize,

    /// Columns per head: `floor(d / n_heads)`.
    pub head_dim: usize,
}

impl Dims {
    /// `d = clamp(floor(d_model/4)·4, 4, 1024)`, `H = max(1, min(n_heads, d/4))`,
    /// `head_dim = floor(d/H)`.
    ///
    /// The upper clamp bounds the `[d × d]` projection matrices for any
    /// caller that skips [`SimConfig::validate`].
    pub fn derive(d_model: i64, n_heads: i64) -> Self {
        let quantum = HEAD_WIDTH_QUANTUM as i64;
        let d = (d_model.div_euclid(quantum) * quantum)
            .clamp(MIN_D_MODEL as i64, MAX_SERVICE_D_MODEL);
        let h = n_heads.min(d / quantum).max(1);
        let d = usize::try_from(d).unwrap_or(usize::MAX);
        let n_heads = usize::try_from(h).unwrap_or(1);
        Self {
            d,
            n_heads,
            head_dim: d / n_heads,
        }
    }

    /// Columns covered by some head; the rest of `d` is unused.
    pub fn usable_width(&self) -> usize {
        self.n_heads * self.head_dim
    }
}

/// Output of one simulation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct AttentionMaps {
    /// Token sequence (at most 40).
    pub tokens: Vec<String>,

    /// Effective dimensions used.
    pub dims: Dims,

    /// One `[T × T]` row-stochastic matrix per head.
    pub per_head: Vec<Array2<f64>>,

    /// Mean of `per_head`.
    pub averaged: Array2<f64>,
}

impl AttentionMaps {
    fn empty(dims: Dims) -> Self {
        Self {
            tokens: Vec::new(),
            dims,
            per_head: Vec::new(),
            averaged: Array2::zeros((0, 0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn seq_len(&self) -> usize {
        self.tokens.len()
    }

    /// Weights of head `idx`, if it exists.
    pub fn head(&self, idx: usize) -> Option<&Array2<f64>> {
        self.per_head.get(idx)
    }

    /// Row sums of the averaged matrix.
    pub fn row_sums(&self) -> Vec<f64> {
        self.averaged.rows().into_iter().map(|r| r.sum()).collect()
    }
}

/// Serializable view of [`AttentionMaps`] with plain nested rows.
#[derive(Clone, Debug, Serialize)]
pub struct AttentionReport {
    pub tokens: Vec<String>,
    pub dims: Dims,
    pub per_head_weights: Vec<Vec<Vec<f64>>>,
    pub averaged_weights: Vec<Vec<f64>>,
}

impl From<&AttentionMaps> for AttentionReport {
    fn from(maps: &AttentionMaps) -> Self {
        Self {
            tokens: maps.tokens.clone(),
            dims: maps.dims,
            per_head_weights: maps.per_head.iter().map(to_rows).collect(),
            averaged_weights: to_rows(&maps.averaged),
        }
    }
}

fn to_rows(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.rows().into_iter().map(|r| r.to_vec()).collect()
}

/// Run the whole pipeline for one configuration.
///
/// An empty token sequence short-circuits before any matrix is built and
/// yields no heads and a `0 × 0` average.
pub fn simulate(config: &SimConfig) -> AttentionMaps {
    let dims = config.dims();
    let tokens = tokenize(&config.text, config.token_mode);
    if tokens.is_empty() {
        tracing::debug!("no tokens in input; skipping attention");
        return AttentionMaps::empty(dims);
    }

    tracing::debug!(
        "simulating {} tokens: d={}, heads={}x{}, causal={}, seed={}",
        tokens.len(),
        dims.d,
        dims.n_heads,
        dims.head_dim,
        config.causal,
        config.seed,
    );

    let x = embed_tokens(&tokens, dims.d, config.seed);
    let weights = ProjectionWeights::draw(&tokens, dims.d, config.seed);
    let projected = weights.project(&x);

    let layout = HeadLayout {
        n_heads: dims.n_heads,
        head_dim: dims.head_dim,
        causal: config.causal,
    };
    let HeadWeights { per_head, averaged } = layout.weights(&projected.q, &projected.k);

    AttentionMaps {
        tokens,
        dims,
        per_head,
        averaged,
    }
}
