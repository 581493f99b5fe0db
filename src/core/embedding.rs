//! Token embeddings drawn from per-token seeded generators.
//!
//! The generator for a token is keyed on `"emb:{token}:{seed}"`, so the
//! vector depends on the token's text and the global seed only. The same
//! token at two positions gets the same row; no positional signal is added.

use ndarray::{Array1, Array2};

use crate::config::EMBEDDING_SCALE;
use crate::core::rng::Mulberry32;

/// Embedding vector of width `d` for a single token.
pub fn token_embedding(token: &str, d: usize, seed: u32) -> Array1<f64> {
    let mut rng = Mulberry32::from_key(&format!("emb:{token}:{seed}"));
    Array1::from_shape_fn(d, |_| rng.next_symmetric(EMBEDDING_SCALE))
}

/// Embedding matrix `X [T × d]`, one row per token occurrence.
pub fn embed_tokens(tokens: &[String], d: usize, seed: u32) -> Array2<f64> {
    let mut x = Array2::zeros((tokens.len(), d));
    for (mut row, token) in x.rows_mut().into_iter().zip(tokens) {
        row.assign(&token_embedding(token, d, seed));
    }
    x
}
