//! Core module: hashing, tokenization, embeddings, projections, attention.

pub mod attention;
pub mod embedding;
pub mod projection;
pub mod rng;
pub mod tokenizer;
