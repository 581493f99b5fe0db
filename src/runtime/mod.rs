//! Runtime module: ties the core into a complete simulation pass.
//!
//! This module provides:
//! - Configuration, derived dimensions and the pure pipeline
//! - A result cache keyed by the full configuration
//! - The built-in self-check battery

pub mod cache;
pub mod pipeline;
pub mod selftest;
