//! Numeric kernels.
//!
//! - **dense_cpu**: reference dense `f64` matrix primitives (matmul,
//!   transpose, elementwise add/scale, row-wise softmax)

pub mod dense_cpu;
