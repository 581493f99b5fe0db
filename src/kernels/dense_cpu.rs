//! Dense CPU kernels over row-major `f64` matrices.
//!
//! Every product is a plain triple loop that accumulates in ascending
//! inner-index order, so results are reproducible bit-for-bit across runs
//! and match any other implementation that sums in the same order.
//!
//! Shape contracts are asserted: a mismatch is a caller bug, not a
//! recoverable condition.

use ndarray::Array2;

// ──────────────────────────────────────────────────────────────
// 1. Products and layout
// ──────────────────────────────────────────────────────────────

/// `A[n × m] · B[m × p] → [n × p]`.
///
/// Panics if the inner dimensions differ.
pub fn matmul(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let (n, m) = a.dim();
    let (m_b, p) = b.dim();
    assert_eq!(m, m_b, "matmul inner dimension mismatch: {n}x{m} · {m_b}x{p}");

    let mut out = Array2::zeros((n, p));
    for i in 0..n {
        for j in 0..p {
            let mut acc = 0.0f64;
            for k in 0..m {
                acc += a[[i, k]] * b[[k, j]];
            }
            out[[i, j]] = acc;
        }
    }
    out
}

/// `A[n × m] → Aᵀ[m × n]`, materialised in standard layout.
pub fn transpose(a: &Array2<f64>) -> Array2<f64> {
    let (n, m) = a.dim();
    Array2::from_shape_fn((m, n), |(i, j)| a[[j, i]])
}

/// Square identity matrix.
pub fn identity(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| if i == j { 1.0 } else { 0.0 })
}

// ──────────────────────────────────────────────────────────────
// 2. Elementwise
// ──────────────────────────────────────────────────────────────

/// Elementwise `A + B`. Panics on shape mismatch.
pub fn add(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    assert_eq!(a.dim(), b.dim(), "add shape mismatch");
    Array2::from_shape_fn(a.dim(), |idx| a[idx] + b[idx])
}

/// Elementwise `A · s`.
pub fn scale(a: &Array2<f64>, s: f64) -> Array2<f64> {
    a.mapv(|v| v * s)
}

// ──────────────────────────────────────────────────────────────
// 3. Normalisation
// ──────────────────────────────────────────────────────────────

/// Row-wise softmax with max subtraction.
///
/// Each row is shifted by its own maximum before exponentiation. A row
/// whose exponential sum is exactly zero is divided by 1 instead, so no
/// NaN or infinity can leak out of a degenerate row.
pub fn softmax_rows(a: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(a.dim());
    for (row, mut out_row) in a.rows().into_iter().zip(out.rows_mut()) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sum = 0.0f64;
        for (o, &v) in out_row.iter_mut().zip(row.iter()) {
            *o = (v - max).exp();
            sum += *o;
        }

        let denom = if sum == 0.0 { 1.0 } else { sum };
        out_row.mapv_inplace(|e| e / denom);
    }
    out
}
