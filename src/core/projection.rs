//! Query / key / value projection weights.
//!
//! One generator, keyed on the whole token sequence and the seed, fills
//! `W_q`, then `W_k`, then `W_v`, each row-major. The draw order is part of
//! the output contract: swapping two fills reshuffles every weight.

use ndarray::Array2;

use crate::config::PROJECTION_SCALE;
use crate::core::rng::Mulberry32;
use crate::kernels::dense_cpu::matmul;

/// Square projection matrices shared by all heads.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionWeights {
    /// Query projection `[d × d]`.
    pub w_q: Array2<f64>,

    /// Key projection `[d × d]`.
    pub w_k: Array2<f64>,

    /// Value projection `[d × d]`.
    pub w_v: Array2<f64>,
}

/// Projected sequence: `Q = X·W_q`, `K = X·W_k`, `V = X·W_v`, each `[T × d]`.
#[derive(Clone, Debug)]
pub struct Projections {
    pub q: Array2<f64>,
    pub k: Array2<f64>,
    /// Computed for completeness; no current output consumes it.
    pub v: Array2<f64>,
}

impl ProjectionWeights {
    /// Draw the three matrices with the default amplitude.
    pub fn draw(tokens: &[String], d: usize, seed: u32) -> Self {
        Self::draw_scaled(tokens, d, seed, PROJECTION_SCALE)
    }

    /// Draw the three matrices with entries in `[-scale_std, scale_std)`.
    pub fn draw_scaled(tokens: &[String], d: usize, seed: u32, scale_std: f64) -> Self {
        let mut rng = Mulberry32::from_key(&sequence_key(tokens, seed));
        let w_q = fill_matrix(&mut rng, d, scale_std);
        let w_k = fill_matrix(&mut rng, d, scale_std);
        let w_v = fill_matrix(&mut rng, d, scale_std);
        Self { w_q, w_k, w_v }
    }

    /// Project an embedding matrix `X [T × d]`.
    pub fn project(&self, x: &Array2<f64>) -> Projections {
        Projections {
            q: matmul(x, &self.w_q),
            k: matmul(x, &self.w_k),
            v: matmul(x, &self.w_v),
        }
    }

    /// Model width these weights were drawn for.
    pub fn width(&self) -> usize {
        self.w_q.nrows()
    }
}

/// Generator key for a sequence: tokens joined by `|`, then `#` and the seed.
pub fn sequence_key(tokens: &[String], seed: u32) -> String {
    format!("{}#{}", tokens.join("|"), seed)
}

/// Row-major `[d × d]` fill from a borrowed generator.
fn fill_matrix(rng: &mut Mulberry32, d: usize, scale_std: f64) -> Array2<f64> {
    let mut w = Array2::zeros((d, d));
    for r in 0..d {
        for c in 0..d {
            w[[r, c]] = rng.next_symmetric(scale_std);
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::dense_cpu::identity;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_sequence_key_format() {
        assert_eq!(sequence_key(&toks(&["a", "b"]), 7), "a|b#7");
        assert_eq!(sequence_key(&[], 0), "#0");
    }

    #[test]
    fn test_shapes_and_range() {
        let w = ProjectionWeights::draw(&toks(&["x", "y"]), 12, 3);
        assert_eq!(w.width(), 12);
        for m in [&w.w_q, &w.w_k, &w.w_v] {
            assert_eq!(m.dim(), (12, 12));
            assert!(m.iter().all(|&v| (-0.2..0.2).contains(&v)));
        }
    }

    #[test]
    fn test_draw_order_q_then_k_then_v() {
        let tokens = toks(&["a", "b", "c"]);
        let d = 4;
        let w = ProjectionWeights::draw(&tokens, d, 11);

        let mut rng = Mulberry32::from_key("a|b|c#11");
        let draws: Vec<f64> = (0..3 * d * d).map(|_| rng.next_symmetric(0.2)).collect();

        assert_eq!(w.w_q[[0, 0]], draws[0]);
        assert_eq!(w.w_q[[0, 1]], draws[1]);
        assert_eq!(w.w_q[[1, 0]], draws[d]);
        assert_eq!(w.w_k[[0, 0]], draws[d * d]);
        assert_eq!(w.w_v[[d - 1, d - 1]], draws[3 * d * d - 1]);
    }

    #[test]
    fn test_deterministic() {
        let tokens = toks(&["the", "cat"]);
        assert_eq!(
            ProjectionWeights::draw(&tokens, 8, 1),
            ProjectionWeights::draw(&tokens, 8, 1)
        );
    }

    #[test]
    fn test_sequence_order_matters() {
        let a = ProjectionWeights::draw(&toks(&["a", "b"]), 4, 1);
        let b = ProjectionWeights::draw(&toks(&["b", "a"]), 4, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_custom_scale() {
        let w = ProjectionWeights::draw_scaled(&toks(&["a"]), 6, 2, 1.0);
        let base = ProjectionWeights::draw(&toks(&["a"]), 6, 2);
        for (big, small) in w.w_k.iter().zip(base.w_k.iter()) {
            approx::assert_abs_diff_eq!(big * 0.2, *small, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_project_through_identity() {
        let x = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let w = ProjectionWeights {
            w_q: identity(2),
            w_k: identity(2) * 2.0,
            w_v: identity(2),
        };
        let p = w.project(&x);
        assert_eq!(p.q, x);
        assert_eq!(p.k, &x * 2.0);
        assert_eq!(p.v.dim(), (2, 2));
    }
}
