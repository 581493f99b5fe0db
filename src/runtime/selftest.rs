//! Built-in self-check battery.
//!
//! A fixed list of named boolean checks over the kernels and the full
//! pipeline. Front ends display the `{name, pass}` pairs; nothing in the
//! simulation path depends on them.

use ndarray::{arr2, Array2};
use serde::Serialize;

use crate::config::{MASK_SENTINEL, ROW_SUM_TOLERANCE};
use crate::core::embedding::embed_tokens;
use crate::core::tokenizer::{tokenize, TokenMode};
use crate::kernels::dense_cpu::{identity, matmul, scale, softmax_rows};
use crate::runtime::pipeline::{simulate, Dims, SimConfig};

/// Outcome of one named check.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub pass: bool,
}

/// Results of a full run, in battery order.
#[derive(Clone, Debug, Serialize)]
pub struct SelfTestReport {
    pub results: Vec<CheckResult>,
}

impl SelfTestReport {
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.pass)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.pass).count()
    }

    /// Names of the failing checks.
    pub fn failures(&self) -> Vec<&'static str> {
        self.results
            .iter()
            .filter(|r| !r.pass)
            .map(|r| r.name)
            .collect()
    }
}

type Check = fn() -> bool;

const BATTERY: &[(&str, Check)] = &[
    ("softmax rows sum to one", check_softmax_rows_sum),
    ("softmax entries lie in [0, 1]", check_softmax_range),
    ("softmax preserves logit order", check_softmax_monotonic),
    ("scale multiplies every entry", check_scale_linearity),
    ("matmul by identity is a no-op", check_matmul_identity),
    ("all weight matrices are row-stochastic", check_pipeline_row_stochastic),
    ("causal mask hides future tokens", check_causal_mask),
    ("first query attends only to itself under mask", check_first_query_self),
    ("repeated tokens share embeddings", check_repeated_embeddings),
    ("seed change alters averaged weights", check_seed_sensitivity),
    ("head count is clamped to model width", check_head_clamp),
    ("simulation is deterministic", check_determinism),
    ("empty input yields empty maps", check_empty_input),
];

/// Run every check in order.
pub fn run_self_tests() -> SelfTestReport {
    let results: Vec<CheckResult> = BATTERY
        .iter()
        .map(|&(name, check)| {
            let pass = check();
            if !pass {
                tracing::warn!("self-check failed: {}", name);
            }
            CheckResult { name, pass }
        })
        .collect();
    SelfTestReport { results }
}

fn sample_logits() -> Array2<f64> {
    arr2(&[
        [0.5, -1.25, 3.0, 0.0],
        [10.0, 10.0, -4.0, 2.5],
        [MASK_SENTINEL, -0.5, 0.25, 1.0],
    ])
}

fn is_row_stochastic(m: &Array2<f64>) -> bool {
    m.rows().into_iter().all(|row| {
        (row.sum() - 1.0).abs() <= ROW_SUM_TOLERANCE
            && row.iter().all(|&p| (0.0..=1.0).contains(&p))
    })
}

fn check_softmax_rows_sum() -> bool {
    softmax_rows(&sample_logits())
        .rows()
        .into_iter()
        .all(|row| (row.sum() - 1.0).abs() <= ROW_SUM_TOLERANCE)
}

fn check_softmax_range() -> bool {
    softmax_rows(&sample_logits())
        .iter()
        .all(|&p| (0.0..=1.0).contains(&p))
}

fn check_softmax_monotonic() -> bool {
    let logits = sample_logits();
    let probs = softmax_rows(&logits);
    let cols = logits.ncols();
    (0..logits.nrows()).all(|i| {
        (0..cols).all(|j| {
            (0..cols).all(|k| logits[[i, j]] <= logits[[i, k]] || probs[[i, j]] >= probs[[i, k]])
        })
    })
}

fn check_scale_linearity() -> bool {
    let a = sample_logits();
    let k = -2.5;
    let scaled = scale(&a, k);
    a.indexed_iter().all(|(idx, &v)| scaled[idx] == v * k)
}

fn check_matmul_identity() -> bool {
    let x = sample_logits();
    matmul(&x, &identity(x.ncols())) == x
}

fn check_pipeline_row_stochastic() -> bool {
    [false, true].iter().all(|&causal| {
        let maps = simulate(&SimConfig {
            text: "rows must sum to one".into(),
            token_mode: TokenMode::Char,
            d_model: 32,
            n_heads: 4,
            causal,
            seed: 11,
        });
        maps.per_head.iter().all(is_row_stochastic) && is_row_stochastic(&maps.averaged)
    })
}

fn check_causal_mask() -> bool {
    let maps = simulate(&SimConfig {
        text: "no peeking at later words please".into(),
        causal: true,
        ..Default::default()
    });
    let t = maps.seq_len();
    maps.per_head
        .iter()
        .chain(std::iter::once(&maps.averaged))
        .all(|m| (0..t).all(|i| ((i + 1)..t).all(|j| m[[i, j]] < ROW_SUM_TOLERANCE)))
}

fn check_first_query_self() -> bool {
    let maps = simulate(&SimConfig {
        text: "ab".into(),
        token_mode: TokenMode::Char,
        causal: true,
        ..Default::default()
    });
    maps.averaged.dim() == (2, 2)
        && (maps.averaged[[0, 0]] - 1.0).abs() < ROW_SUM_TOLERANCE
        && maps.averaged[[0, 1]] < ROW_SUM_TOLERANCE
}

fn check_repeated_embeddings() -> bool {
    let tokens = tokenize("the cat and the hat", TokenMode::Word);
    let x = embed_tokens(&tokens, 16, 42);
    x.row(0) == x.row(3) && x.row(0) != x.row(1)
}

fn check_seed_sensitivity() -> bool {
    let base = SimConfig {
        text: "seeds should matter here".into(),
        ..Default::default()
    };
    let other = SimConfig {
        seed: base.seed.wrapping_add(1),
        ..base.clone()
    };
    simulate(&base).averaged != simulate(&other).averaged
}

fn check_head_clamp() -> bool {
    [(16, 8), (20, 8), (4, 8), (30, 3), (7, 100)].iter().all(|&(d_model, n_heads)| {
        let dims = Dims::derive(d_model, n_heads);
        dims.n_heads >= 1
            && dims.head_dim >= 1
            && dims.usable_width() <= dims.d
            && dims.n_heads <= dims.d / 4
    })
}

fn check_determinism() -> bool {
    let cfg = SimConfig {
        causal: true,
        ..Default::default()
    };
    simulate(&cfg) == simulate(&cfg)
}

fn check_empty_input() -> bool {
    let maps = simulate(&SimConfig {
        text: String::new(),
        ..Default::default()
    });
    maps.tokens.is_empty() && maps.per_head.is_empty() && maps.averaged.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_passes() {
        let report = run_self_tests();
        assert!(report.all_passed(), "failed: {:?}", report.failures());
        assert_eq!(report.passed_count(), BATTERY.len());
    }

    #[test]
    fn test_names_unique() {
        let report = run_self_tests();
        let mut names: Vec<_> = report.results.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), report.results.len());
    }

    #[test]
    fn test_report_failures() {
        let report = SelfTestReport {
            results: vec![
                CheckResult { name: "a", pass: true },
                CheckResult { name: "b", pass: false },
            ],
        };
        assert!(!report.all_passed());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failures(), vec!["b"]);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(run_self_tests()).expect("serialize");
        assert_eq!(json["results"][0]["name"], "softmax rows sum to one");
        assert_eq!(json["results"][0]["pass"], true);
    }
}
