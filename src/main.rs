//! attnsim: deterministic multi-head self-attention simulator.
//!
//! This is the CLI binary entry point.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use ndarray::Array2;
use tracing_subscriber::EnvFilter;

use attnsim::config::{D_MODEL_RANGE, N_HEADS_RANGE};
use attnsim::core::tokenizer::TokenMode;
use attnsim::runtime::pipeline::{simulate, AttentionReport, SimConfig};
use attnsim::runtime::selftest::run_self_tests;

/// attnsim CLI.
#[derive(Parser, Debug)]
#[command(
    name = "attnsim",
    about = "attnsim: print the attention weights a seeded multi-head layer forms over some text",
    version
)]
struct Cli {
    /// Input text (defaults to the config file's text, then a built-in sentence).
    text: Option<String>,

    /// Token granularity: `char` or `word`.
    #[arg(short, long)]
    mode: Option<TokenMode>,

    /// Requested model width (rounded down to a multiple of 4, minimum 4).
    #[arg(short, long, allow_negative_numbers = true)]
    d_model: Option<i64>,

    /// Requested number of heads (clamped to 1..=d/4).
    #[arg(short = 'H', long, allow_negative_numbers = true)]
    heads: Option<i64>,

    /// Apply the causal mask (`--causal` or `--causal=false`).
    #[arg(
        short,
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    causal: Option<bool>,

    /// Global seed.
    #[arg(short, long)]
    seed: Option<u32>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a single head instead of the average.
    #[arg(long)]
    head: Option<usize>,

    /// Decimal places in the table output.
    #[arg(long, default_value_t = 3)]
    precision: usize,

    /// Emit the full result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Run the built-in self-check battery and exit.
    #[arg(long, default_value_t = false)]
    self_test: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!("attnsim v{}", env!("CARGO_PKG_VERSION"));

    if cli.self_test {
        return self_test(cli.json);
    }

    let config = build_config(&cli)?;
    config.validate()?;

    if !D_MODEL_RANGE.contains(&config.d_model) {
        tracing::warn!(
            "d_model {} is outside the intended range {:?}",
            config.d_model,
            D_MODEL_RANGE
        );
    }
    if !N_HEADS_RANGE.contains(&config.n_heads) {
        tracing::warn!(
            "n_heads {} is outside the intended range {:?}",
            config.n_heads,
            N_HEADS_RANGE
        );
    }

    let dims = config.dims();
    tracing::info!(
        "Config: mode={}, d={} (requested {}), heads={}x{}, causal={}, seed={}",
        config.token_mode,
        dims.d,
        config.d_model,
        dims.n_heads,
        dims.head_dim,
        config.causal,
        config.seed,
    );

    let maps = simulate(&config);

    if cli.json {
        let report = AttentionReport::from(&maps);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if maps.is_empty() {
        tracing::warn!("No tokens in input; nothing to show.");
        return Ok(());
    }

    tracing::info!("Tokens: {}", maps.seq_len());

    match cli.head {
        Some(idx) => {
            let Some(weights) = maps.head(idx) else {
                bail!(
                    "head {} out of range: {} heads available",
                    idx,
                    maps.per_head.len()
                );
            };
            print!("{}", format_matrix(&format!("head {idx}"), &maps.tokens, weights, cli.precision));
        }
        None => {
            print!("{}", format_matrix("averaged", &maps.tokens, &maps.averaged, cli.precision));
        }
    }

    Ok(())
}

/// Defaults, then the config file, then explicit flags.
fn build_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            SimConfig::from_json_file(path)?
        }
        None => SimConfig::default(),
    };

    if let Some(text) = &cli.text {
        config.text = text.clone();
    }
    if let Some(mode) = cli.mode {
        config.token_mode = mode;
    }
    if let Some(d_model) = cli.d_model {
        config.d_model = d_model;
    }
    if let Some(heads) = cli.heads {
        config.n_heads = heads;
    }
    if let Some(causal) = cli.causal {
        config.causal = causal;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn self_test(json: bool) -> Result<()> {
    let report = run_self_tests();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for r in &report.results {
            println!("[{}] {}", if r.pass { "pass" } else { "FAIL" }, r.name);
        }
    }

    tracing::info!(
        "{}/{} self-checks passed",
        report.passed_count(),
        report.results.len()
    );

    if !report.all_passed() {
        bail!("self-checks failed: {}", report.failures().join(", "));
    }
    Ok(())
}

/// Plain text table: one row per query token, one column per key token.
fn format_matrix(title: &str, tokens: &[String], m: &Array2<f64>, precision: usize) -> String {
    let labels: Vec<String> = tokens.iter().map(|t| format!("{t:?}")).collect();
    let label_w = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let cell_w = (precision + 2).max(label_w.min(12));

    let mut out = String::new();
    let _ = writeln!(out, "{title} ({}x{})", m.nrows(), m.ncols());

    let _ = write!(out, "{:label_w$}", "");
    for l in &labels {
        let short: String = l.chars().take(cell_w).collect();
        let _ = write!(out, " {short:>cell_w$}");
    }
    out.push('\n');

    for (label, row) in labels.iter().zip(m.rows()) {
        let _ = write!(out, "{label:>label_w$}");
        for v in row {
            let _ = write!(out, " {v:>cell_w$.precision$}");
        }
        out.push('\n');
    }
    out
}
