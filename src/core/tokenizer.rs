//! Text → token sequence.
//!
//! Two granularities: Unicode scalar values (`Char`) or whitespace-delimited
//! words (`Word`). Sequences are truncated to [`MAX_TOKENS`]; duplicates are
//! kept since the same token may occur at several positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::MAX_TOKENS;

/// Tokenization granularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    Char,
    #[default]
    Word,
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenMode::Char => write!(f, "char"),
            TokenMode::Word => write!(f, "word"),
        }
    }
}

impl FromStr for TokenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "char" => Ok(TokenMode::Char),
            "word" => Ok(TokenMode::Word),
            other => Err(format!("unknown token mode '{other}' (expected 'char' or 'word')")),
        }
    }
}

/// Split `text` into at most [`MAX_TOKENS`] tokens.
pub fn tokenize(text: &str, mode: TokenMode) -> Vec<String> {
    match mode {
        TokenMode::Word => text
            .split_whitespace()
            .take(MAX_TOKENS)
            .map(str::to_owned)
            .collect(),
        TokenMode::Char => text.chars().take(MAX_TOKENS).map(String::from).collect(),
    }
}
