//! Design-token construction from ranked aggregates.
//!
//! Token names are derived from the aggregate rank alone, so the same input
//! always yields the same names: the most frequent color is `--color-001`,
//! the second `--color-002`, and so on. Each typography group expands into
//! six variables sharing a `--text-NNN` prefix.

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatedEntry, Aggregates, TypographyEntry};
use crate::record::Provenance;

/// Semantic category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Color,
    Text,
    Space,
    Radius,
    Border,
    Shadow,
}

impl TokenKind {
    /// The name segment used after `--`.
    pub fn prefix(self) -> &'static str {
        match self {
            TokenKind::Color => "color",
            TokenKind::Text => "text",
            TokenKind::Space => "space",
            TokenKind::Radius => "radius",
            TokenKind::Border => "border",
            TokenKind::Shadow => "shadow",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A named design variable with its frequency metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub frequency: usize,
    pub examples: Vec<Provenance>,
}

/// Every token of one run, per category, in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub colors: Vec<Token>,
    pub typography: Vec<Token>,
    pub spaces: Vec<Token>,
    pub radii: Vec<Token>,
    pub borders: Vec<Token>,
    pub shadows: Vec<Token>,
}

impl TokenSet {
    /// Number of typography groups (each group has six tokens).
    pub fn typography_groups(&self) -> usize {
        self.typography.len() / TYPOGRAPHY_SUFFIXES.len()
    }

    /// Total token count across categories.
    pub fn len(&self) -> usize {
        self.colors.len()
            + self.typography.len()
            + self.spaces.len()
            + self.radii.len()
            + self.borders.len()
            + self.shadows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sub-variable suffixes of a typography group, in emission order within
/// the JSON manifest.
pub const TYPOGRAPHY_SUFFIXES: [&str; 6] = [
    "font-size",
    "line-height",
    "letter-spacing",
    "weight",
    "style",
    "transform",
];

/// Formats `--{prefix}-{NNN}` with a three-digit zero-padded ordinal.
pub fn ordinal_name(kind: TokenKind, order: usize) -> String {
    format!("--{}-{:03}", kind.prefix(), order)
}

fn simple_tokens(entries: &[AggregatedEntry], kind: TokenKind) -> Vec<Token> {
    entries
        .iter()
        .map(|entry| Token {
            name: ordinal_name(kind, entry.order),
            value: entry.value.clone(),
            kind,
            frequency: entry.count,
            examples: entry.examples.clone(),
        })
        .collect()
}

fn typography_tokens(entries: &[TypographyEntry]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(entries.len() * TYPOGRAPHY_SUFFIXES.len());
    for (idx, entry) in entries.iter().enumerate() {
        let base = ordinal_name(TokenKind::Text, idx + 1);
        for (suffix, value) in TYPOGRAPHY_SUFFIXES.iter().zip(entry.values.as_array()) {
            tokens.push(Token {
                name: format!("{}-{}", base, suffix),
                value: value.to_string(),
                kind: TokenKind::Text,
                frequency: entry.count,
                examples: entry.examples.clone(),
            });
        }
    }
    tokens
}

/// Converts ranked aggregates into named tokens.
pub fn build_tokens(aggregates: &Aggregates) -> TokenSet {
    TokenSet {
        colors: simple_tokens(&aggregates.colors, TokenKind::Color),
        typography: typography_tokens(&aggregates.typography),
        spaces: simple_tokens(&aggregates.spaces, TokenKind::Space),
        radii: simple_tokens(&aggregates.radii, TokenKind::Radius),
        borders: simple_tokens(&aggregates.borders, TokenKind::Border),
        shadows: simple_tokens(&aggregates.shadows, TokenKind::Shadow),
    }
}
