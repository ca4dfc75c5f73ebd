//! The tokenize stage: inventory file in, token manifest and stylesheets out.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::aggregate::aggregate_all;
use crate::config::read_json;
use crate::dedup::{deduplicate, DedupTable};
use crate::emit::{render_css, write_css_mirrors, write_json, DEFAULT_CSS_MIRRORS};
use crate::error::Error;
use crate::record::StyleRecord;
use crate::tokens::{build_tokens, Token, TokenSet};

pub const RAW_INVENTORY_PATH: &str = "artifacts/style-inventory.raw.json";
pub const DEDUP_INVENTORY_PATH: &str = "artifacts/style-inventory.dedup.json";
pub const REFERENCE_RAW_INVENTORY_PATH: &str = "artifacts/reference/style-inventory.raw.json";
pub const REFERENCE_DEDUP_INVENTORY_PATH: &str = "artifacts/reference/style-inventory.dedup.json";
pub const TOKENS_JSON_PATH: &str = "tokens.candidates.json";

/// A loaded inventory, in whichever shape the file had.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryInput {
    /// Raw records; the dedup table still has to be built.
    Raw(Vec<StyleRecord>),
    /// A dedup table, optionally carrying the raw records it came from.
    Dedup {
        table: DedupTable,
        raw: Vec<StyleRecord>,
    },
}

#[derive(Deserialize)]
struct DedupDocument {
    #[serde(flatten)]
    table: DedupTable,
    #[serde(default)]
    raw: Vec<StyleRecord>,
}

/// Reads an inventory file: either a raw record array or a dedup object with
/// a `fields` map.
pub fn load_inventory(path: &Path) -> Result<InventoryInput, Error> {
    if !path.exists() {
        return Err(Error::MissingInput {
            path: path.to_path_buf(),
            hint: Some("run the inventory stage first or pass --in".to_string()),
        });
    }
    let value: serde_json::Value = read_json(path)?;
    let parse_err = |source: serde_json::Error| Error::Parse {
        path: path.to_path_buf(),
        source,
    };
    let is_dedup = matches!(&value, serde_json::Value::Object(map) if map.contains_key("fields"));
    if value.is_array() {
        let records = serde_json::from_value(value).map_err(parse_err)?;
        Ok(InventoryInput::Raw(records))
    } else if is_dedup {
        let doc: DedupDocument = serde_json::from_value(value).map_err(parse_err)?;
        Ok(InventoryInput::Dedup {
            table: doc.table,
            raw: doc.raw,
        })
    } else {
        Err(Error::InvalidInventory {
            path: path.to_path_buf(),
        })
    }
}

/// Where the tokenize stage reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeOptions {
    pub input: PathBuf,
    pub dedup_output: PathBuf,
    pub tokens_json: PathBuf,
    pub css_outputs: Vec<PathBuf>,
}

impl TokenizeOptions {
    /// Default layout relative to a project root.
    pub fn for_root(root: &Path) -> Self {
        Self {
            input: root.join(RAW_INVENTORY_PATH),
            dedup_output: root.join(DEDUP_INVENTORY_PATH),
            tokens_json: root.join(TOKENS_JSON_PATH),
            css_outputs: DEFAULT_CSS_MIRRORS.iter().map(|p| root.join(p)).collect(),
        }
    }
}

/// Turns an in-memory inventory into tokens without touching the filesystem.
pub fn tokens_from_inventory(input: &InventoryInput) -> (Option<DedupTable>, TokenSet) {
    match input {
        InventoryInput::Raw(records) => {
            let table = deduplicate(records);
            let tokens = build_tokens(&aggregate_all(&table, records));
            (Some(table), tokens)
        }
        InventoryInput::Dedup { table, raw } => (None, build_tokens(&aggregate_all(table, raw))),
    }
}

/// Runs the tokenize stage end to end.
///
/// The input is checked before anything is written, so a missing inventory
/// leaves no partial output behind.
pub fn tokenize(options: &TokenizeOptions) -> Result<TokenSet, Error> {
    let input = load_inventory(&options.input)?;
    let (table, tokens) = tokens_from_inventory(&input);
    let css = render_css(&tokens)?;

    if let Some(table) = &table {
        write_json(&options.dedup_output, table)?;
        tracing::info!(path = %options.dedup_output.display(), "wrote deduplicated inventory");
    }
    write_json(&options.tokens_json, &tokens)?;
    write_css_mirrors(&css, &options.css_outputs)?;
    tracing::info!(
        tokens = tokens.len(),
        mirrors = options.css_outputs.len(),
        "wrote token candidates"
    );
    Ok(tokens)
}

/// Console summary of a token set.
pub struct TokenSummary<'a>(pub &'a TokenSet);

fn top(tokens: &[Token]) -> String {
    tokens
        .iter()
        .take(10)
        .map(|t| format!("{}={} ({})", t.name, t.value, t.frequency))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for TokenSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = self.0;
        writeln!(f, "Token candidates generated.")?;
        writeln!(f, "Colors: {}", tokens.colors.len())?;
        writeln!(f, "Typography groups: {}", tokens.typography_groups())?;
        writeln!(f, "Spaces: {}", tokens.spaces.len())?;
        writeln!(f, "Radii: {}", tokens.radii.len())?;
        writeln!(f, "Borders: {}", tokens.borders.len())?;
        writeln!(f, "Shadows: {}", tokens.shadows.len())?;
        writeln!(f, "Top colors: {}", top(&tokens.colors))?;
        write!(f, "Top spaces: {}", top(&tokens.spaces))
    }
}
