//! Category aggregators over the deduplicated table.
//!
//! Each aggregator folds several properties of the [`DedupTable`] into one
//! frequency map for a design category. Numeric categories (spacing, radius,
//! border width) first normalize values to half-pixel precision, so `13.26px`
//! and `13.5px` count as the same spacing step.
//!
//! Typography is the exception: it groups whole records by their six-field
//! tuple, because a font size only means something together with its line
//! height, weight and so on.
//!
//! All aggregates are ranked the same way: descending count, ties broken by
//! ascending value string. `order` is the 1-based position in that ranking.

use std::collections::HashMap;

use cssparser::{Parser, ParserInput, Token};
use serde::{Deserialize, Serialize};

use crate::dedup::{by_frequency, extend_examples, DedupTable, MAX_EXAMPLES};
use crate::record::{round_half, Provenance, StyleRecord, TypographyValues};

pub const COLOR_FIELDS: &[&str] = &[
    "color",
    "backgroundColor",
    "borderTopColor",
    "borderRightColor",
    "borderBottomColor",
    "borderLeftColor",
    "outlineColor",
    "textDecorationColor",
    "fill",
    "stroke",
];

pub const SPACE_FIELDS: &[&str] = &[
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "gap",
    "rowGap",
    "columnGap",
];

pub const RADIUS_FIELDS: &[&str] = &[
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomRightRadius",
    "borderBottomLeftRadius",
];

pub const BORDER_WIDTH_FIELDS: &[&str] = &[
    "borderTopWidth",
    "borderRightWidth",
    "borderBottomWidth",
    "borderLeftWidth",
];

pub const SHADOW_FIELDS: &[&str] = &["boxShadow"];

/// One ranked value of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub value: String,
    pub count: usize,
    pub examples: Vec<Provenance>,
    pub order: usize,
}

/// One ranked typography tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypographyEntry {
    pub key: String,
    pub values: TypographyValues,
    pub count: usize,
    pub examples: Vec<Provenance>,
    pub order: usize,
}

/// Ranked aggregates for every category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    pub colors: Vec<AggregatedEntry>,
    pub typography: Vec<TypographyEntry>,
    pub spaces: Vec<AggregatedEntry>,
    pub radii: Vec<AggregatedEntry>,
    pub borders: Vec<AggregatedEntry>,
    pub shadows: Vec<AggregatedEntry>,
}

#[derive(Default)]
struct Tally {
    count: usize,
    examples: Vec<Provenance>,
}

/// Sums counts for `fields`, mapping each value through `normalize`.
///
/// Values for which `normalize` returns `None` are dropped.
fn tally<F>(table: &DedupTable, fields: &[&str], normalize: F) -> Vec<AggregatedEntry>
where
    F: Fn(&str) -> Option<String>,
{
    let mut map: HashMap<String, Tally> = HashMap::new();
    for field in fields {
        let Some(values) = table.field(field) else {
            continue;
        };
        for (value, stats) in values.iter() {
            let Some(value) = normalize(value) else {
                continue;
            };
            let entry = map.entry(value).or_default();
            entry.count += stats.count;
            extend_examples(&mut entry.examples, &stats.examples);
        }
    }
    rank(map)
}

fn rank(map: HashMap<String, Tally>) -> Vec<AggregatedEntry> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|a, b| by_frequency((&a.0, a.1.count), (&b.0, b.1.count)));
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (value, tally))| AggregatedEntry {
            value,
            count: tally.count,
            examples: tally.examples,
            order: idx + 1,
        })
        .collect()
}

/// Normalizes a pixel length to half-pixel precision.
///
/// The trimmed value must end in `px`; its leading `px` dimension is the
/// number taken, so a multi-value `gap: 4px 8px` counts as `4px`. The number
/// is rounded to the nearest 0.5 with halves rounding up and formatted
/// without trailing zeros: `13.26px` becomes `13.5px`, `13.24px` becomes
/// `13px`. Anything else, including `0`, `1em` and `auto`, yields `None`.
///
/// The number is re-read from the source text as `f64`; the tokenizer's own
/// value is `f32` and would drift above 2^24.
pub fn normalize_px(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if !trimmed.ends_with("px") {
        return None;
    }
    let mut input = ParserInput::new(trimmed);
    let mut parser = Parser::new(&mut input);
    let start = parser.position();
    let (approx, unit_len) = match parser.next() {
        Ok(&Token::Dimension {
            value, ref unit, ..
        }) if unit.eq_ignore_ascii_case("px") => (value, unit.len()),
        _ => return None,
    };
    let text = parser.slice_from(start);
    let number = text
        .len()
        .checked_sub(unit_len)
        .and_then(|end| text.get(..end))
        .and_then(|digits| digits.parse::<f64>().ok())
        .unwrap_or_else(|| f64::from(approx));
    if !number.is_finite() {
        return None;
    }
    Some(format!("{}px", round_half(number)))
}

/// Color aggregate: every color-bearing property, exact string identity.
pub fn aggregate_colors(table: &DedupTable) -> Vec<AggregatedEntry> {
    tally(table, COLOR_FIELDS, |v| Some(v.to_string()))
}

/// Pixel aggregate over `fields`, normalized with [`normalize_px`].
pub fn aggregate_px(table: &DedupTable, fields: &[&str]) -> Vec<AggregatedEntry> {
    tally(table, fields, normalize_px)
}

/// Shadow aggregate: raw `boxShadow` strings.
pub fn aggregate_shadows(table: &DedupTable) -> Vec<AggregatedEntry> {
    tally(table, SHADOW_FIELDS, |v| Some(v.to_string()))
}

/// Groups records by their typography tuple (joint, not marginal, frequency).
pub fn aggregate_typography(records: &[StyleRecord]) -> Vec<TypographyEntry> {
    let mut groups: HashMap<String, TypographyEntry> = HashMap::new();
    for record in records {
        let values = TypographyValues::from_record(record);
        let key = values.key();
        let group = groups.entry(key.clone()).or_insert_with(|| TypographyEntry {
            key,
            values,
            count: 0,
            examples: Vec::new(),
            order: 0,
        });
        group.count += 1;
        if group.examples.len() < MAX_EXAMPLES {
            group.examples.push(record.provenance());
        }
    }
    rank_typography(groups.into_values().collect())
}

/// Typography aggregate from the tuples stored in a dedup table.
///
/// Used when only the deduplicated inventory is available.
pub fn typography_from_table(table: &DedupTable) -> Vec<TypographyEntry> {
    let mut groups: HashMap<String, TypographyEntry> = HashMap::new();
    for tuple in &table.typography_tuples {
        let key = if tuple.key.is_empty() {
            tuple.values.key()
        } else {
            tuple.key.clone()
        };
        let group = groups.entry(key.clone()).or_insert_with(|| TypographyEntry {
            key,
            values: tuple.values.clone(),
            count: 0,
            examples: Vec::new(),
            order: 0,
        });
        group.count += tuple.count;
        extend_examples(&mut group.examples, &tuple.examples);
    }
    rank_typography(groups.into_values().collect())
}

fn rank_typography(mut entries: Vec<TypographyEntry>) -> Vec<TypographyEntry> {
    entries.sort_by(|a, b| by_frequency((&a.key, a.count), (&b.key, b.count)));
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.order = idx + 1;
    }
    entries
}

/// Runs every aggregator.
///
/// Typography comes from `records` when any are given, otherwise from the
/// tuples stored in `table`.
pub fn aggregate_all(table: &DedupTable, records: &[StyleRecord]) -> Aggregates {
    let typography = if records.is_empty() {
        typography_from_table(table)
    } else {
        aggregate_typography(records)
    };
    Aggregates {
        colors: aggregate_colors(table),
        typography,
        spaces: aggregate_px(table, SPACE_FIELDS),
        radii: aggregate_px(table, RADIUS_FIELDS),
        borders: aggregate_px(table, BORDER_WIDTH_FIELDS),
        shadows: aggregate_shadows(table),
    }
}
