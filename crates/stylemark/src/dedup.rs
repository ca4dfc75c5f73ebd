//! Deduplication of raw style records into a per-property frequency table.
//!
//! The table is always rebuilt from the full record list; it is never updated
//! incrementally. Ordering is part of the output contract:
//!
//! - property names ascend lexicographically
//! - values within a property are ranked by descending count, then ascending
//!   value
//!
//! so two runs over the same records serialize byte-identically.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::record::{Provenance, StyleRecord, TypographyValues};

/// Maximum provenance examples kept per value.
pub const MAX_EXAMPLES: usize = 10;

/// Frequency ranking shared by every stage: count descending, value ascending.
pub(crate) fn by_frequency(a: (&str, usize), b: (&str, usize)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Appends examples until [`MAX_EXAMPLES`] is reached.
pub(crate) fn extend_examples<'a, I>(examples: &mut Vec<Provenance>, more: I)
where
    I: IntoIterator<Item = &'a Provenance>,
{
    let room = MAX_EXAMPLES.saturating_sub(examples.len());
    examples.extend(more.into_iter().take(room).cloned());
}

/// Occurrence count and provenance samples for one distinct value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueStats {
    pub count: usize,
    #[serde(default)]
    pub examples: Vec<Provenance>,
}

impl ValueStats {
    fn record(&mut self, provenance: &Provenance) {
        self.count += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(provenance.clone());
        }
    }
}

/// Distinct values of one property, kept in frequency order.
///
/// Serializes as a JSON object whose key order is the ranking. Deserializing
/// re-ranks, so a table read back from disk has the same order it was
/// written with regardless of how the JSON map was stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueTable(Vec<(String, ValueStats)>);

impl ValueTable {
    fn from_unordered(values: HashMap<String, ValueStats>) -> Self {
        let mut entries: Vec<_> = values.into_iter().collect();
        entries.sort_by(|a, b| by_frequency((&a.0, a.1.count), (&b.0, b.1.count)));
        Self(entries)
    }

    /// Iterates `(value, stats)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueStats)> {
        self.0.iter().map(|(v, s)| (v.as_str(), s))
    }

    /// Looks up the stats for one value.
    pub fn get(&self, value: &str) -> Option<&ValueStats> {
        self.0.iter().find(|(v, _)| v == value).map(|(_, s)| s)
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all value counts.
    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, s)| s.count).sum()
    }
}

impl Serialize for ValueTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, stats) in &self.0 {
            map.serialize_entry(value, stats)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ValueTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueTableVisitor;

        impl<'de> Visitor<'de> for ValueTableVisitor {
            type Value = ValueTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of style values to {count, examples}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ValueTable, A::Error> {
                let mut values = HashMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((value, stats)) = access.next_entry::<String, ValueStats>()? {
                    values.insert(value, stats);
                }
                Ok(ValueTable::from_unordered(values))
            }
        }

        deserializer.deserialize_map(ValueTableVisitor)
    }
}

/// A typography tuple and how often it occurred as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypographyTuple {
    #[serde(default)]
    pub key: String,
    pub count: usize,
    pub values: TypographyValues,
    #[serde(default)]
    pub examples: Vec<Provenance>,
}

/// Per-property frequency table built from a full record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupTable {
    pub fields: BTreeMap<String, ValueTable>,
    #[serde(default)]
    pub typography_tuples: Vec<TypographyTuple>,
}

impl DedupTable {
    /// Returns the value table for a property, if it was ever observed.
    pub fn field(&self, property: &str) -> Option<&ValueTable> {
        self.fields.get(property)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.typography_tuples.is_empty()
    }
}

/// Collapses records into a [`DedupTable`].
///
/// Every `(record, property)` pair contributes one count to that property's
/// value. Typography tuples are accumulated in the same pass.
pub fn deduplicate(records: &[StyleRecord]) -> DedupTable {
    let mut fields: BTreeMap<String, HashMap<String, ValueStats>> = BTreeMap::new();
    let mut tuples: HashMap<String, TypographyTuple> = HashMap::new();

    for record in records {
        let provenance = record.provenance();

        for (property, value) in &record.styles {
            fields
                .entry(property.clone())
                .or_default()
                .entry(value.clone())
                .or_default()
                .record(&provenance);
        }

        let values = TypographyValues::from_record(record);
        let key = values.key();
        let tuple = tuples.entry(key.clone()).or_insert_with(|| TypographyTuple {
            key,
            count: 0,
            values,
            examples: Vec::new(),
        });
        tuple.count += 1;
        if tuple.examples.len() < MAX_EXAMPLES {
            tuple.examples.push(provenance);
        }
    }

    let mut typography_tuples: Vec<_> = tuples.into_values().collect();
    typography_tuples.sort_by(|a, b| by_frequency((&a.key, a.count), (&b.key, b.count)));

    tracing::debug!(
        records = records.len(),
        properties = fields.len(),
        tuples = typography_tuples.len(),
        "deduplicated style inventory"
    );

    DedupTable {
        fields: fields
            .into_iter()
            .map(|(property, values)| (property, ValueTable::from_unordered(values)))
            .collect(),
        typography_tuples,
    }
}
