//! Resolution of a source file header against the destination schema.
//!
//! Every source position is resolved on its own, in a fixed order: alias
//! substitution, skip-prefix test, schema membership. The result is positional so
//! the row transformer can pair it with raw records by index.

use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedColumn {
    Destination(String),
    Dropped,
}

impl MappedColumn {
    pub fn destination(&self) -> Option<&str> {
        match self {
            MappedColumn::Destination(name) => Some(name),
            MappedColumn::Dropped => None,
        }
    }
}

/// Positional source-to-destination correspondence, one entry per source column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    entries: Vec<MappedColumn>,
}

impl HeaderMapping {
    pub fn new(entries: Vec<MappedColumn>) -> Self {
        Self { entries }
    }

    /// Maps every position straight to the given destination names.
    pub fn identity<S: AsRef<str>>(columns: &[S]) -> Self {
        Self::new(
            columns
                .iter()
                .map(|c| MappedColumn::Destination(c.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no position maps to a destination column.
    pub fn is_empty(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| matches!(entry, MappedColumn::Dropped))
    }

    pub fn get(&self, index: usize) -> Option<&MappedColumn> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedColumn> {
        self.entries.iter()
    }

    pub fn destinations(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| entry.destination().map(|name| (idx, name)))
    }

    pub fn dropped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, MappedColumn::Dropped))
            .count()
    }
}

/// Resolves `raw_header` against `schema_columns`.
///
/// An empty header or an empty schema yields an empty mapping; callers treat that
/// as "nothing to load". An empty skip prefix disables skipping.
pub fn resolve_header<S: AsRef<str>>(
    raw_header: &[S],
    schema_columns: &[String],
    aliases: &BTreeMap<String, String>,
    skip_prefix: Option<&str>,
) -> HeaderMapping {
    if raw_header.is_empty() || schema_columns.is_empty() {
        return HeaderMapping::default();
    }
    let known: HashSet<&str> = schema_columns.iter().map(String::as_str).collect();
    let skip_prefix = skip_prefix.filter(|prefix| !prefix.is_empty());

    let entries = raw_header
        .iter()
        .map(|raw| resolve_column(raw.as_ref(), &known, aliases, skip_prefix))
        .collect();
    HeaderMapping::new(entries)
}

fn resolve_column(
    raw: &str,
    known: &HashSet<&str>,
    aliases: &BTreeMap<String, String>,
    skip_prefix: Option<&str>,
) -> MappedColumn {
    let name = aliases.get(raw).map(String::as_str).unwrap_or(raw);
    if let Some(prefix) = skip_prefix
        && name.starts_with(prefix)
    {
        return MappedColumn::Dropped;
    }
    if !known.contains(name) {
        return MappedColumn::Dropped;
    }
    MappedColumn::Destination(name.to_string())
}
