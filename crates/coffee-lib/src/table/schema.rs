//! Canonical column names and types for historical tables

use super::{Cell, Table};

pub const COUNTRY: &str = "country";
pub const TYPE: &str = "type";
pub const YEAR: &str = "year";

/// Source column spellings recognized for each canonical key column
const SYNONYMS: &[(&str, &[&str])] = &[
    (COUNTRY, &["country"]),
    (TYPE, &["coffee type"]),
    (YEAR, &["año"]),
];

/// Expose `country`, `type` and `year` under their canonical names and types.
///
/// A synonym is only renamed when the canonical column is not present yet.
/// `year` becomes a nullable integer and `country`/`type` become text; other
/// columns pass through untouched. Missing key columns are left missing.
pub fn normalize(mut table: Table) -> Table {
    for (canonical, synonyms) in SYNONYMS {
        if table.has_column(canonical) {
            continue;
        }
        let source = table
            .columns()
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                synonyms.iter().any(|s| lower == *s)
            })
            .cloned();
        if let Some(source) = source {
            table.rename_column(&source, canonical);
        }
    }

    table.map_column(YEAR, |cell| cell.as_i64().map(Cell::Int).unwrap_or(Cell::Null));
    for name in [COUNTRY, TYPE] {
        table.map_column(name, |cell| match cell.as_text() {
            Some(text) => Cell::Text(text),
            None => Cell::Null,
        });
    }
    table
}
