//! The instrument catalog and sample roster used to seed a fresh database.
//! Both can be replaced from `config.toml`; the defaults below describe the
//! cupboard the choir actually owns.

use serde::{Deserialize, Serialize};

/// One line of the catalog: an instrument type and how many of it exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: u32,
}

impl CatalogEntry {
    pub fn new(kind: &str, quantity: u32) -> Self {
        Self {
            kind: kind.to_string(),
            quantity,
        }
    }
}

/// A chorister inserted when the roster table is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoristerSeed {
    pub name: String,
    pub division: String,
}

impl ChoristerSeed {
    pub fn new(name: &str, division: &str) -> Self {
        Self {
            name: name.to_string(),
            division: division.to_string(),
        }
    }
}

pub fn default_catalog() -> Vec<CatalogEntry> {
    [
        ("Violin", 40),
        ("Viola", 10),
        ("Cielo", 6),
        ("Double bass", 5),
        ("Flute", 10),
        ("Clarinet", 10),
        ("Alto sax", 5),
        ("Soprano sax", 5),
        ("Tenor sax", 5),
        ("Trombone", 6),
        ("Euphorium", 4),
        ("Tuba", 3),
        ("French Horn", 3),
        ("Keyboard", 1),
        ("Trumpet", 10),
        ("Harp", 1),
    ]
    .into_iter()
    .map(|(kind, quantity)| CatalogEntry::new(kind, quantity))
    .collect()
}

pub fn sample_roster() -> Vec<ChoristerSeed> {
    [
        ("John Doe", "Adult Choir"),
        ("Jane Smith", "Adult Choir"),
        ("Samuel Youth", "Youth Choir"),
        ("Mary Youth", "Youth Choir"),
        ("Peter Child", "Children Choir"),
        ("Grace Child", "Children Choir"),
        ("Paul YPF", "YPF Choir"),
        ("Ruth YPF", "YPF Choir"),
    ]
    .into_iter()
    .map(|(name, division)| ChoristerSeed::new(name, division))
    .collect()
}

/// Label for the `sequence`-th instrument of a type. Whitespace and
/// punctuation are dropped from the type so labels stay easy to write on a
/// case: `Double bass` becomes `Doublebass-001`.
pub fn instrument_number(kind: &str, sequence: u32) -> String {
    let prefix: String = kind.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect();
    format!("{prefix}-{sequence:03}")
}

/// Expand the catalog into `(type, number)` pairs in catalog order.
pub fn expand(catalog: &[CatalogEntry]) -> Vec<(String, String)> {
    catalog
        .iter()
        .flat_map(|entry| {
            (1..=entry.quantity)
                .map(move |seq| (entry.kind.clone(), instrument_number(&entry.kind, seq)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_are_zero_padded_and_stripped() {
        assert_eq!(instrument_number("Violin", 1), "Violin-001");
        assert_eq!(instrument_number("Double bass", 5), "Doublebass-005");
        assert_eq!(instrument_number("French Horn", 12), "FrenchHorn-012");
    }

    #[test]
    fn expand_keeps_catalog_order() {
        let catalog = vec![CatalogEntry::new("Tuba", 2), CatalogEntry::new("Harp", 1)];
        assert_eq!(
            expand(&catalog),
            vec![
                ("Tuba".to_string(), "Tuba-001".to_string()),
                ("Tuba".to_string(), "Tuba-002".to_string()),
                ("Harp".to_string(), "Harp-001".to_string()),
            ]
        );
    }

    #[test]
    fn default_catalog_numbers_are_unique() {
        let pairs = expand(&default_catalog());
        let mut numbers: Vec<_> = pairs.iter().map(|(_, number)| number.as_str()).collect();
        let total = numbers.len();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), total);
        assert_eq!(total, 124);
    }
}
