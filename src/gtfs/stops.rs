//! Stop lookup by name.
//!
//! Names are compared after normalization: Unicode decomposition with the
//! combining diacritics removed, lowercase, and runs of whitespace collapsed,
//! so `"Umėdžių  St."` and `"umedziu st."` are the same stop.
//!
//! Matching goes through three tiers and keeps the first that finds
//! anything: exact, then prefix, then substring. An unknown name is not an
//! error; it just matches nothing.

use super::csv::Row;
use serde::Serialize;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

pub fn normalize(name: &str) -> String {
    let stripped: String = name
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of resolving a requested stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopMatch {
    /// Matched ids in table order. Departures use the first one.
    pub stop_ids: Vec<String>,
    /// Display name: the override's or first match's name, or the request.
    pub name: String,
}

/// Entry of a `/vvt/stops` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopSummary {
    pub stop_id: String,
    pub stop_name: String,
}

/// `stops.txt` in table order, addressable by id.
#[derive(Debug, Default)]
pub struct StopIndex {
    rows: Vec<Row>,
    by_id: HashMap<String, usize>,
}

fn stop_id(row: &Row) -> &str {
    row.get("stop_id").map(String::as_str).unwrap_or("")
}

fn stop_name(row: &Row) -> &str {
    row.get("stop_name").map(String::as_str).unwrap_or("")
}

impl StopIndex {
    /// Later rows with a repeated id replace the earlier row in place.
    pub fn new(rows: Vec<Row>) -> Self {
        let mut index = Self::default();
        for row in rows {
            let id = stop_id(&row).to_string();
            match index.by_id.get(&id) {
                Some(&pos) => index.rows[pos] = row,
                None => {
                    index.by_id.insert(id, index.rows.len());
                    index.rows.push(row);
                }
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.by_id.get(id).map(|&pos| &self.rows[pos])
    }

    pub fn resolve(&self, requested: &str, override_id: Option<&str>) -> StopMatch {
        if let Some(id) = override_id {
            let name = self
                .get(id)
                .map(stop_name)
                .filter(|n| !n.is_empty())
                .unwrap_or(requested);
            return StopMatch {
                stop_ids: vec![id.to_string()],
                name: name.to_string(),
            };
        }

        let target = normalize(requested);
        let named: Vec<(&Row, String)> = self
            .rows
            .iter()
            .map(|row| (row, normalize(stop_name(row))))
            .collect();

        let tiers: [&dyn Fn(&str) -> bool; 3] = [
            &|n| n == target,
            &|n| n.starts_with(&target),
            &|n| n.contains(&target),
        ];
        let candidates: Vec<&Row> = tiers
            .iter()
            .map(|tier| {
                named
                    .iter()
                    .filter(|(_, n)| tier(n.as_str()))
                    .map(|(row, _)| *row)
                    .collect::<Vec<_>>()
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let name = candidates
            .first()
            .map(|row| stop_name(row))
            .filter(|n| !n.is_empty())
            .unwrap_or(requested);
        StopMatch {
            stop_ids: candidates.iter().map(|row| stop_id(row).to_string()).collect(),
            name: name.to_string(),
        }
    }

    /// Stops whose normalized name contains `query`; an empty query lists all.
    pub fn search(&self, query: &str, limit: usize) -> Vec<StopSummary> {
        let q = normalize(query);
        self.rows
            .iter()
            .filter(|row| q.is_empty() || normalize(stop_name(row)).contains(&q))
            .take(limit)
            .map(|row| StopSummary {
                stop_id: stop_id(row).to_string(),
                stop_name: stop_name(row).to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(stops: &[(&str, &str)]) -> StopIndex {
        StopIndex::new(
            stops
                .iter()
                .map(|(id, name)| {
                    Row::from([
                        ("stop_id".to_string(), id.to_string()),
                        ("stop_name".to_string(), name.to_string()),
                    ])
                })
                .collect(),
        )
    }

    #[test]
    fn normalize_strips_marks_and_spaces() {
        assert_eq!(normalize("  Umėdžių   St. "), "umedziu st.");
        assert_eq!(normalize("ŽALGIRIO\tstotelė"), "zalgirio stotele");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn exact_beats_prefix_beats_substring() {
        let stops = index(&[
            ("1", "Old Market Square"),
            ("2", "Market Square North"),
            ("3", "Market Square"),
        ]);

        let exact = stops.resolve("market square", None);
        assert_eq!(exact.stop_ids, vec!["3"]);
        assert_eq!(exact.name, "Market Square");

        let prefix = stops.resolve("Market Square N", None);
        assert_eq!(prefix.stop_ids, vec!["2"]);

        let substring = stops.resolve("square n", None);
        assert_eq!(substring.stop_ids, vec!["2"]);

        let all_substring = stops.resolve("t squ", None);
        assert_eq!(all_substring.stop_ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn prefix_tier_keeps_table_order() {
        let stops = index(&[("1", "Old Market"), ("2", "Market B"), ("3", "Market A")]);
        let found = stops.resolve("market", None);
        assert_eq!(found.stop_ids, vec!["2", "3"]);
        assert_eq!(found.name, "Market B");
    }

    #[test]
    fn diacritics_do_not_matter() {
        let stops = index(&[("42", "Umėdžių st.")]);
        let found = stops.resolve("umedziu st.", None);
        assert_eq!(found.stop_ids, vec!["42"]);
        assert_eq!(found.name, "Umėdžių st.");
    }

    #[test]
    fn unknown_stop_echoes_request() {
        let stops = index(&[("1", "Centras")]);
        let found = stops.resolve("Nowhere", None);
        assert!(found.stop_ids.is_empty());
        assert_eq!(found.name, "Nowhere");
    }

    #[test]
    fn override_bypasses_matching() {
        let stops = index(&[("1", "Centras"), ("2", "Stotis")]);
        let found = stops.resolve("Centras", Some("2"));
        assert_eq!(found.stop_ids, vec!["2"]);
        assert_eq!(found.name, "Stotis");

        let missing = stops.resolve("Centras", Some("99"));
        assert_eq!(missing.stop_ids, vec!["99"]);
        assert_eq!(missing.name, "Centras");
    }

    #[test]
    fn search_filters_and_limits() {
        let stops = index(&[("1", "Centras"), ("2", "Stotis"), ("3", "Centro g.")]);
        let found = stops.search("CENTR", 50);
        let ids: Vec<&str> = found.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(stops.search("", 2).len(), 2);
    }

    #[test]
    fn repeated_id_replaces_in_place() {
        let stops = index(&[("1", "Old"), ("2", "Other"), ("1", "New")]);
        assert_eq!(stops.len(), 2);
        assert_eq!(stop_name(stops.get("1").unwrap()), "New");
        assert_eq!(stops.search("", 10)[0].stop_name, "New");
    }
}
