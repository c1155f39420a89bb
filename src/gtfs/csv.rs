//! Reading GTFS tables.
//!
//! Feeds in the wild use either `,` or `;`. The delimiter is sniffed from the
//! header line: semicolon wins only when it occurs more often than comma.
//! Quoting follows the usual `"…"` rules with `""` as an escaped quote, and
//! short rows are allowed (missing columns read as empty).

use csv::{ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};

/// A raw row keyed by header name.
pub type Row = BTreeMap<String, String>;

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// `b';'` when the header line has more semicolons than commas.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = strip_bom(text).lines().next().unwrap_or("");
    let commas = header.matches(',').count();
    let semis = header.matches(';').count();
    if semis > commas { b';' } else { b',' }
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    let text = strip_bom(text);
    ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .from_reader(text.as_bytes())
}

/// Stretch or cut `record` to exactly `width` fields.
///
/// Serde deserialization fails on a short record even when every field has a
/// default, so missing trailing columns are filled with empty strings here.
fn fit_to_headers(record: &mut StringRecord, width: usize) {
    if record.len() > width {
        record.truncate(width);
    }
    while record.len() < width {
        record.push_field("");
    }
}

/// Deserialize every row of a table.
pub fn parse<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, csv::Error> {
    let mut reader = reader(text);
    let headers = reader.headers()?.clone();

    let mut out = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        fit_to_headers(&mut record, headers.len());
        out.push(record.deserialize(Some(&headers))?);
    }
    Ok(out)
}

/// Deserialize only the rows whose `column` value is in `keep`.
///
/// Rows are filtered before deserialization, which matters for
/// `stop_times.txt` where a single stop owns a tiny share of the table.
pub fn parse_where<T: DeserializeOwned>(
    text: &str,
    column: &str,
    keep: &HashSet<String>,
) -> Result<Vec<T>, csv::Error> {
    let mut reader = reader(text);
    let headers = reader.headers()?.clone();
    let Some(idx) = headers.iter().position(|h| h == column) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        if record.get(idx).is_some_and(|v| keep.contains(v)) {
            fit_to_headers(&mut record, headers.len());
            out.push(record.deserialize(Some(&headers))?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
    }

    #[test]
    fn sniffs_semicolon_only_when_dominant() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("a,b;c\n"), b',');
        assert_eq!(sniff_delimiter("a;b,c\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn parses_rows_by_header() {
        let rows: Vec<Row> = parse("\u{feff}stop_id,stop_name\n1,Centras\n2,Stotis\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["stop_id"], "1");
        assert_eq!(rows[1]["stop_name"], "Stotis");
    }

    #[test]
    fn quoted_fields_and_escapes() {
        let rows: Vec<Pair> = parse("id;name\n7;\"Say \"\"hi\"\"; then go\"\r\n").unwrap();
        assert_eq!(
            rows,
            vec![Pair {
                id: "7".into(),
                name: "Say \"hi\"; then go".into()
            }]
        );
    }

    #[test]
    fn short_rows_fill_missing_columns() {
        let rows: Vec<Pair> = parse("id,name\n9\n").unwrap();
        assert_eq!(rows, vec![Pair { id: "9".into(), name: String::new() }]);
    }

    #[test]
    fn long_rows_drop_extra_columns() {
        let rows: Vec<Pair> = parse("id,name\n9,Centras,extra\n").unwrap();
        assert_eq!(rows, vec![Pair { id: "9".into(), name: "Centras".into() }]);
    }

    #[test]
    fn short_rows_are_kept_by_parse_where() {
        let keep: HashSet<String> = ["9".to_string()].into();
        let rows: Vec<Pair> = parse_where("id,name\n9\n8,skip\n9,Stotis\n", "id", &keep).unwrap();
        assert_eq!(
            rows,
            vec![
                Pair { id: "9".into(), name: String::new() },
                Pair { id: "9".into(), name: "Stotis".into() },
            ]
        );
    }

    #[test]
    fn empty_table_has_no_rows() {
        let rows: Vec<Row> = parse("").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn parse_where_filters_on_column() {
        let keep: HashSet<String> = ["2".to_string()].into();
        let rows: Vec<Pair> = parse_where("id,name\n1,a\n2,b\n3,c\n2,d\n", "id", &keep).unwrap();
        let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d"]);

        let none: Vec<Pair> = parse_where("x,y\n1,2\n", "id", &keep).unwrap();
        assert!(none.is_empty());
    }
}
