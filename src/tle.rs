//! Three-line catalog text (name, line 1, line 2) to element records and back.

use log::debug;
use serde::{Deserialize, Serialize};

/// One catalog entry as it appears in the text, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TleRecord {
    pub norad_id: u32,
    pub name: String,
    pub line1: String,
    pub line2: String,
}

/// Split catalog text into records.
///
/// Blank lines are ignored and the rest is consumed three lines at a time. A
/// group whose second and third lines do not start with `"1 "` and `"2 "`, or
/// whose catalog number (columns 3-7 of line 1) is not an integer, is skipped.
/// A trailing group of fewer than three lines is dropped. Duplicates are kept
/// in input order.
pub fn parse_catalog(text: &str) -> Vec<TleRecord> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut records = Vec::with_capacity(lines.len() / 3);
    for group in lines.chunks_exact(3) {
        let (name, line1, line2) = (group[0], group[1], group[2]);
        if !line1.starts_with("1 ") || !line2.starts_with("2 ") {
            debug!("[parse_catalog] skipping malformed group starting with {:?}", name);
            continue;
        }
        let Some(norad_id) = catalog_number(line1) else {
            debug!("[parse_catalog] skipping group with bad catalog number: {:?}", line1);
            continue;
        };
        records.push(TleRecord {
            norad_id,
            name: name.to_string(),
            line1: line1.to_string(),
            line2: line2.to_string(),
        });
    }
    records
}

/// Catalog number from its fixed columns in line 1. Only an integer parse is
/// attempted; the line is otherwise trusted to be fixed-width.
pub fn catalog_number(line1: &str) -> Option<u32> {
    line1.get(2..7)?.trim().parse().ok()
}

/// Write records back out as catalog text, one three-line group each.
pub fn to_catalog_text<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a TleRecord>,
{
    let mut out = String::new();
    for r in records {
        out.push_str(&r.name);
        out.push('\n');
        out.push_str(&r.line1);
        out.push('\n');
        out.push_str(&r.line2);
        out.push('\n');
    }
    out
}
