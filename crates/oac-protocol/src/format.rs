//! Output rendering: nested JSON or a flattened CSV/TSV table.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

use crate::engine::QueryResult;
use crate::types::{AttrValue, Observation};

/// Response body format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Nested `{event: {quantity: [rows]}}` (default).
    #[default]
    Json,
    /// Comma-separated table.
    Csv,
    /// Tab-separated table.
    Tsv,
}

impl OutputFormat {
    /// Parse the `format` directive. Unsupported values fall back to JSON.
    pub fn from_directive(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "csv" => OutputFormat::Csv,
            "tsv" => OutputFormat::Tsv,
            _ => OutputFormat::Json,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Json => crate::media_types::JSON,
            OutputFormat::Csv => crate::media_types::CSV,
            OutputFormat::Tsv => crate::media_types::TSV,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }

    /// Field delimiter for tabular formats.
    pub fn delimiter(&self) -> Option<char> {
        match self {
            OutputFormat::Json => None,
            OutputFormat::Csv => Some(','),
            OutputFormat::Tsv => Some('\t'),
        }
    }

    pub fn is_delimited(&self) -> bool {
        self.delimiter().is_some()
    }
}

/// Render a result in the requested format.
///
/// `sortby` only affects tabular output.
pub fn render(
    result: &QueryResult,
    format: OutputFormat,
    sortby: Option<&str>,
) -> Result<String, serde_json::Error> {
    match format.delimiter() {
        None => to_json(result),
        Some(delimiter) => Ok(spectrum_table(result, delimiter)
            .unwrap_or_else(|| to_delimited(result, delimiter, sortby))),
    }
}

type QuantityGroup<'a> = (&'a str, Vec<&'a Observation>);
type EventGroup<'a> = (&'a str, Vec<QuantityGroup<'a>>);

fn group_rows(result: &QueryResult) -> Vec<EventGroup<'_>> {
    let mut events: Vec<EventGroup<'_>> = Vec::new();
    for row in &result.rows {
        let event_idx = match events.iter().position(|(name, _)| *name == row.event) {
            Some(idx) => idx,
            None => {
                events.push((row.event.as_str(), Vec::new()));
                events.len() - 1
            }
        };
        let quantities = &mut events[event_idx].1;
        match quantities.iter_mut().find(|(name, _)| *name == row.quantity) {
            Some((_, rows)) => rows.push(&row.observation),
            None => quantities.push((row.quantity.as_str(), vec![&row.observation])),
        }
    }
    events
}

struct JsonEvents<'a>(&'a [EventGroup<'a>]);
struct JsonQuantities<'a>(&'a [QuantityGroup<'a>]);

impl Serialize for JsonEvents<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (event, quantities) in self.0 {
            map.serialize_entry(event, &JsonQuantities(quantities))?;
        }
        map.end()
    }
}

impl Serialize for JsonQuantities<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (quantity, rows) in self.0 {
            map.serialize_entry(quantity, rows)?;
        }
        map.end()
    }
}

/// Nested JSON keeping event, quantity and attribute order.
pub fn to_json(result: &QueryResult) -> Result<String, serde_json::Error> {
    let groups = group_rows(result);
    serde_json::to_string(&JsonEvents(&groups))
}

/// Table columns after `event` and `quantity`.
///
/// The requested attributes, or the union of row keys in first-seen order
/// when none were requested.
pub fn table_columns(result: &QueryResult) -> Vec<String> {
    if !result.attributes.is_empty() {
        return result.attributes.clone();
    }
    let mut columns: Vec<String> = Vec::new();
    for row in &result.rows {
        for key in row.observation.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

/// Text of one table cell, before quoting.
pub fn cell_text(value: Option<&AttrValue>) -> String {
    match value {
        None => String::new(),
        Some(AttrValue::Bool(true)) => "T".to_string(),
        Some(AttrValue::Bool(false)) => "F".to_string(),
        Some(AttrValue::List(items)) => items
            .iter()
            .map(|item| cell_text(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

fn quote_cell(text: &str, delimiter: char) -> String {
    if text.contains(delimiter) || text.contains('"') || text.contains('\n') || text.contains('\r') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Flattened table, one line per row, with a header line.
pub fn to_delimited(result: &QueryResult, delimiter: char, sortby: Option<&str>) -> String {
    let columns = table_columns(result);
    let mut header = vec!["event".to_string(), "quantity".to_string()];
    header.extend(columns.iter().cloned());

    let mut table: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.event.clone(), row.quantity.clone()];
            cells.extend(
                columns
                    .iter()
                    .map(|c| cell_text(row.observation.get(c))),
            );
            cells
        })
        .collect();

    if let Some(column) = sortby.and_then(|s| header.iter().position(|h| h.eq_ignore_ascii_case(s))) {
        table.sort_by(|a, b| compare_cells(&a[column], &b[column]));
    }

    let separator = delimiter.to_string();
    let mut out = String::new();
    for line in std::iter::once(&header).chain(table.iter()) {
        let quoted: Vec<String> = line.iter().map(|c| quote_cell(c, delimiter)).collect();
        out.push_str(&quoted.join(&separator));
        out.push('\n');
    }
    out
}

/// Sort order for `sortby`: numbers ascending, then text, then empty cells.
fn compare_cells(a: &str, b: &str) -> Ordering {
    fn rank(cell: &str) -> (u8, Option<f64>) {
        if cell.trim().is_empty() {
            return (2, None);
        }
        match cell.trim().parse::<f64>().ok().filter(|n| n.is_finite()) {
            Some(n) => (0, Some(n)),
            None => (1, None),
        }
    }

    let (rank_a, num_a) = rank(a);
    let (rank_b, num_b) = rank(b);
    rank_a.cmp(&rank_b).then_with(|| match (num_a, num_b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    })
}

/// Spectrum data table for a single `spectra` row projected to `data`.
///
/// Returns `None` when the request does not have exactly that shape.
pub fn spectrum_table(result: &QueryResult, delimiter: char) -> Option<String> {
    let single = |names: &[String], expected: &str| {
        names.len() == 1 && names[0].eq_ignore_ascii_case(expected)
    };
    if !single(&result.quantities, "spectra") || !single(&result.attributes, "data") {
        return None;
    }
    let [row] = result.rows.as_slice() else {
        return None;
    };
    let AttrValue::List(points) = row.observation.get("data")? else {
        return None;
    };

    let lines: Vec<Vec<String>> = points
        .iter()
        .map(|point| match point {
            AttrValue::List(fields) => fields.iter().map(|f| f.to_string()).collect(),
            other => vec![other.to_string()],
        })
        .collect();

    let separator = delimiter.to_string();
    let mut out = String::from("wavelength");
    out.push(delimiter);
    out.push_str("flux");
    if lines.first().map_or(false, |l| l.len() > 2) {
        out.push(delimiter);
        out.push_str("e_flux");
    }
    out.push('\n');
    for line in lines {
        out.push_str(&line.join(&separator));
        out.push('\n');
    }
    Some(out)
}
