//! CSV readers for price, inflow, and action tables.
//!
//! All tables start with a `timestamp` column holding `YYYYMMDDHH` stamps.
//! A price table may open with a `rest,<value>` row carrying the terminal
//! price. Node tables name one node id per remaining column; blank cells
//! are returned as `None`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::SeriesError;

/// Prices per step plus the optional terminal price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub rest_price: Option<f64>,
    pub timestamps: Vec<NaiveDateTime>,
    pub prices: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Per-node values per step, `rows[step][column]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    /// Node id of each value column.
    pub nodes: Vec<usize>,
    pub timestamps: Vec<NaiveDateTime>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl NodeTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-blank cells as `(step, node, value)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(t, row)| {
            row.iter()
                .zip(&self.nodes)
                .filter_map(move |(value, &node)| value.map(|v| (t, node, v)))
        })
    }
}

/// Parses a `YYYYMMDDHH` stamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d").ok()?;
    let hour: u32 = s[8..].parse().ok()?;
    date.and_hms_opt(hour, 0, 0)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y%m%d%H").to_string()
}

/// Reads a price table from disk.
///
/// # Errors
///
/// Returns a `SeriesError` if the file cannot be opened or a row is malformed.
pub fn read_prices(path: &Path) -> Result<PriceSeries, SeriesError> {
    read_prices_from(open(path)?)
}

/// Reads a price table from any reader.
///
/// # Errors
///
/// Returns a `SeriesError` on a bad header, an unparsable cell, a `rest`
/// row after the first price, or timestamps that do not increase.
pub fn read_prices_from(input: impl Read) -> Result<PriceSeries, SeriesError> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    expect_header(&headers, &["timestamp", "price"])?;

    let mut series = PriceSeries::default();
    for record in rdr.records() {
        let record = record?;
        let line = line_of(&record);
        if is_rest_row(&record) {
            if !series.prices.is_empty() || series.rest_price.is_some() {
                return Err(SeriesError::Format {
                    line,
                    message: "rest row must come first and only once".to_string(),
                });
            }
            series.rest_price = Some(required(&record, 1, line, "rest price")?);
            continue;
        }
        let ts = timestamp(&record, line, series.timestamps.last())?;
        series.timestamps.push(ts);
        series.prices.push(required(&record, 1, line, "price")?);
    }
    Ok(series)
}

/// Reads an inflow or action table from disk.
///
/// # Errors
///
/// Returns a `SeriesError` if the file cannot be opened or a row is malformed.
pub fn read_node_table(path: &Path) -> Result<NodeTable, SeriesError> {
    read_node_table_from(open(path)?)
}

/// Reads a node table from any reader.
///
/// # Errors
///
/// Returns a `SeriesError` on a header that is not `timestamp` followed by
/// distinct node ids, an unparsable cell, or timestamps that do not increase.
pub fn read_node_table_from(input: impl Read) -> Result<NodeTable, SeriesError> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.get(0) != Some("timestamp") || headers.len() < 2 {
        return Err(SeriesError::Format {
            line: 1,
            message: "header must be timestamp followed by node ids".to_string(),
        });
    }
    let mut table = NodeTable::default();
    for field in headers.iter().skip(1) {
        let id: usize = field.parse().map_err(|_| SeriesError::Format {
            line: 1,
            message: format!("invalid node id \"{field}\""),
        })?;
        if table.nodes.contains(&id) {
            return Err(SeriesError::Format {
                line: 1,
                message: format!("node {id} appears twice"),
            });
        }
        table.nodes.push(id);
    }

    for record in rdr.records() {
        let record = record?;
        let line = line_of(&record);
        let ts = timestamp(&record, line, table.timestamps.last())?;
        let row = (1..=table.nodes.len())
            .map(|i| optional(&record, i, line, "value"))
            .collect::<Result<Vec<_>, _>>()?;
        table.timestamps.push(ts);
        table.rows.push(row);
    }
    Ok(table)
}

/// Number of step rows in a table, not counting a `rest` row.
///
/// # Errors
///
/// Returns a `SeriesError` if the file cannot be opened or is not valid CSV.
pub fn count_steps(path: &Path) -> Result<usize, SeriesError> {
    let mut rdr = reader(open(path)?);
    let mut rows = 0;
    for record in rdr.records() {
        if !is_rest_row(&record?) {
            rows += 1;
        }
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<File, SeriesError> {
    File::open(path).map_err(|source| SeriesError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input)
}

fn expect_header(headers: &StringRecord, names: &[&str]) -> Result<(), SeriesError> {
    if headers.iter().eq(names.iter().copied()) {
        Ok(())
    } else {
        Err(SeriesError::Format {
            line: 1,
            message: format!("expected header \"{}\"", names.join(",")),
        })
    }
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

fn is_rest_row(record: &StringRecord) -> bool {
    record.get(0).is_some_and(|f| f.eq_ignore_ascii_case("rest"))
}

fn timestamp(
    record: &StringRecord,
    line: usize,
    previous: Option<&NaiveDateTime>,
) -> Result<NaiveDateTime, SeriesError> {
    let field = record.get(0).unwrap_or_default();
    let ts = parse_timestamp(field).ok_or_else(|| SeriesError::Format {
        line,
        message: format!("invalid timestamp \"{field}\", expected YYYYMMDDHH"),
    })?;
    if previous.is_some_and(|p| ts <= *p) {
        return Err(SeriesError::Format {
            line,
            message: format!("timestamp {field} does not increase"),
        });
    }
    Ok(ts)
}

fn optional(
    record: &StringRecord,
    index: usize,
    line: usize,
    what: &str,
) -> Result<Option<f64>, SeriesError> {
    match record.get(index) {
        None | Some("") => Ok(None),
        Some(s) => match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(SeriesError::Format {
                line,
                message: format!("invalid {what} \"{s}\""),
            }),
        },
    }
}

fn required(
    record: &StringRecord,
    index: usize,
    line: usize,
    what: &str,
) -> Result<f64, SeriesError> {
    optional(record, index, line, what)?.ok_or_else(|| SeriesError::Format {
        line,
        message: format!("missing {what}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = "\
timestamp,price
rest,31.5
2024010100,40.0
2024010101,38.25
# trailing comment
2024010102,55.0
";

    #[test]
    fn parses_stamp() {
        let ts = parse_timestamp("2024013117").unwrap();
        assert_eq!(format_timestamp(&ts), "2024013117");
        assert!(parse_timestamp("2024013124").is_none());
        assert!(parse_timestamp("20240131").is_none());
        assert!(parse_timestamp("2024-01-31").is_none());
    }

    #[test]
    fn reads_prices_with_rest_row() {
        let series = read_prices_from(PRICES.as_bytes()).unwrap();
        assert_eq!(series.rest_price, Some(31.5));
        assert_eq!(series.prices, vec![40.0, 38.25, 55.0]);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn rest_row_after_prices_is_rejected() {
        let csv = "timestamp,price\n2024010100,40.0\nrest,30.0\n";
        let err = read_prices_from(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SeriesError::Format { line: 3, .. }), "{err}");
    }

    #[test]
    fn wrong_header_is_rejected() {
        let csv = "time,value\n2024010100,40.0\n";
        assert!(matches!(
            read_prices_from(csv.as_bytes()),
            Err(SeriesError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn timestamps_must_increase() {
        let csv = "timestamp,price\n2024010101,1.0\n2024010100,2.0\n";
        assert!(read_prices_from(csv.as_bytes()).is_err());
    }

    #[test]
    fn node_table_keeps_blank_cells() {
        let csv = "\
timestamp,0,1
2024010100,0.5,
2024010101,,0.75
";
        let table = read_node_table_from(csv.as_bytes()).unwrap();
        assert_eq!(table.nodes, vec![0, 1]);
        assert_eq!(table.rows[0], vec![Some(0.5), None]);
        assert_eq!(table.rows[1], vec![None, Some(0.75)]);
        let cells: Vec<_> = table.cells().collect();
        assert_eq!(cells, vec![(0, 0, 0.5), (1, 1, 0.75)]);
    }

    #[test]
    fn node_table_rejects_bad_values() {
        let csv = "timestamp,0\n2024010100,abc\n";
        assert!(read_node_table_from(csv.as_bytes()).is_err());
        let csv = "timestamp,0,0\n2024010100,1,2\n";
        assert!(read_node_table_from(csv.as_bytes()).is_err());
        let csv = "timestamp,x\n2024010100,1\n";
        assert!(read_node_table_from(csv.as_bytes()).is_err());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let csv = "timestamp,0,1\n2024010100,1\n";
        assert!(matches!(
            read_node_table_from(csv.as_bytes()),
            Err(SeriesError::Csv(_))
        ));
    }

    #[test]
    fn count_excludes_rest_row() {
        let path = std::env::temp_dir().join(format!("river_sim_count_{}.csv", std::process::id()));
        std::fs::write(&path, PRICES).unwrap();
        let rows = count_steps(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(rows.unwrap(), 3);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = count_steps(Path::new("no/such/file.csv")).unwrap_err();
        assert!(err.to_string().contains("no/such/file.csv"));
    }
}
