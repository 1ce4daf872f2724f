// Pipe-delimited price history parsing
use crate::model::{ParserError, RawPricePoint};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;

pub trait Parser {
    /// Parses an export into raw points grouped by security name.
    fn parse(&self, text: &str) -> Result<BTreeMap<String, Vec<RawPricePoint>>, ParserError>;
}

/// Parser for the `name|date|open|high|low|close|volume` stock export.
pub struct StockDataParser {
    delimiter: u8,
}

impl StockDataParser {
    pub fn new() -> Self {
        Self { delimiter: b'|' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for StockDataParser {
    fn default() -> Self {
        Self::new()
    }
}

struct Columns {
    name: usize,
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, ParserError> {
        let find = |column: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(column));
        let require = |column: &str| find(column).ok_or_else(|| ParserError::MissingColumn(column.to_string()));

        Ok(Self {
            name: require("name")?,
            date: require("date")?,
            open: find("open"),
            high: find("high"),
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

fn number(record: &StringRecord, idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| record.get(i))
        .and_then(|cell| cell.parse::<f64>().ok())
}

impl Parser for StockDataParser {
    fn parse(&self, text: &str) -> Result<BTreeMap<String, Vec<RawPricePoint>>, ParserError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let columns = Columns::locate(reader.headers()?)?;
        let mut grouped: BTreeMap<String, Vec<RawPricePoint>> = BTreeMap::new();

        for record in reader.records() {
            let record = record?;
            let name = record.get(columns.name).unwrap_or("");
            if name.is_empty() {
                continue;
            }

            // unparseable numbers stay None; the normalizer decides what to drop
            let point = RawPricePoint {
                date: record.get(columns.date).unwrap_or("").to_string(),
                open: number(&record, columns.open),
                high: number(&record, columns.high),
                low: number(&record, Some(columns.low)),
                close: number(&record, Some(columns.close)),
                volume: number(&record, columns.volume),
            };
            grouped.entry(name.to_string()).or_default().push(point);
        }

        Ok(grouped)
    }
}
