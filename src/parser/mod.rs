pub mod csv_parser;

pub use csv_parser::{Parser, StockDataParser};
