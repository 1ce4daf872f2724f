// Price-history sources: local export files and HTTP downloads.

pub mod fetcher;
pub mod traits;

pub use fetcher::{FileSource, HttpSource};
pub use traits::PriceSource;
