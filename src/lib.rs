//! Consecutive support break analysis for daily price histories.
//!
//! The engine ([`normalizer`] and [`analyzer`]) is pure and synchronous; the
//! [`source`], [`parser`] and [`storage`] modules load the price histories it
//! consumes.

pub mod analyzer;
pub mod config;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod source;
pub mod storage;
pub mod utils;
