//! Client for the Fingertips public health statistics API.
//!
//! This crate provides:
//! - `IndicatorSource` trait for pluggable indicator data sources
//! - `FingertipsClient`, the HTTP implementation
//! - CSV and JSON decoding into `Frame`s

pub mod client;
pub mod parse;
pub mod source;

pub use client::FingertipsClient;
pub use source::{IndicatorSource, SourceError};
