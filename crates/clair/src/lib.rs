#![doc = include_str!("../README.md")]

pub mod cwe;
pub mod error;
pub mod preflight;
pub mod report;
pub mod scanner;

pub use cwe::CweResolver;
pub use error::ClairError;
pub use preflight::verify_scanner_environment;
pub use scanner::{ClairScanner, VulnerabilityScanner};
