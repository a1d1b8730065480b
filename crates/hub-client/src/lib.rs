#![doc = include_str!("../README.md")]

pub mod client;
pub mod error;
pub mod model;
pub mod selector;

pub use client::{CandidatePager, ExtraInfo, HubClient};
pub use error::HubClientError;
pub use selector::Selector;
