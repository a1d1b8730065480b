#![doc = include_str!("../README.md")]

pub mod controller;
pub mod correlator;
pub mod error;
pub mod output;
pub mod parent_builder;
pub mod parents;

pub use controller::PipelineController;
pub use correlator::Correlator;
pub use error::PipelineError;
pub use output::{OutputWriter, RunArtifacts};
pub use parent_builder::ParentDbBuilder;
pub use parents::ParentIndex;
