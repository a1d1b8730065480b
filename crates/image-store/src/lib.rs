#![doc = include_str!("../README.md")]

pub mod acquirer;
pub mod docker;
pub mod error;

pub use acquirer::{ImageAcquirer, LocalImage};
pub use docker::{BollardDockerClient, ContainerSummary, DockerClient, PulledImage, RegistryAuth};
pub use error::ImageStoreError;
