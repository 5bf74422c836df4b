//! Test helpers shared across tenant-env crates.

pub mod fixture;
pub mod source;

pub use fixture::EnvFixture;
pub use source::{FailingSource, RecordingSource};
