pub mod config;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod hasher;
pub mod source;
pub mod tracker;

pub use config::TrackerConfig;
pub use coordinator::{CancellationToken, ResolutionReport};
pub use error::DepInfoError;
pub use hasher::Digest;
pub use tracker::{DependencyTracker, SCRIPT_SOURCE_NAME, SHADER_SOURCE_NAME};

/// Wall-clock instant used for every file and node timestamp.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
