//! The crate-root error type, unifying every fatal-at-startup failure mode (SPEC_FULL
//! §7, §10).

use crate::config::ConfigError;
use crate::topology::TopologyError;

/// Everything that can make [`crate::driver::run`] return `Err` instead of a `Report`.
/// Both variants are fatal before the run starts; nothing inside a running simulation
/// can fail once construction succeeds (SPEC_FULL §7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}
