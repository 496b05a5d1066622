//! A discrete-event simulator of flow-level traffic over a software-defined network: a
//! controller installs per-flow table entries along controller-selected paths, and a
//! max-min fair allocator assigns every active flow's rate from link capacities alone —
//! no packets, no congestion control.

#[macro_use]
mod ident;

pub mod time;
pub mod units;

pub mod allocator;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod flowgen;
pub mod routing;
pub mod stats;
pub mod topology;

pub(crate) mod driver;
pub(crate) mod simulation;

pub use config::{Config, ConfigError, ValidatedConfig};
pub use controller::{RerouteAlgo, RoutingMode};
pub use driver::run;
pub use error::Error;
pub use flow::{Flow, FlowId, FlowStatus};
pub use routing::PathDbMode;
pub use stats::Report;
pub use topology::{LinkSpec, NodeSpec, Topology, TopologyOverrides};
