//! Top-level entry point. Grounded on `original_source/sim/SimCore.py::main_course` for
//! overall sequencing: build the topology and route database, seed the RNG, drive the
//! event loop to completion, and hand back the assembled report.

use rand::SeedableRng;

use crate::config::Config;
use crate::controller::{Controller, RoutingMode};
use crate::error::Error;
use crate::flowgen::FlowGenerator;
use crate::routing::RouteDb;
use crate::simulation::Simulation;
use crate::stats::Report;
use crate::topology::{LinkSpec, NodeSpec, Topology};

/// Builds and runs one complete simulation from a topology and a validated configuration.
///
/// Returns [`Error::Topology`] if `nodes`/`links` fail validation, or [`Error::Config`] if
/// `cfg` fails validation. Everything past that point is infallible by construction.
pub fn run(nodes: &[NodeSpec], links: &[LinkSpec], cfg: Config) -> Result<Report, Error> {
    let cfg = cfg.validate()?;
    let topo = Topology::new(nodes, links, cfg.topology_overrides())?;

    let need_ecmp_dag = cfg.routing_mode.resolved() == RoutingMode::Ecmp;
    let route_db = RouteDb::build(&topo, cfg.pathdb_mode, cfg.k_path, need_ecmp_dag);

    let flowgen = FlowGenerator::new(
        &topo,
        cfg.flowgen_srcdst_model,
        cfg.flowgen_sizerate_model.clone(),
        cfg.flowgen_arr_model,
    );

    let rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);

    let sim = Simulation::builder()
        .topo(topo)
        .route_db(route_db)
        .controller(Controller::new())
        .flowgen(flowgen)
        .rng(rng)
        .cfg(cfg)
        .build();

    let start = std::time::Instant::now();
    let mut report = sim.run();
    report.summary.exec_time_secs = start.elapsed().as_secs_f64();

    Ok(report)
}
