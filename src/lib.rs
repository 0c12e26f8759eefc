//! insarflow: restartable InSAR workflow orchestration and product writing
//!
//! The workflow runs a fixed sequence of interferometric processing steps,
//! records every resolved step in a crash-safe ledger so an interrupted run can
//! resume, and writes the hierarchical RIFG/RUNW/ROFF/GUNW/GOFF products.

pub mod config;
pub mod journal;
pub mod product;
pub mod types;
pub mod workflow;

// Re-export main types and functions for easier access
pub use config::RunConfig;
pub use journal::Channel;
pub use types::{Frequency, Geogrid, InsarError, InsarResult, Polarization, ProductType, RadarGrid};
pub use workflow::{Persistence, RunReport, StepAction, StepArgs, StepId, StepRegistry};

/// Run (or resume) the InSAR workflow for a validated configuration
///
/// With `restart`, steps already recorded in the ledger at `logging.path` are
/// not executed again. If every step is already resolved this returns an empty
/// report without touching any output.
pub fn run_workflow(
    cfg: &RunConfig,
    restart: bool,
    registry: &StepRegistry,
    channel: &Channel,
) -> InsarResult<RunReport> {
    let mut persist = Persistence::new(cfg.logging.path.as_deref(), restart)?;
    if !persist.run() {
        channel.info("all InSAR steps already resolved, nothing to do");
        return Ok(RunReport::default());
    }

    let (products, out_paths) = workflow::get_products_and_paths(cfg);
    log::info!(
        "Generating {} products: {:?}",
        cfg.primary_executable.product_type,
        products
    );

    let run_steps = persist.run_steps().clone();
    workflow::run(cfg, &out_paths, &run_steps, registry, &mut persist, channel)
}
