//! InSAR workflow driver: step sequencing, restart ledger and output paths

pub mod orchestrator;
pub mod paths;
pub mod persistence;
pub mod prep;
pub mod registry;
pub mod step;

// Re-export main types
pub use orchestrator::{plan, run, Disposition, PlannedStep, RunReport, SkipReason, StepJournal};
pub use paths::{get_products_and_paths, OutputPaths};
pub use persistence::{LedgerEntry, Persistence, RunSteps, StepOutcome};
pub use prep::PrepareProducts;
pub use registry::StepRegistry;
pub use step::{step_fn, SlcVariant, StepAction, StepArgs, StepId};
