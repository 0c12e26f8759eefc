//! Sequencing of the InSAR workflow steps
//!
//! A run is planned in full before any step executes: every step is resolved
//! to `Execute` with its arguments or `Skip` with a reason. Since the run
//! configuration is read-only, the plan makes the same decisions a step-by-step
//! walk would, but configuration mistakes surface before any work is done.

use super::paths::OutputPaths;
use super::persistence::{RunSteps, StepOutcome};
use super::registry::StepRegistry;
use super::step::{step_failure, SlcVariant, StepArgs, StepId};
use crate::config::RunConfig;
use crate::journal::Channel;
use crate::types::{InsarError, InsarResult, ProductType};
use std::time::{Duration, Instant};

/// Receiver of step resolutions, normally the persistence ledger
pub trait StepJournal {
    /// Called after a step resolves and before the next one starts
    fn record(&mut self, step: StepId, outcome: StepOutcome) -> InsarResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Resolved by an earlier invocation according to the ledger
    AlreadyResolved,
    /// Turned off by the named configuration switch
    Disabled(&'static str),
    /// The product this step writes is not requested
    NoOutput(ProductType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Execute(StepArgs),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub step: StepId,
    pub disposition: Disposition,
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub executed: Vec<(StepId, Duration)>,
    pub skipped: Vec<(StepId, SkipReason)>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn executed_steps(&self) -> Vec<StepId> {
        self.executed.iter().map(|(step, _)| *step).collect()
    }

    pub fn skip_reason(&self, step: StepId) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|(skipped, _)| *skipped == step)
            .map(|(_, reason)| reason)
    }
}

/// Resolve every step of the workflow for this invocation
pub fn plan(
    cfg: &RunConfig,
    out_paths: &OutputPaths,
    run_steps: &RunSteps,
) -> InsarResult<Vec<PlannedStep>> {
    StepId::ALL
        .iter()
        .map(|&step| {
            let disposition = if run_steps.should_run(step) {
                plan_step(step, cfg, out_paths)?
            } else {
                Disposition::Skip(SkipReason::AlreadyResolved)
            };
            Ok(PlannedStep { step, disposition })
        })
        .collect()
}

fn plan_step(step: StepId, cfg: &RunConfig, out_paths: &OutputPaths) -> InsarResult<Disposition> {
    match step.disabled_reason(cfg, out_paths) {
        Some(reason) => Ok(Disposition::Skip(reason)),
        None => step_args(step, cfg, out_paths).map(Disposition::Execute),
    }
}

/// Arguments of an enabled step; a product path it cannot run without is a
/// configuration error
fn step_args(step: StepId, cfg: &RunConfig, out_paths: &OutputPaths) -> InsarResult<StepArgs> {
    let name = step.as_str();
    let args = match step {
        StepId::BandpassInsar
        | StepId::Rdr2geo
        | StepId::Geo2rdr
        | StepId::DenseOffsets
        | StepId::Ionosphere => StepArgs::none(),
        StepId::H5Prep => StepArgs::with_paths(
            out_paths.iter().map(|(_, path)| path.to_path_buf()).collect(),
        ),
        StepId::CoarseResample => StepArgs::none().variant(SlcVariant::Coarse),
        StepId::FineResample => StepArgs::none().variant(SlcVariant::Fine),
        StepId::OffsetsProduct => {
            StepArgs::with_paths(vec![out_paths.require(ProductType::ROFF, name)?])
        }
        StepId::Rubbersheet | StepId::FilterInterferogram => {
            StepArgs::with_paths(vec![out_paths.require(ProductType::RIFG, name)?])
        }
        StepId::Crossmul => {
            // fine-coregistered SLCs are only there if fine resampling ran
            let variant = if StepId::FineResample.is_enabled(cfg, out_paths) {
                SlcVariant::Fine
            } else {
                SlcVariant::Coarse
            };
            StepArgs::with_paths(vec![out_paths.require(ProductType::RIFG, name)?]).variant(variant)
        }
        StepId::Unwrap => StepArgs::with_paths(vec![
            out_paths.require(ProductType::RIFG, name)?,
            out_paths.require(ProductType::RUNW, name)?,
        ]),
        StepId::Geocode => StepArgs::with_paths(vec![
            out_paths.require(ProductType::RUNW, name)?,
            out_paths.require(ProductType::GUNW, name)?,
        ]),
    };
    Ok(args)
}

/// Run the InSAR workflow
///
/// Steps execute in declared order, one at a time. Each resolution is handed
/// to `journal` before the next step starts. The first failing step aborts the
/// run; nothing is retried or rolled back.
pub fn run(
    cfg: &RunConfig,
    out_paths: &OutputPaths,
    run_steps: &RunSteps,
    registry: &StepRegistry,
    journal: &mut dyn StepJournal,
    channel: &Channel,
) -> InsarResult<RunReport> {
    channel.info("starting INSAR");
    let t_all = Instant::now();

    let planned = plan(cfg, out_paths, run_steps)?;
    for entry in &planned {
        if matches!(entry.disposition, Disposition::Execute(_)) && !registry.contains(entry.step) {
            return Err(InsarError::Configuration(format!(
                "No action registered for step '{}'",
                entry.step
            )));
        }
    }

    let mut report = RunReport::default();
    for PlannedStep { step, disposition } in planned {
        match disposition {
            Disposition::Skip(reason) => {
                channel.debug(&format!("skipping {}: {:?}", step, reason));
                if reason != SkipReason::AlreadyResolved {
                    journal.record(step, StepOutcome::Skipped)?;
                }
                report.skipped.push((step, reason));
            }
            Disposition::Execute(args) => {
                let action = registry.get(step).ok_or_else(|| {
                    InsarError::Configuration(format!("No action registered for step '{}'", step))
                })?;

                channel.info(&format!("running {}", step));
                let t_step = Instant::now();
                if let Err(error) = action.run(cfg, &args) {
                    channel.error(&format!("{} failed: {:#}", step, error));
                    return Err(step_failure(step, error));
                }
                let elapsed = t_step.elapsed();
                channel.timing(&format!("successfully ran {}", step), elapsed);

                journal.record(step, StepOutcome::Completed)?;
                report.executed.push((step, elapsed));
            }
        }
    }

    report.elapsed = t_all.elapsed();
    channel.timing("successfully ran INSAR", report.elapsed);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::GUNW_CONFIG;
    use crate::workflow::persistence::Persistence;
    use crate::workflow::step::step_fn;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_registry(calls: &Rc<RefCell<Vec<(StepId, StepArgs)>>>) -> StepRegistry {
        recording_registry_without(calls, None)
    }

    fn recording_registry_without(
        calls: &Rc<RefCell<Vec<(StepId, StepArgs)>>>,
        unbound: Option<StepId>,
    ) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for step in StepId::ALL.iter().copied().filter(|s| Some(*s) != unbound) {
            let calls = Rc::clone(calls);
            registry.register(
                step,
                step_fn(move |_, args| {
                    calls.borrow_mut().push((step, args.clone()));
                    Ok(())
                }),
            );
        }
        registry
    }

    fn gunw_paths() -> OutputPaths {
        OutputPaths::new()
            .with(ProductType::RIFG, "rifg.h5")
            .with(ProductType::RUNW, "runw.h5")
            .with(ProductType::GUNW, "gunw.h5")
            .with(ProductType::ROFF, "roff.h5")
            .with(ProductType::GOFF, "goff.h5")
    }

    #[test]
    fn test_plan_gating() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let planned = plan(&cfg, &gunw_paths(), &RunSteps::all()).unwrap();
        assert_eq!(planned.len(), StepId::ALL.len());

        let disposition = |step: StepId| {
            planned
                .iter()
                .find(|p| p.step == step)
                .map(|p| p.disposition.clone())
                .unwrap()
        };
        assert_eq!(
            disposition(StepId::DenseOffsets),
            Disposition::Skip(SkipReason::Disabled("processing.dense_offsets.enabled"))
        );
        assert_eq!(
            disposition(StepId::OffsetsProduct),
            Disposition::Execute(StepArgs::with_paths(vec!["roff.h5".into()]))
        );
        assert_eq!(
            disposition(StepId::Crossmul),
            Disposition::Execute(
                StepArgs::with_paths(vec!["rifg.h5".into()]).variant(SlcVariant::Coarse)
            )
        );
        assert_eq!(
            disposition(StepId::Geocode),
            Disposition::Execute(StepArgs::with_paths(vec!["runw.h5".into(), "gunw.h5".into()]))
        );
    }

    #[test]
    fn test_crossmul_uses_fine_slc_when_fine_resample_enabled() {
        let content = format!("{}\n[processing.fine_resample]\nenabled = true\n", GUNW_CONFIG);
        let cfg = RunConfig::from_toml_str(&content).unwrap();
        let planned = plan(&cfg, &gunw_paths(), &RunSteps::all()).unwrap();

        let crossmul = planned.iter().find(|p| p.step == StepId::Crossmul).unwrap();
        match &crossmul.disposition {
            Disposition::Execute(args) => assert_eq!(args.variant, Some(SlcVariant::Fine)),
            other => panic!("crossmul not executed: {:?}", other),
        }
    }

    #[test]
    fn test_geocode_without_runw_is_a_configuration_error() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let mut out_paths = gunw_paths();
        out_paths.remove(ProductType::RUNW);

        let result = plan(&cfg, &out_paths, &RunSteps::all());
        assert!(matches!(result, Err(InsarError::Configuration(msg)) if msg.contains("geocode")));
    }

    #[test]
    fn test_run_executes_in_declared_order() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let registry = recording_registry(&calls);
        let mut journal = Persistence::new(None, false).unwrap();

        let report = run(
            &cfg,
            &gunw_paths(),
            &RunSteps::all(),
            &registry,
            &mut journal,
            &Channel::insar_run(),
        )
        .unwrap();

        let executed: Vec<StepId> = calls.borrow().iter().map(|(step, _)| *step).collect();
        assert_eq!(executed, report.executed_steps());
        assert_eq!(
            executed,
            vec![
                StepId::BandpassInsar,
                StepId::H5Prep,
                StepId::Rdr2geo,
                StepId::Geo2rdr,
                StepId::CoarseResample,
                StepId::OffsetsProduct,
                StepId::Crossmul,
                StepId::Unwrap,
                StepId::Geocode,
            ]
        );
        assert!(!journal.run());
    }

    #[test]
    fn test_missing_action_fails_before_any_step() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let registry = recording_registry_without(&calls, Some(StepId::Geocode));
        let mut journal = Persistence::new(None, false).unwrap();

        let result = run(
            &cfg,
            &gunw_paths(),
            &RunSteps::all(),
            &registry,
            &mut journal,
            &Channel::insar_run(),
        );
        assert!(matches!(result, Err(InsarError::Configuration(msg)) if msg.contains("geocode")));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_step_failure_aborts_run() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = recording_registry(&calls);
        registry.register(
            StepId::Geo2rdr,
            step_fn(|_, _| Err(anyhow::anyhow!("orbit does not cover acquisition"))),
        );
        let mut journal = Persistence::new(None, false).unwrap();

        let result = run(
            &cfg,
            &gunw_paths(),
            &RunSteps::all(),
            &registry,
            &mut journal,
            &Channel::insar_run(),
        );

        match result {
            Err(InsarError::StepExecution { step, error }) => {
                assert_eq!(step, "geo2rdr");
                assert_eq!(error.to_string(), "orbit does not cover acquisition");
            }
            other => panic!("expected step failure, got {:?}", other),
        }
        assert_eq!(calls.borrow().len(), 3);
        assert!(journal.is_resolved(StepId::Rdr2geo));
        assert!(!journal.is_resolved(StepId::Geo2rdr));
    }
}
