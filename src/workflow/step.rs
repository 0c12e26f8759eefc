use super::orchestrator::SkipReason;
use super::paths::OutputPaths;
use crate::config::{FilterType, RunConfig};
use crate::types::{InsarError, ProductType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Workflow steps in their fixed execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    BandpassInsar,
    H5Prep,
    Rdr2geo,
    Geo2rdr,
    CoarseResample,
    DenseOffsets,
    OffsetsProduct,
    Rubbersheet,
    FineResample,
    Crossmul,
    FilterInterferogram,
    Unwrap,
    Ionosphere,
    Geocode,
}

impl StepId {
    pub const ALL: [StepId; 14] = [
        StepId::BandpassInsar,
        StepId::H5Prep,
        StepId::Rdr2geo,
        StepId::Geo2rdr,
        StepId::CoarseResample,
        StepId::DenseOffsets,
        StepId::OffsetsProduct,
        StepId::Rubbersheet,
        StepId::FineResample,
        StepId::Crossmul,
        StepId::FilterInterferogram,
        StepId::Unwrap,
        StepId::Ionosphere,
        StepId::Geocode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::BandpassInsar => "bandpass_insar",
            StepId::H5Prep => "h5_prep",
            StepId::Rdr2geo => "rdr2geo",
            StepId::Geo2rdr => "geo2rdr",
            StepId::CoarseResample => "coarse_resample",
            StepId::DenseOffsets => "dense_offsets",
            StepId::OffsetsProduct => "offsets_product",
            StepId::Rubbersheet => "rubbersheet",
            StepId::FineResample => "fine_resample",
            StepId::Crossmul => "crossmul",
            StepId::FilterInterferogram => "filter_interferogram",
            StepId::Unwrap => "unwrap",
            StepId::Ionosphere => "ionosphere",
            StepId::Geocode => "geocode",
        }
    }

    /// Why this step is switched off for a run, or `None` if it should execute
    pub fn disabled_reason(&self, cfg: &RunConfig, out_paths: &OutputPaths) -> Option<SkipReason> {
        let proc_cfg = &cfg.processing;
        let switch = |enabled: bool, name: &'static str| (!enabled).then_some(SkipReason::Disabled(name));
        let output = |product: ProductType| out_paths.get(product).is_none().then_some(SkipReason::NoOutput(product));

        match self {
            StepId::BandpassInsar
            | StepId::H5Prep
            | StepId::Rdr2geo
            | StepId::Geo2rdr
            | StepId::CoarseResample
            | StepId::Crossmul => None,
            StepId::DenseOffsets => switch(proc_cfg.dense_offsets.enabled, "processing.dense_offsets.enabled"),
            StepId::OffsetsProduct => switch(
                proc_cfg.offsets_product.enabled,
                "processing.offsets_product.enabled",
            ),
            StepId::Rubbersheet => switch(proc_cfg.rubbersheet.enabled, "processing.rubbersheet.enabled"),
            StepId::FineResample => switch(proc_cfg.fine_resample.enabled, "processing.fine_resample.enabled"),
            StepId::FilterInterferogram => switch(
                proc_cfg.filter_interferogram.filter_type != FilterType::NoFilter,
                "processing.filter_interferogram.filter_type",
            ),
            StepId::Unwrap => output(ProductType::RUNW),
            StepId::Ionosphere => switch(
                proc_cfg.ionosphere_phase_correction.enabled,
                "processing.ionosphere_phase_correction.enabled",
            ),
            StepId::Geocode => output(ProductType::GUNW),
        }
    }

    /// Enable predicate of the step
    pub fn is_enabled(&self, cfg: &RunConfig, out_paths: &OutputPaths) -> bool {
        self.disabled_reason(cfg, out_paths).is_none()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = InsarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepId::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| InsarError::Configuration(format!("Unknown workflow step: {}", s)))
    }
}

/// Which co-registered SLC a resampling-dependent step works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlcVariant {
    Coarse,
    Fine,
}

impl SlcVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlcVariant::Coarse => "coarse",
            SlcVariant::Fine => "fine",
        }
    }
}

/// Arguments handed to a step action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs {
    /// Product paths the step reads or writes, in step-specific order
    pub paths: Vec<PathBuf>,
    pub variant: Option<SlcVariant>,
}

impl StepArgs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            variant: None,
        }
    }

    pub fn variant(mut self, variant: SlcVariant) -> Self {
        self.variant = Some(variant);
        self
    }
}

/// Uniform run contract of a workflow step
///
/// Actions are opaque to the orchestrator: any error is propagated verbatim and
/// aborts the run.
pub trait StepAction {
    fn run(&self, cfg: &RunConfig, args: &StepArgs) -> anyhow::Result<()>;
}

impl<F> StepAction for F
where
    F: Fn(&RunConfig, &StepArgs) -> anyhow::Result<()>,
{
    fn run(&self, cfg: &RunConfig, args: &StepArgs) -> anyhow::Result<()> {
        self(cfg, args)
    }
}

/// Pin a closure to the step action signature
///
/// Lets closure arguments and the error type be inferred at the call site.
pub fn step_fn<F>(f: F) -> F
where
    F: Fn(&RunConfig, &StepArgs) -> anyhow::Result<()>,
{
    f
}

/// Wrap an action failure with the name of the failing step
pub(crate) fn step_failure(step: StepId, error: anyhow::Error) -> InsarError {
    InsarError::StepExecution {
        step: step.as_str(),
        error,
    }
}
