use insarflow::product::store;
use insarflow::workflow::{SkipReason, StepAction};
use insarflow::{
    run_workflow, Channel, InsarError, ProductType, RunConfig, StepArgs, StepId, StepRegistry,
};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

const CONFIG_TEMPLATE: &str = r#"
[logging]
path = "{LOGFILE}"

[primary_executable]
product_type = "{PRODUCT}"

[product_path_group]
sas_output_file = "{OUTPUT}"

[processing.input_subset.list_of_frequencies]
A = ["HH", "HV"]

[processing.offsets_product]
enabled = {OFFSETS}
skip_range = 2
skip_azimuth = 2

[processing.offsets_product.layer1]
window_range = 64
window_azimuth = 64

[processing.offsets_product.layer2]
window_range = 32
window_azimuth = 32

[processing.geocode.geogrids.A]
start_x = -118.5
start_y = 34.2
spacing_x = 0.001
spacing_y = -0.001
width = 40
length = 30
epsg = 4326

[processing.radar_grids.A]
length = 64
width = 48
starting_range = 850000.0
range_pixel_spacing = 6.25
"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(dir: &Path, product: &str, offsets: bool) -> RunConfig {
    let content = CONFIG_TEMPLATE
        .replace("{LOGFILE}", &dir.join("insar.log").display().to_string())
        .replace("{PRODUCT}", product)
        .replace("{OUTPUT}", &dir.join("product.h5").display().to_string())
        .replace("{OFFSETS}", if offsets { "true" } else { "false" });
    RunConfig::from_toml_str(&content).expect("Failed to parse run configuration")
}

type Calls = Rc<RefCell<Vec<StepId>>>;

/// Built-in product preparation plus recording stand-ins for every other step
fn registry(calls: &Calls, failing: Option<StepId>) -> StepRegistry {
    let mut registry = StepRegistry::with_defaults();
    for step in StepId::ALL.iter().copied().filter(|s| *s != StepId::H5Prep) {
        let calls = Rc::clone(calls);
        registry.register(
            step,
            insarflow::workflow::step_fn(move |_cfg, _args| {
                calls.borrow_mut().push(step);
                if Some(step) == failing {
                    anyhow::bail!("simulated {} failure", step);
                }
                Ok(())
            }),
        );
    }
    registry
}

fn ledger_steps(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("insar.log"))
        .expect("Failed to read ledger")
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("Invalid ledger line");
            value["step"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}

#[test]
fn test_fresh_gunw_run() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "GUNW", true);
    let calls = Calls::default();

    let report = run_workflow(&cfg, false, &registry(&calls, None), &Channel::insar_run())
        .expect("Workflow failed");

    assert_eq!(
        report.executed_steps(),
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
    assert!(!calls.borrow().contains(&StepId::H5Prep));
    assert_eq!(
        report.skip_reason(StepId::FineResample),
        Some(&SkipReason::Disabled("processing.fine_resample.enabled"))
    );

    // every step is resolved, executed or skipped
    let recorded = ledger_steps(temp_dir.path());
    assert_eq!(recorded.len(), StepId::ALL.len());
    assert_eq!(recorded[0], "bandpass_insar");
    assert_eq!(recorded[13], "geocode");

    for product in ["product.h5", "product_RIFG.h5", "product_RUNW.h5", "product_ROFF.h5", "product_GOFF.h5"] {
        assert!(temp_dir.path().join(product).exists(), "{} missing", product);
    }
}

#[test]
fn test_restart_after_complete_run_is_a_no_op() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "GUNW", true);
    let calls = Calls::default();
    let channel = Channel::insar_run();

    run_workflow(&cfg, false, &registry(&calls, None), &channel).expect("First run failed");
    let ledger_before = fs::read_to_string(temp_dir.path().join("insar.log")).unwrap();
    calls.borrow_mut().clear();

    let report = run_workflow(&cfg, true, &registry(&calls, None), &channel).expect("Restart failed");
    assert!(report.executed.is_empty());
    assert!(calls.borrow().is_empty());
    assert_eq!(fs::read_to_string(temp_dir.path().join("insar.log")).unwrap(), ledger_before);
}

#[test]
fn test_resume_after_failure() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "RUNW", false);
    let channel = Channel::insar_run();

    let calls = Calls::default();
    let result = run_workflow(&cfg, false, &registry(&calls, Some(StepId::Geo2rdr)), &channel);
    match result {
        Err(InsarError::StepExecution { step, error }) => {
            assert_eq!(step, "geo2rdr");
            assert!(error.to_string().contains("simulated"));
        }
        other => panic!("expected geo2rdr failure, got {:?}", other.map(|r| r.executed_steps())),
    }
    assert_eq!(
        *calls.borrow(),
        vec![StepId::BandpassInsar, StepId::Rdr2geo, StepId::Geo2rdr]
    );
    assert_eq!(
        ledger_steps(temp_dir.path()),
        vec!["bandpass_insar", "h5_prep", "rdr2geo"]
    );

    let calls = Calls::default();
    let report = run_workflow(&cfg, true, &registry(&calls, None), &channel).expect("Restart failed");
    assert_eq!(
        report.executed_steps(),
        vec![
            StepId::Geo2rdr,
            StepId::CoarseResample,
            StepId::Crossmul,
            StepId::Unwrap
        ]
    );
    assert_eq!(
        report.skip_reason(StepId::Rdr2geo),
        Some(&SkipReason::AlreadyResolved)
    );
    assert_eq!(
        report.skip_reason(StepId::Geocode),
        Some(&SkipReason::NoOutput(ProductType::GUNW))
    );
    assert_eq!(ledger_steps(temp_dir.path()).len(), StepId::ALL.len());
}

#[test]
fn test_resume_ignores_torn_ledger_line() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "RIFG", false);
    let channel = Channel::insar_run();

    let calls = Calls::default();
    let _ = run_workflow(&cfg, false, &registry(&calls, Some(StepId::CoarseResample)), &channel);

    let ledger = temp_dir.path().join("insar.log");
    let mut content = fs::read_to_string(&ledger).unwrap();
    content.push_str("{\"step\":\"coarse_res");
    fs::write(&ledger, content).unwrap();

    let calls = Calls::default();
    let report = run_workflow(&cfg, true, &registry(&calls, None), &channel).expect("Restart failed");
    assert_eq!(report.executed_steps().first(), Some(&StepId::CoarseResample));
    assert_eq!(
        report.skip_reason(StepId::Unwrap),
        Some(&SkipReason::NoOutput(ProductType::RUNW))
    );
}

#[test]
fn test_fresh_run_starts_over() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "RIFG", false);
    let channel = Channel::insar_run();

    let calls = Calls::default();
    run_workflow(&cfg, false, &registry(&calls, None), &channel).expect("First run failed");
    let first = calls.borrow().clone();

    let calls = Calls::default();
    run_workflow(&cfg, false, &registry(&calls, None), &channel).expect("Second run failed");
    assert_eq!(*calls.borrow(), first);
}

#[test]
fn test_restart_without_logfile_fails_fast() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut cfg = config(temp_dir.path(), "GUNW", true);
    cfg.logging.path = None;

    let calls = Calls::default();
    let result = run_workflow(&cfg, true, &registry(&calls, None), &Channel::insar_run());
    assert!(matches!(result, Err(InsarError::Configuration(_))));
    assert!(calls.borrow().is_empty());
    assert!(!temp_dir.path().join("product.h5").exists());
}

#[test]
fn test_custom_action_receives_product_paths() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cfg = config(temp_dir.path(), "GUNW", true);

    struct GeocodeRecorder(Rc<RefCell<Vec<StepArgs>>>);
    impl StepAction for GeocodeRecorder {
        fn run(&self, _cfg: &RunConfig, args: &StepArgs) -> anyhow::Result<()> {
            self.0.borrow_mut().push(args.clone());
            Ok(())
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let calls = Calls::default();
    let mut registry = registry(&calls, None);
    registry.register(StepId::Geocode, GeocodeRecorder(Rc::clone(&seen)));

    run_workflow(&cfg, false, &registry, &Channel::insar_run()).expect("Workflow failed");
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].paths,
        vec![temp_dir.path().join("product_RUNW.h5"), temp_dir.path().join("product.h5")]
    );
}

#[test]
fn test_fresh_run_replaces_stale_products() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let channel = Channel::insar_run();
    let cfg = config(temp_dir.path(), "GUNW", false);

    let calls = Calls::default();
    run_workflow(&cfg, false, &registry(&calls, None), &channel).expect("First run failed");
    let hv_group = "/science/LSAR/GUNW/Grids/frequencyA/unwrappedInterferogram/HV";
    let first = store::read(&temp_dir.path().join("product.h5")).expect("Failed to read GUNW");
    assert!(first.group(hv_group).is_some());

    // same outputs, one polarization fewer and a wider geogrid
    let content = CONFIG_TEMPLATE
        .replace("{LOGFILE}", &temp_dir.path().join("insar.log").display().to_string())
        .replace("{PRODUCT}", "GUNW")
        .replace("{OUTPUT}", &temp_dir.path().join("product.h5").display().to_string())
        .replace("{OFFSETS}", "false")
        .replace("A = [\"HH\", \"HV\"]", "A = [\"HH\"]")
        .replace("width = 40", "width = 45");
    let narrowed = RunConfig::from_toml_str(&content).expect("Failed to parse run configuration");

    let calls = Calls::default();
    run_workflow(&narrowed, false, &registry(&calls, None), &channel).expect("Fresh run failed");

    let second = store::read(&temp_dir.path().join("product.h5")).expect("Failed to read GUNW");
    assert!(second.group(hv_group).is_none());
    let phase = second
        .dataset("/science/LSAR/GUNW/Grids/frequencyA/unwrappedInterferogram/HH/unwrappedPhase")
        .expect("unwrapped phase");
    assert_eq!(phase.shape, vec![30, 45]);
}
