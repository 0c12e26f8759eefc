//! Restartable workflow ledger
//!
//! The ledger is a JSON Lines file with one resolved step per line:
//!
//! ```text
//! {"step":"rdr2geo","outcome":"completed","recorded_at":"2026-10-18T08:17:00Z"}
//! ```
//!
//! Every append is a scoped open/write/fsync/close, so a crash between steps
//! never loses a previously recorded resolution. A partial final line left by
//! a crash mid-write is truncated on load.

use super::orchestrator::StepJournal;
use super::step::StepId;
use crate::types::{InsarError, InsarResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::ops::Index;
use std::path::{Path, PathBuf};

/// How a step was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step action returned successfully
    Completed,
    /// The step was disabled by configuration or output paths
    Skipped,
}

/// One resolved step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub step: StepId,
    pub outcome: StepOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Line layout on disk; step names are parsed separately so that unknown
/// names from other workflow versions can be skipped.
#[derive(Debug, Deserialize)]
struct RawEntry {
    step: String,
    outcome: StepOutcome,
    recorded_at: DateTime<Utc>,
}

/// Per-step "should this step execute in this invocation" flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSteps(BTreeMap<StepId, bool>);

impl RunSteps {
    pub fn all() -> Self {
        Self(StepId::ALL.iter().map(|step| (*step, true)).collect())
    }

    pub fn should_run(&self, step: StepId) -> bool {
        self.0.get(&step).copied().unwrap_or(false)
    }

    pub fn set(&mut self, step: StepId, run: bool) {
        self.0.insert(step, run);
    }

    pub fn any(&self) -> bool {
        self.0.values().any(|run| *run)
    }

    /// Steps still to run, in declared order
    pub fn pending(&self) -> Vec<StepId> {
        StepId::ALL
            .iter()
            .copied()
            .filter(|step| self.should_run(*step))
            .collect()
    }
}

impl Index<StepId> for RunSteps {
    type Output = bool;

    fn index(&self, step: StepId) -> &bool {
        self.0.get(&step).unwrap_or(&false)
    }
}

/// Durable record of resolved steps
#[derive(Debug)]
pub struct Persistence {
    logfile: Option<PathBuf>,
    entries: Vec<LedgerEntry>,
    resolved: BTreeSet<StepId>,
    run_steps: RunSteps,
}

impl Persistence {
    /// Open the ledger for a fresh run or a restart
    ///
    /// A fresh run clears the ledger file. A restart reads it and marks every
    /// recorded step as not to be run again. Restarting needs a logfile.
    pub fn new(logfile: Option<&Path>, restart: bool) -> InsarResult<Self> {
        let entries = match (logfile, restart) {
            (None, true) => {
                return Err(InsarError::Configuration(
                    "InSAR workflow persistence requires a logfile to restart".to_string(),
                ))
            }
            (None, false) => Vec::new(),
            (Some(path), true) => load_ledger(path)?,
            (Some(path), false) => {
                start_ledger(path)?;
                Vec::new()
            }
        };

        let resolved: BTreeSet<StepId> = entries.iter().map(|entry| entry.step).collect();
        let mut run_steps = RunSteps::all();
        for step in &resolved {
            run_steps.set(*step, false);
        }

        if restart {
            log::info!(
                "Restarting InSAR workflow: {} of {} steps already resolved",
                resolved.len(),
                StepId::ALL.len()
            );
        }

        Ok(Self {
            logfile: logfile.map(Path::to_path_buf),
            entries,
            resolved,
            run_steps,
        })
    }

    /// Whether any step remains to execute
    pub fn run(&self) -> bool {
        self.run_steps.any()
    }

    pub fn run_steps(&self) -> &RunSteps {
        &self.run_steps
    }

    pub fn is_resolved(&self, step: StepId) -> bool {
        self.resolved.contains(&step)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Append a resolution; returns false if the step was already recorded
    pub fn record(&mut self, step: StepId, outcome: StepOutcome) -> InsarResult<bool> {
        if self.resolved.contains(&step) {
            log::debug!("Step {} already recorded in ledger", step);
            return Ok(false);
        }

        let entry = LedgerEntry {
            step,
            outcome,
            recorded_at: Utc::now(),
        };
        if let Some(path) = &self.logfile {
            append_entry(path, &entry)?;
        }

        self.resolved.insert(step);
        self.run_steps.set(step, false);
        self.entries.push(entry);
        Ok(true)
    }
}

impl StepJournal for Persistence {
    fn record(&mut self, step: StepId, outcome: StepOutcome) -> InsarResult<()> {
        Persistence::record(self, step, outcome).map(|_| ())
    }
}

/// Truncate (or create) the ledger for a fresh run
fn start_ledger(path: &Path) -> InsarResult<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir)?;
    let file = File::create(path)?;
    file.sync_all()?;
    fsync_dir(&dir)?;
    log::debug!("Started empty ledger at {}", path.display());
    Ok(())
}

fn append_entry(path: &Path, entry: &LedgerEntry) -> InsarResult<()> {
    let created = !path.exists();
    let line = serde_json::to_string(entry)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.sync_all()?;
    drop(file);

    if created {
        fsync_dir(&parent_dir(path))?;
    }
    Ok(())
}

/// Replay the ledger, repairing a torn final line
fn load_ledger(path: &Path) -> InsarResult<Vec<LedgerEntry>> {
    if !path.exists() {
        log::warn!(
            "Ledger {} does not exist; restarting from the first step",
            path.display()
        );
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut truncate_at = None;

    for (idx, segment) in segments.iter().enumerate() {
        let terminated = segment.ends_with('\n');
        let line = segment.trim();
        if line.is_empty() {
            offset += segment.len();
            continue;
        }

        match serde_json::from_str::<RawEntry>(line) {
            Ok(raw) => match raw.step.parse::<StepId>() {
                Ok(step) => entries.push(LedgerEntry {
                    step,
                    outcome: raw.outcome,
                    recorded_at: raw.recorded_at,
                }),
                Err(_) => log::warn!("Ignoring unknown step '{}' in ledger", raw.step),
            },
            Err(e) if !terminated && idx + 1 == segments.len() => {
                log::warn!("Truncating partial ledger line {}: {}", idx + 1, e);
                truncate_at = Some(offset);
            }
            Err(e) => {
                return Err(InsarError::LedgerCorrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })
            }
        }
        offset += segment.len();
    }

    if let Some(len) = truncate_at {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(len as u64)?;
        file.sync_all()?;
    } else if !content.is_empty() && !content.ends_with('\n') {
        // complete final record without newline; terminate it before appending
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    log::debug!("Loaded {} ledger entries from {}", entries.len(), path.display());
    Ok(entries)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Make a new directory entry durable
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir)?;
    dir.sync_all()
}
