//! # External Jobs Module
//!
//! Runs the external programs that supply raw maps: one knowledge-based propensity job per
//! interaction channel and an optional secondary buriedness scan.
//!
//! ## Overview
//!
//! Every job is a function of its inputs (channel, protein, working directory) returning
//! maps or an error. Jobs run in isolated sub-directories on a bounded worker pool, and a
//! failed job never aborts its siblings; the caller receives each job's outcome and decides
//! whether a partial channel set is acceptable.
//!
//! The tool itself sits behind [`PropensityTool`], so the pool can be exercised with an
//! in-process implementation.

pub mod ghecom;
mod process;
pub mod superstar;

use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use crate::engine::cancel::CancellationToken;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::weighting::PropensityMaps;
use std::path::Path;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A program producing a propensity map and a ligsite burial map for one channel.
pub trait PropensityTool: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the job for `channel` inside `directory`, which the tool may create.
    fn run(
        &self,
        channel: Channel,
        protein: &Molecule,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<PropensityMaps, EngineError>;
}

/// Outcome of one channel's job.
pub type JobOutcome = (Channel, Result<PropensityMaps, EngineError>);

/// Runs `tool` for every channel, each in `root/<channel>`, on at most `workers` threads.
///
/// Outcomes are returned in `channels` order once all jobs have finished.
///
/// # Errors
///
/// Only a failure to set up the worker pool is returned directly; job failures are carried
/// in the outcomes.
#[instrument(skip_all, name = "propensity_jobs", fields(tool = tool.name(), jobs = channels.len()))]
pub fn run_propensity_jobs(
    tool: &dyn PropensityTool,
    protein: &Molecule,
    channels: &[Channel],
    root: &Path,
    workers: usize,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Vec<JobOutcome>, EngineError> {
    reporter.report(Progress::TaskStart {
        total_steps: channels.len() as u64,
    });

    let job = |&channel: &Channel| {
        let outcome = tool.run(channel, protein, &root.join(channel.name()), cancel);
        if let Err(e) = &outcome {
            warn!(channel = %channel, error = %e, "Propensity job failed.");
        }
        reporter.report(Progress::TaskIncrement);
        (channel, outcome)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<JobOutcome> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to start job pool: {e}")))?;
        pool.install(|| channels.par_iter().map(job).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<JobOutcome> = {
        let _ = workers;
        channels.iter().map(job).collect()
    };

    reporter.report(Progress::TaskFinish);
    info!(
        succeeded = outcomes.iter().filter(|(_, r)| r.is_ok()).count(),
        failed = outcomes.iter().filter(|(_, r)| r.is_err()).count(),
        "Propensity jobs complete."
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{GRID_SPACING, Grid};
    use nalgebra::Point3;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes nothing; fails for negative and records the directories it was given.
    struct FakeTool {
        directories: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeTool {
        fn new() -> Self {
            Self {
                directories: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PropensityTool for FakeTool {
        fn name(&self) -> &str {
            "fake"
        }

        fn run(
            &self,
            channel: Channel,
            _protein: &Molecule,
            directory: &Path,
            cancel: &CancellationToken,
        ) -> Result<PropensityMaps, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            cancel.check()?;
            let leaf = directory
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.directories.lock().unwrap().push(leaf);
            if channel == Channel::Negative {
                return Err(EngineError::ExternalTool {
                    job: channel.name().to_string(),
                    reason: "boom".to_string(),
                });
            }
            let mut propensity = Grid::new(Point3::origin(), GRID_SPACING, [2, 2, 2]).unwrap();
            propensity.values_mut().fill(channel as u8 as f64);
            let ligsite = propensity.copy_and_clear();
            Ok(PropensityMaps {
                propensity,
                ligsite,
            })
        }
    }

    #[test]
    fn one_failing_job_does_not_abort_the_batch() {
        let tool = FakeTool::new();
        let outcomes = run_propensity_jobs(
            &tool,
            &Molecule::new("protein"),
            &Channel::ALL,
            Path::new("/nonexistent/jobs"),
            2,
            &ProgressReporter::new(),
            &CancellationToken::new(),
        )
        .unwrap();

        let order: Vec<Channel> = outcomes.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, Channel::ALL.to_vec());
        for (channel, outcome) in &outcomes {
            assert_eq!(outcome.is_err(), *channel == Channel::Negative);
        }
        let mut dirs = tool.directories.lock().unwrap().clone();
        dirs.sort();
        let mut expected: Vec<String> = Channel::ALL.iter().map(|c| c.name().to_string()).collect();
        expected.sort();
        assert_eq!(dirs, expected);
    }

    #[test]
    fn cancelled_batches_report_every_job_as_cancelled() {
        let tool = FakeTool::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = run_propensity_jobs(
            &tool,
            &Molecule::new("protein"),
            &Channel::NEUTRAL,
            Path::new("/nonexistent/jobs"),
            1,
            &ProgressReporter::new(),
            &cancel,
        )
        .unwrap();
        assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
        assert!(
            outcomes
                .iter()
                .all(|(_, r)| matches!(r, Err(EngineError::Cancelled)))
        );
    }
}
