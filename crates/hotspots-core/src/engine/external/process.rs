use crate::engine::cancel::CancellationToken;
use crate::engine::error::EngineError;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs `command` inside `directory`, sending its output to `<job>.log` there.
///
/// The process is polled until it exits; it is killed when `cancel` fires or `timeout`
/// elapses.
pub(crate) fn run_logged(
    mut command: Command,
    job: &str,
    directory: &Path,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let log_path = directory.join(format!("{job}.log"));
    let log = File::create(&log_path).map_err(|e| EngineError::io(&log_path, e))?;
    let log_err = log.try_clone().map_err(|e| EngineError::io(&log_path, e))?;
    command
        .current_dir(directory)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    debug!(job, command = ?command, "Starting external process.");
    let mut child = command.spawn().map_err(|e| EngineError::ExternalTool {
        job: job.to_string(),
        reason: format!("could not start: {e}"),
    })?;
    let started = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                debug!(job, elapsed = ?started.elapsed(), "External process finished.");
                return Ok(());
            }
            Ok(Some(status)) => {
                return Err(EngineError::ExternalTool {
                    job: job.to_string(),
                    reason: format!("{status} (see {})", log_path.display()),
                });
            }
            Ok(None) => {}
            Err(e) => {
                return Err(EngineError::ExternalTool {
                    job: job.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        let expired = timeout.filter(|limit| started.elapsed() >= *limit);
        if cancel.is_cancelled() || expired.is_some() {
            if let Err(e) = child.kill().and_then(|()| child.wait().map(|_| ())) {
                warn!(job, error = %e, "Failed to stop external process.");
            }
            return Err(match expired {
                Some(limit) => EngineError::Timeout {
                    job: job.to_string(),
                    seconds: limit.as_secs_f64(),
                },
                None => EngineError::Cancelled,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
