use hotspots::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SPINNER_TICK_MS: u64 = 80;

/// The bar plus the workflow phase it is currently showing.
struct PhaseDisplay {
    bar: ProgressBar,
    phase: Option<(&'static str, Instant)>,
}

impl PhaseDisplay {
    fn start_phase(&mut self, name: &'static str) {
        info!(phase = name, "Phase started.");
        self.phase = Some((name, Instant::now()));
        self.bar.reset();
        self.bar.set_length(0);
        self.bar.set_style(spinner_style());
        self.bar.set_message(name);
        self.bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    }

    fn finish_phase(&mut self) {
        self.bar.disable_steady_tick();
        match self.phase.take() {
            Some((name, started)) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(phase = name, elapsed_s = elapsed, "Phase finished.");
                self.bar
                    .finish_with_message(format!("✓ {name} ({elapsed:.1}s)"));
            }
            None => self.bar.finish_with_message("✓ Done"),
        }
    }

    // Probe batches and propensity jobs both report as tasks within the running phase.
    fn start_task(&mut self, total_steps: u64) {
        self.bar.disable_steady_tick();
        self.bar.reset();
        self.bar.set_length(total_steps);
        self.bar.set_position(0);
        self.bar.set_style(bar_style());
        if let Some((name, _)) = self.phase {
            self.bar.set_message(name);
        }
    }

    fn finish_task(&mut self) {
        let length = self.bar.length().unwrap_or(0);
        self.bar.set_position(self.bar.position().max(length));
        self.bar.finish();
    }

    fn note(&mut self, message: String) {
        if self.bar.is_finished() {
            self.bar.set_message(message);
        } else {
            self.bar.println(format!("  {message}"));
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        )
        .progress_chars("=>-")
}

/// Renders engine progress events as a spinner per phase and a bar per task.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<PhaseDisplay>>,
}

impl CliProgressHandler {
    pub fn new(quiet: bool) -> Self {
        let target = if quiet {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        bar.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(PhaseDisplay { bar, phase: None })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut display) = display.lock() else {
                warn!("Progress display mutex was poisoned; dropping a progress event.");
                return;
            };
            match progress {
                Progress::PhaseStart { name } => display.start_phase(name),
                Progress::PhaseFinish => display.finish_phase(),
                Progress::TaskStart { total_steps } => display.start_task(total_steps),
                Progress::TaskIncrement => display.bar.inc(1),
                Progress::TaskFinish => display.finish_task(),
                Progress::Message(message) => display.note(message),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn bar(handler: &CliProgressHandler) -> ProgressBar {
        handler.display.lock().unwrap().bar.clone()
    }

    #[test]
    fn quiet_handler_starts_finished_and_empty() {
        let handler = CliProgressHandler::new(true);
        let bar = bar(&handler);
        assert_eq!(bar.length(), Some(0));
        assert!(bar.is_finished());
        assert!(handler.display.lock().unwrap().phase.is_none());
    }

    #[test]
    fn sampling_batches_fill_the_bar_under_the_phase_name() {
        let handler = CliProgressHandler::new(true);
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Probe Sampling",
        });
        assert_eq!(bar(&handler).message(), "Probe Sampling");

        callback(Progress::TaskStart { total_steps: 47 });
        for _ in 0..10 {
            callback(Progress::TaskIncrement);
        }
        assert_eq!(bar(&handler).position(), 10);
        assert_eq!(bar(&handler).message(), "Probe Sampling");

        // A cancelled run finishes early; the bar is still shown complete.
        callback(Progress::TaskFinish);
        assert!(bar(&handler).is_finished());
        assert_eq!(bar(&handler).position(), 47);

        callback(Progress::Message("apolar: 3 peaks".to_string()));
        assert_eq!(bar(&handler).message(), "apolar: 3 peaks");

        callback(Progress::PhaseFinish);
        let message = bar(&handler).message();
        assert!(message.starts_with("✓ Probe Sampling ("), "{message}");
        assert!(handler.display.lock().unwrap().phase.is_none());
    }

    #[test]
    fn finishing_without_a_phase_reports_done() {
        let handler = CliProgressHandler::new(true);
        handler.get_callback()(Progress::PhaseFinish);
        assert_eq!(bar(&handler).message(), "✓ Done");
    }

    #[test]
    fn propensity_workers_can_report_from_other_threads() {
        let handler = CliProgressHandler::new(true);
        let callback = Arc::new(handler.get_callback());
        callback(Progress::PhaseStart {
            name: "Propensity Maps",
        });
        callback(Progress::TaskStart { total_steps: 4 });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let callback = Arc::clone(&callback);
                thread::spawn(move || callback(Progress::TaskIncrement))
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(bar(&handler).position(), 4);
    }
}
